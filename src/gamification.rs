//! Streak and reputation accounting for confirmed uploads.
//!
//! Everything here is a pure function of the user's counters and the
//! confirmation instant; persistence is left to [`crate::db::Db`].

use serde::Serialize;
use time::OffsetDateTime;

use crate::user::UserStats;

/// Reputation awarded per confirmed recording.
pub const POINTS_PER_RECORDING: i64 = 10;

/// What a confirmation earned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contribution {
    pub new_streak: i32,
    pub points_earned: i64,
}

/// The streak after a confirmation at `now`.
///
/// Dates are compared in the offset of `now`, ignoring the time of
/// day. A confirmation on the same day keeps the streak, one on the
/// next day extends it and anything else (including a `last` in the
/// future) starts over at 1.
pub fn next_streak(current: i32, last: Option<OffsetDateTime>, now: OffsetDateTime) -> i32 {
    let last = match last {
        Some(last) => last.to_offset(now.offset()).date(),
        None => return 1,
    };

    match (now.date() - last).whole_days() {
        0 => current,
        1 => current.saturating_add(1),
        _ => 1,
    }
}

pub fn points_for(uploads: usize) -> i64 {
    uploads as i64 * POINTS_PER_RECORDING
}

/// Applies a confirmation of `uploads` recordings at `now`, returning
/// the updated counters and what was earned. The contribution instant
/// always moves to `now`, even when the streak does not change.
pub fn contribute(stats: &UserStats, uploads: usize, now: OffsetDateTime) -> (UserStats, Contribution) {
    let contribution = Contribution {
        new_streak: next_streak(stats.current_streak, stats.last_contribution_at, now),
        points_earned: points_for(uploads),
    };

    let updated = UserStats {
        name: stats.name.clone(),
        current_streak: contribution.new_streak,
        last_contribution_at: Some(now),
        reputation_score: stats.reputation_score + contribution.points_earned,
    };

    (updated, contribution)
}

/// The rank label shown on the dashboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Level {
    Iniciado,
    Explorador,
    Maestro,
}

impl Level {
    pub fn for_score(reputation_score: i64) -> Self {
        if reputation_score >= 50 {
            Level::Maestro
        } else if reputation_score >= 10 {
            Level::Explorador
        } else {
            Level::Iniciado
        }
    }
}
