//! Works out what a user should record next from the catalog and the
//! states of their recordings.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::glossary::{Category, GlossaryId, GlossaryItem};
use crate::recording::RecordingStatus;
use crate::user::Principal;

/// How many entries the dashboard's priority list shows.
pub const PRIORITY_LIST_LENGTH: usize = 3;

/// The state of one of a user's recordings, keyed by the term it answers.
pub type HistoryEntry = (GlossaryId, RecordingStatus);

/// The display state of an assignment for one user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Available,
    Pending,
    Completed,
}

/// A catalog entry as listed on the assignments page.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Assignment {
    pub id: GlossaryId,
    pub slug: String,
    pub category: Category,
    pub status: AssignmentStatus,
}

/// A catalog entry offered as something to record next.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Mission {
    pub id: GlossaryId,
    pub slug: String,
    pub category: Category,
    pub priority: i32,
}

impl From<&GlossaryItem> for Mission {
    fn from(item: &GlossaryItem) -> Self {
        Mission {
            id: item.id,
            slug: item.slug.clone(),
            category: item.category,
            priority: item.priority,
        }
    }
}

/// Contribution counters for the dashboard.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// Percentage of the catalog contributed to, rounded.
    pub progress: u8,
    pub total_completed: usize,
    pub total_glossary: usize,
    /// Recordings still in review.
    pub pending: usize,
}

/// Ascending priority, then slug.
pub fn by_priority(a: &GlossaryItem, b: &GlossaryItem) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| a.slug.cmp(&b.slug))
}

/// Terms with at least one recording past the upload stage and not
/// rejected.
pub fn contributed_ids(history: &[HistoryEntry]) -> HashSet<GlossaryId> {
    history
        .iter()
        .filter(|(_, status)| status.is_contribution())
        .map(|(id, _)| *id)
        .collect()
}

/// `completed` if anything was approved, `pending` if anything is in
/// review, `available` otherwise.
pub fn status_label(statuses: impl IntoIterator<Item = RecordingStatus>) -> AssignmentStatus {
    let mut label = AssignmentStatus::Available;

    for status in statuses {
        match status {
            RecordingStatus::Approved => return AssignmentStatus::Completed,
            s if s.is_in_review() => label = AssignmentStatus::Pending,
            _ => {}
        }
    }

    label
}

/// The catalog as `principal` may see it, in priority order.
pub fn visible_catalog<'a>(catalog: &'a [GlossaryItem], principal: &Principal) -> Vec<&'a GlossaryItem> {
    let mut visible = catalog
        .iter()
        .filter(|item| item.is_visible_to(principal))
        .collect::<Vec<_>>();

    visible.sort_by(|a, b| by_priority(a, b));

    visible
}

/// Every visible term with its display state.
pub fn assignments(
    catalog: &[GlossaryItem],
    history: &[HistoryEntry],
    principal: &Principal,
) -> Vec<Assignment> {
    let mut by_term: HashMap<GlossaryId, Vec<RecordingStatus>> = HashMap::new();

    for (id, status) in history {
        by_term.entry(*id).or_default().push(*status);
    }

    visible_catalog(catalog, principal)
        .into_iter()
        .map(|item| Assignment {
            id: item.id,
            slug: item.slug.clone(),
            category: item.category,
            status: status_label(by_term.get(&item.id).into_iter().flatten().copied()),
        })
        .collect()
}

/// Up to `limit` visible terms the user has not contributed to yet, most
/// urgent first.
pub fn priority_list(
    catalog: &[GlossaryItem],
    history: &[HistoryEntry],
    principal: &Principal,
    limit: usize,
) -> Vec<Mission> {
    let contributed = contributed_ids(history);

    visible_catalog(catalog, principal)
        .into_iter()
        .filter(|item| !contributed.contains(&item.id))
        .take(limit)
        .map(Mission::from)
        .collect()
}

pub fn next_mission(
    catalog: &[GlossaryItem],
    history: &[HistoryEntry],
    principal: &Principal,
) -> Option<Mission> {
    priority_list(catalog, history, principal, 1).into_iter().next()
}

/// `round(100 * contributed / total)`, or 0 for an empty catalog.
pub fn percentage(contributed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }

    let rounded = (200 * contributed + total) / (2 * total);

    rounded.min(100) as u8
}

pub fn progress(total_glossary: usize, history: &[HistoryEntry]) -> Progress {
    let total_completed = contributed_ids(history).len();

    Progress {
        progress: percentage(total_completed, total_glossary),
        total_completed,
        total_glossary,
        pending: history.iter().filter(|(_, s)| s.is_in_review()).count(),
    }
}
