use std::collections::HashMap;
use std::sync::Mutex;

use futures::future::{BoxFuture, FutureExt};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::assignments::HistoryEntry;
use crate::db::Db;
use crate::errors::BackendError;
use crate::gamification::{self, Contribution};
use crate::glossary::{GlossaryId, GlossaryItem};
use crate::recording::{
    GlossaryRef, ListedRecording, NewRecording, Recording, RecordingQuery, RecordingStatus,
};
use crate::user::{Onboarding, Principal, Profile, Role, Session, UserStats};

/// An in-memory database. Every operation runs under one lock, which
/// gives the same atomicity as the Postgres transactions.
#[derive(Default)]
pub(crate) struct MockDb {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, MockUser>,
    sessions: HashMap<Uuid, Uuid>,
    glossary: Vec<GlossaryItem>,
    recordings: Vec<Recording>,
    clock: i64,
}

struct MockUser {
    email: String,
    role: Role,
    banned: bool,
    stats: UserStats,
    onboarding: Option<Onboarding>,
    last_login_at: Option<OffsetDateTime>,
    created_at: OffsetDateTime,
}

impl MockUser {
    fn new(email: String, role: Role, name: Option<String>, created_at: OffsetDateTime) -> Self {
        MockUser {
            email,
            role,
            banned: false,
            stats: fresh_stats(name),
            onboarding: None,
            last_login_at: None,
            created_at,
        }
    }

    fn profile(&self, id: Uuid) -> Profile {
        let onboarding = self.onboarding.as_ref();

        Profile {
            id,
            email: self.email.clone(),
            name: self.stats.name.clone(),
            role: self.role.clone(),
            hearing_status: onboarding.map(|o| o.hearing_status),
            lsm_variant: onboarding.map(|o| o.lsm_variant.clone()),
            age_range: onboarding.and_then(|o| o.age_range.clone()),
            gender: onboarding.and_then(|o| o.gender.clone()),
            onboarding_completed: onboarding.is_some(),
            last_login_at: self.last_login_at,
            created_at: self.created_at,
        }
    }
}

impl State {
    fn tick(&mut self) -> OffsetDateTime {
        self.clock += 1;
        OffsetDateTime::from_unix_timestamp(1_700_000_000) + Duration::seconds(self.clock)
    }
}

fn fresh_stats(name: Option<String>) -> UserStats {
    UserStats {
        name,
        current_streak: 0,
        last_contribution_at: None,
        reputation_score: 0,
    }
}

impl MockDb {
    pub fn with_glossary(glossary: Vec<GlossaryItem>) -> Self {
        let db = MockDb::default();
        db.state.lock().unwrap().glossary = glossary;
        db
    }

    pub fn add_user(&self, role: Role) -> Uuid {
        let id = Uuid::new_v4();
        let mut state = self.state.lock().unwrap();
        let created_at = state.tick();

        state.users.insert(
            id,
            MockUser::new(format!("{}@example.com", id), role, None, created_at),
        );

        id
    }

    pub fn add_session(&self, user_id: Uuid) -> Uuid {
        let token = Uuid::new_v4();
        self.state.lock().unwrap().sessions.insert(token, user_id);
        token
    }

    pub fn ban(&self, user_id: Uuid) {
        if let Some(user) = self.state.lock().unwrap().users.get_mut(&user_id) {
            user.banned = true;
        }
    }

    pub fn set_stats(&self, user_id: Uuid, stats: UserStats) {
        if let Some(user) = self.state.lock().unwrap().users.get_mut(&user_id) {
            user.stats = stats;
        }
    }

    pub fn stats(&self, user_id: Uuid) -> UserStats {
        self.state.lock().unwrap().users[&user_id].stats.clone()
    }

    pub fn recording(&self, id: Uuid) -> Option<Recording> {
        let state = self.state.lock().unwrap();
        state.recordings.iter().find(|r| r.id == id).cloned()
    }

    pub fn recording_count(&self) -> usize {
        self.state.lock().unwrap().recordings.len()
    }

    /// Moves a recording along as the review pipeline would.
    pub fn set_status(&self, id: Uuid, status: RecordingStatus) {
        let mut state = self.state.lock().unwrap();

        if let Some(recording) = state.recordings.iter_mut().find(|r| r.id == id) {
            recording.status = status;
        }
    }
}

impl Db for MockDb {
    fn authenticate(&self, token: &Uuid) -> BoxFuture<Result<Option<Session>, BackendError>> {
        let token = *token;

        async move {
            let mut state = self.state.lock().unwrap();
            let now = state.tick();

            let user_id = match state.sessions.get(&token) {
                Some(user_id) => *user_id,
                None => return Ok(None),
            };

            let session = state.users.get_mut(&user_id).map(|user| {
                user.last_login_at = Some(now);

                Session {
                    principal: Principal::new(user_id, user.role.clone()),
                    banned: user.banned,
                }
            });

            Ok(session)
        }
        .boxed()
    }

    fn create_session(
        &self,
        email: &str,
        name: Option<String>,
        role: &Role,
    ) -> BoxFuture<Result<Uuid, BackendError>> {
        let email = email.to_owned();
        let role = role.clone();

        async move {
            let mut state = self.state.lock().unwrap();

            let existing = state
                .users
                .iter()
                .find(|(_, user)| user.email == email)
                .map(|(id, _)| *id);

            let user_id = match existing {
                Some(id) => {
                    let user = state.users.get_mut(&id).expect("user exists");
                    user.role = role;
                    if name.is_some() {
                        user.stats.name = name;
                    }
                    id
                }
                None => {
                    let id = Uuid::new_v4();
                    let created_at = state.tick();
                    state.users.insert(id, MockUser::new(email, role, name, created_at));
                    id
                }
            };

            let token = Uuid::new_v4();
            state.sessions.insert(token, user_id);

            Ok(token)
        }
        .boxed()
    }

    fn count_glossary(&self) -> BoxFuture<Result<i64, BackendError>> {
        async move { Ok(self.state.lock().unwrap().glossary.len() as i64) }.boxed()
    }

    fn retrieve_glossary(&self) -> BoxFuture<Result<Vec<GlossaryItem>, BackendError>> {
        async move {
            let mut items = self.state.lock().unwrap().glossary.clone();
            items.sort_by(crate::assignments::by_priority);
            Ok(items)
        }
        .boxed()
    }

    fn retrieve_glossary_by_id(
        &self,
        id: GlossaryId,
    ) -> BoxFuture<Result<Option<GlossaryItem>, BackendError>> {
        async move {
            let state = self.state.lock().unwrap();
            Ok(state.glossary.iter().find(|item| item.id == id).cloned())
        }
        .boxed()
    }

    fn retrieve_glossary_by_slug(
        &self,
        slug: &str,
    ) -> BoxFuture<Result<Option<GlossaryItem>, BackendError>> {
        let slug = slug.to_owned();

        async move {
            let state = self.state.lock().unwrap();
            Ok(state.glossary.iter().find(|item| item.slug == slug).cloned())
        }
        .boxed()
    }

    fn insert_recordings(
        &self,
        recordings: Vec<NewRecording>,
    ) -> BoxFuture<Result<Vec<Recording>, BackendError>> {
        async move {
            let mut state = self.state.lock().unwrap();

            for (i, new) in recordings.iter().enumerate() {
                let clashes = |other: &str| other == new.storage_key;

                if state.recordings.iter().any(|r| clashes(&r.storage_key))
                    || recordings[..i].iter().any(|r| clashes(&r.storage_key))
                {
                    return Err(BackendError::StorageKeyAlreadyExists);
                }
            }

            let mut created = Vec::with_capacity(recordings.len());

            for new in recordings {
                let created_at = state.tick();

                let recording = Recording {
                    id: new.id,
                    user_id: new.user_id,
                    glossary_id: new.glossary_id,
                    storage_key: new.storage_key,
                    filename: new.filename,
                    content_type: new.content_type,
                    status: RecordingStatus::Uploading,
                    metadata: new.metadata,
                    created_at,
                };

                state.recordings.push(recording.clone());
                created.push(recording);
            }

            Ok(created)
        }
        .boxed()
    }

    fn retrieve_recording(&self, id: &Uuid) -> BoxFuture<Result<Option<Recording>, BackendError>> {
        let id = *id;

        async move { Ok(self.recording(id)) }.boxed()
    }

    fn confirm_recordings(
        &self,
        user_id: &Uuid,
        ids: &[Uuid],
        now: OffsetDateTime,
    ) -> BoxFuture<Result<Contribution, BackendError>> {
        let user_id = *user_id;
        let ids = ids.to_vec();

        async move {
            let mut state = self.state.lock().unwrap();

            let eligible = state
                .recordings
                .iter()
                .filter(|r| {
                    ids.contains(&r.id)
                        && r.user_id == user_id
                        && r.status == RecordingStatus::Uploading
                })
                .count();

            if eligible != ids.len() {
                return Err(BackendError::NotConfirmable);
            }

            let user = state
                .users
                .get_mut(&user_id)
                .ok_or(BackendError::UserNotFound(user_id))?;

            let (stats, contribution) = gamification::contribute(&user.stats, ids.len(), now);
            user.stats = stats;

            for recording in state.recordings.iter_mut().filter(|r| ids.contains(&r.id)) {
                recording.status = RecordingStatus::Pending;
            }

            Ok(contribution)
        }
        .boxed()
    }

    fn delete_recording(&self, id: &Uuid) -> BoxFuture<Result<(), BackendError>> {
        let id = *id;

        async move {
            let mut state = self.state.lock().unwrap();
            let before = state.recordings.len();

            state.recordings.retain(|r| r.id != id);

            if state.recordings.len() == before {
                Err(BackendError::RecordingNotFound(id))
            } else {
                Ok(())
            }
        }
        .boxed()
    }

    fn list_recordings(
        &self,
        user_id: &Uuid,
        query: &RecordingQuery,
    ) -> BoxFuture<Result<(Vec<ListedRecording>, i64), BackendError>> {
        let user_id = *user_id;
        let query = query.clone();

        async move {
            let state = self.state.lock().unwrap();

            let mut matching = state
                .recordings
                .iter()
                .filter(|r| r.user_id == user_id && query.matches(r))
                .filter_map(|r| {
                    let term = state.glossary.iter().find(|g| g.id == r.glossary_id)?;

                    Some(ListedRecording {
                        recording: r.clone(),
                        glossary: GlossaryRef {
                            slug: term.slug.clone(),
                            category: term.category,
                        },
                        preview_url: None,
                    })
                })
                .collect::<Vec<_>>();

            matching.sort_by(|a, b| {
                b.recording
                    .created_at
                    .cmp(&a.recording.created_at)
                    .then_with(|| a.recording.id.cmp(&b.recording.id))
            });

            let total = matching.len() as i64;

            let page = match query.page {
                Some(page) => matching
                    .into_iter()
                    .skip(page.offset() as usize)
                    .take(page.limit as usize)
                    .collect(),
                None => matching,
            };

            Ok((page, total))
        }
        .boxed()
    }

    fn retrieve_history(&self, user_id: &Uuid) -> BoxFuture<Result<Vec<HistoryEntry>, BackendError>> {
        let user_id = *user_id;

        async move {
            let state = self.state.lock().unwrap();

            let history: Vec<HistoryEntry> = state
                .recordings
                .iter()
                .filter(|r| r.user_id == user_id)
                .map(|r| (r.glossary_id, r.status))
                .collect();

            Ok(history)
        }
        .boxed()
    }

    fn retrieve_user_stats(
        &self,
        user_id: &Uuid,
    ) -> BoxFuture<Result<Option<UserStats>, BackendError>> {
        let user_id = *user_id;

        async move {
            let state = self.state.lock().unwrap();
            Ok(state.users.get(&user_id).map(|user| user.stats.clone()))
        }
        .boxed()
    }

    fn retrieve_profile(&self, user_id: &Uuid) -> BoxFuture<Result<Option<Profile>, BackendError>> {
        let user_id = *user_id;

        async move {
            let state = self.state.lock().unwrap();
            Ok(state.users.get(&user_id).map(|user| user.profile(user_id)))
        }
        .boxed()
    }

    fn complete_onboarding(
        &self,
        user_id: &Uuid,
        onboarding: &Onboarding,
    ) -> BoxFuture<Result<Option<Profile>, BackendError>> {
        let user_id = *user_id;
        let onboarding = onboarding.clone();

        async move {
            let mut state = self.state.lock().unwrap();

            let updated = match state.users.get_mut(&user_id) {
                Some(user) if user.onboarding.is_none() => {
                    user.onboarding = Some(onboarding);
                    Some(user.profile(user_id))
                }
                _ => None,
            };

            Ok(updated)
        }
        .boxed()
    }

    fn sync_user(
        &self,
        user_id: &Uuid,
        name: Option<String>,
    ) -> BoxFuture<Result<Option<Profile>, BackendError>> {
        let user_id = *user_id;

        async move {
            let mut state = self.state.lock().unwrap();
            let now = state.tick();

            let synced = state.users.get_mut(&user_id).map(|user| {
                user.last_login_at = Some(now);
                if name.is_some() {
                    user.stats.name = name;
                }
                user.profile(user_id)
            });

            Ok(synced)
        }
        .boxed()
    }
}
