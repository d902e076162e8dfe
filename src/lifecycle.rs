//! The recording lifecycle: initiation through signed upload URLs,
//! confirmation, deletion and session restore.

use std::convert::TryFrom;
use std::sync::Arc;

use futures::future::join_all;
use logging::{debug, o, warn, Logger};
use serde::Serialize;
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::db::Db;
use crate::errors::BackendError;
use crate::glossary::{GlossaryId, GlossaryItem};
use crate::media::VideoFormat;
use crate::recording::{
    InitiatedRecording, ListedRecording, NewRecording, Page, RecordingQuery, RecordingStatus,
};
use crate::store::{Store, UploadTarget, PREVIEW_URL_TTL, UPLOAD_URL_TTL};
use crate::user::Principal;

/// The most recordings a single initiation may create.
pub const MAX_BATCH_SIZE: usize = 20;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub const MAX_PAGE_SIZE: u32 = 100;

/// Clients name recordings they never managed to initiate with this
/// prefix. Session cleanup skips them.
pub const EPHEMERAL_ID_PREFIX: &str = "temp-";

/// What the client sends to start uploading.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub assignment_id: GlossaryId,
    pub content_type: String,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedBatch {
    pub recordings: Vec<InitiatedRecording>,

    /// Seconds until the upload URLs stop working.
    pub expires_in: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedSingle {
    pub recording_id: Uuid,
    pub upload_url: Url,
    pub download_url: Url,
    pub key: String,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub confirmed_count: usize,
    pub new_streak: i32,
    pub points_earned: i64,
}

/// The tally of a best-effort session cleanup.
#[derive(Debug, Default, PartialEq)]
pub struct SessionCleanup {
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Deleted,
    Skipped,
    Failed(String, BackendError),
}

impl SessionCleanup {
    fn record(mut self, outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Deleted => self.deleted += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed(..) => self.failed += 1,
        }

        self
    }
}

/// Filters for listing a user's own recordings.
#[derive(Clone, Debug, Default)]
pub struct ListFilters {
    /// Explicit ids. Disables pagination.
    pub ids: Option<Vec<Uuid>>,
    pub glossary_id: Option<GlossaryId>,
    pub status: Option<RecordingStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct RecordingPage {
    pub recordings: Vec<ListedRecording>,
    pub pagination: Pagination,
}

/// Owns every state change of a recording. The database and store are
/// handed in by the process host.
#[derive(Clone)]
pub struct RecordingManager {
    logger: Arc<Logger>,
    db: Arc<dyn Db>,
    store: Arc<dyn Store>,
}

impl RecordingManager {
    pub fn new(logger: Arc<Logger>, db: Arc<dyn Db>, store: Arc<dyn Store>) -> Self {
        Self { logger, db, store }
    }

    /// Mints `count` upload targets for the assignment and persists a
    /// recording in `UPLOADING` for each. Nothing is persisted unless
    /// every target was minted.
    pub async fn initiate_batch(
        &self,
        principal: &Principal,
        request: UploadRequest,
        count: i64,
    ) -> Result<InitiatedBatch, BackendError> {
        let count = usize::try_from(count)
            .ok()
            .filter(|c| (1..=MAX_BATCH_SIZE).contains(c))
            .ok_or_else(|| {
                BackendError::invalid(format!("count must be between 1 and {}", MAX_BATCH_SIZE))
            })?;

        let format = VideoFormat::parse(&request.content_type)?;
        let term = self.resolve(request.assignment_id).await?;

        let targets = (0..count)
            .map(|index| {
                self.store
                    .mint_upload_target(&principal.id, &term.slug, &format)
                    .map_err(|e| BackendError::MintFailed {
                        index,
                        source: Box::new(e),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let rows = targets
            .iter()
            .enumerate()
            .map(|(index, target)| {
                new_recording(principal, &term, &format, &request.metadata, target, index + 1)
            })
            .collect();

        let created = self.db.insert_recordings(rows).await?;

        debug!(self.logger, "Initiated uploads"; "user" => %principal.id, "assignment" => %term.slug, "count" => count);

        let recordings = created
            .into_iter()
            .zip(targets)
            .map(|(recording, target)| InitiatedRecording {
                recording_id: recording.id,
                upload_url: target.upload_url,
                key: target.key,
            })
            .collect();

        Ok(InitiatedBatch {
            recordings,
            expires_in: UPLOAD_URL_TTL.as_secs(),
        })
    }

    /// Like a batch of one, but also signs a preview URL so the client
    /// can play the recording back while the session goes on. `index`
    /// is the 0-based position of the take in the session.
    pub async fn initiate_single(
        &self,
        principal: &Principal,
        request: UploadRequest,
        index: i64,
    ) -> Result<InitiatedSingle, BackendError> {
        let position = usize::try_from(index)
            .map_err(|_| BackendError::invalid("index must not be negative"))?
            + 1;

        let format = VideoFormat::parse(&request.content_type)?;
        let term = self.resolve(request.assignment_id).await?;

        let target = self
            .store
            .mint_upload_target(&principal.id, &term.slug, &format)?;
        let download_url = self.store.download_url(&target.key, PREVIEW_URL_TTL)?;

        let row = new_recording(principal, &term, &format, &request.metadata, &target, position);
        let recording_id = row.id;
        self.db.insert_recordings(vec![row]).await?;

        debug!(self.logger, "Initiated single upload"; "user" => %principal.id, "id" => %recording_id);

        Ok(InitiatedSingle {
            recording_id,
            upload_url: target.upload_url,
            download_url,
            key: target.key,
        })
    }

    /// Like [`RecordingManager::confirm`] for ids exactly as the client
    /// sent them. An id that cannot name a recording makes the whole
    /// list unconfirmable.
    pub async fn confirm_listed(
        &self,
        principal: &Principal,
        ids: &[String],
    ) -> Result<Confirmation, BackendError> {
        let parsed = ids
            .iter()
            .map(|id| Uuid::parse_str(id.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| BackendError::NotConfirmable)?;

        self.confirm(principal, &parsed).await
    }

    /// Moves every one of `ids` to `PENDING` and credits the caller, or
    /// changes nothing at all.
    pub async fn confirm(
        &self,
        principal: &Principal,
        ids: &[Uuid],
    ) -> Result<Confirmation, BackendError> {
        if ids.is_empty() {
            return Err(BackendError::invalid("recordingIds array is required"));
        }

        let contribution = self
            .db
            .confirm_recordings(&principal.id, ids, OffsetDateTime::now_utc())
            .await?;

        debug!(self.logger, "Confirmed uploads"; "user" => %principal.id, "count" => ids.len(), "streak" => contribution.new_streak);

        Ok(Confirmation {
            confirmed_count: ids.len(),
            new_streak: contribution.new_streak,
            points_earned: contribution.points_earned,
        })
    }

    /// Deletes one of the caller's recordings. A failure to delete the
    /// stored object is logged and otherwise ignored.
    pub async fn delete(&self, principal: &Principal, id: Uuid) -> Result<Uuid, BackendError> {
        let recording = self
            .db
            .retrieve_recording(&id)
            .await?
            .ok_or(BackendError::RecordingNotFound(id))?;

        if recording.user_id != principal.id {
            return Err(BackendError::NotOwner(id));
        }

        if let Err(e) = self.store.delete(&recording.storage_key).await {
            warn!(self.logger, "Failed to delete stored object"; "id" => %id, "key" => %recording.storage_key, "error" => %e);
        }

        self.db.delete_recording(&id).await?;

        Ok(id)
    }

    /// Deletes whatever it can of `entries`, never stopping at a failure.
    /// Entries come straight from a page-unload beacon, so anything that
    /// is not a string counts as a failed entry.
    pub async fn delete_session(
        &self,
        principal: &Principal,
        entries: &[serde_json::Value],
    ) -> SessionCleanup {
        let outcomes = join_all(entries.iter().map(|entry| async move {
            match entry.as_str() {
                Some(id) => self.delete_entry(principal, id).await,
                None => Outcome::Failed(
                    entry.to_string(),
                    BackendError::invalid("recording id must be a string"),
                ),
            }
        }))
        .await;

        let logger = self.logger.new(o!("user" => principal.id.to_string()));

        outcomes.iter().fold(SessionCleanup::default(), |cleanup, outcome| {
            if let Outcome::Failed(id, e) = outcome {
                debug!(logger, "Skipping recording during session cleanup"; "id" => %id, "error" => %e);
            }

            cleanup.record(outcome)
        })
    }

    async fn delete_entry(&self, principal: &Principal, id: &str) -> Outcome {
        if id.starts_with(EPHEMERAL_ID_PREFIX) {
            return Outcome::Skipped;
        }

        let parsed = match Uuid::parse_str(id) {
            Ok(parsed) => parsed,
            Err(_) => {
                return Outcome::Failed(id.to_owned(), BackendError::invalid("malformed recording id"))
            }
        };

        match self.delete(principal, parsed).await {
            Ok(_) => Outcome::Deleted,
            Err(e) => Outcome::Failed(id.to_owned(), e),
        }
    }

    /// Lists the caller's recordings, newest first.
    ///
    /// With explicit ids there is no pagination. With only a glossary id
    /// the listing is restricted to `UPLOADING`, which is what a client
    /// restoring an interrupted session needs. Both of these modes sign
    /// a preview URL for each recording where possible.
    pub async fn list(
        &self,
        principal: &Principal,
        filters: ListFilters,
    ) -> Result<RecordingPage, BackendError> {
        let by_ids = filters.ids.is_some();
        let with_previews = by_ids || filters.glossary_id.is_some();

        let status = filters.status.or_else(|| {
            if filters.glossary_id.is_some() && !by_ids {
                Some(RecordingStatus::Uploading)
            } else {
                None
            }
        });

        let page = filters.page.filter(|p| *p > 0).unwrap_or(1);
        let limit = filters
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);

        let query = RecordingQuery {
            ids: filters.ids,
            glossary_id: filters.glossary_id,
            status,
            page: if by_ids {
                None
            } else {
                Some(Page {
                    number: page,
                    limit,
                })
            },
        };

        let (mut recordings, total) = self.db.list_recordings(&principal.id, &query).await?;

        if with_previews {
            for listed in recordings.iter_mut() {
                let key = &listed.recording.storage_key;

                match self.store.download_url(key, PREVIEW_URL_TTL) {
                    Ok(url) => listed.preview_url = Some(url),
                    Err(e) => {
                        warn!(self.logger, "Failed to sign preview URL"; "id" => %listed.recording.id, "key" => %key, "error" => %e)
                    }
                }
            }
        }

        let pagination = if by_ids {
            Pagination {
                page,
                limit: recordings.len() as u32,
                total,
                total_pages: 1,
            }
        } else {
            let limit_wide = i64::from(limit);

            Pagination {
                page,
                limit,
                total,
                total_pages: (total + limit_wide - 1) / limit_wide,
            }
        };

        Ok(RecordingPage {
            recordings,
            pagination,
        })
    }

    async fn resolve(&self, assignment_id: GlossaryId) -> Result<GlossaryItem, BackendError> {
        self.db
            .retrieve_glossary_by_id(assignment_id)
            .await?
            .ok_or_else(|| BackendError::AssignmentNotFound(assignment_id.to_string()))
    }
}

fn new_recording(
    principal: &Principal,
    term: &GlossaryItem,
    format: &VideoFormat,
    metadata: &serde_json::Value,
    target: &UploadTarget,
    position: usize,
) -> NewRecording {
    NewRecording {
        id: Uuid::new_v4(),
        user_id: principal.id,
        glossary_id: term.id,
        storage_key: target.key.clone(),
        filename: format.filename(position),
        content_type: format.essence.clone(),
        metadata: metadata.clone(),
    }
}
