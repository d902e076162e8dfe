use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use crate::glossary::{Category, GlossaryId, UnknownVariant};

/// Where a recording is in its lifecycle.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordingStatus {
    /// Initiated; the client may or may not have sent the bytes yet.
    Uploading,
    /// Confirmed by the client and waiting for review.
    Pending,
    Processing,
    Approved,
    Rejected,
}

impl RecordingStatus {
    pub fn as_str(&self) -> &'static str {
        use RecordingStatus::*;

        match self {
            Uploading => "UPLOADING",
            Pending => "PENDING",
            Processing => "PROCESSING",
            Approved => "APPROVED",
            Rejected => "REJECTED",
        }
    }

    /// Whether a recording in this state counts as a contribution.
    pub fn is_contribution(&self) -> bool {
        matches!(
            self,
            RecordingStatus::Pending | RecordingStatus::Processing | RecordingStatus::Approved
        )
    }

    /// Whether a recording in this state is waiting on the review pipeline.
    pub fn is_in_review(&self) -> bool {
        matches!(self, RecordingStatus::Pending | RecordingStatus::Processing)
    }
}

impl FromStr for RecordingStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use RecordingStatus::*;

        match s {
            "UPLOADING" => Ok(Uploading),
            "PENDING" => Ok(Pending),
            "PROCESSING" => Ok(Processing),
            "APPROVED" => Ok(Approved),
            "REJECTED" => Ok(Rejected),
            _ => Err(UnknownVariant::new("recording status", s)),
        }
    }
}

/// A single recording in the database.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: Uuid,

    pub user_id: Uuid,

    /// The term this recording answers.
    pub glossary_id: GlossaryId,

    /// The object-storage path. Never changes after creation.
    pub storage_key: String,

    pub filename: String,

    pub content_type: String,

    pub status: RecordingStatus,

    /// Opaque client-supplied data.
    pub metadata: serde_json::Value,

    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
}

/// A recording about to be persisted in the `UPLOADING` state.
#[derive(Clone, Debug)]
pub struct NewRecording {
    pub id: Uuid,
    pub user_id: Uuid,
    pub glossary_id: GlossaryId,
    pub storage_key: String,
    pub filename: String,
    pub content_type: String,
    pub metadata: serde_json::Value,
}

/// A recording as listed back to its owner, with the term it answers.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedRecording {
    #[serde(flatten)]
    pub recording: Recording,

    pub glossary: GlossaryRef,

    /// A short-lived playback URL, present only for session restore
    /// and explicit id lookups.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<Url>,
}

/// The parts of a catalog entry shown alongside a recording.
#[derive(Clone, Debug, Serialize)]
pub struct GlossaryRef {
    pub slug: String,
    pub category: Category,
}

/// A freshly minted, not yet confirmed upload.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatedRecording {
    pub recording_id: Uuid,
    pub upload_url: Url,
    pub key: String,
}

/// Which of a user's recordings to list, newest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordingQuery {
    pub ids: Option<Vec<Uuid>>,
    pub glossary_id: Option<GlossaryId>,
    pub status: Option<RecordingStatus>,

    /// `None` returns every match.
    pub page: Option<Page>,
}

impl RecordingQuery {
    /// Whether `recording` satisfies every filter, ignoring the page.
    pub fn matches(&self, recording: &Recording) -> bool {
        self.ids.as_ref().map_or(true, |ids| ids.contains(&recording.id))
            && self
                .glossary_id
                .map_or(true, |id| id == recording.glossary_id)
            && self.status.map_or(true, |status| status == recording.status)
    }
}

/// A 1-based page of results.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Page {
    pub number: u32,
    pub limit: u32,
}

impl Page {
    pub fn offset(&self) -> i64 {
        i64::from(self.number.saturating_sub(1)) * i64::from(self.limit)
    }
}
