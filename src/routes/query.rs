use serde::Deserialize;
use uuid::Uuid;

use crate::errors::BackendError;
use crate::glossary::GlossaryId;
use crate::lifecycle::ListFilters;

/// The body of `init-upload` and `upload-single`. Everything is
/// optional so that missing fields surface as a 400 with a message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBody {
    pub assignment_id: Option<GlossaryId>,
    pub count: Option<i64>,
    pub content_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub index: Option<i64>,
}

/// Ids are kept as sent: one that is not a UUID makes the confirmation
/// fail as a whole rather than the request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    pub recording_ids: Option<Vec<String>>,
}

/// Sent from page-unload beacons, so entries are taken as they come.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSessionBody {
    pub recording_ids: Option<Vec<serde_json::Value>>,
}

impl DeleteSessionBody {
    /// Parses a beacon body whatever content type it was sent with.
    pub fn parse(bytes: &[u8]) -> Result<Self, BackendError> {
        serde_json::from_slice(bytes)
            .map_err(|e| BackendError::invalid(format!("malformed request body: {}", e)))
    }
}

/// The optional body of `auth/sync`.
#[derive(Debug, Default, Deserialize)]
pub struct SyncBody {
    pub name: Option<String>,
}

impl SyncBody {
    /// An empty body is the same as `{}`.
    pub fn parse(bytes: &[u8]) -> Result<Self, BackendError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(SyncBody::default());
        }

        serde_json::from_slice(bytes)
            .map_err(|e| BackendError::invalid(format!("malformed request body: {}", e)))
    }
}

/// The query string of `my-recordings`. Numbers are parsed leniently:
/// anything unparsable falls back to the default.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub ids: Option<String>,
    pub glossary_id: Option<String>,
    pub status: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

fn lenient<T: std::str::FromStr>(value: &Option<String>) -> Option<T> {
    value.as_ref().and_then(|v| v.trim().parse().ok())
}

impl ListQuery {
    pub fn into_filters(self) -> Result<ListFilters, BackendError> {
        let ids = self.ids.as_ref().and_then(|ids| {
            let listed = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .collect::<Vec<_>>();

            if listed.is_empty() {
                None
            } else {
                // malformed ids cannot match anything
                Some(listed.into_iter().filter_map(|id| Uuid::parse_str(id).ok()).collect())
            }
        });

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(status) => Some(
                status
                    .parse()
                    .map_err(|e| BackendError::invalid(format!("{}", e)))?,
            ),
        };

        Ok(ListFilters {
            ids,
            glossary_id: lenient(&self.glossary_id),
            status,
            page: lenient(&self.page),
            limit: lenient(&self.limit),
        })
    }
}
