use serde::Serialize;
use uuid::Uuid;

use crate::assignments::Assignment;

/// The body of every successful API response.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(data: T) -> Self {
        Envelope {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(message: &'static str, data: T) -> Self {
        Envelope {
            message: Some(message),
            ..Envelope::new(data)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Assignments {
        assignments: Vec<Assignment>,
    },
    #[serde(rename_all = "camelCase")]
    Deleted {
        message: &'a str,
        deleted_id: Uuid,
    },
    #[serde(rename_all = "camelCase")]
    SessionDeleted {
        message: String,
        deleted_count: usize,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
}
