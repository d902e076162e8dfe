use serde::Serialize;
use warp::reject;

use crate::errors::BackendError;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }

    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection::new(self.context.clone(), format!("{}", self.error))
    }
}

impl reject::Reject for Rejection {}

/// The body of every failed response.
#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    pub(crate) success: bool,
    pub(crate) error: ErrorBody,
}

impl FlattenedRejection {
    pub fn new(context: Context, message: String) -> Self {
        FlattenedRejection {
            success: false,
            error: ErrorBody { context, message },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(flatten)]
    pub(crate) context: Context,
    pub(crate) message: String,
}

/// What the failed request was trying to do.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum Context {
    Assignments,
    Authenticate,
    Collect { slug: String },
    Confirm { count: usize },
    Dashboard,
    Delete { id: String },
    DeleteSession,
    #[serde(rename_all = "camelCase")]
    InitUpload { assignment_id: Option<i32> },
    List,
    Onboarding,
    Profile,
    Request,
    Sync,
    #[serde(rename_all = "camelCase")]
    UploadSingle { assignment_id: Option<i32> },
}

impl Context {
    pub fn assignments() -> Context {
        Context::Assignments
    }

    pub fn authenticate() -> Context {
        Context::Authenticate
    }

    pub fn collect(slug: String) -> Context {
        Context::Collect { slug }
    }

    pub fn confirm(count: usize) -> Context {
        Context::Confirm { count }
    }

    pub fn dashboard() -> Context {
        Context::Dashboard
    }

    pub fn delete(id: String) -> Context {
        Context::Delete { id }
    }

    pub fn delete_session() -> Context {
        Context::DeleteSession
    }

    pub fn init_upload(assignment_id: Option<i32>) -> Context {
        Context::InitUpload { assignment_id }
    }

    pub fn list() -> Context {
        Context::List
    }

    pub fn onboarding() -> Context {
        Context::Onboarding
    }

    pub fn profile() -> Context {
        Context::Profile
    }

    pub fn sync() -> Context {
        Context::Sync
    }

    /// A request warp refused before it reached a handler.
    pub fn request() -> Context {
        Context::Request
    }

    pub fn upload_single(assignment_id: Option<i32>) -> Context {
        Context::UploadSingle { assignment_id }
    }
}
