use std::time::{Duration, Instant};

use bytes::Bytes;
use logging::{debug, info};
use uuid::Uuid;
use warp::{
    reject,
    reply::{json, with_header, Reply},
};

use crate::dashboard;
use crate::environment::Environment;
use crate::errors::BackendError;
use crate::lifecycle::UploadRequest;
use crate::profile::{self, OnboardingForm};
use crate::routes::{
    query::{ConfirmBody, DeleteSessionBody, ListQuery, SyncBody, UploadBody},
    rejection::{Context, Rejection},
    response::{Envelope, SuccessResponse},
};
use crate::user::Principal;

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($expression:stmt);+) => {
        let start = Instant::now();

        let result = { $($expression)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

fn upload_request(
    environment: &Environment,
    body: &mut UploadBody,
) -> Result<UploadRequest, BackendError> {
    let assignment_id = body
        .assignment_id
        .ok_or_else(|| BackendError::invalid("assignmentId is required"))?;

    Ok(UploadRequest {
        assignment_id,
        content_type: body
            .content_type
            .take()
            .unwrap_or_else(|| environment.config.default_content_type.clone()),
        metadata: body
            .metadata
            .take()
            .unwrap_or_else(|| serde_json::json!({})),
    })
}

pub async fn init_upload(
    environment: Environment,
    principal: Principal,
    mut body: UploadBody,
) -> RouteResult {
    timed! {
        let assignment_id = body.assignment_id;
        let error_handler = |e: BackendError| Rejection::new(Context::init_upload(assignment_id), e);

        let count = match (assignment_id, body.count) {
            (Some(_), Some(count)) => count,
            _ => return Err(error_handler(BackendError::invalid("assignmentId and count are required")).into()),
        };

        let request = upload_request(&environment, &mut body).map_err(&error_handler)?;

        let batch = environment
            .recordings
            .initiate_batch(&principal, request, count)
            .await
            .map_err(&error_handler)?;

        json(&Envelope::new(batch))
    }
}

pub async fn upload_single(
    environment: Environment,
    principal: Principal,
    mut body: UploadBody,
) -> RouteResult {
    timed! {
        let assignment_id = body.assignment_id;
        let error_handler = |e: BackendError| Rejection::new(Context::upload_single(assignment_id), e);

        let request = upload_request(&environment, &mut body).map_err(&error_handler)?;

        let single = environment
            .recordings
            .initiate_single(&principal, request, body.index.unwrap_or(0))
            .await
            .map_err(&error_handler)?;

        json(&Envelope::new(single))
    }
}

pub async fn confirm_upload(
    environment: Environment,
    principal: Principal,
    body: ConfirmBody,
) -> RouteResult {
    timed! {
        let ids = body.recording_ids.unwrap_or_default();

        let confirmation = environment
            .recordings
            .confirm_listed(&principal, &ids)
            .await
            .map_err(|e| Rejection::new(Context::confirm(ids.len()), e))?;

        info!(environment.logger, "Confirmed recordings"; "user" => %principal.id, "count" => confirmation.confirmed_count);

        json(&Envelope::new(confirmation))
    }
}

pub async fn my_recordings(
    environment: Environment,
    principal: Principal,
    query: ListQuery,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::list(), e);

        let filters = query.into_filters().map_err(&error_handler)?;

        let page = environment
            .recordings
            .list(&principal, filters)
            .await
            .map_err(&error_handler)?;

        json(&Envelope::new(page))
    }
}

pub async fn delete_session(
    environment: Environment,
    principal: Principal,
    body: Bytes,
) -> RouteResult {
    timed! {
        let ids = DeleteSessionBody::parse(&body)
            .and_then(|body| {
                body.recording_ids
                    .ok_or_else(|| BackendError::invalid("recordingIds array is required"))
            })
            .map_err(|e| Rejection::new(Context::delete_session(), e))?;

        let cleanup = environment.recordings.delete_session(&principal, &ids).await;

        debug!(environment.logger, "Cleaned up session"; "user" => %principal.id, "deleted" => cleanup.deleted, "skipped" => cleanup.skipped, "failed" => cleanup.failed);

        json(&Envelope::new(SuccessResponse::SessionDeleted {
            message: format!("Deleted {} recordings", cleanup.deleted),
            deleted_count: cleanup.deleted,
        }))
    }
}

pub async fn delete(environment: Environment, id: Uuid, principal: Principal) -> RouteResult {
    timed! {
        let deleted_id = environment
            .recordings
            .delete(&principal, id)
            .await
            .map_err(|e| Rejection::new(Context::delete(id.to_string()), e))?;

        json(&Envelope::new(SuccessResponse::Deleted {
            message: "Recording deleted successfully",
            deleted_id,
        }))
    }
}

pub async fn assignments(environment: Environment, principal: Principal) -> RouteResult {
    timed! {
        let assignments = dashboard::assignments_for(environment.db.as_ref(), &principal)
            .await
            .map_err(|e| Rejection::new(Context::assignments(), e))?;

        json(&Envelope::new(SuccessResponse::Assignments { assignments }))
    }
}

pub async fn collect(environment: Environment, slug: String, principal: Principal) -> RouteResult {
    timed! {
        let item = dashboard::assignment_by_slug(environment.db.as_ref(), &principal, &slug)
            .await
            .map_err(|e| Rejection::new(Context::collect(slug.clone()), e))?;

        json(&Envelope::new(item))
    }
}

pub async fn my_dashboard(environment: Environment, principal: Principal) -> RouteResult {
    timed! {
        let summary = dashboard::dashboard(environment.db.as_ref(), &principal)
            .await
            .map_err(|e| Rejection::new(Context::dashboard(), e))?;

        json(&Envelope::new(summary))
    }
}

pub async fn onboarding(
    environment: Environment,
    principal: Principal,
    form: OnboardingForm,
) -> RouteResult {
    timed! {
        let onboarded = profile::onboard(environment.db.as_ref(), &principal, form)
            .await
            .map_err(|e| Rejection::new(Context::onboarding(), e))?;

        info!(environment.logger, "Completed onboarding"; "user" => %principal.id);

        json(&Envelope::with_message("Onboarding completed successfully", onboarded))
    }
}

pub async fn my_profile(environment: Environment, principal: Principal) -> RouteResult {
    timed! {
        let account = profile::profile(environment.db.as_ref(), &principal)
            .await
            .map_err(|e| Rejection::new(Context::profile(), e))?;

        json(&Envelope::new(account))
    }
}

pub async fn sync(environment: Environment, principal: Principal, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::sync(), e);

        let body = SyncBody::parse(&body).map_err(&error_handler)?;

        let account = profile::sync(environment.db.as_ref(), &principal, body.name)
            .await
            .map_err(&error_handler)?;

        json(&Envelope::new(account))
    }
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
