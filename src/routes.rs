use std::sync::Arc;

use logging::{error, info, Logger};
use warp::filters::body::BodyDeserializeError;
use warp::http::StatusCode;
use warp::reject::{self, InvalidQuery, MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType};
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::BackendError;

pub mod admin;
mod handlers;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// The largest JSON body to accept. Bodies here are small; anything
/// bigger is a client bug.
const MAX_CONTENT_LENGTH: u64 = 64 * 1024;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        } else {
            info!(logger, "Request failed"; "context" => ?r.context, "status" => %status, "message" => %r.error);
        }

        return Ok(with_status(json(&r.flatten()), status));
    }

    let refused = if let Some(e) = rej.find::<BodyDeserializeError>() {
        Some((StatusCode::BAD_REQUEST, format!("malformed request body: {}", e)))
    } else if let Some(e) = rej.find::<InvalidQuery>() {
        Some((StatusCode::BAD_REQUEST, format!("{}", e)))
    } else if rej.find::<PayloadTooLarge>().is_some() {
        Some((StatusCode::BAD_REQUEST, "request body too large".to_owned()))
    } else if let Some(e) = rej.find::<UnsupportedMediaType>() {
        Some((StatusCode::UNSUPPORTED_MEDIA_TYPE, format!("{}", e)))
    } else if let Some(e) = rej.find::<MethodNotAllowed>() {
        Some((StatusCode::METHOD_NOT_ALLOWED, format!("{}", e)))
    } else {
        None
    };

    if let Some((status, message)) = refused {
        info!(logger, "Refused request"; "status" => %status, "message" => %message);
        let flattened = rejection::FlattenedRejection::new(rejection::Context::request(), message);

        return Ok(with_status(json(&flattened), status));
    }

    Err(rej)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use BackendError::*;

    match e {
        InvalidArgument(..) => StatusCode::BAD_REQUEST,
        Unauthenticated => StatusCode::UNAUTHORIZED,
        Suspended | NotOwner(..) | NotConfirmable | AlreadyOnboarded => StatusCode::FORBIDDEN,
        AssignmentNotFound(..) | RecordingNotFound(..) | UserNotFound(..) => StatusCode::NOT_FOUND,
        e if e.is_storage_failure() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use std::sync::Arc;

    use uuid::Uuid;
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::{body, reject, Filter, Reply};
    use warp::{delete, get as g, path as p, path::param as par, post, query};

    use super::rejection::{Context, Rejection};
    use super::{handlers, query as q, MAX_CONTENT_LENGTH};
    use crate::auth;
    use crate::db::Db;
    use crate::environment::Environment;
    use crate::profile::OnboardingForm;
    use crate::user::Principal;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    /// Resolves the bearer token of the request, rejecting it otherwise.
    pub fn authenticated(
        db: Arc<dyn Db>,
    ) -> impl Filter<Extract = (Principal,), Error = reject::Rejection> + Clone {
        warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
            let db = db.clone();

            async move {
                auth::authenticate(db.as_ref(), header.as_deref())
                    .await
                    .map_err(|e| reject::Rejection::from(Rejection::new(Context::authenticate(), e)))
            }
        })
    }

    fn json_body<T: serde::de::DeserializeOwned + Send>(
    ) -> impl Filter<Extract = (T,), Error = reject::Rejection> + Clone {
        body::content_length_limit(MAX_CONTENT_LENGTH).and(body::json())
    }

    fn raw_body() -> impl Filter<Extract = (bytes::Bytes,), Error = reject::Rejection> + Clone {
        body::content_length_limit(MAX_CONTENT_LENGTH).and(body::bytes())
    }

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident, $auth:ident; $($filters:expr),+) => (
        pub fn $name(environment: Environment) -> Route {
            let prefix = environment.config.api_prefix.clone();
            let $auth = authenticated(environment.db.clone());

            let $route_variable = warp::any()
                .map(move || environment.clone())
                .and(p(prefix));

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    route!(make_init_upload_route => init_upload, rt, auth; p("recordings"), p("init-upload"), end(), post(), auth, json_body::<q::UploadBody>());
    route!(make_upload_single_route => upload_single, rt, auth; p("recordings"), p("upload-single"), end(), post(), auth, json_body::<q::UploadBody>());
    route!(make_confirm_upload_route => confirm_upload, rt, auth; p("recordings"), p("confirm-upload"), end(), post(), auth, json_body::<q::ConfirmBody>());
    route!(make_my_recordings_route => my_recordings, rt, auth; p("recordings"), p("my-recordings"), end(), g(), auth, query::<q::ListQuery>());
    route!(make_delete_session_route => delete_session, rt, auth; p("recordings"), p("delete-session"), end(), post(), auth, raw_body());
    route!(make_delete_route => delete, rt, auth; p("recordings"), par::<Uuid>(), end(), delete(), auth);
    route!(make_assignments_route => assignments, rt, auth; p("assignments"), end(), g(), auth);
    route!(make_collect_route => collect, rt, auth; p("collect"), par::<String>(), end(), g(), auth);
    route!(make_dashboard_route => my_dashboard, rt, auth; p("dashboard"), p("me"), end(), g(), auth);
    route!(make_onboarding_route => onboarding, rt, auth; p("users"), p("onboarding"), end(), post(), auth, json_body::<OnboardingForm>());
    route!(make_profile_route => my_profile, rt, auth; p("users"), p("profile"), end(), g(), auth);
    route!(make_sync_route => sync, rt, auth; p("auth"), p("sync"), end(), post(), auth, raw_body());

    /// Every API route, combined.
    pub fn make_api_routes(environment: Environment) -> Route {
        make_init_upload_route(environment.clone())
            .or(make_upload_single_route(environment.clone()))
            .unify()
            .or(make_confirm_upload_route(environment.clone()))
            .unify()
            .or(make_my_recordings_route(environment.clone()))
            .unify()
            .or(make_delete_session_route(environment.clone()))
            .unify()
            .or(make_delete_route(environment.clone()))
            .unify()
            .or(make_assignments_route(environment.clone()))
            .unify()
            .or(make_collect_route(environment.clone()))
            .unify()
            .or(make_dashboard_route(environment.clone()))
            .unify()
            .or(make_onboarding_route(environment.clone()))
            .unify()
            .or(make_profile_route(environment.clone()))
            .unify()
            .or(make_sync_route(environment))
            .unify()
            .boxed()
    }
}
