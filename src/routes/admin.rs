use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, Reply};
use warp::Filter;

use super::response::SuccessResponse;

pub fn make_healthz_route<'a>(
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone + 'a {
    warp::path("healthz").and(warp::get()).map(move || {
        json(&SuccessResponse::Healthz {
            revision: info::REVISION,
            timestamp: info::BUILD_TIMESTAMP,
            version: info::VERSION,
        })
    })
}

type TerminationFuture<'a> = BoxFuture<'a, ()>;

pub type TerminationFunctionWrapper<'a> =
    Arc<dyn Fn() -> TerminationFuture<'a> + Send + Sync + 'a>;

/// `POST /terminate` runs `terminate` and answers once it has finished.
pub fn make_termination_route<'a>(
    terminate: TerminationFunctionWrapper<'a>,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone + 'a {
    let handler = move || -> BoxFuture<Result<StatusCode, std::convert::Infallible>> {
        let terminate = terminate.clone();

        async move {
            terminate().await;
            Ok(StatusCode::NO_CONTENT)
        }
        .boxed()
    };

    warp::path("terminate").and(warp::post()).and_then(handler)
}
