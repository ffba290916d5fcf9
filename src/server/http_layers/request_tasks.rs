//! Per-request task scheduling middleware

use crate::tasks::{RequestLifecycle, RouteOutcome, TasksLifespan};
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http_body::{Body as _, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, warn};

/// Gives every request its own `TaskScheduler` and drives it through the
/// request lifecycle.
///
/// The scheduler (or the reason it could not be created) is stored in the
/// request extensions for the [`Tasks`](crate::server::Tasks) extractor.
/// `after_route` tasks are released as soon as the inner service has produced
/// a response; `after_response` tasks once the response body has been fully
/// handed to the transport, or dropped by it.
pub async fn track_request_tasks(
    State(lifespan): State<TasksLifespan>,
    mut request: Request,
    next: Next,
) -> Response {
    let scheduler = match lifespan.scheduler() {
        Ok(scheduler) => scheduler,
        Err(err) => {
            debug!("No task scheduler for {}: {}", request.uri().path(), err);
            request.extensions_mut().insert(err);
            return next.run(request).await;
        }
    };

    request.extensions_mut().insert(scheduler.clone());
    let mut lifecycle = RequestLifecycle::new(scheduler, lifespan.deferred_policy());

    let response = next.run(request).await;

    let outcome = if response.status().is_server_error() {
        RouteOutcome::Failed
    } else {
        RouteOutcome::Success
    };
    if let Err(err) = lifecycle.route_completed(outcome) {
        warn!("{}", err);
    }

    let (parts, body) = response.into_parts();
    Response::from_parts(parts, Body::new(TrackedBody::new(body, lifecycle)))
}

/// Response body that completes the request lifecycle when the stream ends
/// or when the transport drops it, whichever comes first.
pub struct TrackedBody {
    inner: Body,
    lifecycle: Option<RequestLifecycle>,
}

impl TrackedBody {
    pub fn new(inner: Body, lifecycle: RequestLifecycle) -> Self {
        Self {
            inner,
            lifecycle: Some(lifecycle),
        }
    }

    fn complete(&mut self) {
        let Some(mut lifecycle) = self.lifecycle.take() else {
            return;
        };
        if let Err(err) = lifecycle.response_sent().and_then(|_| lifecycle.finish()) {
            warn!("{}", err);
        }
    }
}

impl http_body::Body for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            this.complete();
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        self.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{TaskConfig, TaskScheduler};
    use crate::test_logging::CapturedLogs;
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn started_lifecycle() -> (RequestLifecycle, crate::tasks::Task) {
        let lifespan = TasksLifespan::new(TaskConfig::new());
        lifespan.start().unwrap();
        let scheduler: TaskScheduler = lifespan.scheduler().unwrap();
        let task = scheduler.after_response().schedule(|| async {});
        let mut lifecycle = RequestLifecycle::new(scheduler, lifespan.deferred_policy());
        lifecycle.route_completed(RouteOutcome::Success).unwrap();
        (lifecycle, task)
    }

    #[tokio::test]
    async fn test_after_response_tasks_start_when_the_body_ends() {
        let (lifecycle, task) = started_lifecycle().await;
        let body = TrackedBody::new(Body::from("hello"), lifecycle);

        assert!(!task.started().is_set());
        let bytes = axum::body::to_bytes(Body::new(body), usize::MAX)
            .await
            .unwrap();

        assert_eq!(&bytes[..], b"hello");
        assert!(task.started().is_set());
    }

    #[tokio::test]
    async fn test_after_response_tasks_start_when_the_body_is_dropped() {
        let (lifecycle, task) = started_lifecycle().await;
        let body = TrackedBody::new(Body::from("never read"), lifecycle);

        assert!(!task.started().is_set());
        drop(body);

        assert!(task.started().is_set());
    }

    #[tokio::test]
    async fn test_missing_lifespan_is_not_an_error_for_routes_without_tasks() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let lifespan = TasksLifespan::new(TaskConfig::new());
        let app = Router::new()
            .route("/plain", get(|| async { "plain" }))
            .layer(middleware::from_fn_with_state(lifespan, track_request_tasks));

        let response = app
            .oneshot(axum::http::Request::builder().uri("/plain").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(logs.lines_containing("ERROR").is_empty(), "{:#?}", logs.lines());
        assert_eq!(logs.lines_containing("No task scheduler for /plain").len(), 1);
    }
}
