use super::track_request_tasks;
use crate::tasks::{InitializationError, TaskScheduler, TasksLifespan};
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use std::ops::Deref;

/// Extractor for the current request's [`TaskScheduler`].
///
/// ```ignore
/// async fn handler(tasks: Tasks) -> StatusCode {
///     tasks.after_response().schedule(|| send_welcome_email());
///     StatusCode::ACCEPTED
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Tasks(pub TaskScheduler);

impl Deref for Tasks {
    type Target = TaskScheduler;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Tasks
where
    S: Send + Sync,
{
    type Rejection = InitializationError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(scheduler) = parts.extensions.get::<TaskScheduler>() {
            return Ok(Tasks(scheduler.clone()));
        }
        Err(parts
            .extensions
            .get::<InitializationError>()
            .cloned()
            .unwrap_or(InitializationError::MissingLayer))
    }
}

impl IntoResponse for InitializationError {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Install the request tasks layer on every route of `router`.
pub fn add_tasks<S>(router: Router<S>, lifespan: TasksLifespan) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(lifespan, track_request_tasks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskConfig;
    use axum::{body::Body, http::Request, routing::get};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn uses_tasks(tasks: Tasks) -> StatusCode {
        tasks.schedule(|| async {});
        StatusCode::OK
    }

    #[tokio::test]
    async fn test_extractor_without_layer_is_an_internal_error() {
        let app: Router = Router::new().route("/", get(uses_tasks));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_extractor_before_lifespan_start_is_an_internal_error() {
        let lifespan = TasksLifespan::new(TaskConfig::new());
        let app = add_tasks(Router::new().route("/", get(uses_tasks)), lifespan);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&body).contains("not been started"));
    }

    #[tokio::test]
    async fn test_routes_without_tasks_work_before_lifespan_start() {
        let lifespan = TasksLifespan::new(TaskConfig::new());
        let app = add_tasks(Router::new().route("/", get(|| async { "ok" })), lifespan);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_deferred_tasks_run_once_the_response_is_consumed() {
        let lifespan = TasksLifespan::new(TaskConfig::new());
        lifespan.start().unwrap();
        let ran = Arc::new(AtomicBool::new(false));

        let r = ran.clone();
        let app = add_tasks(
            Router::new().route(
                "/",
                get(move |tasks: Tasks| {
                    let r = r.clone();
                    async move {
                        tasks.after_response().schedule(move || async move {
                            r.store(true, Ordering::SeqCst);
                        });
                        "scheduled"
                    }
                }),
            ),
            lifespan.clone(),
        );

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(1), async {
            while !ran.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("after_response task should run");
        lifespan.shutdown().await;
    }
}
