use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

/// Return values a task body (or an error handler) may produce.
///
/// `()` always succeeds; `Result<T, E>` fails with `E` and discards `T`.
pub trait TaskReturn: Send + 'static {
    fn into_task_result(self) -> anyhow::Result<()>;
}

impl TaskReturn for () {
    fn into_task_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<T, E> TaskReturn for Result<T, E>
where
    T: Send + 'static,
    E: Into<anyhow::Error> + Send + 'static,
{
    fn into_task_result(self) -> anyhow::Result<()> {
        self.map(|_| ()).map_err(Into::into)
    }
}

/// How a callable ended when it did not succeed.
#[derive(Debug)]
pub(crate) enum Failure {
    Error(anyhow::Error),
    Panic(String),
}

type AsyncFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;
type BlockingFn = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;

/// A callable normalized to one asynchronous invocation path.
pub(crate) enum TaskBody {
    /// Awaited in place on the runtime.
    Async(AsyncFn),
    /// Dispatched to the blocking thread pool.
    Blocking(BlockingFn),
}

impl TaskBody {
    pub(crate) fn from_async<F, Fut>(func: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: TaskReturn,
    {
        TaskBody::Async(Box::new(move || {
            async move { func().await.into_task_result() }.boxed()
        }))
    }

    pub(crate) fn from_blocking<F, R>(func: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
        R: TaskReturn,
    {
        TaskBody::Blocking(Box::new(move || func().into_task_result()))
    }

    /// Run the callable, turning both errors and panics into a [`Failure`].
    pub(crate) async fn call(self) -> Result<(), Failure> {
        match self {
            TaskBody::Async(func) => {
                match AssertUnwindSafe(async move { func().await })
                    .catch_unwind()
                    .await
                {
                    Ok(result) => result.map_err(Failure::Error),
                    Err(payload) => Err(Failure::Panic(panic_message(payload))),
                }
            }
            TaskBody::Blocking(func) => match tokio::task::spawn_blocking(func).await {
                Ok(result) => result.map_err(Failure::Error),
                Err(e) if e.is_panic() => Err(Failure::Panic(panic_message(e.into_panic()))),
                Err(e) => Err(Failure::Error(anyhow::anyhow!(
                    "blocking call did not complete: {}",
                    e
                ))),
            },
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
