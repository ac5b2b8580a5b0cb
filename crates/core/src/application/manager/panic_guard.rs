// Panic isolation for the processing loop
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed
    Success(T),
    /// Execution panicked
    Panicked(String),
}

/// Await a future, converting a panic into `PanicGuardResult::Panicked`.
///
/// Keeps a faulty processor from killing the processing loop; the loop turns
/// the panic into an `ErrorEvent::Generic` outcome.
pub async fn guard_async<F, T>(future: F) -> PanicGuardResult<T>
where
    F: Future<Output = T>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => PanicGuardResult::Success(result),
        Err(panic_info) => {
            let panic_msg = panic_message(panic_info.as_ref());
            error!(panic_msg = %panic_msg, "Processor panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
    }
}

fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
