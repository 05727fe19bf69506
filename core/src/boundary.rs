//! The native side of the boundary.
//!
//! Every export runs inside [`guard`] (or [`guard_async`] for futures). The guard
//! catches unwinding panics, classifies returned failures, and logs the outcome,
//! so nothing but an [`ErrorEnvelope`] ever reaches the foreign caller.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};

use futures_util::FutureExt;
use isthmus_types::{BoundaryResult, ErrorEnvelope, ErrorKind, NativeFailure, classify};

/// Run a synchronous native operation at the boundary.
pub fn guard<T, F>(operation: &'static str, f: F) -> BoundaryResult<T>
where
    F: FnOnce() -> Result<T, NativeFailure>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(failure)) => Err(report(operation, classify(failure))),
        Err(payload) => Err(report(operation, classify(NativeFailure::Panic(payload)))),
    }
}

/// Run a native future at the boundary. A panic while polling is caught and
/// classified the same way as in [`guard`].
pub async fn guard_async<T, Fut>(operation: &'static str, fut: Fut) -> BoundaryResult<T>
where
    Fut: Future<Output = Result<T, NativeFailure>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(failure)) => Err(report(operation, classify(failure))),
        Err(payload) => Err(report(operation, classify(NativeFailure::Panic(payload)))),
    }
}

/// Log a classified failure and hand it back.
pub fn report(operation: &str, envelope: ErrorEnvelope) -> ErrorEnvelope {
    match envelope.kind() {
        ErrorKind::InternalFailure => {
            tracing::warn!(operation, error = %envelope, "native fault caught at boundary");
        }
        ErrorKind::DomainError | ErrorKind::BindingViolation => {
            tracing::debug!(operation, error = %envelope, "boundary call failed");
        }
    }
    envelope
}
