//! Native async operations the foreign side can launch.
//!
//! Each operation marshals its arguments up front and returns a `'static`
//! [`OpFuture`], ready to be awaited directly, raced against a
//! [`CancelSignal`] with [`with_cancel`], bounded with [`with_timeout`], or
//! handed to a gather.

use std::sync::Arc;
use std::time::Duration;

use isthmus_core::marshal;
use isthmus_core::{CancelSignal, Cancellable, ExtendOutcome, NumbersArena, boundary, until_cancelled};
use isthmus_fetch::{Fetcher, StatusClient};
use isthmus_types::{BoundaryResult, CollectionHandle, ErrorEnvelope, ForeignValue};
use tokio::{task, time};

use crate::gather::MemberFut;

pub type OpFuture = MemberFut<ForeignValue>;

/// Timed greeting: waits `ms`, then says hello.
pub async fn say_after(ms: u64, who: &str) -> String {
    time::sleep(Duration::from_millis(ms)).await;
    format!("Hello, {who}!")
}

/// [`say_after`] over foreign arguments.
pub fn say_after_op(ms: &ForeignValue, who: &ForeignValue) -> OpFuture {
    let args = marshal::u64_from_foreign("ms", ms)
        .and_then(|ms| Ok((ms, marshal::string_from_foreign("who", who)?)));
    Box::pin(boundary::guard_async("say_after", async move {
        let (ms, who) = args?;
        Ok(ForeignValue::Str(say_after(ms, &who).await))
    }))
}

/// The network-facing operations, bound to one fetcher and status endpoint.
#[derive(Clone)]
pub struct NativeOps {
    fetcher: Arc<dyn Fetcher>,
    status: StatusClient,
}

impl NativeOps {
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, status: StatusClient) -> Self {
        Self { fetcher, status }
    }

    #[must_use]
    pub fn status(&self) -> &StatusClient {
        &self.status
    }

    /// GET `url` and return the body text.
    pub fn http_get(&self, url: &ForeignValue) -> OpFuture {
        let url = marshal::string_from_foreign("url", url);
        let fetcher = Arc::clone(&self.fetcher);
        Box::pin(boundary::guard_async("http_get", async move {
            let url = url?;
            let fetched = fetcher.fetch(&url).await?;
            Ok(ForeignValue::Str(fetched.body))
        }))
    }

    pub fn last_round(&self) -> OpFuture {
        let status = self.status.clone();
        Box::pin(boundary::guard_async("last_round", async move {
            Ok(ForeignValue::from(status.last_round().await?))
        }))
    }

    pub fn wait_for_block_after(&self, round: &ForeignValue) -> OpFuture {
        let round = marshal::u64_from_foreign("round", round);
        let status = self.status.clone();
        Box::pin(boundary::guard_async("wait_for_block_after", async move {
            let round = round?;
            Ok(ForeignValue::from(status.wait_for_block_after(round).await?))
        }))
    }
}

/// Append a batch to a collection from a foreign task. The batch is applied
/// whole or, if `cancel` fired first, not at all.
pub fn append_numbers(
    arena: Arc<NumbersArena>,
    handle: CollectionHandle,
    numbers: Vec<ForeignValue>,
    cancel: CancelSignal,
) -> OpFuture {
    Box::pin(append_batch(arena, handle, numbers, cancel))
}

async fn append_batch(
    arena: Arc<NumbersArena>,
    handle: CollectionHandle,
    numbers: Vec<ForeignValue>,
    cancel: CancelSignal,
) -> BoundaryResult<ForeignValue> {
    task::yield_now().await;
    let (cancelled, len) = match arena.extend_cancellable(handle, &numbers, &cancel)? {
        ExtendOutcome::Applied { len } => (false, ForeignValue::from(len as u64)),
        ExtendOutcome::Cancelled => (true, ForeignValue::Null),
    };
    Ok(ForeignValue::object([
        ("cancelled", ForeignValue::Bool(cancelled)),
        ("len", len),
    ]))
}

/// Race `op` against `signal`. A cancelled op is dropped at its current
/// suspension point and yields no value.
pub async fn with_cancel(signal: &CancelSignal, op: OpFuture) -> BoundaryResult<Cancellable<ForeignValue>> {
    match until_cancelled(signal, op).await {
        Cancellable::Completed(result) => result.map(Cancellable::Completed),
        Cancellable::Cancelled => Ok(Cancellable::Cancelled),
    }
}

/// Bound `op` by `timeout`; expiry is an internal failure naming `operation`.
pub fn with_timeout(operation: &'static str, op: OpFuture, timeout: Duration) -> OpFuture {
    Box::pin(async move {
        match time::timeout(timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(boundary::report(
                operation,
                ErrorEnvelope::internal(format!(
                    "{operation} timed out after {} ms",
                    timeout.as_millis()
                )),
            )),
        }
    })
}
