//! Foreign-calls-native: concurrent fan-out with one combined result.
//!
//! Every member is spawned on the native runtime up front, so no member waits
//! for another to start. Results come back in input order whatever the
//! completion order. Dropping a pending gather aborts the members that are
//! still running; a [`GatherPolicy::FirstErrorFast`] failure detaches them
//! instead.

use std::future::Future;
use std::pin::Pin;

use futures_util::FutureExt;
use futures_util::future::{AbortHandle, Abortable, Aborted};
use futures_util::stream::{FuturesUnordered, StreamExt};
use isthmus_types::{BoundaryResult, ErrorEnvelope, GatherPolicy, NativeFailure, classify};
use thiserror::Error;
use tokio::task::JoinError;

pub type MemberFut<T> = Pin<Box<dyn Future<Output = BoundaryResult<T>> + Send + 'static>>;

/// A failed gather, with the member it came from.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("gather member {index} failed: {error}")]
pub struct GatherError {
    /// Input position of the reported failure.
    pub index: usize,
    pub error: ErrorEnvelope,
    /// Every failure observed before the gather returned, sorted by index.
    pub failures: Vec<(usize, ErrorEnvelope)>,
}

/// Ordered set of native operations to run concurrently.
pub struct GatherSet<T> {
    policy: GatherPolicy,
    members: Vec<MemberFut<T>>,
}

impl<T: Send + 'static> GatherSet<T> {
    #[must_use]
    pub fn new(policy: GatherPolicy) -> Self {
        Self {
            policy,
            members: Vec::new(),
        }
    }

    /// Add a member; returns its index.
    pub fn push<F>(&mut self, member: F) -> usize
    where
        F: Future<Output = BoundaryResult<T>> + Send + 'static,
    {
        self.members.push(Box::pin(member));
        self.members.len() - 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub async fn run(self) -> Result<Vec<T>, GatherError> {
        let Self { policy, members } = self;
        let count = members.len();
        tracing::debug!(members = count, %policy, "gather start");

        let mut guard = AbortOnDrop::default();
        let mut pending = FuturesUnordered::new();
        for (index, member) in members.into_iter().enumerate() {
            let (abort, registration) = AbortHandle::new_pair();
            guard.handles.push(abort);
            let task = tokio::spawn(Abortable::new(member, registration));
            pending.push(task.map(move |joined| (index, joined)));
        }

        let mut results: Vec<Option<T>> = (0..count).map(|_| None).collect();
        let mut first_failure: Option<(usize, ErrorEnvelope)> = None;
        let mut failures = Vec::new();

        while let Some((index, joined)) = pending.next().await {
            match settle(index, joined) {
                Ok(value) => results[index] = Some(value),
                Err(error) => {
                    tracing::debug!(index, %error, "gather member failed");
                    if policy == GatherPolicy::FirstErrorFast {
                        guard.detach();
                        return Err(GatherError {
                            index,
                            error: error.clone(),
                            failures: vec![(index, error)],
                        });
                    }
                    if first_failure.is_none() {
                        first_failure = Some((index, error.clone()));
                    }
                    failures.push((index, error));
                }
            }
        }
        guard.detach();

        if let Some((index, error)) = first_failure {
            failures.sort_by_key(|(i, _)| *i);
            return Err(GatherError {
                index,
                error,
                failures,
            });
        }
        // No failures means every slot was filled.
        Ok(results.into_iter().flatten().collect())
    }
}

/// Run `operations` concurrently under `policy`.
pub async fn gather<T, I, F>(operations: I, policy: GatherPolicy) -> Result<Vec<T>, GatherError>
where
    T: Send + 'static,
    I: IntoIterator<Item = F>,
    F: Future<Output = BoundaryResult<T>> + Send + 'static,
{
    let mut set = GatherSet::new(policy);
    for operation in operations {
        set.push(operation);
    }
    set.run().await
}

fn settle<T>(
    index: usize,
    joined: Result<Result<BoundaryResult<T>, Aborted>, JoinError>,
) -> BoundaryResult<T> {
    match joined {
        Ok(Ok(result)) => result,
        Ok(Err(Aborted)) => Err(ErrorEnvelope::internal(format!(
            "gather member {index} was aborted"
        ))),
        Err(join) if join.is_panic() => Err(classify(NativeFailure::Panic(join.into_panic()))),
        Err(join) => Err(ErrorEnvelope::internal(format!(
            "gather member {index} did not finish: {join}"
        ))),
    }
}

#[derive(Default)]
struct AbortOnDrop {
    handles: Vec<AbortHandle>,
}

impl AbortOnDrop {
    fn detach(&mut self) {
        self.handles.clear();
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            tracing::debug!(members = self.handles.len(), "gather dropped; aborting members");
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}
