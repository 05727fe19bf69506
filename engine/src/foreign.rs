//! Native-calls-foreign: driving foreign-implemented async capabilities.
//!
//! The foreign side runs on a [`ForeignRuntime`]: one dedicated OS thread with
//! its own current-thread scheduler. Capabilities registered there are invoked
//! from native tasks through a [`CapabilityHandle`]; the native task suspends on
//! a single-assignment [`Completion`] until the foreign task settles it.
//!
//! Dropping the native caller's future fires the invocation's cancel signal.
//! The foreign implementation sees it through [`CallContext`] and gets a grace
//! period to wind down before its task is dropped. Nothing is delivered to the
//! native side after cancellation.

use std::collections::HashMap;
use std::{fmt, io};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use isthmus_core::marshal;
use isthmus_core::{CancelSignal, CancelTrigger, boundary, cancel_pair};
use isthmus_types::{
    BoundaryResult, CapabilityId, DomainError, ErrorEnvelope, ForeignValue, InvocationId,
    panic_message,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::{runtime, task, time};

pub type CapabilityFut<'a> =
    Pin<Box<dyn Future<Output = Result<ForeignValue, ForeignError>> + Send + 'a>>;

/// A failure raised by foreign code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForeignError {
    /// A declared domain failure; crosses as `DomainError`.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// A host exception; crosses as `InternalFailure`.
    #[error("foreign exception: {0}")]
    Raised(String),
}

impl ForeignError {
    #[must_use]
    pub fn into_envelope(self) -> ErrorEnvelope {
        match self {
            Self::Domain(error) => ErrorEnvelope::from(error),
            raised @ Self::Raised(_) => ErrorEnvelope::internal(raised.to_string()),
        }
    }
}

/// The async interface a foreign implementation provides.
pub trait ForeignCapability: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn call<'a>(&'a self, args: Vec<ForeignValue>, ctx: CallContext) -> CapabilityFut<'a>;
}

/// Per-invocation context handed to a foreign implementation.
#[derive(Debug, Clone)]
pub struct CallContext {
    invocation: InvocationId,
    capability: CapabilityId,
    cancel: CancelSignal,
}

impl CallContext {
    #[must_use]
    pub fn invocation(&self) -> InvocationId {
        self.invocation
    }

    #[must_use]
    pub fn capability(&self) -> CapabilityId {
        self.capability
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the native caller gives up on this invocation.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    #[must_use]
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }
}

/// Adapts an async closure into a [`ForeignCapability`].
pub struct FnCapability<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnCapability<F>
where
    F: Fn(Vec<ForeignValue>, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ForeignValue, ForeignError>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F, Fut> ForeignCapability for FnCapability<F>
where
    F: Fn(Vec<ForeignValue>, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ForeignValue, ForeignError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call<'a>(&'a self, args: Vec<ForeignValue>, ctx: CallContext) -> CapabilityFut<'a> {
        Box::pin((self.f)(args, ctx))
    }
}

/// Callback-style capability: the host receives a [`Completion`] and settles it
/// whenever it likes, possibly from a task it spawned on the foreign loop.
pub struct CallbackCapability<F> {
    name: String,
    f: F,
}

impl<F> CallbackCapability<F>
where
    F: Fn(Vec<ForeignValue>, CallContext, Completion) + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> ForeignCapability for CallbackCapability<F>
where
    F: Fn(Vec<ForeignValue>, CallContext, Completion) + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call<'a>(&'a self, args: Vec<ForeignValue>, ctx: CallContext) -> CapabilityFut<'a> {
        let (completion, pending) = Completion::new(ctx.invocation, ctx.cancel.clone());
        (self.f)(args, ctx, completion);
        Box::pin(async move {
            pending.wait().await.unwrap_or_else(|| {
                Err(ForeignError::Raised(
                    "completion dropped without being resolved".to_owned(),
                ))
            })
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("completion already resolved")]
    AlreadyResolved,
    #[error("caller cancelled before resolution")]
    Cancelled,
}

type Settled = Result<ForeignValue, ForeignError>;

/// Single-assignment result slot for one invocation. Clones share the slot.
#[derive(Debug, Clone)]
pub struct Completion {
    invocation: InvocationId,
    slot: Arc<Mutex<Option<oneshot::Sender<Settled>>>>,
    cancel: CancelSignal,
}

/// The receiving half of a [`Completion`].
#[derive(Debug)]
pub struct PendingCompletion {
    rx: oneshot::Receiver<Settled>,
}

impl PendingCompletion {
    /// `None` when every clone of the completion was dropped unresolved.
    pub async fn wait(self) -> Option<Settled> {
        self.rx.await.ok()
    }
}

impl Completion {
    #[must_use]
    pub fn new(invocation: InvocationId, cancel: CancelSignal) -> (Self, PendingCompletion) {
        let (tx, rx) = oneshot::channel();
        let completion = Self {
            invocation,
            slot: Arc::new(Mutex::new(Some(tx))),
            cancel,
        };
        (completion, PendingCompletion { rx })
    }

    #[must_use]
    pub fn invocation(&self) -> InvocationId {
        self.invocation
    }

    /// Settle the invocation. Only the first call can succeed.
    pub fn resolve(&self, result: Settled) -> Result<(), ResolveError> {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            tracing::error!(invocation = %self.invocation, "completion resolved more than once");
            return Err(ResolveError::AlreadyResolved);
        };
        if self.cancel.is_cancelled() {
            tracing::debug!(invocation = %self.invocation, "dropping result of cancelled invocation");
            return Err(ResolveError::Cancelled);
        }
        sender.send(result).map_err(|_| ResolveError::Cancelled)
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[derive(Debug, Clone)]
pub struct ForeignRuntimeConfig {
    pub thread_name: String,
    /// Applied by [`invoke_foreign_async`] when set.
    pub default_call_timeout: Option<Duration>,
    /// How long a cancelled foreign task may keep running before it is dropped.
    pub cancel_grace: Duration,
}

impl Default for ForeignRuntimeConfig {
    fn default() -> Self {
        Self {
            thread_name: "isthmus-foreign".to_owned(),
            default_call_timeout: None,
            cancel_grace: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Error)]
pub enum ForeignRuntimeError {
    #[error("failed to build foreign scheduler: {0}")]
    Build(#[source] io::Error),
    #[error("failed to spawn foreign thread: {0}")]
    Spawn(#[source] io::Error),
}

struct Job {
    capability: Arc<dyn ForeignCapability>,
    args: Vec<ForeignValue>,
    ctx: CallContext,
    completion: Completion,
}

struct Shared {
    jobs: mpsc::UnboundedSender<Job>,
    next_invocation: AtomicU64,
    config: ForeignRuntimeConfig,
    registered: Mutex<HashMap<CapabilityId, String>>,
}

/// Held by every clone of a [`CapabilityHandle`]; the capability leaves the
/// registry when the last clone is dropped.
struct Registration {
    id: CapabilityId,
    shared: Arc<Shared>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let removed = self
            .shared
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
        if let Some(name) = removed {
            tracing::debug!(capability = %self.id, %name, "capability released");
        }
    }
}

/// The foreign event loop.
pub struct ForeignRuntime {
    shared: Arc<Shared>,
    stop: CancelTrigger,
    thread: Option<JoinHandle<()>>,
    next_capability: AtomicU64,
}

impl ForeignRuntime {
    pub fn start(config: ForeignRuntimeConfig) -> Result<Self, ForeignRuntimeError> {
        let scheduler = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ForeignRuntimeError::Build)?;
        let (jobs, mut job_rx) = mpsc::unbounded_channel::<Job>();
        let (stop, stop_signal) = cancel_pair();
        let grace = config.cancel_grace;

        let thread = thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || {
                scheduler.block_on(async move {
                    loop {
                        tokio::select! {
                            biased;
                            () = stop_signal.cancelled() => break,
                            job = job_rx.recv() => match job {
                                Some(job) => {
                                    tokio::spawn(run_job(job, grace));
                                }
                                None => break,
                            },
                        }
                    }
                });
                // Dropping the scheduler drops every unfinished foreign task, and
                // with them their completions.
                drop(scheduler);
                tracing::debug!("foreign loop stopped");
            })
            .map_err(ForeignRuntimeError::Spawn)?;

        tracing::debug!(thread = %config.thread_name, "foreign loop started");
        Ok(Self {
            shared: Arc::new(Shared {
                jobs,
                next_invocation: AtomicU64::new(0),
                config,
                registered: Mutex::new(HashMap::new()),
            }),
            stop,
            thread: Some(thread),
            next_capability: AtomicU64::new(0),
        })
    }

    /// Register a foreign implementation and get the handle native code calls
    /// it through. The registration lasts until every clone of the handle is
    /// dropped.
    pub fn register(&self, capability: impl ForeignCapability) -> CapabilityHandle {
        let id = CapabilityId::new(self.next_capability.fetch_add(1, Ordering::Relaxed) + 1);
        let name: Arc<str> = Arc::from(capability.name());
        self.shared
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, name.to_string());
        tracing::debug!(capability = %id, name = %name, "capability registered");
        CapabilityHandle {
            id,
            name,
            capability: Arc::new(capability),
            registration: Arc::new(Registration {
                id,
                shared: Arc::clone(&self.shared),
            }),
        }
    }

    /// Live registrations, ordered by id.
    #[must_use]
    pub fn capabilities(&self) -> Vec<(CapabilityId, String)> {
        let mut out: Vec<_> = self
            .shared
            .registered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect();
        out.sort_by_key(|(id, _)| *id);
        out
    }

    #[must_use]
    pub fn config(&self) -> &ForeignRuntimeConfig {
        &self.shared.config
    }

    /// Stop the loop and join its thread. In-flight invocations fail with an
    /// internal failure.
    ///
    /// Joining blocks the calling thread; from async code use
    /// [`ForeignRuntime::shutdown_async`].
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    /// [`ForeignRuntime::shutdown`] with the join moved to the blocking pool.
    pub async fn shutdown_async(mut self) {
        self.stop.cancel();
        let Some(thread) = self.thread.take() else {
            return;
        };
        match task::spawn_blocking(move || thread.join()).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => tracing::warn!("foreign thread panicked during shutdown"),
            Err(err) => tracing::warn!(error = %err, "foreign thread join was abandoned"),
        }
    }

    fn stop_and_join(&mut self) {
        self.stop.cancel();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("foreign thread panicked during shutdown");
        }
    }
}

impl Drop for ForeignRuntime {
    fn drop(&mut self) {
        // Inside async code the stopped thread is detached rather than joined.
        if runtime::Handle::try_current().is_ok() {
            self.stop.cancel();
            self.thread.take();
            return;
        }
        self.stop_and_join();
    }
}

async fn run_job(job: Job, grace: Duration) {
    let Job {
        capability,
        args,
        ctx,
        completion,
    } = job;
    let signal = ctx.cancel.clone();
    let invocation = ctx.invocation;
    if signal.is_cancelled() {
        tracing::debug!(%invocation, "invocation cancelled before the foreign task started");
        return;
    }
    let name = capability.name().to_owned();
    // Building the future runs host code too, so it goes inside the unwind guard.
    let work = AssertUnwindSafe(async move { capability.call(args, ctx).await }).catch_unwind();
    tokio::pin!(work);

    let settled = tokio::select! {
        biased;
        () = signal.cancelled() => time::timeout(grace, &mut work).await.ok(),
        out = &mut work => Some(out),
    };
    let Some(settled) = settled else {
        tracing::debug!(%invocation, "cancelled foreign task dropped after grace period");
        return;
    };
    let result = settled.unwrap_or_else(|payload| {
        Err(ForeignError::Raised(format!(
            "panic in `{name}`: {}",
            panic_message(payload.as_ref())
        )))
    });
    // Cancelled or already-resolved outcomes are logged inside `resolve`.
    let _ = completion.resolve(result);
}

/// Opaque native-side reference to a registered foreign capability.
#[derive(Clone)]
pub struct CapabilityHandle {
    id: CapabilityId,
    name: Arc<str>,
    capability: Arc<dyn ForeignCapability>,
    registration: Arc<Registration>,
}

impl fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl CapabilityHandle {
    #[must_use]
    pub fn id(&self) -> CapabilityId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn shared(&self) -> &Shared {
        &self.registration.shared
    }
}

/// Fires the invocation's cancel signal unless the result arrived first.
struct CancelOnDrop {
    trigger: Option<CancelTrigger>,
}

impl CancelOnDrop {
    fn disarm(&mut self) {
        self.trigger = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(trigger) = self.trigger.take() {
            trigger.cancel();
        }
    }
}

/// Invoke a foreign capability and wait for its result.
///
/// Uses the runtime's default call timeout when one is configured.
pub async fn invoke_foreign_async(
    handle: &CapabilityHandle,
    args: Vec<ForeignValue>,
) -> BoundaryResult<ForeignValue> {
    match handle.shared().config.default_call_timeout {
        Some(timeout) => invoke_foreign_async_with_timeout(handle, args, timeout).await,
        None => invoke(handle, args).await,
    }
}

/// Like [`invoke_foreign_async`], with an explicit deadline. On expiry the
/// invocation is cancelled and the call fails with an internal failure.
pub async fn invoke_foreign_async_with_timeout(
    handle: &CapabilityHandle,
    args: Vec<ForeignValue>,
    timeout: Duration,
) -> BoundaryResult<ForeignValue> {
    let started = Instant::now();
    match time::timeout(timeout, invoke(handle, args)).await {
        Ok(result) => result,
        Err(_) => Err(boundary::report(
            handle.name(),
            ErrorEnvelope::internal(format!(
                "foreign capability `{}` timed out after {} ms",
                handle.name(),
                started.elapsed().as_millis()
            )),
        )),
    }
}

async fn invoke(handle: &CapabilityHandle, args: Vec<ForeignValue>) -> BoundaryResult<ForeignValue> {
    let invocation = InvocationId::new(handle.shared().next_invocation.fetch_add(1, Ordering::Relaxed) + 1);
    let (trigger, signal) = cancel_pair();
    let (completion, pending) = Completion::new(invocation, signal.clone());
    let mut cancel_guard = CancelOnDrop {
        trigger: Some(trigger),
    };

    let job = Job {
        capability: Arc::clone(&handle.capability),
        args,
        ctx: CallContext {
            invocation,
            capability: handle.id,
            cancel: signal,
        },
        completion,
    };
    if handle.shared().jobs.send(job).is_err() {
        cancel_guard.disarm();
        return Err(boundary::report(
            handle.name(),
            ErrorEnvelope::internal(format!(
                "foreign runtime is shut down; cannot invoke `{}`",
                handle.name()
            )),
        ));
    }
    tracing::debug!(capability = %handle.name, %invocation, "foreign invocation dispatched");

    let settled = pending.wait().await;
    cancel_guard.disarm();
    match settled {
        Some(Ok(value)) => Ok(value),
        Some(Err(error)) => Err(boundary::report(handle.name(), error.into_envelope())),
        None => Err(boundary::report(
            handle.name(),
            ErrorEnvelope::internal(format!(
                "foreign runtime stopped before `{}` resolved",
                handle.name()
            )),
        )),
    }
}

/// Ask a foreign `add` capability for `a + b`.
pub async fn add_via_foreign(handle: &CapabilityHandle, a: u64, b: u64) -> BoundaryResult<u64> {
    let value =
        invoke_foreign_async(handle, vec![ForeignValue::from(a), ForeignValue::from(b)]).await?;
    marshal::u64_from_foreign("result", &value).map_err(|e| e.reject("add_via_foreign"))
}
