//! Cooperative cancellation signal shared across the boundary.
//!
//! A [`CancelTrigger`] is held by whoever owns the operation's lifetime (the
//! native caller, a gather, a timeout). Any number of [`CancelSignal`]s observe
//! it. Cancellation is sticky: once fired it stays fired, and observers that
//! subscribe late still see it.

use std::future::{self, Future};

use tokio::sync::watch;

#[derive(Debug)]
pub struct CancelTrigger {
    tx: watch::Sender<bool>,
}

#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected trigger/signal pair.
#[must_use]
pub fn cancel_pair() -> (CancelTrigger, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelTrigger { tx }, CancelSignal { rx })
}

impl CancelTrigger {
    /// Fire the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl CancelSignal {
    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_trigger, signal) = cancel_pair();
        signal
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the signal fires. If the trigger is dropped without firing,
    /// this never resolves.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            future::pending::<()>().await;
        }
    }
}

/// Outcome of work raced against a [`CancelSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellable<T> {
    Completed(T),
    Cancelled,
}

impl<T> Cancellable<T> {
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Cancelled => None,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Drive `fut` until it finishes or `signal` fires, whichever is first.
///
/// On cancellation `fut` is dropped at its current suspension point. A signal
/// that is already fired wins without polling `fut` at all.
pub async fn until_cancelled<F: Future>(signal: &CancelSignal, fut: F) -> Cancellable<F::Output> {
    tokio::select! {
        biased;
        () = signal.cancelled() => Cancellable::Cancelled,
        value = fut => Cancellable::Completed(value),
    }
}
