//! Native-owned favorite-numbers collections.
//!
//! The foreign side never touches a [`FavoriteNumbers`] directly. Collections
//! live in a [`NumbersArena`] behind one mutex and are addressed by opaque
//! [`CollectionHandle`]s, so concurrent foreign tasks are serialized here and no
//! reference into native state ever crosses the boundary.

use std::collections::HashMap;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use isthmus_types::{BoundaryResult, CollectionHandle, ErrorEnvelope, ForeignValue};

use crate::boundary;
use crate::cancel::CancelSignal;
use crate::marshal::{self, BindingError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FavoriteNumbers {
    numbers: Vec<u64>,
    max_number: u64,
}

impl FavoriteNumbers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_number(&mut self, number: u64) {
        self.numbers.push(number);
        self.max_number = self.max_number.max(number);
    }

    /// Linear-scan minimum; `None` when empty.
    #[must_use]
    pub fn find_min(&self) -> Option<u64> {
        let mut iter = self.numbers.iter().copied();
        let first = iter.next()?;
        Some(iter.fold(first, |min, n| if n < min { n } else { min }))
    }

    /// Sorted copy of `numbers`, or of the collection itself when `None`.
    #[must_use]
    pub fn quick_sort(&self, numbers: Option<&[u64]>) -> Vec<u64> {
        quick_sort(numbers.unwrap_or(&self.numbers))
    }

    #[must_use]
    pub fn numbers(&self) -> &[u64] {
        &self.numbers
    }

    #[must_use]
    pub fn max_number(&self) -> u64 {
        self.max_number
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

/// Partition sort with a last-element pivot. Returns a new vector.
#[must_use]
pub fn quick_sort(numbers: &[u64]) -> Vec<u64> {
    let mut out = numbers.to_vec();
    partition_sort(&mut out);
    out
}

fn partition_sort(mut slice: &mut [u64]) {
    while slice.len() > 1 {
        let pivot = partition(slice);
        let (left, right) = mem::take(&mut slice).split_at_mut(pivot);
        let right = &mut right[1..];
        // Recurse into the smaller side and loop on the larger to bound stack depth.
        if left.len() < right.len() {
            partition_sort(left);
            slice = right;
        } else {
            partition_sort(right);
            slice = left;
        }
    }
}

fn partition(slice: &mut [u64]) -> usize {
    let last = slice.len() - 1;
    let pivot = slice[last];
    let mut store = 0;
    for i in 0..last {
        if slice[i] <= pivot {
            slice.swap(i, store);
            store += 1;
        }
    }
    slice.swap(store, last);
    store
}

/// Result of a cancellable batch append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendOutcome {
    /// The whole batch was applied; `len` is the new collection size.
    Applied { len: usize },
    /// Cancelled before the batch was applied; the collection is unchanged.
    Cancelled,
}

#[derive(Debug, Default)]
pub struct NumbersArena {
    slots: Mutex<HashMap<CollectionHandle, FavoriteNumbers>>,
    next_id: AtomicU64,
}

impl NumbersArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self) -> CollectionHandle {
        let handle = CollectionHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.lock().insert(handle, FavoriteNumbers::new());
        tracing::trace!(%handle, "collection created");
        handle
    }

    /// Drop a collection. Later use of the handle is a binding violation.
    pub fn release(&self, handle: CollectionHandle) -> BoundaryResult<()> {
        if self.lock().remove(&handle).is_some() {
            tracing::trace!(%handle, "collection released");
            Ok(())
        } else {
            Err(unknown_handle(handle))
        }
    }

    #[must_use]
    pub fn live_collections(&self) -> usize {
        self.lock().len()
    }

    pub fn add_number(&self, handle: CollectionHandle, number: &ForeignValue) -> BoundaryResult<()> {
        let number =
            marshal::u64_from_foreign("number", number).map_err(|e| e.reject("add_number"))?;
        self.with_collection(handle, "add_number", |c| c.add_number(number))
    }

    /// Append a batch atomically with respect to `cancel`.
    ///
    /// Every value is marshaled first and the signal is checked before the lock
    /// is taken, so the collection either receives the whole batch or nothing.
    pub fn extend_cancellable(
        &self,
        handle: CollectionHandle,
        numbers: &[ForeignValue],
        cancel: &CancelSignal,
    ) -> BoundaryResult<ExtendOutcome> {
        let numbers = numbers
            .iter()
            .enumerate()
            .map(|(i, n)| marshal::u64_from_foreign(&format!("numbers[{i}]"), n))
            .collect::<Result<Vec<_>, BindingError>>()
            .map_err(|e| e.reject("extend_cancellable"))?;
        if cancel.is_cancelled() {
            tracing::debug!(%handle, "append batch cancelled before apply");
            return Ok(ExtendOutcome::Cancelled);
        }
        self.with_collection(handle, "extend_cancellable", |c| {
            for n in numbers {
                c.add_number(n);
            }
            ExtendOutcome::Applied { len: c.len() }
        })
    }

    /// Minimum number, or `Null` for an empty collection.
    pub fn find_min(&self, handle: CollectionHandle) -> BoundaryResult<ForeignValue> {
        self.with_collection(handle, "find_min", |c| {
            c.find_min().map_or(ForeignValue::Null, ForeignValue::from)
        })
    }

    /// Sort a caller-supplied list, or a snapshot of the collection. Sorting runs
    /// outside the arena lock.
    pub fn quick_sort(
        &self,
        handle: CollectionHandle,
        numbers: Option<&ForeignValue>,
    ) -> BoundaryResult<ForeignValue> {
        let input = match numbers {
            Some(list) => marshal::u64_list_from_foreign("numbers", list)
                .map_err(|e| e.reject("quick_sort"))?,
            None => self.with_collection(handle, "quick_sort", |c| c.numbers().to_vec())?,
        };
        boundary::guard("quick_sort", || {
            Ok(marshal::u64_list_to_foreign(&quick_sort(&input)))
        })
    }

    pub fn numbers(&self, handle: CollectionHandle) -> BoundaryResult<ForeignValue> {
        self.with_collection(handle, "numbers", |c| {
            marshal::u64_list_to_foreign(c.numbers())
        })
    }

    pub fn max_number(&self, handle: CollectionHandle) -> BoundaryResult<ForeignValue> {
        self.with_collection(handle, "max_number", |c| ForeignValue::from(c.max_number()))
    }

    pub fn len(&self, handle: CollectionHandle) -> BoundaryResult<usize> {
        self.with_collection(handle, "len", |c| c.len())
    }

    fn with_collection<R>(
        &self,
        handle: CollectionHandle,
        operation: &'static str,
        f: impl FnOnce(&mut FavoriteNumbers) -> R,
    ) -> BoundaryResult<R> {
        let mut slots = self.lock();
        let Some(collection) = slots.get_mut(&handle) else {
            return Err(boundary::report(operation, unknown_handle(handle)));
        };
        boundary::guard(operation, || Ok(f(collection)))
    }

    // A panic inside `with_collection` is caught by the guard while the lock is
    // held, which poisons it; every mutation is a single push, so the data is
    // still consistent and recovering the guard is sound.
    fn lock(&self) -> MutexGuard<'_, HashMap<CollectionHandle, FavoriteNumbers>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unknown_handle(handle: CollectionHandle) -> ErrorEnvelope {
    ErrorEnvelope::binding(format!("unknown or released handle {handle}"))
}
