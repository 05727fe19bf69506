//! Native side of the Isthmus boundary.
//!
//! Everything a foreign caller can reach lives here: the guarded export
//! surface, the marshaling layer between [`ForeignValue`] and native types,
//! the record codec, and the handle-indexed favorite-numbers arena.
//!
//! [`ForeignValue`]: isthmus_types::ForeignValue

pub mod arithmetic;
pub mod boundary;
pub mod cancel;
pub mod codec;
pub mod exports;
pub mod marshal;
pub mod numbers;

pub use boundary::{guard, guard_async, report};
pub use cancel::{CancelSignal, CancelTrigger, Cancellable, cancel_pair, until_cancelled};
pub use codec::{CodecError, deserialize, serialize};
pub use marshal::{BindingError, to_foreign, to_native};
pub use numbers::{ExtendOutcome, FavoriteNumbers, NumbersArena, quick_sort};
