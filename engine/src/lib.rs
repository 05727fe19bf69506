//! The Isthmus async bridge.
//!
//! Two directions share one process:
//!
//! - [`foreign`]: native code awaits capabilities implemented on the foreign
//!   event loop ([`ForeignRuntime`]).
//! - [`gather`] and [`ops`]: the foreign side launches native async operations
//!   and combines them deterministically.

pub mod foreign;
pub mod gather;
pub mod ops;

pub use foreign::{
    CallContext, CallbackCapability, CapabilityFut, CapabilityHandle, Completion, FnCapability,
    ForeignCapability, ForeignError, ForeignRuntime, ForeignRuntimeConfig, ForeignRuntimeError,
    PendingCompletion, ResolveError, add_via_foreign, invoke_foreign_async,
    invoke_foreign_async_with_timeout,
};
pub use gather::{GatherError, GatherSet, MemberFut, gather};
pub use isthmus_types::GatherPolicy;
pub use ops::{NativeOps, OpFuture, append_numbers, say_after, say_after_op, with_cancel, with_timeout};
