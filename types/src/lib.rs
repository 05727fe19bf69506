//! Boundary domain types for Isthmus.
//!
//! This crate contains pure types with no IO, no async, and minimal dependencies:
//! the error envelope and its classification rule, the foreign value shape, the
//! shared record, and the opaque handle ids. Every other crate in the workspace
//! builds on these.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod envelope;
mod ids;
mod policy;
mod proofs;
mod record;
mod value;

pub use envelope::{
    ArithmeticError, DOMAIN_ERROR_VERSION, DomainError, EnvelopeDecodeError, ErrorEnvelope,
    ErrorKind, FetchError, NativeFailure, classify, panic_message,
};
pub use ids::{CapabilityId, CollectionHandle, InvocationId};
pub use policy::GatherPolicy;
pub use proofs::{EmptyStringError, NonEmptyStaticStr, NonEmptyString};
pub use record::UserRecord;
pub use value::ForeignValue;

/// Result of any operation that crosses the boundary.
pub type BoundaryResult<T> = Result<T, ErrorEnvelope>;
