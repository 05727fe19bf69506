//! Cross-boundary error taxonomy.
//!
//! Every failure that leaves the native library is exactly one [`ErrorEnvelope`]:
//!
//! | Kind | Meaning | Caller action |
//! |------|---------|---------------|
//! | [`ErrorKind::DomainError`] | Declared business failure ([`DomainError`]) | Branch on the variant |
//! | [`ErrorKind::InternalFailure`] | Native fault caught at the boundary | Log/report; operation is lost |
//! | [`ErrorKind::BindingViolation`] | Input rejected by marshaling before execution | Fix the call |
//!
//! Native code never builds an envelope by hand for unexpected faults. It reports a
//! [`NativeFailure`] and lets [`classify`] pick the kind, so the same fault is always
//! classified the same way.

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ForeignValue;
use crate::proofs::{NonEmptyStaticStr, NonEmptyString};

/// Version of the closed [`DomainError`] variant set. Bumped whenever a variant
/// is added, removed, or has its payload changed.
pub const DOMAIN_ERROR_VERSION: u32 = 1;

const UNKNOWN_FAILURE: NonEmptyStaticStr = NonEmptyStaticStr::new("unknown native failure");
const UNKNOWN_PANIC: NonEmptyStaticStr = NonEmptyStaticStr::new("unknown panic payload");

/// The top-level kinds, for callers that only need to discriminate severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DomainError,
    InternalFailure,
    BindingViolation,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DomainError => "DomainError",
            Self::InternalFailure => "InternalFailure",
            Self::BindingViolation => "BindingViolation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed error shape crossing the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorEnvelope {
    #[error("DomainError: {error}")]
    Domain { error: DomainError },
    #[error("InternalFailure: {message}")]
    Internal { message: NonEmptyString },
    #[error("BindingViolation: {message}")]
    Binding { message: NonEmptyString },
}

impl ErrorEnvelope {
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: NonEmptyString::or_static(message, UNKNOWN_FAILURE),
        }
    }

    #[must_use]
    pub fn binding(message: impl Into<String>) -> Self {
        Self::Binding {
            message: NonEmptyString::or_static(message, UNKNOWN_FAILURE),
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain { .. } => ErrorKind::DomainError,
            Self::Internal { .. } => ErrorKind::InternalFailure,
            Self::Binding { .. } => ErrorKind::BindingViolation,
        }
    }

    #[must_use]
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain { error } => Some(error),
            _ => None,
        }
    }

    /// Diagnostic text for internal and binding kinds; the rendered variant for domain errors.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Domain { error } => error.to_string(),
            Self::Internal { message } | Self::Binding { message } => message.to_string(),
        }
    }

    /// Render as the error object handed to the foreign side.
    #[must_use]
    pub fn to_foreign(&self) -> ForeignValue {
        match serde_json::to_value(self) {
            Ok(json) => ForeignValue::from_json(&json),
            // Envelope fields are plain strings and integers; serialization cannot fail.
            Err(_) => ForeignValue::Null,
        }
    }

    /// Rebuild an envelope from a foreign error object.
    pub fn from_foreign(value: &ForeignValue) -> Result<Self, EnvelopeDecodeError> {
        serde_json::from_value(value.to_json()).map_err(|e| EnvelopeDecodeError(e.to_string()))
    }
}

impl From<DomainError> for ErrorEnvelope {
    fn from(error: DomainError) -> Self {
        Self::Domain { error }
    }
}

#[derive(Debug, Error)]
#[error("foreign value is not an error envelope: {0}")]
pub struct EnvelopeDecodeError(String);

/// Declared, recoverable business failures. Closed and versioned by
/// [`DOMAIN_ERROR_VERSION`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail", rename_all = "snake_case")]
pub enum DomainError {
    #[error(transparent)]
    Arithmetic(ArithmeticError),
    #[error(transparent)]
    Fetch(FetchError),
}

impl DomainError {
    /// Stable dotted code, e.g. `arithmetic.integer_overflow`.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Arithmetic(ArithmeticError::IntegerOverflow { .. }) => {
                "arithmetic.integer_overflow"
            }
            Self::Fetch(FetchError::Timeout { .. }) => "fetch.timeout",
            Self::Fetch(FetchError::Status { .. }) => "fetch.status",
            Self::Fetch(FetchError::Transport { .. }) => "fetch.transport",
            Self::Fetch(FetchError::Malformed { .. }) => "fetch.malformed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum ArithmeticError {
    #[error("Integer overflow on an operation with {a} and {b}")]
    IntegerOverflow { a: u64, b: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum FetchError {
    #[error("request to {url} timed out after {after_ms} ms")]
    Timeout { url: String, after_ms: u64 },
    #[error("request to {url} failed with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("unexpected response from {url}: {message}")]
    Malformed { url: String, message: String },
}

impl From<ArithmeticError> for DomainError {
    fn from(error: ArithmeticError) -> Self {
        Self::Arithmetic(error)
    }
}

impl From<FetchError> for DomainError {
    fn from(error: FetchError) -> Self {
        Self::Fetch(error)
    }
}

/// A native-only failure, before classification.
pub enum NativeFailure {
    /// Raised intentionally by business logic.
    Declared(DomainError),
    /// Rejected by the marshaling step; the operation never ran.
    Binding(String),
    /// Caught unwinding panic payload.
    Panic(Box<dyn Any + Send>),
    /// Any other error escaping native code.
    Unexpected(Box<dyn StdError + Send + Sync>),
}

impl fmt::Debug for NativeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared(e) => f.debug_tuple("Declared").field(e).finish(),
            Self::Binding(m) => f.debug_tuple("Binding").field(m).finish(),
            Self::Panic(p) => f.debug_tuple("Panic").field(&panic_message(p.as_ref())).finish(),
            Self::Unexpected(e) => f.debug_tuple("Unexpected").field(&e.to_string()).finish(),
        }
    }
}

impl From<DomainError> for NativeFailure {
    fn from(error: DomainError) -> Self {
        Self::Declared(error)
    }
}

impl From<ArithmeticError> for NativeFailure {
    fn from(error: ArithmeticError) -> Self {
        Self::Declared(error.into())
    }
}

impl From<FetchError> for NativeFailure {
    fn from(error: FetchError) -> Self {
        Self::Declared(error.into())
    }
}

/// Classify a native failure into exactly one envelope kind. Never fails.
#[must_use]
pub fn classify(failure: NativeFailure) -> ErrorEnvelope {
    match failure {
        NativeFailure::Declared(error) => ErrorEnvelope::Domain { error },
        NativeFailure::Binding(message) => ErrorEnvelope::binding(message),
        NativeFailure::Panic(payload) => ErrorEnvelope::Internal {
            message: NonEmptyString::or_static(panic_message(payload.as_ref()), UNKNOWN_PANIC),
        },
        NativeFailure::Unexpected(error) => ErrorEnvelope::internal(error.to_string()),
    }
}

/// Render a panic payload. `panic!` produces `&str` or `String`; anything else is opaque.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        UNKNOWN_PANIC.as_str().to_string()
    }
}
