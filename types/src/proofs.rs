//! Proof types for validated diagnostic text.
//!
//! Every failure message that crosses the boundary must be readable, so the
//! envelope stores its messages as [`NonEmptyString`] and never as a raw `String`.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A string that is never empty (or whitespace-only) after trimming.
///
/// # Serde
///
/// Serializes as a plain string. Deserialization validates non-emptiness, so an
/// envelope decoded from foreign data can never carry a blank message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("message content must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyStringError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyStringError)
        } else {
            Ok(Self(value))
        }
    }

    /// Like [`NonEmptyString::new`], substituting `fallback` for blank input.
    #[must_use]
    pub fn or_static(value: impl Into<String>, fallback: NonEmptyStaticStr) -> Self {
        Self::new(value).unwrap_or_else(|_| Self::from(fallback))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl From<NonEmptyStaticStr> for NonEmptyString {
    fn from(value: NonEmptyStaticStr) -> Self {
        Self(value.0.to_owned())
    }
}

impl Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Like [`NonEmptyString`], but for `'static` literals. Checked at compile time
/// via `const` assertion; literals must not be empty or whitespace-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NonEmptyStaticStr(&'static str);

impl NonEmptyStaticStr {
    #[must_use]
    pub const fn new(value: &'static str) -> Self {
        assert!(
            has_content(value),
            "NonEmptyStaticStr must not be empty or whitespace-only"
        );
        Self(value)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

/// Whether `value` survives `str::trim`: some character lies outside the
/// Unicode `White_Space` set.
const fn has_content(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let lead = bytes[i];
        let (c, width) = if lead < 0x80 {
            (lead as u32, 1)
        } else if lead < 0xE0 {
            ((((lead & 0x1F) as u32) << 6) | (bytes[i + 1] & 0x3F) as u32, 2)
        } else if lead < 0xF0 {
            (
                (((lead & 0x0F) as u32) << 12)
                    | (((bytes[i + 1] & 0x3F) as u32) << 6)
                    | (bytes[i + 2] & 0x3F) as u32,
                3,
            )
        } else {
            // No whitespace lies outside the BMP.
            return true;
        };
        if !is_white_space(c) {
            return true;
        }
        i += width;
    }
    false
}

const fn is_white_space(c: u32) -> bool {
    matches!(
        c,
        0x09..=0x0D
            | 0x20
            | 0x85
            | 0xA0
            | 0x1680
            | 0x2000..=0x200A
            | 0x2028
            | 0x2029
            | 0x202F
            | 0x205F
            | 0x3000
    )
}
