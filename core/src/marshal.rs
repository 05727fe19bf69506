//! Marshaling between foreign values and native types.
//!
//! Checks here run before any native computation. A value that does not fit the
//! native parameter type is a [`BindingError`], which always classifies as a
//! `BindingViolation`; nothing is truncated, wrapped, or coerced.

use std::collections::BTreeMap;

use isthmus_types::{BoundaryResult, ErrorEnvelope, ForeignValue, NativeFailure, UserRecord, classify};
use thiserror::Error;

use crate::boundary;

pub const ID_FIELD: &str = "id";
pub const FAVORITE_NUMBERS_FIELD: &str = "favorite_numbers";
pub const FAVORITE_COLORS_FIELD: &str = "favorite_colors";

/// A value rejected by the marshaling layer. `path` names the argument or field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {reason}")]
pub struct BindingError {
    pub path: String,
    pub reason: String,
}

impl BindingError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }

    fn expected(path: &str, expected: &str, got: &ForeignValue) -> Self {
        Self::new(path, format!("expected {expected}, got {}", got.type_name()))
    }

    /// Classify and log this rejection as a failure of `operation`.
    pub fn reject(self, operation: &str) -> ErrorEnvelope {
        boundary::report(operation, classify(self.into()))
    }
}

impl From<BindingError> for NativeFailure {
    fn from(error: BindingError) -> Self {
        NativeFailure::Binding(error.to_string())
    }
}

/// Range-checked conversion to `u64`.
pub fn u64_from_foreign(path: &str, value: &ForeignValue) -> Result<u64, BindingError> {
    match value {
        ForeignValue::Int(n) => u64::try_from(*n)
            .map_err(|_| BindingError::new(path, format!("{n} is out of range for u64"))),
        ForeignValue::Float(f) => Err(BindingError::new(
            path,
            format!("{f} is not an integer in range for u64"),
        )),
        other => Err(BindingError::expected(path, "int", other)),
    }
}

pub fn string_from_foreign(path: &str, value: &ForeignValue) -> Result<String, BindingError> {
    value
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(|| BindingError::expected(path, "string", value))
}

pub fn u64_list_from_foreign(path: &str, value: &ForeignValue) -> Result<Vec<u64>, BindingError> {
    let items = value
        .as_list()
        .ok_or_else(|| BindingError::expected(path, "list", value))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| u64_from_foreign(&format!("{path}[{i}]"), item))
        .collect()
}

pub fn string_list_from_foreign(
    path: &str,
    value: &ForeignValue,
) -> Result<Vec<String>, BindingError> {
    let items = value
        .as_list()
        .ok_or_else(|| BindingError::expected(path, "list", value))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| string_from_foreign(&format!("{path}[{i}]"), item))
        .collect()
}

#[must_use]
pub fn u64_list_to_foreign(numbers: &[u64]) -> ForeignValue {
    ForeignValue::List(numbers.iter().copied().map(ForeignValue::from).collect())
}

fn required<'a>(value: &'a ForeignValue, field: &str) -> Result<&'a ForeignValue, BindingError> {
    let ForeignValue::Object(fields) = value else {
        return Err(BindingError::expected("record", "object", value));
    };
    fields
        .get(field)
        .ok_or_else(|| BindingError::new(field, "missing required field"))
}

/// Native record to foreign object.
#[must_use]
pub fn to_foreign(record: &UserRecord) -> ForeignValue {
    let mut fields = BTreeMap::new();
    fields.insert(ID_FIELD.to_owned(), ForeignValue::from(record.id));
    fields.insert(
        FAVORITE_NUMBERS_FIELD.to_owned(),
        u64_list_to_foreign(&record.favorite_numbers),
    );
    fields.insert(
        FAVORITE_COLORS_FIELD.to_owned(),
        ForeignValue::List(
            record
                .favorite_colors
                .iter()
                .map(|c| ForeignValue::Str(c.clone()))
                .collect(),
        ),
    );
    ForeignValue::Object(fields)
}

/// Foreign object to native record. Extra keys are ignored.
pub fn to_native(value: &ForeignValue) -> BoundaryResult<UserRecord> {
    record_from_foreign(value).map_err(|e| e.reject("to_native"))
}

fn record_from_foreign(value: &ForeignValue) -> Result<UserRecord, BindingError> {
    let id = u64_from_foreign(ID_FIELD, required(value, ID_FIELD)?)?;
    let favorite_numbers = u64_list_from_foreign(
        FAVORITE_NUMBERS_FIELD,
        required(value, FAVORITE_NUMBERS_FIELD)?,
    )?;
    let favorite_colors = string_list_from_foreign(
        FAVORITE_COLORS_FIELD,
        required(value, FAVORITE_COLORS_FIELD)?,
    )?;
    Ok(UserRecord {
        id,
        favorite_numbers,
        favorite_colors,
    })
}
