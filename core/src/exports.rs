//! Foreign-callable exports.
//!
//! Each export takes [`ForeignValue`] arguments, marshals them, and runs the
//! native operation inside the boundary guard. [`call`] dispatches by name for
//! callers that only know the export as a string.

use isthmus_types::{BoundaryResult, ErrorEnvelope, ForeignValue, NativeFailure};

use crate::arithmetic;
use crate::boundary;
use crate::marshal;

/// Export names accepted by [`call`], with their arity.
pub const EXPORTS: &[(&str, usize)] = &[
    ("add", 2),
    ("sub", 2),
    ("div", 2),
    ("equal", 2),
    ("no_op", 0),
];

pub fn add(a: &ForeignValue, b: &ForeignValue) -> BoundaryResult<ForeignValue> {
    boundary::guard("add", || {
        let a = marshal::u64_from_foreign("a", a)?;
        let b = marshal::u64_from_foreign("b", b)?;
        Ok(ForeignValue::from(arithmetic::add(a, b)?))
    })
}

pub fn sub(a: &ForeignValue, b: &ForeignValue) -> BoundaryResult<ForeignValue> {
    boundary::guard("sub", || {
        let a = marshal::u64_from_foreign("a", a)?;
        let b = marshal::u64_from_foreign("b", b)?;
        Ok(ForeignValue::from(arithmetic::sub(a, b)?))
    })
}

/// A zero divisor panics natively and comes back as an internal failure.
pub fn div(dividend: &ForeignValue, divisor: &ForeignValue) -> BoundaryResult<ForeignValue> {
    boundary::guard("div", || {
        let dividend = marshal::u64_from_foreign("dividend", dividend)?;
        let divisor = marshal::u64_from_foreign("divisor", divisor)?;
        Ok(ForeignValue::from(arithmetic::div(dividend, divisor)))
    })
}

pub fn equal(a: &ForeignValue, b: &ForeignValue) -> BoundaryResult<ForeignValue> {
    boundary::guard("equal", || {
        let a = marshal::u64_from_foreign("a", a)?;
        let b = marshal::u64_from_foreign("b", b)?;
        Ok(ForeignValue::Bool(arithmetic::equal(a, b)))
    })
}

pub fn no_op() -> BoundaryResult<ForeignValue> {
    boundary::guard("no_op", || {
        arithmetic::no_op();
        Ok::<_, NativeFailure>(ForeignValue::Null)
    })
}

/// Dispatch an export by name.
pub fn call(name: &str, args: &[ForeignValue]) -> BoundaryResult<ForeignValue> {
    let Some(&(_, arity)) = EXPORTS.iter().find(|(export, _)| *export == name) else {
        return Err(boundary::report(
            name,
            ErrorEnvelope::binding(format!("unknown export `{name}`")),
        ));
    };
    if args.len() != arity {
        return Err(boundary::report(
            name,
            ErrorEnvelope::binding(format!(
                "`{name}` takes {arity} argument(s), got {}",
                args.len()
            )),
        ));
    }
    tracing::trace!(export = name, "dispatch");
    match (name, args) {
        ("add", [a, b]) => add(a, b),
        ("sub", [a, b]) => sub(a, b),
        ("div", [a, b]) => div(a, b),
        ("equal", [a, b]) => equal(a, b),
        ("no_op", []) => no_op(),
        _ => Err(ErrorEnvelope::internal(format!(
            "export table out of sync for `{name}`"
        ))),
    }
}
