//! Native arithmetic operations.
//!
//! These are the opaque computations the boundary exposes. They take native
//! types only; range checks on foreign input happen in the marshaling layer
//! before these run.

use isthmus_types::ArithmeticError;

pub fn add(a: u64, b: u64) -> Result<u64, ArithmeticError> {
    a.checked_add(b)
        .ok_or(ArithmeticError::IntegerOverflow { a, b })
}

pub fn sub(a: u64, b: u64) -> Result<u64, ArithmeticError> {
    a.checked_sub(b)
        .ok_or(ArithmeticError::IntegerOverflow { a, b })
}

/// Integer division.
///
/// # Panics
///
/// Panics when `divisor` is zero. Exports route this through the boundary guard,
/// which reports it as an internal failure rather than a domain error.
#[must_use]
pub fn div(dividend: u64, divisor: u64) -> u64 {
    assert!(divisor != 0, "Can't divide by zero");
    dividend / divisor
}

#[must_use]
pub fn equal(a: u64, b: u64) -> bool {
    a == b
}

#[inline(never)]
pub fn no_op() {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_sub() {
        assert_eq!(add(2, 4), Ok(6));
        assert_eq!(add(4, 8), Ok(12));
        assert_eq!(sub(4, 2), Ok(2));
        assert_eq!(sub(8, 4), Ok(4));
    }

    #[test]
    fn overflow_is_declared() {
        assert_eq!(
            add(u64::MAX, 1),
            Err(ArithmeticError::IntegerOverflow { a: u64::MAX, b: 1 })
        );
        assert_eq!(
            sub(0, 1),
            Err(ArithmeticError::IntegerOverflow { a: 0, b: 1 })
        );
    }

    #[test]
    fn div_and_equal() {
        assert_eq!(div(8, 4), 2);
        assert!(equal(2, 2));
        assert!(!equal(2, 4));
    }

    #[test]
    #[should_panic(expected = "Can't divide by zero")]
    fn div_by_zero_panics() {
        let _ = div(8, 0);
    }
}
