//! Error taxonomy across the boundary

use isthmus_core::exports;
use isthmus_types::{
    ArithmeticError, DomainError, ErrorEnvelope, ErrorKind, FetchError, ForeignValue,
};

fn int(n: u64) -> ForeignValue {
    ForeignValue::from(n)
}

#[test]
fn add_overflow_is_a_domain_error() {
    let err = exports::add(&int(u64::MAX), &int(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DomainError);
    assert_eq!(
        err.as_domain(),
        Some(&DomainError::Arithmetic(ArithmeticError::IntegerOverflow {
            a: u64::MAX,
            b: 1
        }))
    );
    assert_eq!(err.as_domain().unwrap().code(), "arithmetic.integer_overflow");
}

#[test]
fn sub_underflow_is_a_domain_error() {
    let err = exports::sub(&int(0), &int(1)).unwrap_err();
    assert!(matches!(
        err.as_domain(),
        Some(DomainError::Arithmetic(ArithmeticError::IntegerOverflow { a: 0, b: 1 }))
    ));
}

#[test]
fn in_range_arithmetic_succeeds() {
    assert_eq!(exports::add(&int(u64::MAX - 1), &int(1)), Ok(int(u64::MAX)));
    assert_eq!(exports::sub(&int(5), &int(5)), Ok(int(0)));
    assert_eq!(exports::div(&int(9), &int(2)), Ok(int(4)));
    assert_eq!(exports::equal(&int(3), &int(3)), Ok(ForeignValue::Bool(true)));
    assert_eq!(exports::no_op(), Ok(ForeignValue::Null));
}

#[test]
fn out_of_range_inputs_are_binding_violations() {
    let cases = [
        ForeignValue::Int(-1),
        ForeignValue::Int(i128::from(u64::MAX) + 1),
        ForeignValue::Float(1.5),
        ForeignValue::from("7"),
        ForeignValue::Null,
    ];
    for bad in cases {
        let err = exports::add(&bad, &int(1)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BindingViolation, "input {bad:?}");
        assert!(err.message().starts_with("a: "), "{}", err.message());
    }
}

#[test]
fn binding_check_runs_before_business_logic() {
    // Would overflow if it ran; the bad second argument wins.
    let err = exports::add(&int(u64::MAX), &ForeignValue::Int(-1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BindingViolation);
    // Would panic if it ran.
    let err = exports::div(&int(1), &ForeignValue::Int(-1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BindingViolation);
}

#[test]
fn divide_by_zero_is_an_internal_failure() {
    let err = exports::div(&int(1), &int(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalFailure);
    assert!(err.as_domain().is_none());
    assert!(!err.message().is_empty());
}

#[test]
fn dispatch_by_name_checks_name_and_arity() {
    assert_eq!(exports::call("add", &[int(2), int(3)]), Ok(int(5)));
    assert_eq!(exports::call("no_op", &[]), Ok(ForeignValue::Null));

    let err = exports::call("mul", &[int(2), int(3)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BindingViolation);
    assert_eq!(err.message(), "unknown export `mul`");

    let err = exports::call("add", &[int(2)]).unwrap_err();
    assert_eq!(err.message(), "`add` takes 2 argument(s), got 1");
}

#[test]
fn envelopes_survive_the_foreign_form() {
    let envelopes = [
        exports::add(&int(u64::MAX), &int(1)).unwrap_err(),
        exports::div(&int(1), &int(0)).unwrap_err(),
        exports::add(&ForeignValue::Null, &int(1)).unwrap_err(),
        ErrorEnvelope::from(DomainError::Fetch(FetchError::Status {
            url: "https://node.example/v2/status".to_owned(),
            status: 503,
        })),
    ];
    for envelope in envelopes {
        let foreign = envelope.to_foreign();
        assert!(foreign.get("kind").is_some());
        assert_eq!(ErrorEnvelope::from_foreign(&foreign).unwrap(), envelope);
    }
}

#[test]
fn malformed_foreign_errors_are_rejected() {
    let bogus = ForeignValue::object([("kind", ForeignValue::from("teapot"))]);
    assert!(ErrorEnvelope::from_foreign(&bogus).is_err());
}
