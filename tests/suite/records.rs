//! Record marshaling and the serialized form

use isthmus_bench::random_record;
use isthmus_core::{codec, deserialize, marshal, serialize, to_foreign, to_native};
use isthmus_types::{ErrorKind, ForeignValue, UserRecord};

fn sample_records() -> Vec<UserRecord> {
    let mut records = vec![
        UserRecord::default(),
        UserRecord::new(u64::MAX, vec![0, u64::MAX], vec![String::new(), "紫".to_owned()]),
    ];
    records.extend((0..50).map(random_record));
    records
}

#[test]
fn foreign_round_trip_is_identity() {
    for record in sample_records() {
        assert_eq!(to_native(&to_foreign(&record)).unwrap(), record);
    }
}

#[test]
fn serialized_round_trip_is_identity() {
    for record in sample_records() {
        assert_eq!(deserialize(&serialize(&record).unwrap()).unwrap(), record);
    }
}

#[test]
fn foreign_form_uses_field_names() {
    let record = UserRecord::new(7, vec![3, 1], vec!["teal".to_owned()]);
    let foreign = to_foreign(&record);
    assert_eq!(foreign.get(marshal::ID_FIELD), Some(&ForeignValue::from(7_u64)));
    assert_eq!(
        foreign.get(marshal::FAVORITE_NUMBERS_FIELD),
        Some(&ForeignValue::List(vec![
            ForeignValue::from(3_u64),
            ForeignValue::from(1_u64)
        ]))
    );
    assert_eq!(
        foreign.get(marshal::FAVORITE_COLORS_FIELD),
        Some(&ForeignValue::List(vec![ForeignValue::from("teal")]))
    );
}

#[test]
fn bad_foreign_records_are_binding_violations() {
    let good = to_foreign(&UserRecord::new(1, vec![2], vec!["red".to_owned()]));
    let ForeignValue::Object(fields) = good else {
        panic!("records marshal to objects");
    };

    let mut negative = fields.clone();
    negative.insert(
        marshal::FAVORITE_NUMBERS_FIELD.to_owned(),
        ForeignValue::List(vec![ForeignValue::Int(-4)]),
    );
    let mut missing = fields.clone();
    missing.remove(marshal::ID_FIELD);
    let mut wrong_type = fields;
    wrong_type.insert(
        marshal::FAVORITE_COLORS_FIELD.to_owned(),
        ForeignValue::from("red"),
    );

    for bad in [negative, missing, wrong_type] {
        let err = to_native(&ForeignValue::Object(bad)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BindingViolation);
    }
    let err = to_native(&ForeignValue::List(Vec::new())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BindingViolation);
}

#[test]
fn corrupt_bytes_are_binding_violations() {
    let bytes = serialize(&UserRecord::new(1, vec![2, 3], vec!["navy".to_owned()])).unwrap();

    let mut bad_magic = bytes.clone();
    bad_magic[0] = b'X';
    let truncated = &bytes[..bytes.len() - 1];
    let mut trailing = bytes.clone();
    trailing.push(0);
    let mut bad_version = bytes.clone();
    bad_version[4] = codec::FORMAT_VERSION + 1;

    for bad in [&bad_magic[..], truncated, &trailing[..], &bad_version[..], &[][..]] {
        let err = deserialize(bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BindingViolation);
        assert!(err.message().starts_with("cannot deserialize record"));
    }
}

#[test]
fn serialized_form_starts_with_header() {
    let bytes = serialize(&UserRecord::default()).unwrap();
    assert_eq!(&bytes[..4], &codec::RECORD_MAGIC);
    assert_eq!(bytes[4], codec::FORMAT_VERSION);
    assert_eq!(bytes[5], 3);
}
