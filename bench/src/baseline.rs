//! Same-runtime baselines: the foreign side doing the work itself, on
//! [`ForeignValue`]s, without crossing the boundary.

use std::collections::BTreeMap;

use isthmus_types::ForeignValue;

/// A favorite-numbers collection kept entirely in foreign values.
#[derive(Debug, Default, Clone)]
pub struct ForeignNumbers {
    numbers: Vec<ForeignValue>,
}

impl ForeignNumbers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_number(&mut self, number: ForeignValue) {
        self.numbers.push(number);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    /// Smallest integer, or `Null` when there is none.
    #[must_use]
    pub fn find_min(&self) -> ForeignValue {
        self.numbers
            .iter()
            .filter_map(ForeignValue::as_int)
            .min()
            .map_or(ForeignValue::Null, ForeignValue::Int)
    }

    #[must_use]
    pub fn quick_sort(&self, numbers: Option<&[ForeignValue]>) -> Vec<ForeignValue> {
        let ints: Vec<i128> = numbers
            .unwrap_or(&self.numbers)
            .iter()
            .filter_map(ForeignValue::as_int)
            .collect();
        filter_sort(ints).into_iter().map(ForeignValue::Int).collect()
    }
}

/// Pivot on the last element, filter into two fresh lists, recurse.
fn filter_sort(mut numbers: Vec<i128>) -> Vec<i128> {
    let Some(pivot) = numbers.pop() else {
        return numbers;
    };
    let less: Vec<i128> = numbers.iter().copied().filter(|&n| n <= pivot).collect();
    let greater: Vec<i128> = numbers.into_iter().filter(|&n| n > pivot).collect();
    let mut sorted = filter_sort(less);
    sorted.push(pivot);
    sorted.extend(filter_sort(greater));
    sorted
}

pub fn foreign_no_op() -> ForeignValue {
    ForeignValue::Null
}

/// Field-by-field copy of a record-shaped object, the foreign analogue of a
/// conversion.
#[must_use]
pub fn copy_record(value: &ForeignValue) -> ForeignValue {
    match value {
        ForeignValue::Object(fields) => ForeignValue::Object(
            fields
                .iter()
                .map(|(key, field)| (key.clone(), copy_record(field)))
                .collect::<BTreeMap<_, _>>(),
        ),
        ForeignValue::List(items) => ForeignValue::List(items.iter().map(copy_record).collect()),
        other => other.clone(),
    }
}
