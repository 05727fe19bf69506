//! Paired scenarios: each runs once as a same-runtime baseline and once across
//! the boundary, so the difference is the cost of crossing.

use std::hint::black_box;
use std::sync::Arc;

use isthmus_core::{NumbersArena, codec, exports, marshal};
use isthmus_engine::{
    CapabilityHandle, FnCapability, ForeignRuntime, ForeignRuntimeConfig, add_via_foreign,
};
use isthmus_types::{BoundaryResult, CollectionHandle, ErrorEnvelope, ForeignValue, UserRecord};
use tokio::task;

use crate::baseline::{ForeignNumbers, copy_record, foreign_no_op};
use crate::harness::{BenchReport, HarnessError, measure, measure_async};

pub const DEFAULT_ITERATIONS: i64 = 10_000;
/// Record and sort scenarios run this many times fewer iterations.
pub const BULK_DIVISOR: i64 = 50;
/// Numbers preloaded before the scan and sort scenarios.
pub const SAMPLE_SIZE: usize = 1_000;
pub const RECORD_NUMBERS: usize = 100;
pub const RECORD_COLORS: usize = 5;

pub const COLORS: [&str; 15] = [
    "red", "blue", "green", "yellow", "purple", "orange", "pink", "brown", "gray", "black",
    "white", "teal", "navy", "maroon", "violet",
];

pub const SCENARIOS: &[&str] = &[
    "no_op",
    "push",
    "find_min",
    "quick_sort",
    "record_to_native",
    "record_to_foreign",
    "serialize",
    "deserialize",
    "foreign_add",
];

#[derive(Debug, Clone)]
pub struct BenchSettings {
    pub iterations: i64,
    pub bulk_iterations: i64,
    /// Scenario names to run; all of [`SCENARIOS`] when `None`.
    pub scenarios: Option<Vec<String>>,
    pub foreign: ForeignRuntimeConfig,
}

impl BenchSettings {
    /// Settings for `iterations` light calls. Bulk scenarios get a fraction of
    /// that; a non-positive count is passed through so the harness flags it.
    #[must_use]
    pub fn with_iterations(iterations: i64) -> Self {
        let bulk_iterations = if iterations > 0 {
            (iterations / BULK_DIVISOR).max(1)
        } else {
            iterations
        };
        Self {
            iterations,
            bulk_iterations,
            scenarios: None,
            foreign: ForeignRuntimeConfig::default(),
        }
    }

    fn selected(&self) -> Result<Vec<&str>, HarnessError> {
        let Some(names) = &self.scenarios else {
            return Ok(SCENARIOS.to_vec());
        };
        names
            .iter()
            .map(|name| {
                SCENARIOS
                    .iter()
                    .copied()
                    .find(|known| *known == name.as_str())
                    .ok_or_else(|| HarnessError::UnknownScenario(name.clone()))
            })
            .collect()
    }
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self::with_iterations(DEFAULT_ITERATIONS)
    }
}

#[must_use]
pub fn random_number() -> u64 {
    rand::random::<u64>() % 1_000_000
}

/// A record with random favorites, shaped like the ones the suite converts.
#[must_use]
pub fn random_record(id: u64) -> UserRecord {
    let favorite_numbers = (0..RECORD_NUMBERS).map(|_| random_number()).collect();
    let favorite_colors = (0..RECORD_COLORS)
        .map(|_| COLORS[(rand::random::<u64>() % COLORS.len() as u64) as usize].to_owned())
        .collect();
    UserRecord::new(id, favorite_numbers, favorite_colors)
}

/// Fail fast if a bridged operation errors before it is timed.
fn warm_up<T>(name: &str, result: BoundaryResult<T>) -> Result<T, HarnessError> {
    result.map_err(|error| HarnessError::Operation {
        name: name.to_owned(),
        error,
    })
}

fn pair(scenario: &str) -> (String, String) {
    (format!("{scenario} (foreign)"), format!("{scenario} (bridged)"))
}

/// Run the selected scenarios and return their reports in order, baseline
/// first within each pair.
pub async fn run_suite(settings: &BenchSettings) -> Result<Vec<BenchReport>, HarnessError> {
    let selected = settings.selected()?;
    tracing::info!(
        scenarios = selected.len(),
        iterations = settings.iterations,
        bulk_iterations = settings.bulk_iterations,
        "running benchmark suite"
    );
    let mut reports = Vec::with_capacity(selected.len() * 2);
    for scenario in selected {
        let (baseline, bridged) = match scenario {
            "no_op" => no_op(settings)?,
            "push" => push(settings)?,
            "find_min" => find_min(settings)?,
            "quick_sort" => quick_sort(settings)?,
            "record_to_native" => record_to_native(settings)?,
            "record_to_foreign" => record_to_foreign(settings)?,
            "serialize" => serialize(settings)?,
            "deserialize" => deserialize(settings)?,
            "foreign_add" => foreign_add(settings).await?,
            other => return Err(HarnessError::UnknownScenario(other.to_owned())),
        };
        reports.push(baseline);
        reports.push(bridged);
    }
    Ok(reports)
}

type Pair = (BenchReport, BenchReport);

fn no_op(settings: &BenchSettings) -> Result<Pair, HarnessError> {
    let (baseline, bridged) = pair("no_op");
    warm_up(&bridged, exports::no_op())?;
    Ok((
        measure(&baseline, settings.iterations, || {
            black_box(foreign_no_op());
        })?,
        measure(&bridged, settings.iterations, || {
            black_box(exports::no_op()).ok();
        })?,
    ))
}

fn push(settings: &BenchSettings) -> Result<Pair, HarnessError> {
    let (baseline, bridged) = pair("push");
    let mut foreign = ForeignNumbers::new();
    let arena = NumbersArena::new();
    let handle = arena.create();
    warm_up(&bridged, arena.add_number(handle, &ForeignValue::from(random_number())))?;

    let baseline = measure(&baseline, settings.iterations, || {
        foreign.add_number(ForeignValue::from(random_number()));
    })?;
    let bridged = measure(&bridged, settings.iterations, || {
        black_box(arena.add_number(handle, &ForeignValue::from(random_number()))).ok();
    })?;
    Ok((baseline, bridged))
}

fn loaded(arena: &NumbersArena) -> Result<(ForeignNumbers, CollectionHandle), HarnessError> {
    let mut foreign = ForeignNumbers::new();
    let handle = arena.create();
    for _ in 0..SAMPLE_SIZE {
        let number = ForeignValue::from(random_number());
        warm_up("preload", arena.add_number(handle, &number))?;
        foreign.add_number(number);
    }
    Ok((foreign, handle))
}

fn find_min(settings: &BenchSettings) -> Result<Pair, HarnessError> {
    let (baseline, bridged) = pair("find_min");
    let arena = NumbersArena::new();
    let (foreign, handle) = loaded(&arena)?;
    warm_up(&bridged, arena.find_min(handle))?;
    Ok((
        measure(&baseline, settings.iterations, || {
            black_box(foreign.find_min());
        })?,
        measure(&bridged, settings.iterations, || {
            black_box(arena.find_min(handle)).ok();
        })?,
    ))
}

fn quick_sort(settings: &BenchSettings) -> Result<Pair, HarnessError> {
    let (baseline, bridged) = pair("quick_sort");
    let arena = NumbersArena::new();
    let (foreign, handle) = loaded(&arena)?;
    warm_up(&bridged, arena.quick_sort(handle, None))?;
    Ok((
        measure(&baseline, settings.bulk_iterations, || {
            black_box(foreign.quick_sort(None));
        })?,
        measure(&bridged, settings.bulk_iterations, || {
            black_box(arena.quick_sort(handle, None)).ok();
        })?,
    ))
}

fn record_to_native(settings: &BenchSettings) -> Result<Pair, HarnessError> {
    let (baseline, bridged) = pair("record_to_native");
    let object = marshal::to_foreign(&random_record(1));
    warm_up(&bridged, marshal::to_native(&object))?;
    Ok((
        measure(&baseline, settings.bulk_iterations, || {
            black_box(copy_record(&object));
        })?,
        measure(&bridged, settings.bulk_iterations, || {
            black_box(marshal::to_native(&object)).ok();
        })?,
    ))
}

fn record_to_foreign(settings: &BenchSettings) -> Result<Pair, HarnessError> {
    let (baseline, bridged) = pair("record_to_foreign");
    let record = random_record(2);
    let object = marshal::to_foreign(&record);
    Ok((
        measure(&baseline, settings.bulk_iterations, || {
            black_box(copy_record(&object));
        })?,
        measure(&bridged, settings.bulk_iterations, || {
            black_box(marshal::to_foreign(&record));
        })?,
    ))
}

fn serialize(settings: &BenchSettings) -> Result<Pair, HarnessError> {
    let (baseline, bridged) = pair("serialize");
    let record = random_record(3);
    let json = marshal::to_foreign(&record).to_json();
    warm_up(&bridged, codec::serialize(&record))?;
    Ok((
        measure(&baseline, settings.bulk_iterations, || {
            black_box(serde_json::to_vec(&json)).ok();
        })?,
        measure(&bridged, settings.bulk_iterations, || {
            black_box(codec::serialize(&record)).ok();
        })?,
    ))
}

fn deserialize(settings: &BenchSettings) -> Result<Pair, HarnessError> {
    let (baseline, bridged) = pair("deserialize");
    let record = random_record(4);
    let bytes = warm_up(&bridged, codec::serialize(&record))?;
    let json_bytes = serde_json::to_vec(&marshal::to_foreign(&record).to_json()).map_err(|e| {
        HarnessError::Operation {
            name: baseline.clone(),
            error: ErrorEnvelope::internal(e.to_string()),
        }
    })?;
    warm_up(&bridged, codec::deserialize(&bytes))?;
    Ok((
        measure(&baseline, settings.bulk_iterations, || {
            if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&json_bytes) {
                black_box(ForeignValue::from_json(&value));
            }
        })?,
        measure(&bridged, settings.bulk_iterations, || {
            black_box(codec::deserialize(&bytes)).ok();
        })?,
    ))
}

fn foreign_sum(args: &[ForeignValue]) -> ForeignValue {
    let a = args.first().and_then(ForeignValue::as_int).unwrap_or(0);
    let b = args.get(1).and_then(ForeignValue::as_int).unwrap_or(0);
    ForeignValue::Int(a + b)
}

fn register_add(runtime: &ForeignRuntime) -> CapabilityHandle {
    runtime.register(FnCapability::new(
        "add",
        |args: Vec<ForeignValue>, _ctx| async move {
            task::yield_now().await;
            Ok(foreign_sum(&args))
        },
    ))
}

async fn foreign_add(settings: &BenchSettings) -> Result<Pair, HarnessError> {
    let (baseline, bridged) = pair("foreign_add");
    let runtime = ForeignRuntime::start(settings.foreign.clone())?;
    let add = Arc::new(register_add(&runtime));
    let args = [ForeignValue::from(2_u64), ForeignValue::from(3_u64)];
    warm_up(&bridged, add_via_foreign(&add, 2, 3).await)?;

    let baseline = measure_async(&baseline, settings.bulk_iterations, || {
        let args = args.clone();
        async move {
            task::yield_now().await;
            black_box(foreign_sum(&args));
        }
    })
    .await?;
    let bridged = measure_async(&bridged, settings.bulk_iterations, || {
        let add = Arc::clone(&add);
        async move {
            black_box(add_via_foreign(&add, 2, 3).await).ok();
        }
    })
    .await?;
    drop(add);
    runtime.shutdown_async().await;
    Ok((baseline, bridged))
}
