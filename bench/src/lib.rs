//! Benchmark harness for boundary dispatch.
//!
//! [`measure`] times a tight sequential loop; [`run_suite`] runs every paired
//! scenario, a same-runtime baseline next to its boundary-crossing twin.

pub mod baseline;
pub mod harness;
pub mod suite;

pub use harness::{BenchReport, HarnessError, NAME_COLUMN_WIDTH, measure, measure_async};
pub use suite::{BenchSettings, SCENARIOS, random_record, run_suite};
