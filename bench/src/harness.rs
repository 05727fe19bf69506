//! Timing loop and report formatting.

use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};

use isthmus_types::ErrorEnvelope;
use thiserror::Error;

/// Width of the name column in rendered reports.
pub const NAME_COLUMN_WIDTH: usize = 35;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("`{name}`: iteration count must be positive, got {iterations}")]
    NonPositiveIterations { name: String, iterations: i64 },
    #[error("unknown scenario `{0}`")]
    UnknownScenario(String),
    #[error("`{name}` failed during warm-up: {error}")]
    Operation { name: String, error: ErrorEnvelope },
    #[error(transparent)]
    ForeignRuntime(#[from] isthmus_engine::ForeignRuntimeError),
}

/// One measurement pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchReport {
    pub name: String,
    pub iterations: u64,
    pub total: Duration,
}

impl BenchReport {
    /// Zero for a report that counted no iterations.
    #[must_use]
    pub fn per_iteration(&self) -> Duration {
        if self.iterations == 0 {
            return Duration::ZERO;
        }
        self.total.div_f64(self.iterations as f64)
    }

    #[must_use]
    pub fn total_ms(&self) -> f64 {
        self.total.as_secs_f64() * 1_000.0
    }

    #[must_use]
    pub fn ms_per_iter(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.total_ms() / self.iterations as f64
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<width$} {} ms/iter ({} ms/{})",
            self.name,
            self.ms_per_iter(),
            self.total_ms(),
            self.iterations,
            width = NAME_COLUMN_WIDTH
        )
    }
}

fn checked_iterations(name: &str, iterations: i64) -> Result<u64, HarnessError> {
    match u64::try_from(iterations) {
        Ok(count) if count > 0 => Ok(count),
        _ => {
            tracing::warn!(name, iterations, "refusing to benchmark with non-positive iterations");
            Err(HarnessError::NonPositiveIterations {
                name: name.to_owned(),
                iterations,
            })
        }
    }
}

/// Run `operation` `iterations` times back to back and time the whole pass.
pub fn measure<F>(name: &str, iterations: i64, mut operation: F) -> Result<BenchReport, HarnessError>
where
    F: FnMut(),
{
    let count = checked_iterations(name, iterations)?;
    let started = Instant::now();
    for _ in 0..count {
        operation();
    }
    let report = BenchReport {
        name: name.to_owned(),
        iterations: count,
        total: started.elapsed(),
    };
    tracing::debug!(name, iterations = count, total_ms = report.total_ms(), "measured");
    Ok(report)
}

/// [`measure`] for async operations. Each iteration is awaited before the
/// next starts.
pub async fn measure_async<F, Fut>(
    name: &str,
    iterations: i64,
    mut operation: F,
) -> Result<BenchReport, HarnessError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let count = checked_iterations(name, iterations)?;
    let started = Instant::now();
    for _ in 0..count {
        operation().await;
    }
    let report = BenchReport {
        name: name.to_owned(),
        iterations: count,
        total: started.elapsed(),
    };
    tracing::debug!(name, iterations = count, total_ms = report.total_ms(), "measured");
    Ok(report)
}
