//! Isthmus CLI - demo and benchmark driver.
//!
//! ```text
//! isthmus [demo|bench|all]
//! ```
//!
//! `demo` walks every boundary path once and prints what crossed it; `bench`
//! runs the paired benchmark suite. Results go to stdout, logs to stderr.

mod demo;

use std::{env, io};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use isthmus_bench::{BenchSettings, run_suite};
use isthmus_config::IsthmusConfig;
use isthmus_engine::ForeignRuntimeConfig;
use isthmus_fetch::{FetchOptions, Fetcher, HttpFetcher, RetryConfig, StatusClient};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Demo,
    Bench,
    All,
}

impl Mode {
    fn from_args() -> Result<Self> {
        let arg = env::args().nth(1).map(|arg| arg.to_ascii_lowercase());
        match arg.as_deref() {
            None | Some("demo") => Ok(Mode::Demo),
            Some("bench") => Ok(Mode::Bench),
            Some("all") => Ok(Mode::All),
            Some(other) => bail!("unknown mode `{other}`; usage: isthmus [demo|bench|all]"),
        }
    }
}

fn fetch_options(config: &IsthmusConfig) -> FetchOptions {
    FetchOptions {
        request_timeout: config.request_timeout(),
        connect_timeout: config.connect_timeout(),
        https_only: config.https_only(),
        retry: RetryConfig {
            max_retries: config.max_retries(),
            ..RetryConfig::default()
        },
    }
}

fn foreign_config(config: &IsthmusConfig) -> ForeignRuntimeConfig {
    ForeignRuntimeConfig {
        thread_name: config.foreign_thread_name(),
        default_call_timeout: config.foreign_call_timeout(),
        cancel_grace: config.cancel_grace(),
    }
}

fn bench_settings(config: &IsthmusConfig) -> BenchSettings {
    let mut settings = BenchSettings::with_iterations(config.bench_iterations());
    settings.scenarios = config.bench_scenarios().map(<[String]>::to_vec);
    settings.foreign = foreign_config(config);
    settings
}

async fn run_bench(config: &IsthmusConfig) -> Result<()> {
    let reports = run_suite(&bench_settings(config))
        .await
        .context("benchmark suite failed")?;
    for report in reports {
        println!("{report}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mode = Mode::from_args()?;
    let config = match IsthmusConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            tracing::warn!(path = %err.path().display(), "{err}; using defaults");
            IsthmusConfig::default()
        }
    };

    if matches!(mode, Mode::Demo | Mode::All) {
        let fetcher: Arc<dyn Fetcher> = Arc::new(
            HttpFetcher::new(fetch_options(&config)).context("failed to build HTTP client")?,
        );
        let status = StatusClient::new(Arc::clone(&fetcher), &config.status_base_url())
            .context("invalid status base URL")?;
        let ctx = demo::DemoContext {
            fetcher,
            status,
            foreign: foreign_config(&config),
            policy: config.gather_policy(),
        };
        demo::run(&ctx).await?;
    }

    if matches!(mode, Mode::Bench | Mode::All) {
        run_bench(&config).await?;
    }

    Ok(())
}
