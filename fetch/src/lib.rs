//! Native HTTP fetching for Isthmus.
//!
//! [`HttpFetcher`] wraps a hardened reqwest client with a whole-request
//! deadline and [`retry`] with exponential backoff. Failures come back as
//! [`FetchError`] domain variants so they cross the boundary as declared,
//! recoverable errors. [`StatusClient`] polls a chain node's status endpoints.
//!
//! [`FetchError`]: isthmus_types::FetchError

mod fetcher;
pub mod retry;
mod status;

use std::time::Duration;

pub use fetcher::{FetchFut, FetchOptions, FetchedBody, Fetcher, HttpFetcher};
pub use retry::RetryConfig;
pub use status::{LAST_ROUND_FIELD, StatusClient, parse_last_round};

const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 32;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

fn client_builder(options: &FetchOptions) -> reqwest::ClientBuilder {
    use reqwest::header::{self, HeaderMap, HeaderValue};
    use reqwest::redirect;

    let mut default_headers = HeaderMap::new();
    default_headers.insert(
        header::USER_AGENT,
        HeaderValue::from_static(concat!("isthmus/", env!("CARGO_PKG_VERSION"))),
    );

    reqwest::Client::builder()
        .connect_timeout(options.connect_timeout)
        .redirect(redirect::Policy::none())
        .https_only(options.https_only)
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}
