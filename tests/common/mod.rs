//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use isthmus_engine::{FnCapability, ForeignCapability, ForeignRuntime, ForeignRuntimeConfig, NativeOps};
use isthmus_fetch::{FetchOptions, Fetcher, HttpFetcher, RetryConfig, StatusClient};
use isthmus_types::ForeignValue;
use tokio::task;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Start a mock server that simulates the node status API
pub async fn start_status_mock() -> MockServer {
    MockServer::start().await
}

/// Mount `GET /v2/status` reporting `round`
pub async fn mount_status(server: &MockServer, round: u64) {
    Mock::given(method("GET"))
        .and(path("/v2/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "last-round": round })),
        )
        .mount(server)
        .await;
}

/// Mount `GET /v2/status/wait-for-block-after/{round}`, answering after `delay`
pub async fn mount_wait_for_block(server: &MockServer, round: u64, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(format!("/v2/status/wait-for-block-after/{round}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "last-round": round + 1 }))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// Plain-HTTP options with no retries, so failures surface on the first attempt
pub fn test_fetch_options(request_timeout: Duration) -> FetchOptions {
    FetchOptions {
        request_timeout,
        https_only: false,
        retry: RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        },
        ..FetchOptions::default()
    }
}

pub fn native_ops(server: &MockServer, request_timeout: Duration) -> NativeOps {
    let fetcher: Arc<dyn Fetcher> =
        Arc::new(HttpFetcher::new(test_fetch_options(request_timeout)).unwrap());
    let status = StatusClient::new(Arc::clone(&fetcher), &server.uri()).unwrap();
    NativeOps::new(fetcher, status)
}

pub fn foreign_runtime() -> ForeignRuntime {
    ForeignRuntime::start(ForeignRuntimeConfig::default()).unwrap()
}

/// Foreign `add` that yields to its own loop before answering
pub fn async_add() -> impl ForeignCapability {
    FnCapability::new("add", |args: Vec<ForeignValue>, _ctx| async move {
        task::yield_now().await;
        let a = args.first().and_then(ForeignValue::as_int).unwrap_or(0);
        let b = args.get(1).and_then(ForeignValue::as_int).unwrap_or(0);
        Ok(ForeignValue::Int(a + b))
    })
}
