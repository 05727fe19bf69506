//! The native fetch interface and its reqwest-backed implementation.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use isthmus_types::FetchError;
use tokio::time;

use crate::retry::{RetryConfig, RetryOutcome, send_with_retry};

pub type FetchFut<'a> = Pin<Box<dyn Future<Output = Result<FetchedBody, FetchError>> + Send + 'a>>;

/// A successful response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Anything that can GET a URL and hand back its body.
///
/// Dropping the returned future abandons the request.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFut<'a>;
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Deadline for one whole fetch, retries and body read included.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Reject plain-http URLs. Tests against a local mock server turn this off.
    pub https_only: bool,
    pub retry: RetryConfig,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            https_only: true,
            retry: RetryConfig::default(),
        }
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    options: FetchOptions,
}

impl HttpFetcher {
    pub fn new(options: FetchOptions) -> Result<Self, reqwest::Error> {
        let client = crate::client_builder(&options).build()?;
        Ok(Self { client, options })
    }

    #[must_use]
    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    async fn fetch_once(&self, url: &str) -> Result<FetchedBody, FetchError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| FetchError::Transport {
            url: url.to_owned(),
            message: format!("invalid url: {e}"),
        })?;
        if self.options.https_only && parsed.scheme() != "https" {
            return Err(FetchError::Transport {
                url: url.to_owned(),
                message: format!("scheme `{}` refused; https only", parsed.scheme()),
            });
        }

        let outcome = send_with_retry(|| self.client.get(parsed.clone()), &self.options.retry).await;
        let response = match outcome {
            RetryOutcome::Success(response) => response,
            RetryOutcome::HttpError(response) => {
                return Err(FetchError::Status {
                    url: url.to_owned(),
                    status: response.status().as_u16(),
                });
            }
            RetryOutcome::ConnectionError { attempts, source } => {
                return Err(FetchError::Transport {
                    url: url.to_owned(),
                    message: format!("{source} (after {attempts} attempts)"),
                });
            }
            RetryOutcome::NonRetryable(source) => {
                return Err(FetchError::Transport {
                    url: url.to_owned(),
                    message: source.to_string(),
                });
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| FetchError::Malformed {
            url: url.to_owned(),
            message: format!("unreadable body: {e}"),
        })?;
        Ok(FetchedBody {
            url: url.to_owned(),
            status,
            body,
        })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFut<'a> {
        Box::pin(async move {
            let started = Instant::now();
            tracing::debug!(url, "fetch start");
            let result =
                match time::timeout(self.options.request_timeout, self.fetch_once(url)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout {
                        url: url.to_owned(),
                        after_ms: started.elapsed().as_millis() as u64,
                    }),
                };
            match &result {
                Ok(body) => tracing::debug!(url, status = body.status, "fetch done"),
                Err(error) => tracing::debug!(url, %error, "fetch failed"),
            }
            result
        })
    }
}
