//! Chain status polling on top of a [`Fetcher`].

use std::sync::Arc;

use isthmus_types::FetchError;
use url::Url;

use crate::fetcher::Fetcher;

pub const LAST_ROUND_FIELD: &str = "last-round";

/// Builds status URLs against one base and parses the round out of the body.
#[derive(Clone)]
pub struct StatusClient {
    fetcher: Arc<dyn Fetcher>,
    base: Url,
}

impl StatusClient {
    pub fn new(fetcher: Arc<dyn Fetcher>, base_url: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base_url)?;
        // Trailing slash so `join` appends instead of replacing the last segment.
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }
        Ok(Self { fetcher, base })
    }

    #[must_use]
    pub fn status_url(&self) -> String {
        self.join("v2/status")
    }

    #[must_use]
    pub fn wait_for_block_after_url(&self, round: u64) -> String {
        self.join(&format!("v2/status/wait-for-block-after/{round}"))
    }

    pub async fn last_round(&self) -> Result<u64, FetchError> {
        let url = self.status_url();
        self.fetch_round(&url).await
    }

    /// Resolves once the node has seen a block after `round`; returns the new
    /// last round.
    pub async fn wait_for_block_after(&self, round: u64) -> Result<u64, FetchError> {
        let url = self.wait_for_block_after_url(round);
        self.fetch_round(&url).await
    }

    async fn fetch_round(&self, url: &str) -> Result<u64, FetchError> {
        let fetched = self.fetcher.fetch(url).await?;
        parse_last_round(url, &fetched.body)
    }

    fn join(&self, path: &str) -> String {
        // Both inputs are fixed relative paths; a join failure would mean a
        // broken base, which `new` already rejected.
        self.base
            .join(path)
            .map_or_else(|_| format!("{}{path}", self.base), String::from)
    }
}

pub fn parse_last_round(url: &str, body: &str) -> Result<u64, FetchError> {
    let malformed = |message: String| FetchError::Malformed {
        url: url.to_owned(),
        message,
    };
    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
    json.get(LAST_ROUND_FIELD)
        .ok_or_else(|| malformed(format!("missing `{LAST_ROUND_FIELD}`")))?
        .as_u64()
        .ok_or_else(|| malformed(format!("`{LAST_ROUND_FIELD}` is not an unsigned integer")))
}
