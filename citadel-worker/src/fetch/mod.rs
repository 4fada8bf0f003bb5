//! Feed fetching and normalization.
//!
//! One HTTP GET, format auto-detection, and a parse into the single entry
//! shape the rest of the pipeline works with. Deterministic given identical
//! response bytes; never touches the store.

mod parse;
mod sanitize;

pub use parse::{detect_format, parse_atom, parse_rss, FeedFormat};
pub use sanitize::sanitize;

use std::time::Duration;

use citadel_common::models::{FeedDelta, NewFeedEntry};
use citadel_common::{Error, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(3);
const USER_AGENT: &str = concat!("citadel/", env!("CARGO_PKG_VERSION"));

/// Everything a single fetch yields: channel-level metadata for the feed row
/// and the normalized entries.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedFeed {
    pub delta: FeedDelta,
    pub entries: Vec<NewFeedEntry>,
}

/// HTTP client for feed fetches.
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| Error::Internal(format!("error building fetch client: {err}")))?;

        Ok(Fetcher { client })
    }

    /// Fetch `feed_url` and normalize whatever comes back, tagging every
    /// entry with `feed_id`.
    pub async fn fetch(&self, feed_id: &str, feed_url: &str) -> Result<FetchedFeed> {
        let response = self.client.get(feed_url).send().await.map_err(|err| {
            Error::Upstream {
                status: 502,
                message: format!("error getting feed url: {err}"),
            }
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::Upstream {
                status: status.as_u16(),
                message: format!("unexpected status code: {status}"),
            });
        }

        let body = response.bytes().await.map_err(|err| Error::Upstream {
            status: 502,
            message: format!("error reading response body: {err}"),
        })?;
        let body = String::from_utf8_lossy(&body);

        match detect_format(&body) {
            FeedFormat::Atom => parse_atom(feed_id, &body),
            FeedFormat::Rss => parse_rss(feed_id, &body),
        }
    }
}
