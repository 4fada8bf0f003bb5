//! Reader view extraction.
//!
//! Fetches the linked article, pulls out the readable content, sanitizes it,
//! and memoizes by entry ID so repeat opens don't refetch the site.

use std::io::Cursor;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;

use citadel_common::{Error, Result};

const FETCH_TIMEOUT: Duration = Duration::from_secs(2);
const CACHE_CAPACITY: usize = 1024;

pub struct Reader {
    client: reqwest::Client,
    cache: Mutex<LruCache<String, String>>,
}

impl Reader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("citadel/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| Error::Internal(format!("error building reader client: {err}")))?;

        let capacity = NonZeroUsize::new(CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);

        Ok(Reader {
            client,
            cache: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Readable article content for an entry, from cache when possible.
    pub async fn readable_content(&self, entry_id: &str, link: &str) -> Result<String> {
        if let Some(content) = self.cached(entry_id) {
            return Ok(content);
        }

        let url = url::Url::parse(link)
            .map_err(|err| Error::invalid(format!("entry link is not a valid url: {err}")))?;

        let response = self
            .client
            .get(link)
            .send()
            .await
            .map_err(|err| Error::Upstream {
                status: 502,
                message: format!("error fetching article: {err}"),
            })?;
        let body = response.bytes().await.map_err(|err| Error::Upstream {
            status: 502,
            message: format!("error reading article body: {err}"),
        })?;

        let article = readability::extractor::extract(&mut Cursor::new(body.as_ref()), &url)
            .map_err(|err| Error::Internal(format!("error extracting article: {err}")))?;

        // Readability output is still HTML; scrub it before serving.
        let content = ammonia::clean(&article.content);

        self.store(entry_id, &content);
        Ok(content)
    }

    fn cached(&self, entry_id: &str) -> Option<String> {
        let mut cache = self.cache.lock().ok()?;
        cache.get(entry_id).cloned()
    }

    fn store(&self, entry_id: &str, content: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(entry_id.to_string(), content.to_string());
        }
    }
}
