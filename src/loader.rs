//! Reference document loading with a time-bounded cache.
//!
//! Draft and Critique embed a long reference file in their prompts. Fetching
//! it on every stage call would dominate a run, so fetched text is kept for a
//! fixed window. Failures degrade to a placeholder instead of failing the
//! stage.
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a fetched document stays fresh.
pub const REFERENCE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Supplies reference text by URL. Never fails; degraded results are text too.
pub trait ReferenceSource {
    fn fetch(&self, url: &str) -> String;
}

/// Raw transport underneath the cache.
pub trait Fetch {
    fn get(&self, url: &str) -> Result<FetchResponse>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    Ok(String),
    Status(u16),
}

/// Plain HTTP GET through ureq.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetch;

impl Fetch for HttpFetch {
    fn get(&self, url: &str) -> Result<FetchResponse> {
        let mut response = match ureq::get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::StatusCode(code)) => return Ok(FetchResponse::Status(code)),
            Err(err) => return Err(err).with_context(|| format!("GET {url}")),
        };
        let text = response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("read body of {url}"))?;
        Ok(FetchResponse::Ok(text))
    }
}

/// Point GitHub `blob` page URLs at the raw file instead of the HTML viewer.
pub fn raw_github_url(url: &str) -> String {
    match url.split_once("://github.com/") {
        Some((scheme, path)) => format!(
            "{scheme}://raw.githubusercontent.com/{}",
            path.replacen("/blob/", "/", 1)
        ),
        None => url.to_string(),
    }
}

/// A cached value with its fetch time and lifetime.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < self.ttl
    }
}

/// Keyed cache whose entries expire after a fixed TTL.
///
/// The lock is held across a refetch so concurrent callers of the same key
/// never fetch twice for one expiry.
#[derive(Debug)]
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the fresh value for `key`, calling `fetch` when missing or stale.
    pub fn get_or_fetch_at(&self, key: &str, now: Instant, fetch: impl FnOnce() -> V) -> V {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = entries.get(key).filter(|entry| entry.is_fresh(now)) {
            tracing::debug!(key, "reference cache hit");
            return entry.value.clone();
        }
        tracing::debug!(key, "reference cache miss");
        let value = fetch();
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.clone(),
                fetched_at: now,
                ttl: self.ttl,
            },
        );
        value
    }

    pub fn get_or_fetch(&self, key: &str, fetch: impl FnOnce() -> V) -> V {
        self.get_or_fetch_at(key, Instant::now(), fetch)
    }
}

/// [`ReferenceSource`] that caches whatever its transport returns.
#[derive(Debug)]
pub struct CachedLoader<F = HttpFetch> {
    fetcher: F,
    cache: TtlCache<String>,
}

impl CachedLoader<HttpFetch> {
    pub fn http() -> Self {
        Self::new(HttpFetch, REFERENCE_TTL)
    }
}

impl<F: Fetch> CachedLoader<F> {
    pub fn new(fetcher: F, ttl: Duration) -> Self {
        Self {
            fetcher,
            cache: TtlCache::new(ttl),
        }
    }

    pub fn fetch_at(&self, url: &str, now: Instant) -> String {
        self.cache
            .get_or_fetch_at(url, now, || load_or_placeholder(&self.fetcher, url))
    }
}

impl<F: Fetch> ReferenceSource for CachedLoader<F> {
    fn fetch(&self, url: &str) -> String {
        self.fetch_at(url, Instant::now())
    }
}

fn load_or_placeholder<F: Fetch>(fetcher: &F, url: &str) -> String {
    let raw_url = raw_github_url(url);
    match fetcher.get(&raw_url) {
        Ok(FetchResponse::Ok(text)) => {
            tracing::info!(url = %raw_url, bytes = text.len(), "reference loaded");
            text
        }
        Ok(FetchResponse::Status(code)) => {
            tracing::warn!(url = %raw_url, code, "reference fetch returned non-success status");
            format!("Failed to load file. Status code: {code}")
        }
        Err(err) => {
            tracing::warn!(url = %raw_url, error = %format!("{err:#}"), "reference fetch failed");
            format!("Failed to load file. Error: {err:#}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Scripted {
        responses: RefCell<Vec<Result<FetchResponse>>>,
        requested: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<FetchResponse>>) -> Self {
            Self {
                responses: RefCell::new(responses),
                requested: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.requested.borrow().len()
        }
    }

    impl Fetch for Scripted {
        fn get(&self, url: &str) -> Result<FetchResponse> {
            self.requested.borrow_mut().push(url.to_string());
            self.responses.borrow_mut().remove(0)
        }
    }

    const URL: &str = "https://github.com/org/repo/blob/main/tests/test_file.py";

    #[test]
    fn blob_urls_are_rewritten_to_raw() {
        assert_eq!(
            raw_github_url(URL),
            "https://raw.githubusercontent.com/org/repo/main/tests/test_file.py"
        );
        let raw = "https://raw.githubusercontent.com/org/repo/main/x.py";
        assert_eq!(raw_github_url(raw), raw);
    }

    #[test]
    fn repeat_fetches_within_window_hit_cache() {
        let loader = CachedLoader::new(
            Scripted::new(vec![Ok(FetchResponse::Ok("body".to_string()))]),
            REFERENCE_TTL,
        );
        let start = Instant::now();
        assert_eq!(loader.fetch_at(URL, start), "body");
        assert_eq!(loader.fetch_at(URL, start + Duration::from_secs(3600)), "body");
        assert_eq!(loader.fetcher.calls(), 1);
        assert!(loader.fetcher.requested.borrow()[0].starts_with("https://raw.githubusercontent.com/"));
    }

    #[test]
    fn expired_entries_are_refetched() {
        let loader = CachedLoader::new(
            Scripted::new(vec![
                Ok(FetchResponse::Ok("old".to_string())),
                Ok(FetchResponse::Ok("new".to_string())),
            ]),
            REFERENCE_TTL,
        );
        let start = Instant::now();
        assert_eq!(loader.fetch_at(URL, start), "old");
        assert_eq!(loader.fetch_at(URL, start + REFERENCE_TTL), "new");
        assert_eq!(loader.fetcher.calls(), 2);
    }

    #[test]
    fn failures_degrade_to_placeholder_text() {
        let loader = CachedLoader::new(
            Scripted::new(vec![
                Ok(FetchResponse::Status(404)),
                Err(anyhow::anyhow!("connection refused")),
            ]),
            REFERENCE_TTL,
        );
        let start = Instant::now();
        assert_eq!(
            loader.fetch_at(URL, start),
            "Failed to load file. Status code: 404"
        );
        let other = "https://example.com/ref.txt";
        let degraded = loader.fetch_at(other, start);
        assert!(degraded.contains("connection refused"), "{degraded}");
    }

    #[test]
    fn distinct_urls_are_cached_separately() {
        let loader = CachedLoader::new(
            Scripted::new(vec![
                Ok(FetchResponse::Ok("a".to_string())),
                Ok(FetchResponse::Ok("b".to_string())),
            ]),
            REFERENCE_TTL,
        );
        let now = Instant::now();
        assert_eq!(loader.fetch_at("https://example.com/a", now), "a");
        assert_eq!(loader.fetch_at("https://example.com/b", now), "b");
        assert_eq!(loader.fetch_at("https://example.com/a", now), "a");
        assert_eq!(loader.fetcher.calls(), 2);
    }
}
