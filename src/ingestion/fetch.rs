use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use governor::clock::Clock;
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use super::parse;
use super::types::ParsedFeed;

const USER_AGENT: &str = concat!("rss-importer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http { url: String, #[source] source: reqwest::Error },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("could not parse feed at {url}: {reason}")]
    Parse { url: String, reason: String },
}

/// Raw byte retrieval; the HTTP client in production, a stub in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Bytes, FetchError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Bytes, FetchError> {
        let http = |source| FetchError::Http { url: url.to_string(), source };
        let resp = self.client.get(url).send().await.map_err(http)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }
        resp.bytes().await.map_err(http)
    }
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub cache_ttl: Duration,
    pub min_interval: Duration,
    pub prune_every: Duration,
    pub max_entries: usize,
    pub request_timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(5 * 60),
            min_interval: Duration::from_secs(30),
            prune_every: Duration::from_secs(10 * 60),
            max_entries: 50,
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Reads tokio's clock so a paused test runtime also pauses rate limiting.
#[derive(Debug, Clone, Copy, Default)]
struct TokioClock;

impl Clock for TokioClock {
    type Instant = std::time::Instant;
    fn now(&self) -> Self::Instant { Instant::now().into_std() }
}

type UrlLimiter = RateLimiter<String, DashMapStateStore<String>, TokioClock, NoOpMiddleware<std::time::Instant>>;

struct CacheEntry {
    feed: Arc<ParsedFeed>,
    stored_at: Instant,
}

/// Feed retrieval with a per-URL response cache and a per-URL request interval.
///
/// Constructed once per process and shared by handle; the cache and
/// rate-limit state live only as long as the fetcher.
pub struct FeedFetcher {
    transport: Arc<dyn Transport>,
    cfg: FetcherConfig,
    cache: Mutex<HashMap<String, CacheEntry>>,
    /// One cell per `min_interval` for each URL; `None` when the interval is zero.
    limiter: Option<UrlLimiter>,
}

impl FeedFetcher {
    pub fn new(transport: Arc<dyn Transport>, cfg: FetcherConfig) -> Self {
        let limiter = Quota::with_period(cfg.min_interval).map(|q| RateLimiter::dashmap_with_clock(q, TokioClock));
        Self { transport, cfg, cache: Mutex::new(HashMap::new()), limiter }
    }

    pub fn http(cfg: FetcherConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(cfg.request_timeout)?;
        Ok(Self::new(Arc::new(transport), cfg))
    }

    pub async fn fetch(&self, url: &str) -> Result<Arc<ParsedFeed>, FetchError> {
        if let Some(feed) = self.fresh_cached(url).await {
            tracing::debug!(url, "feed cache hit");
            return Ok(feed);
        }

        self.wait_for_slot(url).await;
        // a concurrent caller may have refreshed the entry while we waited
        if let Some(feed) = self.fresh_cached(url).await {
            return Ok(feed);
        }

        match self.fetch_uncached(url).await {
            Ok(feed) => {
                let feed = Arc::new(feed);
                let mut cache = self.cache.lock().await;
                cache.insert(url.to_string(), CacheEntry { feed: feed.clone(), stored_at: Instant::now() });
                Ok(feed)
            }
            Err(e) => {
                let cache = self.cache.lock().await;
                match cache.get(url) {
                    Some(entry) => {
                        tracing::warn!(url, error = %e, "fetch failed; serving stale cached feed");
                        Ok(entry.feed.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }

    async fn fetch_uncached(&self, url: &str) -> Result<ParsedFeed, FetchError> {
        let bytes = self.transport.get(url).await?;
        parse::parse_feed(&bytes).map_err(|reason| FetchError::Parse { url: url.to_string(), reason })
    }

    async fn fresh_cached(&self, url: &str) -> Option<Arc<ParsedFeed>> {
        let cache = self.cache.lock().await;
        cache
            .get(url)
            .filter(|e| e.stored_at.elapsed() < self.cfg.cache_ttl)
            .map(|e| e.feed.clone())
    }

    /// Sleep until `url` has a free request slot.
    async fn wait_for_slot(&self, url: &str) {
        let Some(limiter) = &self.limiter else { return };
        let key = url.to_string();
        while let Err(not_until) = limiter.check_key(&key) {
            let wait = not_until.wait_time_from(TokioClock.now());
            tracing::debug!(url, wait_ms = wait.as_millis() as u64, "rate limited; waiting");
            sleep(wait).await;
        }
    }

    /// Drop expired entries, then the oldest ones beyond `max_entries`.
    pub async fn prune(&self) -> usize {
        let mut cache = self.cache.lock().await;
        let before = cache.len();
        let ttl = self.cfg.cache_ttl;
        cache.retain(|_, e| e.stored_at.elapsed() < ttl);

        if cache.len() > self.cfg.max_entries {
            let mut by_age: Vec<(String, Instant)> = cache.iter().map(|(k, e)| (k.clone(), e.stored_at)).collect();
            by_age.sort_by_key(|(_, t)| *t);
            let excess = cache.len() - self.cfg.max_entries;
            for (k, _) in by_age.into_iter().take(excess) { cache.remove(&k); }
        }

        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
        }

        before - cache.len()
    }

    #[cfg(test)]
    pub async fn cached_len(&self) -> usize { self.cache.lock().await.len() }

    pub fn spawn_pruner(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let fetcher = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(fetcher.cfg.prune_every);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = fetcher.prune().await;
                        if evicted > 0 { tracing::debug!(evicted, "pruned feed cache"); }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;

    /// Serves canned bodies per URL; unknown or failing URLs error.
    #[derive(Default)]
    pub struct StubTransport {
        bodies: Mutex<HashMap<String, String>>,
        pub calls: AtomicUsize,
    }

    impl StubTransport {
        pub fn with(url: &str, body: &str) -> Self {
            let t = Self::default();
            t.set(url, body);
            t
        }

        pub fn set(&self, url: &str, body: &str) {
            self.bodies.lock().unwrap().insert(url.to_string(), body.to_string());
        }

        pub fn fail(&self, url: &str) {
            self.bodies.lock().unwrap().remove(url);
        }

        pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn get(&self, url: &str) -> Result<Bytes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.bodies.lock().unwrap().get(url) {
                Some(body) => Ok(Bytes::from(body.clone())),
                None => Err(FetchError::Status { url: url.to_string(), status: 503 }),
            }
        }
    }

    pub fn rss(items: &[(&str, &str, &str)]) -> String {
        let mut out = String::from(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Stub</title><link>https://stub.example</link><description>stub</description>"#);
        for (title, link, desc) in items {
            out.push_str(&format!(
                "<item><title>{}</title><link>{}</link><description><![CDATA[{}]]></description></item>",
                title, link, desc
            ));
        }
        out.push_str("</channel></rss>");
        out
    }
}
