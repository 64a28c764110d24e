use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use reqwest::header::{CACHE_CONTROL, RETRY_AFTER};
use reqwest::{Client, StatusCode, Url};
use tokio::runtime::Runtime;
use tokio::time::sleep;

use slugscan_core::{Result, ScanError, TierLabel};

use crate::retry::{with_retry, FetchFailure, RetryPolicy};

const GVIZ_HOST: &str = "https://docs.google.com/spreadsheets/d";
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(8);

/// How the configured tabs are pulled from the shared gviz endpoint.
///
/// `Batched` is the default: the endpoint rate-limits aggressively and the tab
/// count is small, so a fixed inter-request gap costs little latency and
/// avoids most 429s. `Parallel` trades 429 risk for speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Parallel,
    Serial,
    Batched { gap: Duration },
}

impl Default for FetchMode {
    fn default() -> Self {
        FetchMode::Batched {
            gap: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SheetsClientOptions {
    pub spreadsheet_id: String,
    pub policy: RetryPolicy,
    pub mode: FetchMode,
    pub cache_ttl: Duration,
    pub attempt_timeout: Duration,
}

impl SheetsClientOptions {
    pub fn new(spreadsheet_id: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            policy: RetryPolicy::default(),
            mode: FetchMode::default(),
            cache_ttl: Duration::from_secs(120),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

/// Retry-aware text-over-HTTP fetcher with a per-attempt timeout and no
/// caching. Standalone resources (the image manifest) use it directly;
/// `SheetsClient` layers the gviz URL scheme and the tab cache on top.
pub struct TextFetcher {
    http: Client,
    policy: RetryPolicy,
}

impl TextFetcher {
    pub fn new(policy: RetryPolicy, attempt_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(attempt_timeout)
            .build()
            .map_err(|e| ScanError::Other(format!("failed to build http client: {e}")))?;
        Ok(Self { http, policy })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(RetryPolicy::default(), DEFAULT_ATTEMPT_TIMEOUT)
    }

    /// Fetch a resource with retries. `make_url` runs once per attempt so a
    /// per-attempt cache-buster stays fresh; `name` labels the resource in
    /// errors.
    pub async fn fetch_with<F>(&self, name: &str, mut make_url: F) -> Result<String>
    where
        F: FnMut() -> Url,
    {
        with_retry(&self.policy, |_| self.attempt(make_url()))
            .await
            .map_err(|failure| ScanError::Fetch {
                table: name.to_string(),
                reason: failure.reason,
            })
    }

    pub async fn fetch_url(&self, url: &str) -> Result<String> {
        let parsed =
            Url::parse(url).map_err(|e| ScanError::InvalidConfig(format!("bad url {url}: {e}")))?;
        self.fetch_with(url, || parsed.clone()).await
    }

    pub fn fetch_url_blocking(&self, url: &str) -> Result<String> {
        let rt = Runtime::new()?;
        rt.block_on(self.fetch_url(url))
    }

    async fn attempt(&self, url: Url) -> std::result::Result<String, FetchFailure> {
        let response = self
            .http
            .get(url)
            .header(CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() || err.is_connect() {
                    FetchFailure::transient(err.to_string())
                } else {
                    FetchFailure::permanent(err.to_string())
                }
            })?;
        let status = response.status();
        if status != StatusCode::OK {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FetchFailure::from_status(status.as_u16(), retry_after));
        }
        response
            .text()
            .await
            .map_err(|err| FetchFailure::transient(err.to_string()))
    }
}

struct CacheEntry {
    fetched_at: Instant,
    body: String,
}

/// Fetches published spreadsheet tabs as raw text. Owns a short-lived
/// per-table cache; index construction and parsing stay in `slugscan_core`.
pub struct SheetsClient {
    fetcher: TextFetcher,
    base_url: Url,
    mode: FetchMode,
    cache_ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl SheetsClient {
    pub fn new(options: SheetsClientOptions) -> Result<Self> {
        let fetcher = TextFetcher::new(options.policy, options.attempt_timeout)?;
        let base_url = Url::parse(&format!("{GVIZ_HOST}/{}/gviz/tq", options.spreadsheet_id))
            .map_err(|e| {
                ScanError::InvalidConfig(format!(
                    "bad spreadsheet id {:?}: {e}",
                    options.spreadsheet_id
                ))
            })?;
        Ok(Self {
            fetcher,
            base_url,
            mode: options.mode,
            cache_ttl: options.cache_ttl,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// gviz CSV export URL for one tab, with a cache-busting timestamp param.
    pub fn table_url(&self, sheet: &str) -> Url {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
            .to_string();
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("tqx", "out:csv")
            .append_pair("sheet", sheet)
            .append_pair("_t", &millis);
        url
    }

    /// Fetch one tab's raw text, via the TTL cache when fresh.
    pub async fn fetch_table(&self, sheet: &str) -> Result<String> {
        if let Some(body) = self.cached(sheet) {
            return Ok(body);
        }
        let body = self
            .fetcher
            .fetch_with(sheet, || self.table_url(sheet))
            .await?;
        self.cache.lock().insert(
            sheet.to_string(),
            CacheEntry {
                fetched_at: Instant::now(),
                body: body.clone(),
            },
        );
        Ok(body)
    }

    /// Fetch every configured tab, honoring the fetch mode. One tab's failure
    /// never discards another's result.
    pub async fn fetch_all(
        &self,
        tabs: &[(TierLabel, String)],
    ) -> Vec<(TierLabel, Result<String>)> {
        match self.mode {
            FetchMode::Parallel => {
                let futures = tabs.iter().map(|(tier, sheet)| async move {
                    (tier.clone(), self.fetch_table(sheet).await)
                });
                futures::future::join_all(futures).await
            }
            FetchMode::Serial => self.fetch_sequential(tabs, None).await,
            FetchMode::Batched { gap } => self.fetch_sequential(tabs, Some(gap)).await,
        }
    }

    /// Blocking adapter for the synchronous CLI path.
    pub fn fetch_all_blocking(
        &self,
        tabs: &[(TierLabel, String)],
    ) -> Result<Vec<(TierLabel, Result<String>)>> {
        let rt = Runtime::new()?;
        Ok(rt.block_on(self.fetch_all(tabs)))
    }

    async fn fetch_sequential(
        &self,
        tabs: &[(TierLabel, String)],
        gap: Option<Duration>,
    ) -> Vec<(TierLabel, Result<String>)> {
        let mut results = Vec::with_capacity(tabs.len());
        for (idx, (tier, sheet)) in tabs.iter().enumerate() {
            if idx > 0 {
                if let Some(gap) = gap {
                    sleep(gap).await;
                }
            }
            results.push((tier.clone(), self.fetch_table(sheet).await));
        }
        results
    }

    fn cached(&self, sheet: &str) -> Option<String> {
        let cache = self.cache.lock();
        cache
            .get(sheet)
            .filter(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
            .map(|entry| entry.body.clone())
    }

    #[cfg(test)]
    fn seed_cache(&self, sheet: &str, body: &str) {
        self.cache.lock().insert(
            sheet.to_string(),
            CacheEntry {
                fetched_at: Instant::now(),
                body: body.to_string(),
            },
        );
    }
}
