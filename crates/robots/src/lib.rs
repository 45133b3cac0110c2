//! Per-origin `robots.txt` cache and permission check.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crawler_core::normalize::origin_of;
use robotstxt::DefaultMatcher;
use tokio::sync::RwLock;

const ROBOTS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
enum CacheEntry {
    /// `robots.txt` was fetched successfully; holds its raw body.
    Loaded(String),
    /// Fetch failed (network error, timeout, non-2xx, not found): fail open.
    Unavailable,
}

/// Caches `robots.txt` bodies per origin and answers allow/deny checks
/// against the wildcard `*` user agent.
///
/// Fails open: a missing or unfetchable `robots.txt` allows the URL, matching
/// `app.py`'s `can_fetch` behavior when `robot_parser` is `None`.
pub struct RobotsCache {
    client: reqwest::Client,
    user_agent: String,
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
}

impl RobotsCache {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(ROBOTS_FETCH_TIMEOUT)
                .build()
                .expect("reqwest client builder"),
            user_agent: user_agent.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// True if `respect_robots` is off, the URL is malformed, or `robots.txt`
    /// allows it; false only on a confirmed `Disallow` match.
    pub async fn is_allowed(&self, url: &str, respect_robots: bool) -> bool {
        if !respect_robots {
            return true;
        }
        let Some(origin) = origin_of(url) else {
            return true;
        };

        let entry = self.entry_for(&origin).await;
        match entry.as_ref() {
            CacheEntry::Unavailable => true,
            CacheEntry::Loaded(body) => {
                DefaultMatcher::default().one_agent_allowed_by_robots(body, "*", url)
            }
        }
    }

    async fn entry_for(&self, origin: &str) -> Arc<CacheEntry> {
        if let Some(entry) = self.entries.read().await.get(origin) {
            return entry.clone();
        }

        let entry = Arc::new(self.fetch(origin).await);
        self.entries
            .write()
            .await
            .insert(origin.to_string(), entry.clone());
        entry
    }

    async fn fetch(&self, origin: &str) -> CacheEntry {
        let robots_url = format!("{origin}/robots.txt");
        let result = self
            .client
            .get(&robots_url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => {
                    tracing::debug!(origin, "loaded robots.txt");
                    CacheEntry::Loaded(body)
                }
                Err(err) => {
                    tracing::warn!(origin, %err, "failed to read robots.txt body");
                    CacheEntry::Unavailable
                }
            },
            Ok(resp) => {
                tracing::debug!(origin, status = %resp.status(), "robots.txt not available");
                CacheEntry::Unavailable
            }
            Err(err) => {
                tracing::warn!(origin, %err, "failed to fetch robots.txt");
                CacheEntry::Unavailable
            }
        }
    }
}
