//! Chapter fetcher: one chapter id in, raw article markup (or nothing) out.

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use novel_model::FetchResult;

use crate::api;
use crate::error::FetchFailure;
use crate::retry::{RetryPolicy, RetryState};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Per-attempt timeout against the content API.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Landing pages are heavier than API calls, so they get a longer timeout.
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(7);

/// Settings shared by every fetch of one book session.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Request headers; at least `User-Agent`.
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
    /// Whole-request timeout for the book landing page.
    pub page_timeout: Duration,
    pub retry: RetryPolicy,
    /// Content API endpoint. Only changed to point at a mirror or a test server.
    pub api_base: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }
}

impl FetchConfig {
    pub fn with_user_agent(user_agent: &str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("User-Agent".to_string(), user_agent.to_string());
        Self {
            headers,
            timeout: DEFAULT_TIMEOUT,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
            retry: RetryPolicy::default(),
            api_base: api::CONTENT_API_BASE.to_string(),
        }
    }

    /// Convert the header map into reqwest headers, rejecting invalid names or values.
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name: {name}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {name}"))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    pub fn api_url(&self, chapter_id: &str) -> String {
        api::build_api_url(&self.api_base, chapter_id)
    }
}

/// Fetches chapter content from the JSON content API with bounded retries.
///
/// Holds no per-chapter state, so one fetcher can serve any number of
/// concurrent chapter fetches.
#[derive(Debug, Clone)]
pub struct ChapterFetcher {
    client: reqwest::Client,
    headers: HeaderMap,
    config: FetchConfig,
}

impl ChapterFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let headers = config.header_map()?;
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            headers,
            config,
        })
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch one chapter's raw article markup.
    ///
    /// Never fails: transport and decoding problems are retried up to the
    /// policy's budget, after which the result carries no markup and the
    /// caller is expected to skip the chapter.
    pub async fn fetch(&self, chapter_id: &str, title: &str) -> FetchResult {
        let url = self.config.api_url(chapter_id);
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts();

        let mut state = RetryState::start();
        let mut attempts = 0;
        let mut markup = None;

        while let RetryState::Attempting(attempt) = state {
            attempts = attempt;
            tracing::debug!(chapter_id, attempt, "Requesting chapter content");

            match self.attempt(&url).await {
                Ok(content) => {
                    markup = Some(content);
                    state = state.succeed();
                }
                Err(failure) => {
                    if attempt == 1 {
                        tracing::warn!(
                            chapter_id,
                            title,
                            error = %failure,
                            "Chapter fetch failed, retrying"
                        );
                    }
                    tracing::warn!(
                        chapter_id,
                        attempt,
                        max_attempts,
                        "Retry ({attempt}/{max_attempts}) fetching chapter content"
                    );
                    state = state.fail(policy);
                    if !state.is_terminal() && !policy.delay().is_zero() {
                        tokio::time::sleep(policy.delay()).await;
                    }
                }
            }
        }

        if state == RetryState::Exhausted {
            tracing::error!(
                chapter_id,
                title,
                attempts,
                "Chapter fetch failed, retry budget exhausted; skipping"
            );
        } else {
            tracing::debug!(chapter_id, attempts, "Fetched chapter content");
        }

        FetchResult {
            chapter_id: chapter_id.to_string(),
            title: title.to_string(),
            raw_article_markup: markup,
            attempts,
        }
    }

    /// One request/decode round trip.
    async fn attempt(&self, url: &str) -> Result<String, FetchFailure> {
        let response = self
            .client
            .get(url)
            .headers(self.headers.clone())
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(FetchFailure::from_reqwest)?;

        let envelope: Value = response.json().await.map_err(FetchFailure::from_reqwest)?;

        api::extract_content(&envelope)
            .map(str::to_string)
            .ok_or(FetchFailure::MissingContent)
    }
}
