use std::env;
use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use regex::Regex;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str = "tmcollector/0.1";
pub const DEFAULT_TIMEOUT_MS: u64 = 185_000;

/// A page found by label search, reduced to the fields the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRecord {
    pub id: String,
    pub title: String,
    /// Container path, e.g. `/rest/api/space/MR`.
    pub space_path: String,
    /// Web UI path relative to the platform base URL.
    pub webui_path: String,
}

pub trait ConfluenceApi {
    fn find_pages_by_label(
        &mut self,
        label: &str,
        start: usize,
        limit: usize,
    ) -> Result<Vec<PageRecord>>;
    /// Storage-format body of one page. A page without a body yields `""`.
    fn fetch_page_body(&mut self, page_id: &str) -> Result<String>;
    /// All full matches of `pattern` in the page body. No match is not an error.
    fn search_page_body(&mut self, page_id: &str, pattern: &Regex) -> Result<Vec<String>> {
        let body = self.fetch_page_body(page_id)?;
        Ok(find_all(pattern, &body))
    }
    fn web_url(&self, path: &str) -> String;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct ConfluenceClientConfig {
    pub base_url: String,
    pub login: Option<String>,
    pub password: Option<String>,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub rate_limit_ms: u64,
}

impl ConfluenceClientConfig {
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("CONFLUENCE_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "CONFLUENCE_URL is required (example: https://example.atlassian.net/wiki)"
                )
            })?;
        Ok(Self {
            base_url,
            login: env_optional("CONFLUENCE_LOGIN"),
            password: env_optional("CONFLUENCE_PASSWORD"),
            user_agent: env_optional("CONFLUENCE_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout_ms: env_value_u64("CONFLUENCE_HTTP_TIMEOUT_MS", DEFAULT_TIMEOUT_MS),
            rate_limit_ms: env_value_u64("CONFLUENCE_RATE_LIMIT_MS", 0),
        })
    }
}

pub struct ConfluenceClient {
    client: Client,
    config: ConfluenceClientConfig,
    last_request_at: Option<Instant>,
    request_count: usize,
}

impl ConfluenceClient {
    pub fn from_env() -> Result<Self> {
        Self::new(ConfluenceClientConfig::from_env()?)
    }

    pub fn new(config: ConfluenceClientConfig) -> Result<Self> {
        Url::parse(&config.base_url)
            .with_context(|| format!("invalid CONFLUENCE_URL: {}", config.base_url))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("failed to build Confluence HTTP client")?;

        Ok(Self {
            client,
            config,
            last_request_at: None,
            request_count: 0,
        })
    }

    fn request_json_get(&mut self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.config.base_url, path);
        self.apply_rate_limit();

        let mut request = self
            .client
            .get(&url)
            .header("User-Agent", self.config.user_agent.clone())
            .header("Accept", "application/json")
            .query(params);
        if let Some(login) = &self.config.login {
            request = request.basic_auth(login, self.config.password.as_ref());
        }

        let response = request
            .send()
            .with_context(|| format!("failed to call Confluence API {path}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("Confluence API request {path} failed with HTTP {status}");
        }
        response
            .json()
            .with_context(|| format!("failed to decode Confluence API JSON response for {path}"))
    }

    fn apply_rate_limit(&mut self) {
        let delay = Duration::from_millis(self.config.rate_limit_ms);
        if let Some(last) = self.last_request_at {
            let elapsed = last.elapsed();
            if elapsed < delay {
                sleep(delay - elapsed);
            }
        }
        self.last_request_at = Some(Instant::now());
        self.request_count += 1;
    }
}

impl ConfluenceApi for ConfluenceClient {
    fn find_pages_by_label(
        &mut self,
        label: &str,
        start: usize,
        limit: usize,
    ) -> Result<Vec<PageRecord>> {
        let cql = format!("type=page AND label=\"{}\"", label.replace('"', "\\\""));
        let response = self.request_json_get(
            "/rest/api/content/search",
            &[
                ("cql", cql),
                ("start", start.to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        let parsed: SearchResponse = serde_json::from_value(response)
            .context("failed to decode content search API response")?;
        debug!(label, count = parsed.results.len(), "label search finished");

        Ok(parsed
            .results
            .into_iter()
            .map(|item| PageRecord {
                id: item.id,
                title: item.title,
                space_path: item.expandable.space.unwrap_or_default(),
                webui_path: item.links.webui.unwrap_or_default(),
            })
            .collect())
    }

    fn fetch_page_body(&mut self, page_id: &str) -> Result<String> {
        let response = self.request_json_get(
            &format!("/rest/api/content/{page_id}"),
            &[("expand", "body.storage".to_string())],
        )?;
        let parsed: ContentResponse = serde_json::from_value(response)
            .with_context(|| format!("failed to decode content API response for page {page_id}"))?;
        Ok(parsed
            .body
            .and_then(|body| body.storage)
            .map(|storage| storage.value)
            .unwrap_or_default())
    }

    fn web_url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

/// Every full match of `pattern` in `text`, in order.
pub fn find_all(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .find_iter(text)
        .map(|found| found.as_str().to_string())
        .collect()
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_value_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResultItem>,
}

#[derive(Debug, Deserialize)]
struct SearchResultItem {
    id: String,
    title: String,
    #[serde(default, rename = "_expandable")]
    expandable: ExpandablePayload,
    #[serde(default, rename = "_links")]
    links: LinksPayload,
}

#[derive(Debug, Deserialize, Default)]
struct ExpandablePayload {
    space: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LinksPayload {
    webui: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ContentResponse {
    body: Option<BodyPayload>,
}

#[derive(Debug, Deserialize)]
struct BodyPayload {
    storage: Option<StoragePayload>,
}

#[derive(Debug, Deserialize)]
struct StoragePayload {
    value: String,
}
