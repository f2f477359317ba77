//! PubMed search client.
//!
//! Builds the two query shapes used by the pipelines and performs a single
//! GET per call with a browser-like identity, returning the raw body.

use crate::error::{PubmedError, Result};
use tracing::{debug, info};
use url::Url;

/// Default PubMed URL
pub const DEFAULT_PUBMED_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// User agent string for requests (PubMed blocks obvious bots)
const USER_AGENT: &str = "Mozilla/5.0";

/// Topic used by the longevity record search
pub const LONGEVITY_TERM: &str = "longevity";

/// Options for building a [`PubmedClient`]
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Custom base URL for mirror sites
    pub base_url: Option<String>,
    /// Proxy URL (e.g., "http://127.0.0.1:7890")
    pub proxy: Option<String>,
}

/// Thin wrapper around `reqwest::Client` bound to a PubMed base URL.
pub struct PubmedClient {
    client: reqwest::Client,
    base_url: String,
}

impl PubmedClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns `PubmedError::Config` if the base URL or proxy URL is invalid.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let base_url = options
            .base_url
            .as_ref()
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_PUBMED_URL.to_string());

        Url::parse(&base_url)
            .map_err(|e| PubmedError::Config(format!("Invalid base URL '{}': {}", base_url, e)))?;

        Ok(Self {
            client: build_http_client(options.proxy.as_deref())?,
            base_url,
        })
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of one page of abstracts for `disease` published between the given years.
    pub fn biomarker_search_url(
        &self,
        disease: &str,
        start_year: i32,
        end_year: i32,
        page_size: u32,
    ) -> Result<Url> {
        build_biomarker_url(&self.base_url, disease, start_year, end_year, page_size)
    }

    /// URL of one page of MEDLINE records on longevity, newest first.
    pub fn longevity_search_url(&self, page_size: u32) -> Result<Url> {
        build_longevity_url(&self.base_url, page_size)
    }

    /// Fetch a page and return its body as text.
    ///
    /// # Errors
    ///
    /// Network failures and non-success statuses are returned as-is; there is
    /// no retry.
    pub async fn fetch(&self, url: &Url) -> Result<String> {
        debug!(url = %url, "Fetching page");

        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PubmedError::Api {
                code: status.as_u16(),
                message: format!("HTTP error: {}", status),
            });
        }

        let body = response.text().await?;
        info!(url = %url, bytes = body.len(), "Fetched page");
        Ok(body)
    }
}

/// Build HTTP client with optional proxy
fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            PubmedError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| PubmedError::Config(format!("Failed to build HTTP client: {}", e)))
}

fn search_root(base_url: &str) -> Result<Url> {
    Url::parse(&format!("{}/", base_url))
        .map_err(|e| PubmedError::Config(format!("Invalid base URL: {}", e)))
}

/// Build the abstract-listing search URL.
///
/// Query pairs are form-encoded, so spaces in `disease` become `+`.
fn build_biomarker_url(
    base_url: &str,
    disease: &str,
    start_year: i32,
    end_year: i32,
    page_size: u32,
) -> Result<Url> {
    let mut url = search_root(base_url)?;

    url.query_pairs_mut()
        .append_pair("term", disease)
        .append_pair("filter", &format!("years.{}-{}", start_year, end_year))
        .append_pair("format", "abstract")
        .append_pair("size", &page_size.to_string());

    Ok(url)
}

/// Build the MEDLINE-format longevity search URL.
fn build_longevity_url(base_url: &str, page_size: u32) -> Result<Url> {
    let mut url = search_root(base_url)?;

    url.query_pairs_mut()
        .append_pair("term", LONGEVITY_TERM)
        .append_pair("format", "pubmed")
        .append_pair("sort", "date")
        .append_pair("size", &page_size.to_string());

    Ok(url)
}
