//! Industry value chain lookup (`ic.tpex.org.tw`).
//!
//! The company page lists one `<h4>` per industry the company belongs to:
//!
//! ```html
//! <div class="content">
//!   <h4><a href="...">半導體</a> &gt; 上游 &gt; IC設計</h4>
//! </div>
//! ```
//!
//! The link text is the industry; the text node right after it is the
//! position in that industry's chain.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use tpex_common::DataSourceConfig;

use super::provider::{IndustryLookup, ProviderError};
use super::IndustryInfo;

const CHAIN_PATH: &str = "/company_chain.php";
const INDUSTRY_SELECTOR: &str = "div.content h4 a";

/// HTTP client for the industry value chain site.
pub struct IndustryChainClient {
    client: reqwest::Client,
    base_url: String,
}

impl IndustryChainClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from config
    pub fn from_config(config: &DataSourceConfig) -> Self {
        Self::new(
            config.industry_base_url.clone(),
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
        )
    }

    async fn fetch_page(&self, instrument_id: &str) -> Result<String, ProviderError> {
        let url = format!("{}{}", self.base_url, CHAIN_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[("stk_code", instrument_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::Network(format!("HTTP {}", response.status())));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl IndustryLookup for IndustryChainClient {
    async fn fetch_industry(&self, instrument_id: &str) -> IndustryInfo {
        let html = match self.fetch_page(instrument_id).await {
            Ok(html) => html,
            Err(e) => {
                warn!(instrument = %instrument_id, error = %e, "Industry page fetch failed");
                return IndustryInfo::unknown();
            }
        };

        match parse_industry_page(&html) {
            Some(info) => info,
            None => {
                debug!(instrument = %instrument_id, "No industry entries on page");
                IndustryInfo::unknown()
            }
        }
    }
}

/// Extract industry and chain position from a company chain page.
///
/// Returns `None` when the page has no industry entries.
pub fn parse_industry_page(html: &str) -> Option<IndustryInfo> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(INDUSTRY_SELECTOR).ok()?;

    let mut industries = Vec::new();
    let mut chains = Vec::new();

    for link in document.select(&selector) {
        industries.push(link.text().collect::<String>().trim().to_string());

        let chain = link
            .next_sibling()
            .and_then(|node| node.value().as_text().map(|t| t.replace('>', "")));
        if let Some(chain) = chain {
            chains.push(chain.trim().to_string());
        }
    }

    if industries.is_empty() {
        return None;
    }

    Some(IndustryInfo {
        industry: industries.join(", "),
        industry_chain: chains.join(", "),
    })
}
