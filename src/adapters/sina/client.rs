use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;

use crate::domain::Market;
use crate::ports::{FeedError, QuoteFeed};

pub const DEFAULT_FEED_URL: &str = "http://hq.sinajs.cn";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";
const REFERER: &str = "https://finance.sina.com.cn/";
const FEED_CHARSET: &str = "gb18030";

#[derive(Debug, Clone)]
pub struct SinaFeedClient {
    http: Client,
    base_url: String,
}

impl SinaFeedClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Request URL for a feed symbol. `rn` is a cache buster.
    pub fn request_url(&self, symbol: &str) -> String {
        format!("{}/rn={}&list={}", self.base_url, Utc::now().timestamp(), symbol)
    }

    /// Fetch by bare instrument code, resolving the market prefix first
    pub async fn fetch_code(&self, code: &str) -> Result<String, FeedError> {
        let symbol = Market::feed_symbol(code)
            .ok_or_else(|| FeedError::InvalidSymbol(code.to_string()))?;
        self.fetch_raw(&symbol).await
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl QuoteFeed for SinaFeedClient {
    async fn fetch_raw(&self, symbol: &str) -> Result<String, FeedError> {
        let url = self.request_url(symbol);
        tracing::debug!("GET {}", url);

        let response = self.http
            .get(&url)
            .header(reqwest::header::REFERER, REFERER)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response
            .text_with_charset(FEED_CHARSET)
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        body.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| FeedError::Empty(symbol.to_string()))
    }
}
