use crate::config::ScraperConfig;
use crate::error::ExtractError;
use std::time::Duration;
use tracing::debug;

pub struct HttpClient {
    inner: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(config: &ScraperConfig) -> Result<Self, ExtractError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let inner = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(timeout)
            .gzip(true)
            // ASP.NET pages set a session cookie on first hit
            .cookie_store(true)
            .build()?;

        Ok(Self { inner, timeout })
    }

    /// Fetch a URL as text. Single attempt; errors are returned as-is.
    pub async fn get_text(&self, url: &str) -> Result<String, ExtractError> {
        debug!("GET {}", url);

        let resp = self.inner.get(url).send().await.map_err(|e| self.classify(e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ExtractError::Status(status));
        }

        resp.text().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, err: reqwest::Error) -> ExtractError {
        if err.is_timeout() {
            ExtractError::Timeout(self.timeout)
        } else {
            ExtractError::Http(err)
        }
    }
}
