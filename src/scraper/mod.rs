pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use crate::error::ExtractError;
use crate::models::Table;
use async_trait::async_trait;
use tracing::{error, info, warn};
use url::Url;

use self::http_client::HttpClient;
use self::parsers::parse_details_table;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable source of holder-distribution tables.
#[async_trait]
pub trait HolderSource: Send + Sync {
    async fn fetch_table(&self, code: &str) -> Result<Table, ExtractError>;
}

/// Fetch a code's table, logging and flattening every failure into `None`.
pub async fn extract(source: &dyn HolderSource, code: &str) -> Option<Table> {
    match source.fetch_table(code).await {
        Ok(table) => {
            if table.is_empty() {
                warn!("{}: table has a header but no data rows", code);
            }
            info!("{}: extracted {} rows, {} columns", code, table.len(), table.headers().len());
            Some(table)
        }
        Err(e) => {
            error!("{}: extraction failed: {}", code, e);
            None
        }
    }
}

// ── twsthr scraper ────────────────────────────────────────────────────────────

pub struct TwsthrScraper {
    client: HttpClient,
    base_url: String,
    table_id: String,
    min_cells: usize,
}

impl TwsthrScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self, ExtractError> {
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: config.base_url.clone(),
            table_id: config.table_id.clone(),
            min_cells: config.min_cells,
        })
    }

    /// e.g. 2330 → StockHolders.aspx?stock=2330
    pub fn stock_url(&self, code: &str) -> Result<Url, ExtractError> {
        let mut url = Url::parse(&self.base_url)?;
        url.query_pairs_mut().append_pair("stock", code);
        Ok(url)
    }
}

#[async_trait]
impl HolderSource for TwsthrScraper {
    async fn fetch_table(&self, code: &str) -> Result<Table, ExtractError> {
        let url = self.stock_url(code)?;
        info!("Visiting {}", url);

        let html = self.client.get_text(url.as_str()).await?;
        parse_details_table(&html, &self.table_id, self.min_cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Missing;

    #[async_trait]
    impl HolderSource for Missing {
        async fn fetch_table(&self, _code: &str) -> Result<Table, ExtractError> {
            Err(ExtractError::TableNotFound("Details".into()))
        }
    }

    #[test]
    fn stock_url_encodes_code() {
        let scraper = TwsthrScraper::new(&ScraperConfig::default()).unwrap();
        assert_eq!(
            scraper.stock_url("2330").unwrap().as_str(),
            "https://norway.twsthr.info/StockHolders.aspx?stock=2330"
        );
        assert_eq!(
            scraper.stock_url("a b&c").unwrap().as_str(),
            "https://norway.twsthr.info/StockHolders.aspx?stock=a+b%26c"
        );
    }

    #[tokio::test]
    async fn failures_flatten_to_none() {
        assert!(extract(&Missing, "0000").await.is_none());
    }
}
