use super::{Exchange, f64_lenient_opt};
use crate::errors::ExchangeError;
use crate::models::{FundingRow, Protocol};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

const PERP_SUFFIX: &str = "-PERP";

/// First entry of a market's stats list; later entries are ignored.
#[derive(Debug, Deserialize)]
struct MarketStats {
    #[serde(default, deserialize_with = "f64_lenient_opt")]
    funding_rate: Option<f64>,
}

pub struct Mango {
    client: reqwest::Client,
    base_url: String,
}

impl Mango {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

/// Maps `{"BTC-PERP": [{"funding_rate": ..}], ..}` into rows, in response
/// order. Markets with an empty list or no usable rate are skipped.
fn normalize(summary: Map<String, Value>) -> Vec<FundingRow> {
    summary
        .into_iter()
        .filter_map(|(symbol, stats)| {
            let first = stats.as_array()?.first()?;
            let funding_rate = match MarketStats::deserialize(first) {
                Ok(first) => first.funding_rate?,
                Err(e) => {
                    tracing::debug!("[mango] {symbol} skipped: {e}");
                    return None;
                }
            };
            let token = symbol.strip_suffix(PERP_SUFFIX).unwrap_or(&symbol);

            Some(FundingRow::new(token, funding_rate, Protocol::Mango))
        })
        .collect()
}

#[async_trait]
impl Exchange for Mango {
    fn protocol(&self) -> Protocol {
        Protocol::Mango
    }

    async fn fetch_funding(&self) -> Result<Vec<FundingRow>, ExchangeError> {
        let url = format!("{}/stats/perp-market-summary", self.base_url);

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let summary: Map<String, Value> = serde_json::from_str(&body)?;
        Ok(normalize(summary))
    }
}
