use crate::config::Config;
use crate::errors::ExchangeError;
use crate::models::{FundingRow, Protocol};
use async_trait::async_trait;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

pub mod aevo;
pub mod hyperliquid;
pub mod mango;
pub mod vertex;

#[async_trait]
pub trait Exchange: Send + Sync {
    fn protocol(&self) -> Protocol;

    fn name(&self) -> &'static str {
        self.protocol().id()
    }

    /// Fetches this exchange's current funding rates and maps them into
    /// normalized rows. An `Err` means the whole exchange produced nothing.
    async fn fetch_funding(&self) -> Result<Vec<FundingRow>, ExchangeError>;
}

/// Shared HTTP client settings for every exchange.
pub fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client, ExchangeError> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

/// Instantiates the configured exchanges in run order.
pub fn from_config(config: &Config) -> Result<Vec<Box<dyn Exchange>>, ExchangeError> {
    let client = build_client(config.request_timeout)?;

    Ok(config
        .exchanges
        .iter()
        .map(|protocol| -> Box<dyn Exchange> {
            let base_url = config.base_url(*protocol).to_string();
            match protocol {
                Protocol::Aevo => Box::new(aevo::Aevo::new(client.clone(), base_url)),
                Protocol::Mango => Box::new(mango::Mango::new(client.clone(), base_url)),
                Protocol::Vertex => Box::new(vertex::Vertex::new(
                    client.clone(),
                    base_url,
                    config.vertex_products.clone(),
                )),
                Protocol::Hyperliquid => {
                    Box::new(hyperliquid::Hyperliquid::new(client.clone(), base_url))
                }
            }
        })
        .collect())
}

/// Exchanges send decimals either as JSON numbers or as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn into_f64(self) -> Result<f64, String> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid number {s:?}: {e}")),
        }
    }
}

pub(crate) fn f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    NumberOrString::deserialize(deserializer)?
        .into_f64()
        .map_err(D::Error::custom)
}

pub(crate) fn f64_lenient_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<NumberOrString>::deserialize(deserializer)?
        .map(NumberOrString::into_f64)
        .transpose()
        .map_err(D::Error::custom)
}
