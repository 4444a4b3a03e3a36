use super::Exchange;
use crate::errors::ExchangeError;
use crate::models::{FundingRow, Protocol};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Rates come back as 18-decimal fixed point.
const X18_SCALE: f64 = 1e18;
/// Vertex's published rate is daily; the snapshot stores it per hour.
const HOURS_PER_DAY: f64 = 24.0;

#[derive(Debug, Serialize)]
struct IndexerRequest<'a> {
    funding_rates: ProductIds<'a>,
}

#[derive(Debug, Serialize)]
struct ProductIds<'a> {
    product_ids: &'a [u32],
}

/// Read before the rest of an entry so unmapped products are never parsed.
#[derive(Debug, Deserialize)]
struct ProductKey {
    product_id: u32,
}

#[derive(Debug, Deserialize)]
struct ProductFundingRate {
    funding_rate_x18: String,
}

pub struct Vertex {
    client: reqwest::Client,
    base_url: String,
    product_ids: Vec<u32>,
    symbols: HashMap<u32, String>,
}

impl Vertex {
    /// `products` is the allow-list of product id → token symbol; its order
    /// is the order ids are sent in.
    pub fn new(client: reqwest::Client, base_url: String, products: Vec<(u32, String)>) -> Self {
        let product_ids = products.iter().map(|(id, _)| *id).collect();
        let symbols = products.into_iter().collect();
        Self {
            client,
            base_url,
            product_ids,
            symbols,
        }
    }
}

/// `"18000000000000000"` → 0.018 → 0.00075 per hour.
fn hourly_rate(funding_rate_x18: &str) -> Result<f64, ExchangeError> {
    let scaled = funding_rate_x18.trim().parse::<i128>().map_err(|e| {
        ExchangeError::UnexpectedData(format!("invalid funding_rate_x18 {funding_rate_x18:?}: {e}"))
    })?;

    Ok(scaled as f64 / X18_SCALE / HOURS_PER_DAY)
}

/// Maps the keyed indexer response into rows, dropping products that are not
/// in the symbol table.
fn normalize(
    response: Map<String, Value>,
    symbols: &HashMap<u32, String>,
) -> Result<Vec<FundingRow>, ExchangeError> {
    let mut rows = Vec::with_capacity(response.len());

    for (_, value) in response {
        let ProductKey { product_id } = ProductKey::deserialize(&value)?;

        let Some(symbol) = symbols.get(&product_id) else {
            tracing::debug!("[vertex] product {product_id} not in symbol table");
            continue;
        };

        let rate: ProductFundingRate = serde_json::from_value(value)?;

        rows.push(FundingRow::new(
            symbol.clone(),
            hourly_rate(&rate.funding_rate_x18)?,
            Protocol::Vertex,
        ));
    }

    Ok(rows)
}

#[async_trait]
impl Exchange for Vertex {
    fn protocol(&self) -> Protocol {
        Protocol::Vertex
    }

    async fn fetch_funding(&self) -> Result<Vec<FundingRow>, ExchangeError> {
        let url = format!("{}/indexer", self.base_url);
        let request = IndexerRequest {
            funding_rates: ProductIds {
                product_ids: &self.product_ids,
            },
        };

        let body = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let response: Map<String, Value> = serde_json::from_str(&body)?;
        normalize(response, &self.symbols)
    }
}
