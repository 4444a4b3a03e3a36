use super::{Exchange, f64_lenient};
use crate::errors::ExchangeError;
use crate::fetcher::gather_per_asset;
use crate::models::{FundingRow, Protocol};
use async_trait::async_trait;
use serde::Deserialize;

/// The part of `GET /funding` we read. Aevo sends the rate as a string.
#[derive(Debug, Deserialize)]
struct FundingResponse {
    #[serde(deserialize_with = "f64_lenient")]
    funding_rate: f64,
}

pub struct Aevo {
    client: reqwest::Client,
    base_url: String,
}

impl Aevo {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Lists every tradable asset symbol (`GET /assets`).
    async fn fetch_assets(&self) -> Result<Vec<String>, ExchangeError> {
        let url = format!("{}/assets", self.base_url);

        let assets = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<String>>()
            .await?;

        Ok(assets)
    }

    /// Funding rate of the `{asset}-PERP` instrument.
    async fn fetch_single_funding_rate(&self, asset: String) -> Result<f64, ExchangeError> {
        let url = format!("{}/funding?instrument_name={asset}-PERP", self.base_url);

        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(serde_json::from_str::<FundingResponse>(&body)?.funding_rate)
    }
}

fn normalize(rates: Vec<(String, f64)>) -> Vec<FundingRow> {
    rates
        .into_iter()
        .map(|(asset, rate)| FundingRow::new(asset, rate, Protocol::Aevo))
        .collect()
}

#[async_trait]
impl Exchange for Aevo {
    fn protocol(&self) -> Protocol {
        Protocol::Aevo
    }

    /// Aevo has no bulk funding endpoint: list the assets, then request every
    /// asset's rate concurrently. Assets whose request fails are left out.
    async fn fetch_funding(&self) -> Result<Vec<FundingRow>, ExchangeError> {
        let assets = self.fetch_assets().await?;
        tracing::debug!("[{}] requesting funding for {} assets", self.name(), assets.len());

        let rates = gather_per_asset(self.name(), assets, |asset| {
            self.fetch_single_funding_rate(asset)
        })
        .await;

        Ok(normalize(rates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_and_numeric_rates() {
        let parsed: FundingResponse = serde_json::from_str(
            r#"{"instrument_name": "ETH-PERP", "funding_rate": "0.000012", "next_epoch": "1700000000"}"#,
        )
        .unwrap();
        assert_eq!(parsed.funding_rate, 0.000012);

        let parsed: FundingResponse = serde_json::from_str(r#"{"funding_rate": -0.5}"#).unwrap();
        assert_eq!(parsed.funding_rate, -0.5);
    }

    #[test]
    fn missing_rate_is_an_error() {
        assert!(serde_json::from_str::<FundingResponse>(r#"{"error": "NOT_FOUND"}"#).is_err());
    }

    mod fetch {
        use super::*;
        use axum::extract::Query;
        use axum::http::StatusCode;
        use axum::routing::get;
        use axum::{Json, Router};
        use serde_json::{Value, json};
        use std::collections::HashMap;

        async fn assets() -> Json<Value> {
            Json(json!(["BTC", "ETH", "DOGE", "SOL"]))
        }

        async fn funding(
            Query(params): Query<HashMap<String, String>>,
        ) -> Result<Json<Value>, StatusCode> {
            match params.get("instrument_name").map(String::as_str) {
                Some("BTC-PERP") => Ok(Json(json!({"funding_rate": "0.0001"}))),
                Some("SOL-PERP") => Ok(Json(json!({"funding_rate": 0.0003}))),
                Some("ETH-PERP") => Ok(Json(json!({"error": "INSTRUMENT_NOT_FOUND"}))),
                _ => Err(StatusCode::INTERNAL_SERVER_ERROR),
            }
        }

        async fn serve(app: Router) -> String {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            format!("http://{addr}")
        }

        #[tokio::test]
        async fn keeps_assets_whose_rate_arrived() {
            let base = serve(
                Router::new()
                    .route("/assets", get(assets))
                    .route("/funding", get(funding)),
            )
            .await;

            let rows = Aevo::new(reqwest::Client::new(), base)
                .fetch_funding()
                .await
                .unwrap();

            assert_eq!(
                rows,
                vec![
                    FundingRow::new("BTC", 0.0001, Protocol::Aevo),
                    FundingRow::new("SOL", 0.0003, Protocol::Aevo),
                ]
            );
        }

        #[tokio::test]
        async fn failed_asset_listing_fails_the_exchange() {
            let base = serve(Router::new().route("/funding", get(funding))).await;

            let result = Aevo::new(reqwest::Client::new(), base).fetch_funding().await;

            assert!(matches!(result, Err(ExchangeError::Http(_))));
        }
    }
}
