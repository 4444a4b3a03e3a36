use super::{Exchange, f64_lenient};
use crate::errors::ExchangeError;
use crate::models::{FundingRow, Protocol};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Hyperliquid's funding is reported as a fraction; the snapshot stores
/// percent.
const FUNDING_TO_PERCENT: f64 = 100.0;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
enum InfoRequest {
    MetaAndAssetCtxs,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Universe {
    universe: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetCtx {
    #[serde(deserialize_with = "f64_lenient")]
    funding: f64,
    #[serde(deserialize_with = "f64_lenient")]
    open_interest: f64,
}

/// `[{"universe": [..]}, [ctx, ..]]` where `ctx[i]` belongs to `universe[i]`.
type MetaAndAssetCtxs = (Universe, Vec<AssetCtx>);

pub struct Hyperliquid {
    client: reqwest::Client,
    base_url: String,
}

impl Hyperliquid {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

/// Pairs assets with their contexts by position. The two arrays carry no
/// shared key, so a length mismatch means the pairing cannot be trusted.
fn normalize((meta, ctxs): MetaAndAssetCtxs) -> Result<Vec<FundingRow>, ExchangeError> {
    if meta.universe.len() != ctxs.len() {
        return Err(ExchangeError::UnexpectedData(format!(
            "universe has {} assets but {} asset contexts",
            meta.universe.len(),
            ctxs.len()
        )));
    }

    Ok(meta
        .universe
        .into_iter()
        .zip(ctxs)
        .map(|(asset, ctx)| {
            FundingRow::new(asset.name, ctx.funding * FUNDING_TO_PERCENT, Protocol::Hyperliquid)
                .with_open_interest(ctx.open_interest)
        })
        .collect())
}

#[async_trait]
impl Exchange for Hyperliquid {
    fn protocol(&self) -> Protocol {
        Protocol::Hyperliquid
    }

    async fn fetch_funding(&self) -> Result<Vec<FundingRow>, ExchangeError> {
        let url = format!("{}/info", self.base_url);

        let body = self
            .client
            .post(&url)
            .json(&InfoRequest::MetaAndAssetCtxs)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        normalize(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> MetaAndAssetCtxs {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn pairs_universe_and_contexts_by_index() {
        let rows = normalize(parse(
            r#"[
                {"universe": [{"name": "BTC", "szDecimals": 5}, {"name": "ETH", "szDecimals": 4}]},
                [
                    {"funding": "0.01", "openInterest": "5", "markPx": "30000.0"},
                    {"funding": "0.02", "openInterest": "7", "markPx": "1800.0"}
                ]
            ]"#,
        ))
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].token_name, "BTC");
        assert!((rows[0].funding_rate - 1.0).abs() < 1e-12);
        assert_eq!(rows[0].open_interest, Some(5.0));
        assert_eq!(rows[1].token_name, "ETH");
        assert!((rows[1].funding_rate - 2.0).abs() < 1e-12);
        assert_eq!(rows[1].open_interest, Some(7.0));
        assert!(rows.iter().all(|row| row.protocol == Protocol::Hyperliquid));
    }

    #[test]
    fn rejects_misaligned_arrays() {
        let result = normalize(parse(
            r#"[
                {"universe": [{"name": "BTC"}, {"name": "ETH"}]},
                [{"funding": "0.01", "openInterest": "5"}]
            ]"#,
        ));
        assert!(matches!(result, Err(ExchangeError::UnexpectedData(_))));
    }

    #[test]
    fn request_body_is_tagged() {
        assert_eq!(
            serde_json::to_value(InfoRequest::MetaAndAssetCtxs).unwrap(),
            serde_json::json!({"type": "metaAndAssetCtxs"})
        );
    }
}
