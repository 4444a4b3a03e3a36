use crate::errors::ExchangeError;
use crate::exchanges::Exchange;
use crate::models::FundingRow;
use futures_util::future::join_all;
use std::future::Future;
use std::time::Instant;

/// Runs one exchange's fetch-and-normalize step, logging how it went.
/// `Err` means the exchange has no snapshot for this run.
pub async fn fetch_funding(exchange: &dyn Exchange) -> Result<Vec<FundingRow>, ExchangeError> {
    let name = exchange.name();
    let started = Instant::now();

    match exchange.fetch_funding().await {
        Ok(rows) => {
            tracing::info!(
                "[{name}] fetched {} funding rows in {:?}",
                rows.len(),
                started.elapsed()
            );
            Ok(rows)
        }
        Err(e) => {
            tracing::error!("[{name}] funding fetch failed: {e}");
            Err(e)
        }
    }
}

/// Issues `fetch` for every asset at once and keeps the ones that succeeded,
/// each paired with the asset it was requested for. Failed assets are dropped.
pub async fn gather_per_asset<T, F, Fut>(
    name: &str,
    assets: Vec<String>,
    fetch: F,
) -> Vec<(String, T)>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    let requested = assets.len();

    let results = join_all(assets.into_iter().map(|asset| {
        let request = fetch(asset.clone());
        async move { (asset, request.await) }
    }))
    .await;

    let gathered: Vec<(String, T)> = results
        .into_iter()
        .filter_map(|(asset, result)| match result {
            Ok(value) => Some((asset, value)),
            Err(e) => {
                tracing::debug!("[{name}] {asset} skipped: {e}");
                None
            }
        })
        .collect();

    if gathered.len() < requested {
        tracing::warn!(
            "[{name}] {} of {requested} per-asset requests failed",
            requested - gathered.len()
        );
    }

    gathered
}
