//! CoinGecko market data collaborator.
//!
//! One attempt per request, then the configured delay, whatever the outcome.
//! The provider rate-limits aggressively and retries are out of scope here;
//! a failed request is reported once and the run continues with partial data
//! where it can.

use std::cmp::min;
use std::time::Duration;

use anyhow::{Result, bail};
use chrono::{DateTime, TimeZone, Utc};
use itertools::Itertools;
use reqwest::{Client, Url, header};
use serde::Deserialize;
use tokio::time::sleep;
use tracing::info;

use crate::error::StrategyError;
use crate::simulate::PriceSample;

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 4_000;

/// Market data capabilities the simulation runs consume. [`CoinGecko`] is the
/// real implementation; tests substitute a delay-free in-memory fake.
///
/// `fetch_spot_price` yields a positive price or fails; `fetch_price_series`
/// may legitimately return an empty series.
#[allow(async_fn_in_trait)]
pub trait PriceSeriesSource {
    async fn resolve_asset_id(&self, ticker: &str) -> Result<String>;
    async fn fetch_price_series(
        &self,
        asset_id: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<PriceSample>>;
    async fn fetch_spot_price(&self, asset_id: &str) -> Result<f64>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct CoinListEntry {
    pub id: String,
    pub symbol: String,
}

/// Row of `/coins/markets`, trimmed to what the ATH report needs.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketRow {
    pub symbol: String,
    pub name: String,
    pub market_cap_rank: Option<u32>,
    pub current_price: Option<f64>,
    pub ath: Option<f64>,
    pub ath_date: Option<DateTime<Utc>>,
}

/// Point of a `market_chart/range` response: `[timestamp_ms, price]`
#[derive(Debug, Clone, Deserialize)]
pub struct ChartPoint(#[serde(deserialize_with = "de_f64_or_i64")] f64, f64);

// Helper for timestamp that may arrive as f64 or i64
fn de_f64_or_i64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Num {
        F(f64),
        I(i64),
    }
    match Num::deserialize(deserializer)? {
        Num::F(v) => Ok(v),
        Num::I(v) => Ok(v as f64),
    }
}

#[derive(Debug, Deserialize)]
pub struct MarketChart {
    #[serde(default)]
    prices: Vec<ChartPoint>,
}

/// Normalize a chart response into time-ascending samples.
fn chart_to_samples(chart: MarketChart) -> Vec<PriceSample> {
    let mut samples: Vec<PriceSample> = chart
        .prices
        .into_iter()
        .filter_map(|ChartPoint(ts_ms, price)| {
            let ts = Utc.timestamp_opt((ts_ms / 1000.0) as i64, 0).single()?;
            Some(PriceSample { ts, price })
        })
        .collect();
    samples.sort_by_key(|s| s.ts);
    samples
}

/// HTTP client for the CoinGecko v3 API. Base URL, quote currency and the
/// mandatory inter-request delay are fixed at construction.
pub struct CoinGecko {
    client: Client,
    base_url: String,
    vs: String,
    delay: Duration,
}

impl CoinGecko {
    /// # Errors
    /// Fails when the API key is not a valid header value or the TLS client
    /// cannot be built.
    pub fn new(
        base_url: &str,
        vs: &str,
        delay: Duration,
        api_key: Option<&str>,
    ) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = api_key {
            headers.insert("x-cg-demo-api-key", header::HeaderValue::from_str(key)?);
        }
        let client = Client::builder()
            .default_headers(headers)
            .user_agent("crypto-dca/0.1 (rust)")
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            vs: vs.to_string(),
            delay,
        })
    }

    /// Single-attempt GET; always sleeps the configured delay afterwards.
    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: Url) -> Result<T> {
        info!("GET {url}");
        let resp = self.client.get(url.clone()).send().await;
        sleep(self.delay).await;
        let resp = resp?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("HTTP {status} from {url}; body: {body}");
        }
        Ok(resp.json::<T>().await?)
    }

    /// Top-N market rows by market cap, rank-sorted.
    ///
    /// # Errors
    /// Fails when any page request fails.
    pub async fn fetch_markets(&self, top_n: usize) -> Result<Vec<MarketRow>> {
        let base = format!("{}/coins/markets", self.base_url);
        let mut page = 1usize;
        let mut out: Vec<MarketRow> = vec![];
        while out.len() < top_n {
            let per = min(250, top_n - out.len());
            let url = Url::parse_with_params(
                &base,
                &[
                    ("vs_currency", self.vs.clone()),
                    ("order", "market_cap_desc".to_string()),
                    ("per_page", per.to_string()),
                    ("page", page.to_string()),
                ],
            )?;
            let batch: Vec<MarketRow> = self.get_json(url).await?;
            if batch.is_empty() {
                break;
            }
            out.extend(batch);
            page += 1;
        }
        let mut out: Vec<MarketRow> = out
            .into_iter()
            .sorted_by_key(|r| r.market_cap_rank.unwrap_or(u32::MAX))
            .collect();
        out.truncate(top_n);
        Ok(out)
    }
}

impl PriceSeriesSource for CoinGecko {
    /// Map a ticker symbol to the provider's asset id via `/coins/list`.
    /// Symbols are not unique; the last listing wins, matching the provider's
    /// own symbol index.
    async fn resolve_asset_id(&self, ticker: &str) -> Result<String> {
        let url = Url::parse(&format!("{}/coins/list", self.base_url))?;
        let coins: Vec<CoinListEntry> = self.get_json(url).await?;
        coins
            .into_iter()
            .filter(|c| c.symbol.eq_ignore_ascii_case(ticker))
            .last()
            .map(|c| c.id)
            .ok_or_else(|| StrategyError::UnknownTicker(ticker.to_string()).into())
    }

    async fn fetch_price_series(
        &self,
        asset_id: &str,
        from_ts: i64,
        to_ts: i64,
    ) -> Result<Vec<PriceSample>> {
        let url = Url::parse_with_params(
            &format!("{}/coins/{}/market_chart/range", self.base_url, asset_id),
            &[
                ("vs_currency", self.vs.to_string()),
                ("from", from_ts.to_string()),
                ("to", to_ts.to_string()),
            ],
        )?;
        let chart: MarketChart = self.get_json(url).await?;
        Ok(chart_to_samples(chart))
    }

    async fn fetch_spot_price(&self, asset_id: &str) -> Result<f64> {
        let url = Url::parse_with_params(
            &format!("{}/simple/price", self.base_url),
            &[("ids", asset_id), ("vs_currencies", self.vs.as_str())],
        )?;
        let val: serde_json::Value = self.get_json(url).await?;
        val.get(asset_id)
            .and_then(|v| v.get(&self.vs))
            .and_then(serde_json::Value::as_f64)
            .filter(|p| *p > 0.0)
            .ok_or_else(|| StrategyError::SpotUnavailable(asset_id.to_string()).into())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    /// In-memory [`PriceSeriesSource`] for command-level tests: no network,
    /// no delay.
    pub struct FakeSource {
        pub asset_id: Option<&'static str>,
        pub series: Vec<PriceSample>,
        pub spot: Option<f64>,
    }

    impl PriceSeriesSource for FakeSource {
        async fn resolve_asset_id(&self, ticker: &str) -> Result<String> {
            self.asset_id
                .map(str::to_string)
                .ok_or_else(|| StrategyError::UnknownTicker(ticker.to_string()).into())
        }

        async fn fetch_price_series(
            &self,
            _asset_id: &str,
            from_ts: i64,
            to_ts: i64,
        ) -> Result<Vec<PriceSample>> {
            Ok(self
                .series
                .iter()
                .copied()
                .filter(|s| s.ts.timestamp() >= from_ts && s.ts.timestamp() <= to_ts)
                .collect())
        }

        async fn fetch_spot_price(&self, asset_id: &str) -> Result<f64> {
            self.spot
                .ok_or_else(|| StrategyError::SpotUnavailable(asset_id.to_string()).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_chart_parses_int_and_float_timestamps() {
        let raw = r#"{"prices":[[1710892800000,67123.45],[1710979200000.0,68000.0]],"market_caps":[],"total_volumes":[]}"#;
        let chart: MarketChart = serde_json::from_str(raw).unwrap();
        let samples = chart_to_samples(chart);
        assert_eq!(samples.len(), 2);
        assert!(samples[0].ts < samples[1].ts);
        assert!((samples[0].price - 67123.45).abs() < 1e-9);
    }

    #[test]
    fn chart_samples_are_sorted_ascending() {
        let raw = r#"{"prices":[[1710979200000,2.0],[1710892800000,1.0]]}"#;
        let chart: MarketChart = serde_json::from_str(raw).unwrap();
        let samples = chart_to_samples(chart);
        assert!((samples[0].price - 1.0).abs() < 1e-12);
        assert!((samples[1].price - 2.0).abs() < 1e-12);
    }

    #[test]
    fn market_row_tolerates_missing_fields() {
        let raw = r#"{"id":"bitcoin","symbol":"btc","name":"Bitcoin","market_cap_rank":null,"current_price":67000.0,"ath":null,"ath_date":null}"#;
        let row: MarketRow = serde_json::from_str(raw).unwrap();
        assert_eq!(row.symbol, "btc");
        assert!(row.ath.is_none());
        assert!(row.market_cap_rank.is_none());
    }

    #[test]
    fn market_row_parses_ath_date() {
        let raw = r#"{"id":"bitcoin","symbol":"btc","name":"Bitcoin","market_cap_rank":1,"current_price":67000.0,"ath":69045.0,"ath_date":"2021-11-10T14:24:11.849Z"}"#;
        let row: MarketRow = serde_json::from_str(raw).unwrap();
        let ath_date = row.ath_date.unwrap();
        assert_eq!(ath_date.date_naive().to_string(), "2021-11-10");
    }
}
