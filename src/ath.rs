//! `ath` subcommand: gap between current price and all-time high for the
//! top assets by market cap.

use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use tempfile::NamedTempFile;
use tracing::info;

use crate::AthArgs;
use crate::coingecko::{CoinGecko, MarketRow};

/// One line of the report. Delta fields are absent when the provider has no
/// ATH for the asset or the current price cannot serve as a divisor.
#[derive(Debug, Clone)]
pub struct AthRow {
    pub name: String,
    pub symbol: String,
    pub current_price: Option<f64>,
    pub ath: Option<f64>,
    pub ath_date: Option<DateTime<Utc>>,
    pub delta: Option<f64>,
    pub delta_percent: Option<f64>,
}

fn build_rows(markets: Vec<MarketRow>) -> Vec<AthRow> {
    markets
        .into_iter()
        .map(|m| {
            let delta = match (m.ath, m.current_price) {
                (Some(ath), Some(current)) => Some(ath - current),
                _ => None,
            };
            let delta_percent = match (m.ath, m.current_price) {
                (Some(ath), Some(current)) if current > 0.0 => {
                    Some((ath - current) / current * 100.0)
                }
                _ => None,
            };
            AthRow {
                name: m.name,
                symbol: m.symbol.to_uppercase(),
                current_price: m.current_price,
                ath: m.ath,
                ath_date: m.ath_date,
                delta,
                delta_percent,
            }
        })
        .collect()
}

fn fmt_price(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into())
}

fn fmt_date(v: Option<DateTime<Utc>>) -> String {
    v.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".into())
}

fn print_table(rows: &[AthRow], vs: &str) {
    let vs = vs.to_uppercase();
    println!(
        "{:<28} {:<8} {:>14} {:>14} {:>12} {:>14} {:>10}",
        "Name",
        "Symbol",
        format!("Price ({vs})"),
        format!("ATH ({vs})"),
        "ATH date",
        "Delta",
        "Delta %"
    );
    for r in rows {
        println!(
            "{:<28} {:<8} {:>14} {:>14} {:>12} {:>14} {:>10}",
            r.name,
            r.symbol,
            fmt_price(r.current_price),
            fmt_price(r.ath),
            fmt_date(r.ath_date),
            fmt_price(r.delta),
            r.delta_percent
                .map(|d| format!("{d:.2}%"))
                .unwrap_or_else(|| "-".into()),
        );
    }
}

/// Fresh CSV written to a temp file and renamed into place.
fn write_csv(rows: &[AthRow], out_path: &Path) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(out_path.parent().unwrap_or(Path::new(".")))?;
    {
        let mut wtr = WriterBuilder::new().from_writer(tmp.as_file_mut());
        wtr.write_record([
            "name",
            "symbol",
            "current_price",
            "ath",
            "ath_date",
            "delta",
            "delta_percent",
        ])?;
        for r in rows {
            wtr.write_record(&[
                r.name.clone(),
                r.symbol.clone(),
                r.current_price.map(|v| format!("{v:.8}")).unwrap_or_default(),
                r.ath.map(|v| format!("{v:.8}")).unwrap_or_default(),
                r.ath_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
                r.delta.map(|v| format!("{v:.8}")).unwrap_or_default(),
                r.delta_percent
                    .map(|v| format!("{v:.4}"))
                    .unwrap_or_default(),
            ])?;
        }
        wtr.flush()?;
    }
    tmp.persist(out_path)?;
    Ok(())
}

/// Entry point for the subcommand; expects defaults already applied.
///
/// # Errors
/// Fails when the markets request or the CSV export fails.
pub async fn execute(args: &AthArgs) -> Result<()> {
    let api_key = args
        .api_key
        .clone()
        .or_else(|| env::var("COINGECKO_API_KEY").ok());
    let source = CoinGecko::new(
        args.base_url.as_ref().unwrap(),
        args.vs.as_ref().unwrap(),
        Duration::from_millis(args.delay_ms.unwrap()),
        api_key.as_deref(),
    )?;

    let markets = source
        .fetch_markets(args.top_n.unwrap())
        .await
        .context("fetch market rows")?;
    let rows = build_rows(markets);
    print_table(&rows, args.vs.as_ref().unwrap());

    if let Some(path) = &args.out {
        write_csv(&rows, path)?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn market(current: Option<f64>, ath: Option<f64>) -> MarketRow {
        MarketRow {
            symbol: "btc".to_string(),
            name: "Bitcoin".to_string(),
            market_cap_rank: Some(1),
            current_price: current,
            ath,
            ath_date: None,
        }
    }

    #[test]
    fn delta_is_ath_minus_current() {
        let rows = build_rows(vec![market(Some(60_000.0), Some(69_000.0))]);
        assert!((rows[0].delta.unwrap() - 9_000.0).abs() < 1e-9);
        assert!((rows[0].delta_percent.unwrap() - 15.0).abs() < 1e-9);
        assert_eq!(rows[0].symbol, "BTC");
    }

    #[test]
    fn zero_current_price_leaves_percent_absent() {
        let rows = build_rows(vec![market(Some(0.0), Some(10.0))]);
        assert!((rows[0].delta.unwrap() - 10.0).abs() < 1e-9);
        assert!(rows[0].delta_percent.is_none());
    }

    #[test]
    fn missing_ath_leaves_deltas_absent() {
        let rows = build_rows(vec![market(Some(100.0), None)]);
        assert!(rows[0].delta.is_none());
        assert!(rows[0].delta_percent.is_none());
    }

    #[test]
    fn csv_export_round_trips_through_rename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ath.csv");
        let rows = build_rows(vec![market(Some(60_000.0), Some(69_000.0))]);
        write_csv(&rows, &path).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("name,symbol,"));
        assert!(body.contains("Bitcoin,BTC,60000.00000000,69000.00000000"));
    }
}
