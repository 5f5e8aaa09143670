//! `stepup` subcommand: buy on every configured percentage rise above the
//! running average cost basis.
//!
//! The strategy needs a cost basis before the replay, so the run opens with a
//! mandatory seed purchase at the current spot price. The spot is fetched
//! once and reused for the final valuation.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::StepUpArgs;
use crate::coingecko::{CoinGecko, PriceSeriesSource};
use crate::error::StrategyError;
use crate::report::{RunOutcome, compute_valuation, print_run_summary};
use crate::simulate::{self, DateRange, SimulationState, TriggerPolicy};

pub struct RunConfig {
    pub range: DateRange,
    pub policy: TriggerPolicy,
    pub amount: f64,
    pub ticker: String,
}

fn parse_config(args: &StepUpArgs) -> Result<RunConfig, StrategyError> {
    let range = simulate::resolve_date_range(&args.start, args.end.as_deref())?;
    let policy = TriggerPolicy::step_up(args.step_percent.unwrap())?;
    if args.amount <= 0.0 {
        return Err(StrategyError::NonPositiveAmount(args.amount));
    }
    Ok(RunConfig {
        range,
        policy,
        amount: args.amount,
        ticker: args.ticker.clone().unwrap(),
    })
}

/// Seed at the spot price, then replay the series. Without a spot quote the
/// cost basis is undefined and the run aborts; series problems only degrade
/// to the seed-only result.
pub async fn run<S: PriceSeriesSource>(source: &S, cfg: &RunConfig) -> Result<RunOutcome> {
    let asset_id = source.resolve_asset_id(&cfg.ticker).await?;
    info!("resolved ticker {} -> {}", cfg.ticker, asset_id);

    let spot = source
        .fetch_spot_price(&asset_id)
        .await
        .with_context(|| format!("seed purchase needs a spot price for {}", cfg.ticker))?;

    let series = match source
        .fetch_price_series(&asset_id, cfg.range.from_ts(), cfg.range.to_ts())
        .await
    {
        Ok(series) => series,
        Err(e) => {
            warn!("price series unavailable for {}: {e}", cfg.ticker);
            vec![]
        }
    };
    if series.is_empty() {
        warn!("no price samples for {} in the requested range", cfg.ticker);
    }

    let state = simulate::simulate(
        &series,
        &cfg.policy,
        cfg.amount,
        SimulationState::seeded(cfg.range.start, cfg.amount, spot),
    );
    if state.anomalies > 0 {
        warn!(
            "skipped {} non-positive price sample(s) for {}",
            state.anomalies, cfg.ticker
        );
    }

    let valuation = compute_valuation(&state, Some(spot));
    Ok(RunOutcome { state, valuation })
}

/// Entry point for the subcommand; expects defaults already applied.
///
/// # Errors
/// Config errors, an unknown ticker and a missing seed spot price abort the
/// run.
pub async fn execute(args: &StepUpArgs) -> Result<()> {
    let cfg = parse_config(args)?;
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

    let outcome = run(&source, &cfg).await?;
    print_run_summary(
        &cfg.ticker,
        args.vs.as_ref().unwrap(),
        cfg.range.start,
        cfg.range.end,
        "Step percentage",
        &format!("{}%", args.step_percent.unwrap()),
        cfg.amount,
        &outcome.state,
        &outcome.valuation,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coingecko::fake::FakeSource;
    use crate::simulate::PriceSample;
    use chrono::{Days, NaiveDate, TimeZone, Utc};

    fn cfg(start: NaiveDate, end: NaiveDate, step_percent: f64) -> RunConfig {
        RunConfig {
            range: DateRange { start, end },
            policy: TriggerPolicy::step_up(step_percent).unwrap(),
            amount: 10.0,
            ticker: "BTC".to_string(),
        }
    }

    fn daily_series(start: NaiveDate, prices: &[f64]) -> Vec<PriceSample> {
        prices
            .iter()
            .enumerate()
            .map(|(i, p)| PriceSample {
                ts: Utc.from_utc_datetime(
                    &(start + Days::new(i as u64)).and_hms_opt(9, 0, 0).unwrap(),
                ),
                price: *p,
            })
            .collect()
    }

    #[tokio::test]
    async fn seeded_run_matches_hand_computation() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = start + Days::new(4);
        let source = FakeSource {
            asset_id: Some("bitcoin"),
            series: daily_series(start, &[100.0, 100.0, 110.0, 121.0]),
            spot: Some(100.0),
        };
        let outcome = run(&source, &cfg(start, end, 10.0)).await.unwrap();
        let expected_units = 0.1 + 1.0 / 11.0 + 10.0 / 121.0;
        assert_eq!(outcome.state.purchases, 2);
        assert!((outcome.state.total_invested - 30.0).abs() < 1e-9);
        assert!((outcome.state.accumulated_units - expected_units).abs() < 1e-12);
        // valued at the same spot used for the seed
        let value = outcome.valuation.current_value.unwrap();
        assert!((value - expected_units * 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_seed_spot_aborts_the_run() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let source = FakeSource {
            asset_id: Some("bitcoin"),
            series: daily_series(start, &[100.0; 5]),
            spot: None,
        };
        let err = run(&source, &cfg(start, start + Days::new(4), 10.0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("seed purchase"));
    }

    #[tokio::test]
    async fn empty_series_still_reports_the_seed() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let source = FakeSource {
            asset_id: Some("bitcoin"),
            series: vec![],
            spot: Some(100.0),
        };
        let outcome = run(&source, &cfg(start, start + Days::new(4), 10.0))
            .await
            .unwrap();
        assert_eq!(outcome.state.purchases, 0);
        assert!((outcome.state.total_invested - 10.0).abs() < 1e-9);
        assert!((outcome.valuation.current_value.unwrap() - 10.0).abs() < 1e-9);
        assert!((outcome.valuation.delta_percent.unwrap() - 0.0).abs() < 1e-9);
    }

    #[test]
    fn config_rejects_negative_step() {
        let args = StepUpArgs {
            start: "2024-01-01".to_string(),
            end: Some("2024-02-01".to_string()),
            step_percent: Some(-2.0),
            amount: 10.0,
            ticker: Some("BTC".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            parse_config(&args),
            Err(StrategyError::NegativeStepPercent(_))
        ));
    }
}
