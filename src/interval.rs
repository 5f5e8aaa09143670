//! `interval` subcommand: dollar-cost averaging on a fixed calendar cadence.

use std::env;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::IntervalArgs;
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

/// Validate the CLI configuration. Runs before any network call; every
/// rejection here is a [`StrategyError`] config kind.
fn parse_config(args: &IntervalArgs) -> Result<RunConfig, StrategyError> {
    let range = simulate::resolve_date_range(&args.start, args.end.as_deref())?;
    let policy = TriggerPolicy::CalendarInterval(simulate::parse_interval(&args.interval)?);
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

/// Resolve, fetch, replay, value. An unknown ticker aborts; a failed or empty
/// series degrades to zero purchases; a failed spot request degrades the
/// valuation to "unavailable".
pub async fn run<S: PriceSeriesSource>(source: &S, cfg: &RunConfig) -> Result<RunOutcome> {
    let asset_id = source.resolve_asset_id(&cfg.ticker).await?;
    info!("resolved ticker {} -> {}", cfg.ticker, asset_id);

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
        SimulationState::new(cfg.range.start),
    );
    if state.anomalies > 0 {
        warn!(
            "skipped {} non-positive price sample(s) for {}",
            state.anomalies, cfg.ticker
        );
    }

    let spot = match source.fetch_spot_price(&asset_id).await {
        Ok(price) => Some(price),
        Err(e) => {
            warn!("spot price unavailable for {}: {e}", cfg.ticker);
            None
        }
    };
    let valuation = compute_valuation(&state, spot);
    Ok(RunOutcome { state, valuation })
}

/// Entry point for the subcommand; expects defaults already applied.
///
/// # Errors
/// Config errors, an unknown ticker and client construction failures abort
/// the run. Data-availability problems only degrade the report.
pub async fn execute(args: &IntervalArgs) -> Result<()> {
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
        "Interval",
        &args.interval,
        cfg.amount,
        &outcome.state,
        &outcome.valuation,
    );
    Ok(())
}
