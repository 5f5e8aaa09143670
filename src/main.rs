use anyhow::Result;
use crypto_dca::coingecko::{DEFAULT_BASE_URL, DEFAULT_REQUEST_DELAY_MS};
use crypto_dca::{AthArgs, IntervalArgs, StepUpArgs, ath, interval, stepup};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Backtest fixed-calendar-interval DCA purchases
    Interval(IntervalArgs),
    /// Backtest step-up purchases triggered by price rises above average cost
    Stepup(StepUpArgs),
    /// Report the gap between current price and all-time high for top assets
    Ath(AthArgs),
}

fn apply_interval_defaults(args: &mut IntervalArgs) {
    if args.ticker.is_none() {
        args.ticker = Some("BTC".to_string());
    }
    if args.vs.is_none() {
        args.vs = Some("usd".to_string());
    }
    if args.delay_ms.is_none() {
        args.delay_ms = Some(DEFAULT_REQUEST_DELAY_MS);
    }
    if args.base_url.is_none() {
        args.base_url = Some(DEFAULT_BASE_URL.to_string());
    }
}

fn apply_stepup_defaults(args: &mut StepUpArgs) {
    if args.step_percent.is_none() {
        args.step_percent = Some(1.0);
    }
    if args.ticker.is_none() {
        args.ticker = Some("BTC".to_string());
    }
    if args.vs.is_none() {
        args.vs = Some("usd".to_string());
    }
    if args.delay_ms.is_none() {
        args.delay_ms = Some(DEFAULT_REQUEST_DELAY_MS);
    }
    if args.base_url.is_none() {
        args.base_url = Some(DEFAULT_BASE_URL.to_string());
    }
}

fn apply_ath_defaults(args: &mut AthArgs) {
    if args.top_n.is_none() {
        args.top_n = Some(100);
    }
    if args.vs.is_none() {
        args.vs = Some("usd".to_string());
    }
    if args.delay_ms.is_none() {
        args.delay_ms = Some(DEFAULT_REQUEST_DELAY_MS);
    }
    if args.base_url.is_none() {
        args.base_url = Some(DEFAULT_BASE_URL.to_string());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();
    match args.command {
        Command::Interval(mut interval_args) => {
            apply_interval_defaults(&mut interval_args);
            interval::execute(&interval_args).await?;
        }
        Command::Stepup(mut stepup_args) => {
            apply_stepup_defaults(&mut stepup_args);
            stepup::execute(&stepup_args).await?;
        }
        Command::Ath(mut ath_args) => {
            apply_ath_defaults(&mut ath_args);
            ath::execute(&ath_args).await?;
        }
    }
    Ok(())
}
