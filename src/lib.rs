pub mod ath;
pub mod coingecko;
pub mod error;
pub mod interval;
pub mod report;
pub mod simulate;
pub mod stepup;

use clap::Parser;
use std::path::PathBuf;

/// Backtests dollar-cost averaging on a fixed calendar interval.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about)]
pub struct IntervalArgs {
    /// Start date (inclusive), format YYYY-MM-DD
    #[arg(short, long)]
    pub start: String,

    /// End date, format YYYY-MM-DD. Defaults to today.
    #[arg(short, long)]
    pub end: Option<String>,

    /// Purchase cadence: <n>d, <n>w or <n>m. Example: 1m for monthly, 2w for bi-weekly.
    #[arg(short, long)]
    pub interval: String,

    /// Fiat amount per purchase
    #[arg(short, long)]
    pub amount: f64,

    /// Asset ticker (defaults to BTC)
    #[arg(short, long)]
    pub ticker: Option<String>,

    /// VS currency (e.g., usd, eur, krw)
    #[arg(long)]
    pub vs: Option<String>,

    /// Delay (ms) after each provider request, to respect rate limits
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// CoinGecko API key (or set COINGECKO_API_KEY env)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Provider base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Backtests step-up buying: a purchase each time the price rises a given
/// percentage above the running average cost basis.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about)]
pub struct StepUpArgs {
    /// Start date (inclusive), format YYYY-MM-DD
    #[arg(short, long)]
    pub start: String,

    /// End date, format YYYY-MM-DD. Defaults to today.
    #[arg(short, long)]
    pub end: Option<String>,

    /// Step percentage per purchase. Example: 1 for a 1% rise. Zero buys at
    /// or above the average cost.
    #[arg(short = 'p', long)]
    pub step_percent: Option<f64>,

    /// Fiat amount per purchase
    #[arg(short, long)]
    pub amount: f64,

    /// Asset ticker (defaults to BTC)
    #[arg(short, long)]
    pub ticker: Option<String>,

    /// VS currency (e.g., usd, eur, krw)
    #[arg(long)]
    pub vs: Option<String>,

    /// Delay (ms) after each provider request, to respect rate limits
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// CoinGecko API key (or set COINGECKO_API_KEY env)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Provider base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

/// Reports the gap between current price and all-time high for the top
/// assets by market cap.
#[derive(Parser, Debug, Clone, Default)]
#[command(version, about)]
pub struct AthArgs {
    /// Number of top coins by market cap to report
    #[arg(long)]
    pub top_n: Option<usize>,

    /// VS currency (e.g., usd, eur, krw)
    #[arg(long)]
    pub vs: Option<String>,

    /// Also write the table as CSV to this path
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Delay (ms) after each provider request, to respect rate limits
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// CoinGecko API key (or set COINGECKO_API_KEY env)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Provider base URL
    #[arg(long)]
    pub base_url: Option<String>,
}
