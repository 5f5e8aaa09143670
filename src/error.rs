/// Error kinds a run can surface before or during simulation.
///
/// Config variants are rejected before any network call. `UnknownTicker`
/// aborts a run before simulation. `SpotUnavailable` is fatal only for the
/// step-up seed purchase; at valuation time a missing spot just degrades the
/// report instead of raising.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("invalid interval '{0}': expected <n>d, <n>w or <n>m (e.g. 7d, 2w, 1m)")]
    InvalidInterval(String),

    #[error("interval count must be positive")]
    ZeroIntervalCount,

    #[error("invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("end date {end} is not after start date {start}")]
    EmptyDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("purchase amount must be positive, got {0}")]
    NonPositiveAmount(f64),

    #[error("step percentage must not be negative, got {0}")]
    NegativeStepPercent(f64),

    #[error("ticker '{0}' is not listed by the provider")]
    UnknownTicker(String),

    #[error("no spot price available for '{0}'")]
    SpotUnavailable(String),
}
