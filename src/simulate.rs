//! Purchase simulation over a provider price series.
//!
//! Both strategies replay the series once, in timestamp order, and decide per
//! sample whether a fixed-fiat purchase fires. The two calendar cadences
//! anchor differently on purpose:
//!
//! - day/week intervals test `(date - run_start).days % count == 0` against a
//!   fixed grid that never moves, so purchases stay aligned to the run start
//!   regardless of how many samples were missing;
//! - month intervals advance a mutable anchor by exactly `count` months after
//!   each fire (never reset to the sample date), so purchases drift toward
//!   calendar month boundaries instead.
//!
//! The asymmetry is inherited behavior and is kept as-is.

use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};

use crate::error::StrategyError;

/// Single point of a price series: provider timestamp plus quote price.
#[derive(Debug, Clone, Copy)]
pub struct PriceSample {
    pub ts: DateTime<Utc>,
    pub price: f64,
}

impl PriceSample {
    pub fn date(&self) -> NaiveDate {
        self.ts.date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Days,
    Months,
}

/// Parsed purchase cadence. Week-denominated input is normalized to days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalSpec {
    pub unit: IntervalUnit,
    pub count: u32,
}

/// Parse an interval argument of the form `<n>d`, `<n>w` or `<n>m`.
///
/// # Errors
/// Rejects unknown unit suffixes, non-numeric counts and a count of zero.
pub fn parse_interval(spec: &str) -> Result<IntervalSpec, StrategyError> {
    let bad = || StrategyError::InvalidInterval(spec.to_string());
    if spec.len() < 2 || !spec.is_ascii() {
        return Err(bad());
    }
    let (digits, unit) = spec.split_at(spec.len() - 1);
    let count: u32 = digits.parse().map_err(|_| bad())?;
    if count == 0 {
        return Err(StrategyError::ZeroIntervalCount);
    }
    match unit {
        "d" => Ok(IntervalSpec {
            unit: IntervalUnit::Days,
            count,
        }),
        "w" => Ok(IntervalSpec {
            unit: IntervalUnit::Days,
            count: count.checked_mul(7).ok_or_else(bad)?,
        }),
        "m" => Ok(IntervalSpec {
            unit: IntervalUnit::Months,
            count,
        }),
        _ => Err(bad()),
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate, StrategyError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| StrategyError::InvalidDate(s.to_string()))
}

/// Inclusive simulation window.
#[derive(Debug, Clone, Copy)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Unix timestamp at the start of the first day.
    pub fn from_ts(&self) -> i64 {
        Utc.from_utc_datetime(&self.start.and_hms_opt(0, 0, 0).unwrap())
            .timestamp()
    }

    /// Unix timestamp at the end of the last day.
    pub fn to_ts(&self) -> i64 {
        Utc.from_utc_datetime(&self.end.and_hms_opt(23, 59, 59).unwrap())
            .timestamp()
    }
}

/// Resolve the CLI date pair; the end date defaults to today.
///
/// # Errors
/// Rejects malformed dates and an end date not after the start.
pub fn resolve_date_range(start: &str, end: Option<&str>) -> Result<DateRange, StrategyError> {
    let start = parse_date(start)?;
    let end = match end {
        Some(s) => parse_date(s)?,
        None => Utc::now().date_naive(),
    };
    if end <= start {
        return Err(StrategyError::EmptyDateRange { start, end });
    }
    Ok(DateRange { start, end })
}

/// When a purchase fires at a given sample.
#[derive(Debug, Clone, Copy)]
pub enum TriggerPolicy {
    /// Fixed calendar cadence.
    CalendarInterval(IntervalSpec),
    /// Fires when the price rises `step_percent` above the average cost basis.
    PriceStepUp { step_percent: f64 },
}

impl TriggerPolicy {
    /// # Errors
    /// A negative step percentage is a configuration error. Zero is valid and
    /// degenerates to "fire whenever the price is at or above average cost".
    pub fn step_up(step_percent: f64) -> Result<Self, StrategyError> {
        if step_percent < 0.0 {
            return Err(StrategyError::NegativeStepPercent(step_percent));
        }
        Ok(Self::PriceStepUp { step_percent })
    }
}

/// Running totals of one simulation. The final values are the result.
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub accumulated_units: f64,
    pub total_invested: f64,
    /// Purchases fired by the series replay (the step-up seed is not counted).
    pub purchases: u32,
    /// Non-positive price samples skipped mid-series.
    pub anomalies: u32,
    last_purchase_date: NaiveDate,
    anchor_date: NaiveDate,
    run_start: NaiveDate,
}

impl SimulationState {
    pub fn new(run_start: NaiveDate) -> Self {
        Self {
            accumulated_units: 0.0,
            total_invested: 0.0,
            purchases: 0,
            anomalies: 0,
            last_purchase_date: run_start.pred_opt().unwrap_or(run_start),
            anchor_date: run_start,
            run_start,
        }
    }

    /// State with the mandatory step-up seed purchase applied: `amount` spent
    /// at `spot_price` before the replay, establishing the cost basis.
    /// `spot_price` must be positive (the provider contract guarantees it).
    pub fn seeded(run_start: NaiveDate, amount: f64, spot_price: f64) -> Self {
        let mut state = Self::new(run_start);
        state.accumulated_units = amount / spot_price;
        state.total_invested = amount;
        state
    }

    /// Total fiat invested per unit held; absent while nothing is held.
    pub fn average_cost(&self) -> Option<f64> {
        (self.accumulated_units > 0.0).then(|| self.total_invested / self.accumulated_units)
    }

    pub fn last_purchase_date(&self) -> NaiveDate {
        self.last_purchase_date
    }
}

fn months_between(anchor: NaiveDate, date: NaiveDate) -> i64 {
    i64::from(date.year() - anchor.year()) * 12
        + i64::from(date.month() as i32 - anchor.month() as i32)
}

fn step_months(anchor: NaiveDate, count: u32) -> NaiveDate {
    // end-of-month days clamp (Jan 31 + 1m = Feb 29/28)
    anchor
        .checked_add_months(Months::new(count))
        .unwrap_or(anchor)
}

/// Replay `series` once, applying `policy` at every sample.
///
/// Exactly one purchase decision per sample, at most one fire per sample, and
/// at most one fire per calendar date (samples not strictly later than the
/// last purchase date are skipped). Non-positive prices are never divided by:
/// the sample is skipped and counted in [`SimulationState::anomalies`]. An
/// empty series returns the state unchanged; reporting "no data" is the
/// caller's job.
pub fn simulate(
    series: &[PriceSample],
    policy: &TriggerPolicy,
    amount: f64,
    mut state: SimulationState,
) -> SimulationState {
    for sample in series {
        let date = sample.date();
        if date <= state.last_purchase_date {
            continue;
        }
        if sample.price <= 0.0 {
            state.anomalies += 1;
            continue;
        }
        let fires = match policy {
            TriggerPolicy::CalendarInterval(spec) => match spec.unit {
                IntervalUnit::Days => {
                    (date - state.run_start).num_days() % i64::from(spec.count) == 0
                }
                IntervalUnit::Months => {
                    months_between(state.anchor_date, date) >= i64::from(spec.count)
                }
            },
            // percent-scaled comparison so an exact step rise over the basis
            // still fires (avg * (1 + step/100) rounds past an exact target)
            TriggerPolicy::PriceStepUp { step_percent } => state
                .average_cost()
                .is_some_and(|avg| sample.price * 100.0 >= avg * (100.0 + step_percent)),
        };
        if !fires {
            continue;
        }
        state.accumulated_units += amount / sample.price;
        state.total_invested += amount;
        state.purchases += 1;
        state.last_purchase_date = date;
        if let TriggerPolicy::CalendarInterval(spec) = policy
            && spec.unit == IntervalUnit::Months
        {
            state.anchor_date = step_months(state.anchor_date, spec.count);
        }
    }
    state
}
