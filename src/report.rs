//! Final report: valuation math and the printed run summary.

use chrono::NaiveDate;

use crate::simulate::SimulationState;

/// Present-day worth of a finished run. Fields are absent rather than NaN
/// when the inputs cannot support them: the value needs a spot quote, the
/// delta additionally needs a non-zero invested total.
#[derive(Debug, Clone, Copy, Default)]
pub struct Valuation {
    pub current_value: Option<f64>,
    pub delta_percent: Option<f64>,
}

/// Everything a finished run hands to the formatter.
#[derive(Debug)]
pub struct RunOutcome {
    pub state: SimulationState,
    pub valuation: Valuation,
}

pub fn compute_valuation(state: &SimulationState, spot_price: Option<f64>) -> Valuation {
    let current_value = spot_price.map(|p| state.accumulated_units * p);
    let delta_percent = current_value.and_then(|value| {
        (state.total_invested > 0.0)
            .then(|| (value - state.total_invested) / state.total_invested * 100.0)
    });
    Valuation {
        current_value,
        delta_percent,
    }
}

/// Console summary for both run commands. `policy_label`/`policy_value` carry
/// the strategy-specific line ("Interval: 2w" or "Step percentage: 1.5%").
#[allow(clippy::too_many_arguments)]
pub fn print_run_summary(
    ticker: &str,
    vs: &str,
    start: NaiveDate,
    end: NaiveDate,
    policy_label: &str,
    policy_value: &str,
    amount: f64,
    state: &SimulationState,
    valuation: &Valuation,
) {
    let vs = vs.to_uppercase();

    println!("\nStarting parameters:");
    println!("  {:<17} {start}", "Start date:");
    println!("  {:<17} {end}", "End date:");
    println!("  {:<17} {policy_value}", format!("{policy_label}:"));
    println!("  {:<17} {amount:.2} {vs} per purchase", "Amount:");
    println!("  {:<17} {ticker}", "Ticker:");
    println!();
    println!("{:<24} {}", "Purchases fired:", state.purchases);
    println!(
        "{:<24} {:.2} {vs}",
        "Total invested:", state.total_invested
    );
    println!(
        "{:<24} {:.8} {ticker}",
        "Total accumulated:", state.accumulated_units
    );
    if state.anomalies > 0 {
        println!("{:<24} {}", "Anomalous samples:", state.anomalies);
    }
    match valuation.current_value {
        Some(value) => println!("{:<24} {value:.2} {vs}", "Current value:"),
        None => println!("{:<24} unavailable", "Current value:"),
    }
    match valuation.delta_percent {
        Some(delta) => println!("{:<24} {delta:+.2}%", "Delta vs invested:"),
        None => println!("{:<24} unavailable", "Delta vs invested:"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::{PriceSample, SimulationState, TriggerPolicy, simulate};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn state_with(units: f64, invested: f64) -> SimulationState {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let series = [PriceSample {
            ts: Utc
                .from_utc_datetime(&start.and_hms_opt(12, 0, 0).unwrap()),
            price: invested / units,
        }];
        // drive the state through the simulator so totals stay consistent
        simulate(
            &series,
            &TriggerPolicy::CalendarInterval(crate::simulate::IntervalSpec {
                unit: crate::simulate::IntervalUnit::Days,
                count: 1,
            }),
            invested,
            SimulationState::new(start),
        )
    }

    #[test]
    fn valuation_needs_a_spot_quote() {
        let state = state_with(0.5, 100.0);
        let valuation = compute_valuation(&state, None);
        assert!(valuation.current_value.is_none());
        assert!(valuation.delta_percent.is_none());
    }

    #[test]
    fn valuation_computes_value_and_delta() {
        let state = state_with(0.5, 100.0);
        let valuation = compute_valuation(&state, Some(300.0));
        assert!((valuation.current_value.unwrap() - 150.0).abs() < 1e-9);
        assert!((valuation.delta_percent.unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn delta_is_absent_when_nothing_was_invested() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let state = SimulationState::new(start);
        let valuation = compute_valuation(&state, Some(300.0));
        // zero units value to zero, but a percent delta over zero invested
        // does not exist
        assert!((valuation.current_value.unwrap() - 0.0).abs() < 1e-12);
        assert!(valuation.delta_percent.is_none());
    }
}
