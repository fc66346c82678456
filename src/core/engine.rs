use tracing::debug;

use super::types::{
    CashFlowFields, ProductionPhase, ProjectResult, SimulationParameters, YearlyRecord,
};

#[derive(Debug)]
struct HorizonState {
    cumulative_produced: f64,
    npv: f64,
    years: Vec<YearlyRecord>,
}

pub fn production_phase(year: u32, params: &SimulationParameters) -> ProductionPhase {
    if year <= params.build_up_years {
        ProductionPhase::BuildUp
    } else if year <= plateau_end(params) {
        ProductionPhase::Plateau
    } else {
        ProductionPhase::Decline
    }
}

/// Production for `year` on the build-up / plateau / decline curve, clamped to
/// `[0, remaining_reserves]`.
pub fn production_rate(year: u32, remaining_reserves: f64, params: &SimulationParameters) -> f64 {
    let unclamped = match production_phase(year, params) {
        ProductionPhase::BuildUp => {
            // Only reachable for year 0 when there is no build-up phase.
            if params.build_up_years == 0 {
                0.0
            } else {
                params.max_production_rate * (year as f64 / params.build_up_years as f64)
            }
        }
        ProductionPhase::Plateau => params.max_production_rate,
        ProductionPhase::Decline => {
            let decline_years = year - plateau_end(params);
            params.max_production_rate * (1.0 - params.decline_rate).powi(exponent(decline_years))
        }
    };
    unclamped.min(remaining_reserves).max(0.0)
}

pub fn evaluate_cash_flow(
    production_rate: f64,
    params: &SimulationParameters,
    is_final_year: bool,
) -> CashFlowFields {
    let revenue = production_rate * params.oil_price_per_unit;
    let operating_cost = production_rate * params.operating_cost_per_unit;
    let gross_profit = revenue - operating_cost;
    let tax = gross_profit * params.tax_rate;
    let government_take = revenue * params.government_take_rate;
    let mut net_cash_flow = gross_profit - tax - government_take;
    if is_final_year {
        net_cash_flow -= params.decommissioning_cost;
    }

    CashFlowFields {
        revenue,
        operating_cost,
        gross_profit,
        tax,
        government_take,
        net_cash_flow,
    }
}

pub fn discount_factor(discount_rate: f64, year: u32) -> f64 {
    (1.0 + discount_rate).powi(exponent(year))
}

/// Simulates every year of the horizon and discounts the net cash flows.
///
/// Depletion is tracked on produced volume, so the NPV and the schedule always
/// describe the same production profile.
pub fn run_project(params: &SimulationParameters) -> ProjectResult {
    let initial = HorizonState {
        cumulative_produced: 0.0,
        npv: -params.initial_investment,
        years: Vec::with_capacity(params.horizon_years as usize),
    };

    let state = (1..=params.horizon_years).fold(initial, |mut state, year| {
        let remaining_reserves = params.total_recoverable_reserves - state.cumulative_produced;
        let rate = production_rate(year, remaining_reserves, params);
        let fields = evaluate_cash_flow(rate, params, year == params.horizon_years);
        let discounted = fields.net_cash_flow / discount_factor(params.discount_rate, year);

        state.cumulative_produced += rate;
        state.npv += discounted;
        state.years.push(YearlyRecord {
            year,
            phase: production_phase(year, params),
            production_rate: rate,
            revenue: fields.revenue,
            operating_cost: fields.operating_cost,
            gross_profit: fields.gross_profit,
            tax: fields.tax,
            government_take: fields.government_take,
            net_cash_flow: fields.net_cash_flow,
            discounted_net_cash_flow: discounted,
            cumulative_production: state.cumulative_produced,
        });
        state
    });

    debug!(
        horizon_years = params.horizon_years,
        npv = state.npv,
        total_production = state.cumulative_produced,
        "project simulated"
    );

    ProjectResult {
        years: state.years,
        npv: state.npv,
    }
}

pub fn npv(params: &SimulationParameters) -> f64 {
    run_project(params).npv
}

fn plateau_end(params: &SimulationParameters) -> u32 {
    params.build_up_years.saturating_add(params.plateau_years)
}

fn exponent(years: u32) -> i32 {
    i32::try_from(years).unwrap_or(i32::MAX)
}
