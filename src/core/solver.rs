use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

use super::{SimulationParameters, npv};

/// Upper bound on bisection steps accepted from callers.
pub const MAX_ITERATIONS: u32 = 1_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BreakevenTarget {
    /// Oil price per unit at which the NPV is zero.
    OilPrice,
    /// Discount rate at which the NPV is zero (internal rate of return).
    DiscountRate,
}

#[derive(Debug, Clone, Copy)]
pub struct BreakevenConfig {
    pub target: BreakevenTarget,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl BreakevenConfig {
    pub fn for_target(target: BreakevenTarget) -> Self {
        let (search_min, search_max, tolerance) = match target {
            BreakevenTarget::OilPrice => (0.0, 500.0, 0.01),
            BreakevenTarget::DiscountRate => (0.0, 1.0, 1e-6),
        };
        Self {
            target,
            search_min,
            search_max,
            tolerance,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakevenIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub npv: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakevenResult {
    pub target: BreakevenTarget,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub solved_value: Option<f64>,
    pub npv_at_solution: Option<f64>,
    pub iterations: Vec<BreakevenIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum SolverError {
    #[error("search bounds must be finite")]
    NonFiniteBounds,
    #[error("search_max must be greater than search_min")]
    EmptyInterval,
    #[error("tolerance must be > 0")]
    InvalidTolerance,
    #[error("max_iterations must be > 0")]
    NoIterations,
    #[error("max_iterations must be <= {max}")]
    TooManyIterations { max: u32 },
    #[error("discount rate search_min must be > -1")]
    DiscountRateBelowMinusOne,
}

/// Bisects `config.target` until the project NPV crosses zero.
///
/// The interval must bracket a sign change of the NPV; otherwise the result
/// is reported infeasible with no solved value.
pub fn solve_breakeven(
    params: &SimulationParameters,
    config: BreakevenConfig,
) -> Result<BreakevenResult, SolverError> {
    validate_config(config)?;

    let low_npv = evaluate_candidate(params, config.target, config.search_min);
    let high_npv = evaluate_candidate(params, config.target, config.search_max);

    let mut iterations = Vec::new();
    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_npv == 0.0 {
        solved_value = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "NPV is already zero at the lower search bound.".to_string();
    } else if high_npv == 0.0 {
        solved_value = Some(config.search_max);
        converged = true;
        feasible = true;
        message = "NPV is already zero at the upper search bound.".to_string();
    } else if !(low_npv.is_finite() && high_npv.is_finite())
        || low_npv.signum() == high_npv.signum()
    {
        feasible = false;
        message = "NPV does not change sign within the search bounds.".to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut lo_npv = low_npv;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let mid_npv = evaluate_candidate(params, config.target, mid);
            trace!(iteration = it, lo, hi, mid, npv = mid_npv, "breakeven step");
            iterations.push(BreakevenIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_value: mid,
                npv: mid_npv,
            });

            if mid_npv == 0.0 {
                lo = mid;
                hi = mid;
            } else if mid_npv.signum() == lo_npv.signum() {
                lo = mid;
                lo_npv = mid_npv;
            } else {
                hi = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_value = Some((lo + hi) * 0.5);
        feasible = true;
        message = if converged {
            "Solved breakeven value.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    let npv_at_solution =
        solved_value.map(|value| evaluate_candidate(params, config.target, value));
    debug!(
        breakeven_target = ?config.target,
        solved_value = ?solved_value,
        converged,
        feasible,
        iterations = iterations.len(),
        "breakeven solve finished"
    );

    Ok(BreakevenResult {
        target: config.target,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        solved_value,
        npv_at_solution,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn evaluate_candidate(
    base: &SimulationParameters,
    target: BreakevenTarget,
    candidate_value: f64,
) -> f64 {
    let mut params = *base;
    match target {
        BreakevenTarget::OilPrice => params.oil_price_per_unit = candidate_value,
        BreakevenTarget::DiscountRate => params.discount_rate = candidate_value,
    }
    npv(&params)
}

fn validate_config(config: BreakevenConfig) -> Result<(), SolverError> {
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err(SolverError::NonFiniteBounds);
    }
    if config.search_max <= config.search_min {
        return Err(SolverError::EmptyInterval);
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err(SolverError::InvalidTolerance);
    }
    if config.max_iterations == 0 {
        return Err(SolverError::NoIterations);
    }
    if config.max_iterations > MAX_ITERATIONS {
        return Err(SolverError::TooManyIterations {
            max: MAX_ITERATIONS,
        });
    }
    if config.target == BreakevenTarget::DiscountRate && config.search_min <= -1.0 {
        return Err(SolverError::DiscountRateBelowMinusOne);
    }
    Ok(())
}
