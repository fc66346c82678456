mod engine;
mod solver;
mod types;

pub use engine::{
    discount_factor, evaluate_cash_flow, npv, production_phase, production_rate, run_project,
};
pub use solver::{
    BreakevenConfig, BreakevenIteration, BreakevenResult, BreakevenTarget, MAX_ITERATIONS,
    SolverError, solve_breakeven,
};
pub use types::{
    CashFlowFields, ProductionPhase, ProjectResult, ScheduleColumn, ScheduleTotals,
    SimulationParameters, YearlyRecord,
};
