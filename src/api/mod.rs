use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    BreakevenConfig, BreakevenResult, BreakevenTarget, ProjectResult, ScheduleColumn,
    ScheduleTotals, SimulationParameters, SolverError, YearlyRecord, run_project,
    solve_breakeven,
};

mod report;

pub use report::{render_breakeven, render_schedule};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

const DEFAULT_INITIAL_INVESTMENT: f64 = 1_000_000.0;
const DEFAULT_OIL_PRICE: f64 = 70.0;
const DEFAULT_OPERATING_COST: f64 = 35.0;
const DEFAULT_DISCOUNT_RATE: f64 = 0.10;
const DEFAULT_TAX_RATE: f64 = 0.15;
const DEFAULT_GOVERNMENT_TAKE: f64 = 0.25;
const DEFAULT_OOIP: f64 = 12_000_000.0;
const DEFAULT_RECOVERY_RATE: f64 = 0.30;
const DEFAULT_DECOMMISSIONING_COST: f64 = 500_000.0;
const DEFAULT_YEARS: u32 = 20;
const DEFAULT_MAX_PRODUCTION_RATE: f64 = 125_000.0;
const DEFAULT_BUILD_UP_YEARS: u32 = 3;
const DEFAULT_PLATEAU_YEARS: u32 = 6;
const DEFAULT_DECLINE_RATE: f64 = 0.10;

const MIN_UNIT_PRICE: f64 = 1.0;
const MIN_OOIP: f64 = 1_000.0;
const MAX_YEARS: u32 = 100;

#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("{flag} must be a finite number")]
    NonFinite { flag: &'static str },
    #[error("{flag} must be >= {min}")]
    BelowMinimum { flag: &'static str, min: f64 },
    #[error("{flag} must be between {min} and {max}")]
    OutOfRange {
        flag: &'static str,
        min: f64,
        max: f64,
    },
    #[error("{flag} must be between 1 and {max}")]
    InvalidHorizon { flag: &'static str, max: u32 },
    #[error("{flag} must be <= --years ({years})")]
    PhaseExceedsHorizon { flag: &'static str, years: u32 },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid parameters: {0}")]
    Parameters(#[from] ParameterError),
    #[error("invalid breakeven search: {0}")]
    Solver(#[from] SolverError),
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliBreakevenTarget {
    OilPrice,
    DiscountRate,
}

impl From<CliBreakevenTarget> for BreakevenTarget {
    fn from(value: CliBreakevenTarget) -> Self {
        match value {
            CliBreakevenTarget::OilPrice => BreakevenTarget::OilPrice,
            CliBreakevenTarget::DiscountRate => BreakevenTarget::DiscountRate,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiBreakevenTarget {
    #[serde(alias = "oilPrice", alias = "oil_price", alias = "price")]
    OilPrice,
    #[serde(alias = "discountRate", alias = "discount_rate", alias = "irr")]
    DiscountRate,
}

impl From<ApiBreakevenTarget> for BreakevenTarget {
    fn from(value: ApiBreakevenTarget) -> Self {
        match value {
            ApiBreakevenTarget::OilPrice => BreakevenTarget::OilPrice,
            ApiBreakevenTarget::DiscountRate => BreakevenTarget::DiscountRate,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "oil-npv",
    about = "Quick NPV screening for oil-production assets (build-up, plateau, decline)"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate the production profile and print the annual schedule and NPV.
    Run {
        #[command(flatten)]
        screening: ScreeningArgs,
        #[arg(long, help = "Print the JSON response instead of a table")]
        json: bool,
    },
    /// Solve for the oil price or discount rate at which the NPV is zero.
    Breakeven {
        #[command(flatten)]
        screening: ScreeningArgs,
        #[arg(long, value_enum, default_value_t = CliBreakevenTarget::OilPrice)]
        target: CliBreakevenTarget,
        #[arg(long, allow_negative_numbers = true)]
        search_min: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        search_max: Option<f64>,
        #[arg(long)]
        tolerance: Option<f64>,
        #[arg(long)]
        max_iterations: Option<u32>,
        #[arg(long, help = "Print the JSON result instead of a summary")]
        json: bool,
    },
    /// Serve the web page and JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct ScreeningArgs {
    #[arg(long, default_value_t = DEFAULT_INITIAL_INVESTMENT, help = "Initial investment (USD)")]
    initial_investment: f64,
    #[arg(long, default_value_t = DEFAULT_OIL_PRICE, help = "Oil price per barrel (USD)")]
    oil_price: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_OPERATING_COST,
        help = "Operating cost per barrel (USD)"
    )]
    operating_cost: f64,
    #[arg(long, default_value_t = DEFAULT_DISCOUNT_RATE, help = "Discount rate as a fraction")]
    discount_rate: f64,
    #[arg(long, default_value_t = DEFAULT_TAX_RATE, help = "Tax rate on gross profit")]
    tax_rate: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_GOVERNMENT_TAKE,
        help = "Government take as a fraction of revenue"
    )]
    government_take: f64,
    #[arg(long, default_value_t = DEFAULT_OOIP, help = "Original oil in place (barrels)")]
    ooip: f64,
    #[arg(long, default_value_t = DEFAULT_RECOVERY_RATE, help = "Recovery factor applied to OOIP")]
    recovery_rate: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_DECOMMISSIONING_COST,
        help = "Decommissioning cost charged in the final year (USD)"
    )]
    decommissioning_cost: f64,
    #[arg(long, default_value_t = DEFAULT_YEARS, help = "Total project life (years)")]
    years: u32,
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_PRODUCTION_RATE,
        help = "Plateau production rate (barrels per year)"
    )]
    max_production_rate: f64,
    #[arg(long, default_value_t = DEFAULT_BUILD_UP_YEARS)]
    build_up_years: u32,
    #[arg(long, default_value_t = DEFAULT_PLATEAU_YEARS)]
    plateau_years: u32,
    #[arg(long, default_value_t = DEFAULT_DECLINE_RATE, help = "Annual decline rate as a fraction")]
    decline_rate: f64,
}

impl Default for ScreeningArgs {
    fn default() -> Self {
        Self {
            initial_investment: DEFAULT_INITIAL_INVESTMENT,
            oil_price: DEFAULT_OIL_PRICE,
            operating_cost: DEFAULT_OPERATING_COST,
            discount_rate: DEFAULT_DISCOUNT_RATE,
            tax_rate: DEFAULT_TAX_RATE,
            government_take: DEFAULT_GOVERNMENT_TAKE,
            ooip: DEFAULT_OOIP,
            recovery_rate: DEFAULT_RECOVERY_RATE,
            decommissioning_cost: DEFAULT_DECOMMISSIONING_COST,
            years: DEFAULT_YEARS,
            max_production_rate: DEFAULT_MAX_PRODUCTION_RATE,
            build_up_years: DEFAULT_BUILD_UP_YEARS,
            plateau_years: DEFAULT_PLATEAU_YEARS,
            decline_rate: DEFAULT_DECLINE_RATE,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    initial_investment: Option<f64>,
    oil_price: Option<f64>,
    operating_cost: Option<f64>,
    discount_rate: Option<f64>,
    tax_rate: Option<f64>,
    government_take: Option<f64>,
    ooip: Option<f64>,
    recovery_rate: Option<f64>,
    decommissioning_cost: Option<f64>,
    years: Option<u32>,
    max_production_rate: Option<f64>,
    build_up_years: Option<u32>,
    plateau_years: Option<u32>,
    decline_rate: Option<f64>,
}

/// Screening fields are repeated rather than flattened so the same struct
/// deserializes from a query string.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BreakevenPayload {
    initial_investment: Option<f64>,
    oil_price: Option<f64>,
    operating_cost: Option<f64>,
    discount_rate: Option<f64>,
    tax_rate: Option<f64>,
    government_take: Option<f64>,
    ooip: Option<f64>,
    recovery_rate: Option<f64>,
    decommissioning_cost: Option<f64>,
    years: Option<u32>,
    max_production_rate: Option<f64>,
    build_up_years: Option<u32>,
    plateau_years: Option<u32>,
    decline_rate: Option<f64>,
    target: Option<ApiBreakevenTarget>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

impl BreakevenPayload {
    fn screening(&self) -> SimulatePayload {
        SimulatePayload {
            initial_investment: self.initial_investment,
            oil_price: self.oil_price,
            operating_cost: self.operating_cost,
            discount_rate: self.discount_rate,
            tax_rate: self.tax_rate,
            government_take: self.government_take,
            ooip: self.ooip,
            recovery_rate: self.recovery_rate,
            decommissioning_cost: self.decommissioning_cost,
            years: self.years,
            max_production_rate: self.max_production_rate,
            build_up_years: self.build_up_years,
            plateau_years: self.plateau_years,
            decline_rate: self.decline_rate,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartResponse {
    column: ScheduleColumn,
    label: &'static str,
    y_axis_min: f64,
    y_axis_max: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    parameters: SimulationParameters,
    npv: f64,
    total_recoverable_reserves: f64,
    total_production: f64,
    years: Vec<YearlyRecord>,
    totals: ScheduleTotals,
    charts: Vec<ChartResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BreakevenResponse {
    parameters: SimulationParameters,
    base_npv: f64,
    breakeven: BreakevenResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Maps the screening inputs onto validated simulation parameters.
///
/// Recoverable reserves are OOIP times the recovery factor.
pub fn build_parameters(args: &ScreeningArgs) -> Result<SimulationParameters, ParameterError> {
    for (flag, value) in [
        ("--initial-investment", args.initial_investment),
        ("--oil-price", args.oil_price),
        ("--operating-cost", args.operating_cost),
        ("--discount-rate", args.discount_rate),
        ("--tax-rate", args.tax_rate),
        ("--government-take", args.government_take),
        ("--ooip", args.ooip),
        ("--recovery-rate", args.recovery_rate),
        ("--decommissioning-cost", args.decommissioning_cost),
        ("--max-production-rate", args.max_production_rate),
        ("--decline-rate", args.decline_rate),
    ] {
        if !value.is_finite() {
            return Err(ParameterError::NonFinite { flag });
        }
    }

    for (flag, value, min) in [
        ("--initial-investment", args.initial_investment, 0.0),
        ("--oil-price", args.oil_price, MIN_UNIT_PRICE),
        ("--operating-cost", args.operating_cost, MIN_UNIT_PRICE),
        ("--ooip", args.ooip, MIN_OOIP),
        ("--decommissioning-cost", args.decommissioning_cost, 0.0),
        ("--max-production-rate", args.max_production_rate, 0.0),
    ] {
        if value < min {
            return Err(ParameterError::BelowMinimum { flag, min });
        }
    }

    for (flag, value) in [
        ("--discount-rate", args.discount_rate),
        ("--tax-rate", args.tax_rate),
        ("--government-take", args.government_take),
        ("--recovery-rate", args.recovery_rate),
        ("--decline-rate", args.decline_rate),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ParameterError::OutOfRange {
                flag,
                min: 0.0,
                max: 1.0,
            });
        }
    }

    if !(1..=MAX_YEARS).contains(&args.years) {
        return Err(ParameterError::InvalidHorizon {
            flag: "--years",
            max: MAX_YEARS,
        });
    }

    for (flag, value) in [
        ("--build-up-years", args.build_up_years),
        ("--plateau-years", args.plateau_years),
    ] {
        if value > args.years {
            return Err(ParameterError::PhaseExceedsHorizon {
                flag,
                years: args.years,
            });
        }
    }

    Ok(SimulationParameters {
        horizon_years: args.years,
        max_production_rate: args.max_production_rate,
        build_up_years: args.build_up_years,
        plateau_years: args.plateau_years,
        decline_rate: args.decline_rate,
        total_recoverable_reserves: args.ooip * args.recovery_rate,
        oil_price_per_unit: args.oil_price,
        operating_cost_per_unit: args.operating_cost,
        tax_rate: args.tax_rate,
        government_take_rate: args.government_take,
        decommissioning_cost: args.decommissioning_cost,
        initial_investment: args.initial_investment,
        discount_rate: args.discount_rate,
    })
}

pub async fn run_cli(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Command::Run { screening, json } => {
            let params = build_parameters(&screening)?;
            let result = run_project(&params);
            if json {
                let response = build_simulate_response(&params, &result);
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print!("{}", render_schedule(&params, &result));
            }
            Ok(())
        }
        Command::Breakeven {
            screening,
            target,
            search_min,
            search_max,
            tolerance,
            max_iterations,
            json,
        } => {
            let params = build_parameters(&screening)?;
            let mut config = BreakevenConfig::for_target(target.into());
            if let Some(v) = search_min {
                config.search_min = v;
            }
            if let Some(v) = search_max {
                config.search_max = v;
            }
            if let Some(v) = tolerance {
                config.tolerance = v;
            }
            if let Some(v) = max_iterations {
                config.max_iterations = v;
            }
            let response = build_breakeven_response(&params, config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print!("{}", render_breakeven(&response.breakeven, response.base_npv));
            }
            Ok(())
        }
        Command::Serve { port } => Ok(run_http_server(port).await?),
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router();

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "oil NPV screening API listening");
    info!("local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

fn router() -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/breakeven",
            get(breakeven_get_handler).post(breakeven_post_handler),
        )
        .fallback(not_found_handler)
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    query: Result<Query<SimulatePayload>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(payload)) => simulate_handler_impl(payload),
        Err(rejection) => rejected_request(&rejection.body_text()),
    }
}

async fn simulate_post_handler(
    body: Result<Json<SimulatePayload>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(payload)) => simulate_handler_impl(payload),
        Err(rejection) => rejected_request(&rejection.body_text()),
    }
}

fn rejected_request(msg: &str) -> Response {
    warn!(error = %msg, "malformed request payload");
    error_response(StatusCode::BAD_REQUEST, msg)
}

fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let params = match parameters_from_payload(&payload) {
        Ok(params) => params,
        Err(err) => {
            warn!(error = %err, "rejected simulate request");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    let result = run_project(&params);
    json_response(StatusCode::OK, build_simulate_response(&params, &result))
}

async fn breakeven_get_handler(
    query: Result<Query<BreakevenPayload>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(payload)) => breakeven_handler_impl(payload),
        Err(rejection) => rejected_request(&rejection.body_text()),
    }
}

async fn breakeven_post_handler(
    body: Result<Json<BreakevenPayload>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(payload)) => breakeven_handler_impl(payload),
        Err(rejection) => rejected_request(&rejection.body_text()),
    }
}

fn breakeven_handler_impl(payload: BreakevenPayload) -> Response {
    let params = match parameters_from_payload(&payload.screening()) {
        Ok(params) => params,
        Err(err) => {
            warn!(error = %err, "rejected breakeven request");
            return error_response(StatusCode::BAD_REQUEST, &err.to_string());
        }
    };

    let target = payload
        .target
        .map(BreakevenTarget::from)
        .unwrap_or(BreakevenTarget::OilPrice);
    let mut config = BreakevenConfig::for_target(target);
    if let Some(v) = payload.search_min {
        config.search_min = v;
    }
    if let Some(v) = payload.search_max {
        config.search_max = v;
    }
    if let Some(v) = payload.tolerance {
        config.tolerance = v;
    }
    if let Some(v) = payload.max_iterations {
        config.max_iterations = v;
    }

    match build_breakeven_response(&params, config) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(err) => {
            warn!(error = %err, "rejected breakeven search");
            error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn parameters_from_payload(
    payload: &SimulatePayload,
) -> Result<SimulationParameters, ParameterError> {
    let mut args = ScreeningArgs::default();

    if let Some(v) = payload.initial_investment {
        args.initial_investment = v;
    }
    if let Some(v) = payload.oil_price {
        args.oil_price = v;
    }
    if let Some(v) = payload.operating_cost {
        args.operating_cost = v;
    }
    if let Some(v) = payload.discount_rate {
        args.discount_rate = v;
    }
    if let Some(v) = payload.tax_rate {
        args.tax_rate = v;
    }
    if let Some(v) = payload.government_take {
        args.government_take = v;
    }
    if let Some(v) = payload.ooip {
        args.ooip = v;
    }
    if let Some(v) = payload.recovery_rate {
        args.recovery_rate = v;
    }
    if let Some(v) = payload.decommissioning_cost {
        args.decommissioning_cost = v;
    }
    if let Some(v) = payload.years {
        args.years = v;
    }
    if let Some(v) = payload.max_production_rate {
        args.max_production_rate = v;
    }
    if let Some(v) = payload.build_up_years {
        args.build_up_years = v;
    }
    if let Some(v) = payload.plateau_years {
        args.plateau_years = v;
    }
    if let Some(v) = payload.decline_rate {
        args.decline_rate = v;
    }

    build_parameters(&args)
}

fn build_simulate_response(
    params: &SimulationParameters,
    result: &ProjectResult,
) -> SimulateResponse {
    let charts = ScheduleColumn::ALL
        .iter()
        .map(|&column| {
            let (y_axis_min, y_axis_max) = result.y_axis_range(column);
            ChartResponse {
                column,
                label: column.label(),
                y_axis_min,
                y_axis_max,
            }
        })
        .collect();

    SimulateResponse {
        parameters: *params,
        npv: result.npv,
        total_recoverable_reserves: params.total_recoverable_reserves,
        total_production: result.total_production(),
        years: result.years.clone(),
        totals: result.totals(),
        charts,
    }
}

fn build_breakeven_response(
    params: &SimulationParameters,
    config: BreakevenConfig,
) -> Result<BreakevenResponse, SolverError> {
    let breakeven = solve_breakeven(params, config)?;
    Ok(BreakevenResponse {
        parameters: *params,
        base_npv: run_project(params).npv,
        breakeven,
    })
}

#[cfg(test)]
fn payload_from_json(json: &str) -> Result<SimulatePayload, String> {
    serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{Body, to_bytes},
        extract::FromRequest,
        http::{Request, Uri},
    };

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_args() -> ScreeningArgs {
        ScreeningArgs::default()
    }

    fn json_request(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/simulate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .expect("request should build")
    }

    fn query_uri(query: &str) -> Uri {
        format!("http://localhost/api/simulate?{query}")
            .parse()
            .expect("uri should parse")
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        serde_json::from_slice(&bytes).expect("body should be JSON")
    }

    #[test]
    fn build_parameters_uses_screening_defaults() {
        let params = build_parameters(&sample_args()).expect("valid defaults");
        assert_eq!(params.horizon_years, 20);
        assert_eq!(params.build_up_years, 3);
        assert_eq!(params.plateau_years, 6);
        assert_approx(params.total_recoverable_reserves, 3_600_000.0);
        assert_approx(params.oil_price_per_unit, 70.0);
        assert_approx(params.government_take_rate, 0.25);
        assert_approx(params.initial_investment, 1_000_000.0);
    }

    #[test]
    fn build_parameters_rejects_low_oil_price() {
        let mut args = sample_args();
        args.oil_price = 0.5;
        let err = build_parameters(&args).expect_err("must reject price below 1");
        assert!(err.to_string().contains("--oil-price"));
    }

    #[test]
    fn build_parameters_rejects_rates_outside_unit_interval() {
        let mut args = sample_args();
        args.decline_rate = 1.5;
        let err = build_parameters(&args).expect_err("must reject decline > 1");
        assert_eq!(
            err,
            ParameterError::OutOfRange {
                flag: "--decline-rate",
                min: 0.0,
                max: 1.0
            }
        );

        let mut args = sample_args();
        args.government_take = -0.1;
        let err = build_parameters(&args).expect_err("must reject negative take");
        assert!(err.to_string().contains("--government-take"));
    }

    #[test]
    fn build_parameters_rejects_non_finite_values() {
        let mut args = sample_args();
        args.initial_investment = f64::NAN;
        let err = build_parameters(&args).expect_err("must reject NaN");
        assert_eq!(
            err,
            ParameterError::NonFinite {
                flag: "--initial-investment"
            }
        );
    }

    #[test]
    fn build_parameters_rejects_horizon_outside_range() {
        let mut args = sample_args();
        args.years = 0;
        args.build_up_years = 0;
        args.plateau_years = 0;
        let err = build_parameters(&args).expect_err("must reject zero years");
        assert!(err.to_string().contains("--years"));

        let mut args = sample_args();
        args.years = 101;
        assert!(build_parameters(&args).is_err());
    }

    #[test]
    fn build_parameters_rejects_phase_longer_than_horizon() {
        let mut args = sample_args();
        args.years = 5;
        args.build_up_years = 3;
        args.plateau_years = 6;
        let err = build_parameters(&args).expect_err("must reject plateau > years");
        assert_eq!(
            err,
            ParameterError::PhaseExceedsHorizon {
                flag: "--plateau-years",
                years: 5
            }
        );
    }

    #[test]
    fn build_parameters_rejects_small_ooip() {
        let mut args = sample_args();
        args.ooip = 999.0;
        let err = build_parameters(&args).expect_err("must reject tiny OOIP");
        assert!(err.to_string().contains("--ooip"));
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "oil-npv",
            "run",
            "--years",
            "5",
            "--build-up-years",
            "2",
            "--plateau-years",
            "1",
            "--oil-price",
            "80",
            "--json",
        ])
        .expect("flags should parse");

        let Command::Run { screening, json } = cli.command else {
            panic!("expected run command");
        };
        assert!(json);
        let params = build_parameters(&screening).expect("valid inputs");
        assert_eq!(params.horizon_years, 5);
        assert_eq!(params.build_up_years, 2);
        assert_eq!(params.plateau_years, 1);
        assert_approx(params.oil_price_per_unit, 80.0);
        assert_approx(params.tax_rate, 0.15);
    }

    #[test]
    fn cli_parses_breakeven_target() {
        let cli = Cli::try_parse_from(["oil-npv", "breakeven", "--target", "discount-rate"])
            .expect("flags should parse");
        let Command::Breakeven { target, .. } = cli.command else {
            panic!("expected breakeven command");
        };
        assert_eq!(target, CliBreakevenTarget::DiscountRate);
    }

    #[test]
    fn cli_accepts_negative_search_bounds() {
        let cli = Cli::try_parse_from([
            "oil-npv",
            "breakeven",
            "--target",
            "discount-rate",
            "--search-min",
            "-0.5",
            "--search-max",
            "1",
        ])
        .expect("negative bound should parse");
        let Command::Breakeven {
            search_min,
            search_max,
            ..
        } = cli.command
        else {
            panic!("expected breakeven command");
        };
        assert_eq!(search_min, Some(-0.5));
        assert_eq!(search_max, Some(1.0));
    }

    #[test]
    fn payload_overrides_defaults_from_web_keys() {
        let json = r#"{
          "initialInvestment": 0,
          "oilPrice": 70,
          "operatingCost": 35,
          "discountRate": 0,
          "taxRate": 0,
          "governmentTake": 0,
          "ooip": 1000000,
          "recoveryRate": 0.1,
          "decommissioningCost": 0,
          "years": 5,
          "maxProductionRate": 1000,
          "buildUpYears": 2,
          "plateauYears": 1,
          "declineRate": 0.1
        }"#;
        let payload = payload_from_json(json).expect("json should parse");
        let params = parameters_from_payload(&payload).expect("valid inputs");

        assert_eq!(params.horizon_years, 5);
        assert_approx(params.total_recoverable_reserves, 100_000.0);
        let result = run_project(&params);
        assert_approx(result.npv, 147_350.0);
    }

    #[test]
    fn empty_payload_falls_back_to_defaults() {
        let payload = payload_from_json("{}").expect("json should parse");
        let params = parameters_from_payload(&payload).expect("valid inputs");
        assert_eq!(
            params,
            build_parameters(&ScreeningArgs::default()).expect("valid defaults")
        );
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let params = build_parameters(&sample_args()).expect("valid inputs");
        let result = run_project(&params);
        let response = build_simulate_response(&params, &result);

        assert_eq!(response.years.len(), 20);
        assert_eq!(response.charts.len(), ScheduleColumn::ALL.len());
        assert!(response.charts.iter().all(|c| c.y_axis_min == 0.0));

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"npv\""));
        assert!(json.contains("\"years\""));
        assert!(json.contains("\"totals\""));
        assert!(json.contains("\"productionRate\""));
        assert!(json.contains("\"governmentTake\""));
        assert!(json.contains("\"netCashFlow\""));
        assert!(json.contains("\"yAxisMax\""));
        assert!(json.contains("\"build-up\""));
        assert!(json.contains("\"Production Rate (Barrels)\""));
    }

    #[tokio::test]
    async fn simulate_handler_returns_schedule() {
        let payload = SimulatePayload {
            years: Some(10),
            build_up_years: Some(2),
            plateau_years: Some(3),
            ..SimulatePayload::default()
        };
        let response = simulate_handler_impl(payload);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CACHE_CONTROL)
                .and_then(|v| v.to_str().ok()),
            Some("no-store")
        );

        let body = body_json(response).await;
        assert_eq!(body["years"].as_array().map(Vec::len), Some(10));
        assert_eq!(body["years"][0]["year"], 1);
        assert!(body["npv"].is_number());
    }

    #[tokio::test]
    async fn simulate_handler_rejects_invalid_parameters() {
        let payload = SimulatePayload {
            tax_rate: Some(2.0),
            ..SimulatePayload::default()
        };
        let response = simulate_handler_impl(payload);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        let message = body["error"].as_str().expect("error message");
        assert!(message.contains("--tax-rate"));
    }

    #[tokio::test]
    async fn breakeven_handler_solves_oil_price() {
        let payload: BreakevenPayload = serde_json::from_str(
            r#"{"target": "oil-price", "years": 10, "searchMin": 1, "searchMax": 300}"#,
        )
        .expect("json should parse");
        assert_eq!(payload.years, Some(10));

        let response = breakeven_handler_impl(payload);
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["breakeven"]["feasible"], true);
        assert_eq!(body["breakeven"]["target"], "oil-price");
        let price = body["breakeven"]["solvedValue"]
            .as_f64()
            .expect("solved value");
        assert!(price > 1.0 && price < 70.0, "unexpected breakeven {price}");
    }

    #[tokio::test]
    async fn breakeven_handler_rejects_invalid_search() {
        let payload = BreakevenPayload {
            search_min: Some(10.0),
            search_max: Some(5.0),
            ..BreakevenPayload::default()
        };
        let response = breakeven_handler_impl(payload);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn breakeven_handler_rejects_excessive_iterations() {
        let payload = BreakevenPayload {
            max_iterations: Some(u32::MAX),
            ..BreakevenPayload::default()
        };
        let response = breakeven_handler_impl(payload);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        let message = body["error"].as_str().expect("error message");
        assert!(message.contains("max_iterations"));
    }

    #[tokio::test]
    async fn malformed_json_body_is_json_bad_request() {
        let extracted =
            Json::<SimulatePayload>::from_request(json_request(r#"{"years": 2.5}"#), &()).await;
        assert!(extracted.is_err());

        let response = simulate_post_handler(extracted).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_breakeven_body_is_json_bad_request() {
        let extracted = Json::<BreakevenPayload>::from_request(
            json_request(r#"{"buildUpYears": -1}"#),
            &(),
        )
        .await;

        let response = breakeven_post_handler(extracted).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn simulate_query_string_overrides_defaults() {
        let query = Query::<SimulatePayload>::try_from_uri(&query_uri(
            "years=5&buildUpYears=2&plateauYears=1&oilPrice=70&operatingCost=35\
             &initialInvestment=0&discountRate=0&taxRate=0&governmentTake=0\
             &decommissioningCost=0&ooip=1000000&recoveryRate=0.1&maxProductionRate=1000\
             &declineRate=0.1",
        ));
        let Ok(Query(payload)) = &query else {
            panic!("query should parse");
        };
        assert_eq!(payload.years, Some(5));
        assert_eq!(payload.recovery_rate, Some(0.1));

        let response = simulate_get_handler(query).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["years"].as_array().map(Vec::len), Some(5));
        let npv = body["npv"].as_f64().expect("npv");
        assert_approx(npv, 147_350.0);
    }

    #[tokio::test]
    async fn malformed_query_string_is_json_bad_request() {
        let query = Query::<SimulatePayload>::try_from_uri(&query_uri("years=abc"));
        assert!(query.is_err());

        let response = simulate_get_handler(query).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn breakeven_query_string_solves_discount_rate() {
        let query = Query::<BreakevenPayload>::try_from_uri(&query_uri(
            "target=discount-rate&years=10&searchMin=-0.5&searchMax=1&maxIterations=200",
        ));
        let Ok(Query(payload)) = &query else {
            panic!("query should parse");
        };
        assert_eq!(payload.target, Some(ApiBreakevenTarget::DiscountRate));
        assert_eq!(payload.search_min, Some(-0.5));

        let response = breakeven_get_handler(query).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["breakeven"]["target"], "discount-rate");
        assert!(body["breakeven"]["iterations"].is_array());
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let response = not_found_handler().await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Not found");
    }
}
