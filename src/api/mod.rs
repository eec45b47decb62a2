use std::net::SocketAddr;
use std::str::FromStr;

use axum::{
    Router,
    extract::{Json, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::core::{
    Account, ComparisonResult, DEFAULT_HORIZON_MONTHS, EngineConfig, RepaymentPolicy,
    SimulationResult, compare_with, simulate_with,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliPolicy {
    Avalanche,
    Snowball,
}

impl From<CliPolicy> for RepaymentPolicy {
    fn from(value: CliPolicy) -> Self {
        match value {
            CliPolicy::Avalanche => RepaymentPolicy::Avalanche,
            CliPolicy::Snowball => RepaymentPolicy::Snowball,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum AnalysisMode {
    Simulate(RepaymentPolicy),
    Compare,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    accounts: Vec<Account>,
    extra_monthly_payment: Option<Decimal>,
    policy: Option<RepaymentPolicy>,
    horizon_months: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ComparePayload {
    accounts: Vec<Account>,
    extra_monthly_payment: Option<Decimal>,
    horizon_months: Option<u32>,
    sweep_steps: Option<Vec<Decimal>>,
}

#[derive(Parser, Debug)]
#[command(
    name = "payoff",
    about = "Debt payoff simulator: avalanche vs snowball repayment with a minimums-only baseline",
    after_help = "Run `payoff serve [port]` to start the HTTP JSON API instead."
)]
pub struct Cli {
    #[arg(
        long = "account",
        required = true,
        value_name = "ID,BALANCE,RATE,MINIMUM[,NAME]",
        value_parser = parse_account_spec,
        help = "Debt account; RATE is the annual rate in percent, e.g. 24 for 24%"
    )]
    accounts: Vec<Account>,
    #[arg(
        long,
        default_value = "0",
        allow_negative_numbers = true,
        help = "Monthly amount paid on top of all minimum payments"
    )]
    extra_payment: Decimal,
    #[arg(
        long,
        value_enum,
        help = "Simulate only this policy; omit to compare both against a minimums-only baseline"
    )]
    policy: Option<CliPolicy>,
    #[arg(
        long,
        default_value_t = DEFAULT_HORIZON_MONTHS,
        help = "Safety horizon in months before a plan is reported as never paying off"
    )]
    horizon_months: u32,
    #[arg(
        long = "sweep-step",
        help = "Additional monthly payment for the what-if sweep; repeat for several steps"
    )]
    sweep_steps: Vec<Decimal>,
    #[arg(long, help = "Pretty-print the JSON output")]
    pretty: bool,
    #[arg(long, default_value = "warn", help = "Log level when RUST_LOG is unset")]
    pub log_level: String,
}

#[derive(Debug)]
struct ApiRequest {
    accounts: Vec<Account>,
    extra_monthly_payment: Decimal,
    config: EngineConfig,
    mode: AnalysisMode,
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
enum ApiResponse {
    Simulation(SimulationResult),
    Comparison(ComparisonResult),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn parse_account_spec(raw: &str) -> Result<Account, String> {
    let parts: Vec<&str> = raw.splitn(5, ',').map(str::trim).collect();
    if parts.len() < 4 {
        return Err(format!(
            "invalid account '{raw}': expected ID,BALANCE,RATE,MINIMUM[,NAME]"
        ));
    }

    let id = parts[0];
    if id.is_empty() {
        return Err(format!("invalid account '{raw}': id must not be empty"));
    }

    let number = |label: &str, value: &str| {
        Decimal::from_str(value)
            .map_err(|e| format!("invalid account '{raw}': {label} '{value}' is not a number ({e})"))
    };
    let balance = number("balance", parts[1])?;
    let rate = number("rate", parts[2])?;
    let minimum = number("minimum", parts[3])?;

    let account = Account::new(id, balance, rate, minimum);
    Ok(match parts.get(4) {
        Some(name) if !name.is_empty() => account.with_name(*name),
        _ => account,
    })
}

fn build_config(
    horizon_months: Option<u32>,
    sweep_steps: Option<Vec<Decimal>>,
) -> Result<EngineConfig, String> {
    let mut config = EngineConfig::default();

    if let Some(horizon) = horizon_months {
        config.horizon_months = horizon;
    }

    if let Some(steps) = sweep_steps {
        config.sweep_steps = steps;
    }

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn build_cli_request(cli: Cli) -> Result<ApiRequest, String> {
    if cli.extra_payment < Decimal::ZERO {
        return Err("--extra-payment must be >= 0".to_string());
    }

    let sweep_steps = (!cli.sweep_steps.is_empty()).then_some(cli.sweep_steps);
    let config = build_config(Some(cli.horizon_months), sweep_steps)?;

    Ok(ApiRequest {
        accounts: cli.accounts,
        extra_monthly_payment: cli.extra_payment,
        config,
        mode: match cli.policy {
            Some(policy) => AnalysisMode::Simulate(policy.into()),
            None => AnalysisMode::Compare,
        },
    })
}

fn api_request_from_simulate(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let Some(policy) = payload.policy else {
        return Err("policy is required (avalanche or snowball)".to_string());
    };

    Ok(ApiRequest {
        accounts: payload.accounts,
        extra_monthly_payment: payload.extra_monthly_payment.unwrap_or(Decimal::ZERO),
        config: build_config(payload.horizon_months, None)?,
        mode: AnalysisMode::Simulate(policy),
    })
}

fn api_request_from_compare(payload: ComparePayload) -> Result<ApiRequest, String> {
    Ok(ApiRequest {
        accounts: payload.accounts,
        extra_monthly_payment: payload.extra_monthly_payment.unwrap_or(Decimal::ZERO),
        config: build_config(payload.horizon_months, payload.sweep_steps)?,
        mode: AnalysisMode::Compare,
    })
}

fn execute(request: &ApiRequest) -> Result<ApiResponse, String> {
    let outcome = match request.mode {
        AnalysisMode::Simulate(policy) => simulate_with(
            &request.config,
            &request.accounts,
            request.extra_monthly_payment,
            policy,
        )
        .map(ApiResponse::Simulation),
        AnalysisMode::Compare => compare_with(
            &request.config,
            &request.accounts,
            request.extra_monthly_payment,
        )
        .map(ApiResponse::Comparison),
    };
    outcome.map_err(|e| e.to_string())
}

pub fn run_cli(cli: Cli) -> Result<String, String> {
    let pretty = cli.pretty;
    let request = build_cli_request(cli)?;
    let response = execute(&request)?;

    let rendered = if pretty {
        serde_json::to_string_pretty(&response)
    } else {
        serde_json::to_string(&response)
    };
    rendered.map_err(|e| format!("failed to render result: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "payoff HTTP API listening");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/compare", post(compare_handler))
        .fallback(not_found_handler)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, serde_json::json!({ "status": "ok" }))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_handler(payload: Result<Json<SimulatePayload>, JsonRejection>) -> Response {
    let request = payload
        .map_err(|rejection| (rejection.status(), rejection.body_text()))
        .and_then(|Json(payload)| {
            api_request_from_simulate(payload).map_err(|msg| (StatusCode::BAD_REQUEST, msg))
        });
    respond(request).await
}

async fn compare_handler(payload: Result<Json<ComparePayload>, JsonRejection>) -> Response {
    let request = payload
        .map_err(|rejection| (rejection.status(), rejection.body_text()))
        .and_then(|Json(payload)| {
            api_request_from_compare(payload).map_err(|msg| (StatusCode::BAD_REQUEST, msg))
        });
    respond(request).await
}

async fn respond(request: Result<ApiRequest, (StatusCode, String)>) -> Response {
    let request = match request {
        Ok(request) => request,
        Err((status, msg)) => return error_response(status, &msg),
    };

    info!(
        accounts = request.accounts.len(),
        extra = %request.extra_monthly_payment,
        mode = ?request.mode,
        "handling payoff request"
    );

    match tokio::task::spawn_blocking(move || execute(&request)).await {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(msg)) => error_response(StatusCode::BAD_REQUEST, &msg),
        Err(e) => {
            error!(error = %e, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Simulation failed")
        }
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
