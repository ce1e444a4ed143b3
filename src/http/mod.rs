use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::address::WalletAddress;
use crate::error::PremiumError;
use crate::state::AppState;

mod premium;
mod referral;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let premium_router = premium::router().with_state(state.clone());
    let referral_router = referral::router().with_state(state.clone());
    Router::new()
        .route("/health", get(health_live))
        .route("/health/ready", get(health_ready))
        .nest("/premium", premium_router)
        .nest("/referral", referral_router)
        .layer(cors)
        .with_state(state)
}

async fn health_live(State(state): State<AppState>) -> Result<Json<HealthResponse>, HttpError> {
    let uptime = state.start_time.elapsed().as_secs();
    assert!(
        uptime <= 31_536_000,
        "Uptime exceeds one year without restart"
    );
    let response = HealthResponse {
        status: "live",
        uptime_seconds: uptime,
    };
    Ok(Json(response))
}

async fn health_ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, HttpError> {
    state
        .database
        .ping()
        .await
        .map_err(|err| HttpError::new(StatusCode::SERVICE_UNAVAILABLE, err.to_string()))?;

    let rpc_timeout_ms = u64::try_from(state.rpc_timeout.as_millis()).unwrap_or(u64::MAX);

    let response = ReadyResponse {
        status: "ready",
        rpc_timeout_ms,
        cache_entries: CacheSummary {
            profiles: state.profiles.entry_count(),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    status: &'static str,
    rpc_timeout_ms: u64,
    cache_entries: CacheSummary,
}

#[derive(Debug, Serialize)]
struct CacheSummary {
    profiles: u64,
}

fn parse_wallet(raw: &str) -> Result<WalletAddress, HttpError> {
    WalletAddress::parse(raw).map_err(|err| {
        HttpError::new(
            StatusCode::BAD_REQUEST,
            format!("Invalid wallet address {raw}: {err}"),
        )
    })
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    code: Option<&'static str>,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: String) -> Self {
        assert!(status != StatusCode::OK, "Error status cannot be 200");
        assert!(!message.is_empty(), "Error message cannot be empty");
        Self {
            status,
            code: None,
            message,
        }
    }

    fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }
}

impl From<PremiumError> for HttpError {
    fn from(err: PremiumError) -> Self {
        let (status, code) = match &err {
            PremiumError::ChainUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "chain_unavailable")
            }
            PremiumError::NotPremium(_) => (StatusCode::FORBIDDEN, "not_premium"),
            PremiumError::NotOwner { .. } => (StatusCode::FORBIDDEN, "not_owner"),
            PremiumError::WalletAlreadyLinked { .. } => {
                (StatusCode::CONFLICT, "wallet_already_linked")
            }
            PremiumError::ProfileAlreadyLinked { .. } => {
                (StatusCode::CONFLICT, "profile_already_linked")
            }
            PremiumError::OperationNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, "operation_not_allowed")
            }
            PremiumError::IdentityProvider(_) => (StatusCode::BAD_GATEWAY, "identity_unavailable"),
            PremiumError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
        };
        if status.is_server_error() {
            warn!("Premium operation failed: {err}");
        }
        HttpError::new(status, err.to_string()).with_code(code)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        info!("HTTP error: {}", self.message);
        let body = Json(ErrorBody {
            error: self.message,
            code: self.code,
        });
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}
