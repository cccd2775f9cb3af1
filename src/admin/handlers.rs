use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::ratelimit::BucketSnapshot;
use crate::store::ClientRule;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub backends: usize,
    pub live_backends: usize,
    pub rate_limit_buckets: usize,
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub address: String,
    pub alive: bool,
}

#[derive(Serialize, Deserialize)]
pub struct SetRuleRequest {
    pub client_id: String,
    pub capacity: u32,
    pub rate: u32,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let backends = state.pool.all();
    let live = backends.iter().filter(|b| b.is_alive()).count();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        backends: backends.len(),
        live_backends: live,
        rate_limit_buckets: state.limiter.bucket_count().await,
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let statuses = state
        .pool
        .all()
        .iter()
        .map(|b| BackendStatus {
            name: b.name.clone(),
            address: b.addr.to_string(),
            alive: b.is_alive(),
        })
        .collect();

    Json(statuses)
}

pub async fn get_ratelimits(State(state): State<AdminState>) -> Json<Vec<BucketSnapshot>> {
    Json(state.limiter.snapshot().await)
}

pub async fn set_ratelimit(
    State(state): State<AdminState>,
    Json(req): Json<SetRuleRequest>,
) -> Response {
    if let Err(message) = validate_rule_request(&req) {
        return (StatusCode::BAD_REQUEST, Json(ErrorBody { error: message })).into_response();
    }

    let rule = ClientRule {
        capacity: req.capacity,
        refill_rate: req.rate,
    };

    match state.limiter.set_rule(&req.client_id, rule).await {
        Ok(()) => {
            tracing::info!(
                client = %req.client_id,
                capacity = req.capacity,
                rate = req.rate,
                "Rate-limit rule updated"
            );
            (StatusCode::OK, Json(req)).into_response()
        }
        Err(e) => {
            tracing::error!(client = %req.client_id, error = %e, "Failed to persist rate-limit rule");
            let body = ErrorBody {
                error: "failed to persist rule".to_string(),
            };
            (StatusCode::BAD_GATEWAY, Json(body)).into_response()
        }
    }
}

fn validate_rule_request(req: &SetRuleRequest) -> Result<(), String> {
    if req.client_id.is_empty() {
        return Err("client_id must not be empty".to_string());
    }
    if req.capacity == 0 {
        return Err("capacity must be greater than zero".to_string());
    }
    if req.rate == 0 {
        return Err("rate must be greater than zero".to_string());
    }
    Ok(())
}
