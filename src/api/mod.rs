//! HTTP API
//!
//! `POST /scan-network`, `POST /test-camera` and `GET /health` on top of a
//! shared [`ScanEngine`].

use crate::config::ScanConfig;
use crate::network::Credentials;
use crate::scanner::{DeviceStatus, ScanEngine, ScanRequest};
use crate::utils::profiles::ScanProfile;
use crate::utils::target_parser::{parse_ipv4, IpRange};
use crate::ScanError;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const INVALID_RANGE_MESSAGE: &str = "Invalid network range format";
const SCAN_ACTIVE_MESSAGE: &str = "Scan already active for this range";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ScanEngine>,
}

impl AppState {
    pub fn new(engine: ScanEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scan-network", post(scan_network))
        .route("/test-camera", post(test_camera))
        .with_state(state)
}

/// Bind `config.bind` and serve until the process exits
pub async fn serve(config: ScanConfig) -> crate::Result<()> {
    let bind = config.bind.clone();
    let state = AppState::new(ScanEngine::new(config)?);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    log::info!("API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScanNetworkBody {
    #[serde(rename = "startIP")]
    pub start_ip: Option<String>,
    #[serde(rename = "endIP")]
    pub end_ip: Option<String>,
    #[serde(rename = "networkRange")]
    pub network_range: Option<String>,
    pub ports: Option<Vec<u16>>,
    pub profile: Option<String>,
}

impl ScanNetworkBody {
    /// `networkRange` wins over `startIP`/`endIP`
    fn range(&self) -> Option<IpRange> {
        match (&self.network_range, &self.start_ip, &self.end_ip) {
            (Some(range), _, _) => IpRange::parse(range).ok(),
            (None, Some(start), Some(end)) => IpRange::from_endpoints(start, end).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestCameraBody {
    pub ip_address: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Milliseconds
    pub timeout: Option<u64>,
}

/// JSON error body `{ success: false, message }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::ScanInProgress(_) => ApiError::new(StatusCode::CONFLICT, SCAN_ACTIVE_MESSAGE),
            e if e.is_client_error() => ApiError::new(StatusCode::BAD_REQUEST, e.to_string()),
            e => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "success": false, "message": self.message }));
        (self.status, body).into_response()
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

pub async fn scan_network(
    State(state): State<AppState>,
    payload: Result<Json<ScanNetworkBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    // Any unreadable body is a bad range as far as the caller is concerned
    let Json(body) = payload.map_err(|rejection| {
        log::debug!("Rejected scan body: {}", rejection.body_text());
        ApiError::new(StatusCode::BAD_REQUEST, INVALID_RANGE_MESSAGE)
    })?;
    let range = body.range().ok_or_else(|| {
        log::debug!("Rejected scan request: {:?}", body);
        ApiError::new(StatusCode::BAD_REQUEST, INVALID_RANGE_MESSAGE)
    })?;

    let ports = match (&body.ports, &body.profile) {
        (Some(ports), _) => ports.clone(),
        (None, Some(profile)) => profile.parse::<ScanProfile>()?.ports(),
        (None, None) => state.engine.config().profile.ports(),
    };

    let request = ScanRequest::new(range, ports)?;
    let report = state.engine.scan(&request).await?;

    let scan_info = json!({
        "totalDevices": report.total_devices(),
        "cameras": report.cameras(),
        "startIP": range.start().to_string(),
        "endIP": range.end().to_string(),
        "networkRange": body.network_range.clone().unwrap_or_else(|| range.key()),
        "ports": report.ports,
        "scanId": report.scan_id,
        "startedAt": report.started_at,
        "finishedAt": report.finished_at,
        "durationMs": report.stats.duration_ms,
    });

    Ok(Json(json!({
        "success": true,
        "data": report.devices,
        "scanInfo": scan_info,
    })))
}

pub async fn test_camera(
    State(state): State<AppState>,
    payload: Result<Json<TestCameraBody>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = payload.map_err(|rejection| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("Invalid request body: {}", rejection.body_text()),
        )
    })?;
    let address = parse_ipv4(&body.ip_address)
        .map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "Invalid IP address"))?;
    if body.port == Some(0) {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Invalid port"));
    }

    let ports: Vec<u16> = body.port.into_iter().collect();
    let credentials = body.username.clone().map(|username| Credentials {
        username,
        password: body.password.clone(),
    });
    let timeout = body.timeout.map(Duration::from_millis);

    let status = state
        .engine
        .test_device(address, &ports, credentials.as_ref(), timeout)
        .await;

    let data = match status {
        DeviceStatus::Online(record) => {
            let port = body.port.or_else(|| record.open_ports.iter().next().copied());
            let mut data = serde_json::to_value(&record)
                .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
            if let Value::Object(fields) = &mut data {
                fields.insert("ip_address".to_string(), json!(address.to_string()));
                fields.insert("port".to_string(), json!(port));
                fields.insert("status".to_string(), json!("online"));
            }
            data
        }
        DeviceStatus::Offline => json!({
            "ip_address": address.to_string(),
            "port": body.port,
            "status": "offline",
        }),
    };

    Ok(Json(json!({ "success": true, "data": data })))
}
