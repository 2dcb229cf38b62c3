use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::error::{PredictionError, ValidationErrors};
use crate::service::{PredictionService, ServiceError};
use crate::types::{
    now_iso8601, ErrorBody, HealthResponse, ModelInfo, PredictionResponse, RawPredictionRequest,
};

// ---------- Server state ----------

/// `service` is `None` only when the server was started without artifacts.
#[derive(Clone)]
pub struct AppState {
    pub service: Option<Arc<PredictionService>>,
}

impl AppState {
    pub fn loaded(service: PredictionService) -> Self {
        Self {
            service: Some(Arc::new(service)),
        }
    }

    /// State for a server started with `ALLOW_MISSING_MODEL=1` after the
    /// artifacts failed to load. The normal startup path exits instead.
    /// `/health` reports `model_loaded: false`; `/predict` and `/model-info`
    /// answer 503.
    pub fn unloaded() -> Self {
        Self { service: None }
    }

    fn service(&self) -> Result<&PredictionService, ApiError> {
        self.service.as_deref().ok_or(ApiError::ModelUnavailable)
    }
}

pub fn router(state: AppState, cfg: &ServerConfig) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .route("/model-info", get(model_info))
        .route("/api-docs", get(api_docs))
        .route_service("/", ServeFile::new(cfg.templates_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(&cfg.static_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ---------- Errors ----------

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationErrors),
    Body(JsonRejection),
    Prediction(PredictionError),
    ModelUnavailable,
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(v) => ApiError::Validation(v),
            ServiceError::Prediction(p) => ApiError::Prediction(p),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        ApiError::Body(r)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    error: "validation_error",
                    detail: Some(e.to_string()),
                    violations: e.0,
                },
            ),
            ApiError::Body(r) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorBody {
                    error: "invalid_body",
                    detail: Some(r.body_text()),
                    violations: Vec::new(),
                },
            ),
            ApiError::Prediction(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    error: "prediction_failed",
                    detail: Some(e.to_string()),
                    violations: Vec::new(),
                },
            ),
            ApiError::ModelUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    error: "model_unavailable",
                    detail: Some("model artifacts are not loaded".to_string()),
                    violations: Vec::new(),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

// ---------- Handlers ----------

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<RawPredictionRequest>, JsonRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let service = state.service()?;
    let Json(raw) = payload.inspect_err(|e| tracing::warn!("rejected body: {}", e.body_text()))?;

    match service.predict(&raw) {
        Ok(out) => {
            tracing::info!(
                "prediction made: {} with confidence {:.3}",
                out.congestion_level,
                out.confidence_score
            );
            Ok(Json(out))
        }
        Err(ServiceError::Validation(e)) => {
            tracing::warn!("{}", e);
            Err(ApiError::Validation(e))
        }
        Err(e) => {
            tracing::error!("{}", e);
            Err(e.into())
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_loaded = state.service.is_some();
    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "degraded" },
        model_loaded,
        timestamp: now_iso8601(),
    })
}

async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfo>, ApiError> {
    Ok(Json(state.service()?.model_info()))
}

async fn api_docs() -> Json<Value> {
    Json(json!({
        "title": "Kigali Traffic Congestion Prediction API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            { "method": "POST", "path": "/predict", "description": "Predict the congestion level for one road and hour" },
            { "method": "GET", "path": "/health", "description": "Liveness and model load status" },
            { "method": "GET", "path": "/model-info", "description": "Model type, feature order and permitted labels" },
            { "method": "GET", "path": "/", "description": "Prediction form" },
        ],
    }))
}
