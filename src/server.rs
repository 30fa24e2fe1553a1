use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use h3o::Resolution;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::distance::Coordinate;
use crate::error::ScoreError;
use crate::heatmap::{HeatmapPoint, HexBin, aggregate_hex};
use crate::route::{DEFAULT_AUDIT_RADIUS_KM, DangerSegment, RiskZones};
use crate::scorer::{RiskAssessment, RiskScorer};

// Shared, read-only after startup
pub struct AppState {
    pub city: String,
    pub scorer: RiskScorer,
    pub heatmap: Vec<HeatmapPoint>,
    pub zones: RiskZones,
    pub hex_resolution: Resolution,
}

impl AppState {
    pub fn new(
        city: String,
        scorer: RiskScorer,
        heatmap: Vec<HeatmapPoint>,
        hex_resolution: Resolution,
    ) -> Self {
        let zones = RiskZones::new(&heatmap);
        Self {
            city,
            scorer,
            heatmap,
            zones,
            hex_resolution,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/health", get(|| async { "OK" }))
        .route("/predict", get(predict))
        .route("/heatmap", get(heatmap))
        .route("/heatmap/hex", get(heatmap_hex))
        .route("/route/audit", post(audit_route))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- API DTOs ---

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    city: String,
    model_loaded: bool,
    heatmap_points: usize,
}

#[derive(Deserialize)]
struct PredictQuery {
    lat: f64,
    lon: f64,
}

#[derive(Serialize)]
struct HeatmapResponse<'a> {
    points: &'a [HeatmapPoint],
}

#[derive(Deserialize)]
struct HexQuery {
    resolution: Option<u8>,
}

#[derive(Serialize)]
struct HexResponse {
    resolution: u8,
    bins: Vec<HexBin>,
}

#[derive(Deserialize)]
struct AuditRequest {
    coordinates: Vec<[f64; 2]>, // [lat, lon]
    radius_km: Option<f64>,
}

#[derive(Serialize)]
struct AuditResponse {
    danger_segments: Vec<DangerSegment>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: "bad_request",
                message,
            },
        }
    }
}

impl From<ScoreError> for ApiError {
    fn from(err: ScoreError) -> Self {
        let (status, error) = match err {
            ScoreError::ModelUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "model_unavailable"),
            ScoreError::InvalidCoordinate { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid_coordinate")
            }
        };
        Self {
            status,
            body: ErrorBody {
                error,
                message: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

// --- Handlers ---

async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "System Online",
        city: state.city.clone(),
        model_loaded: state.scorer.model_available(),
        heatmap_points: state.heatmap.len(),
    })
}

async fn predict(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PredictQuery>,
) -> Result<Json<RiskAssessment>, ApiError> {
    match state.scorer.score(q.lat, q.lon).await {
        Ok(assessment) => Ok(Json(assessment)),
        Err(e) => {
            warn!(lat = q.lat, lon = q.lon, error = %e, "prediction rejected");
            Err(e.into())
        }
    }
}

async fn heatmap(State(state): State<Arc<AppState>>) -> Response {
    Json(HeatmapResponse {
        points: &state.heatmap,
    })
    .into_response()
}

async fn heatmap_hex(
    State(state): State<Arc<AppState>>,
    Query(q): Query<HexQuery>,
) -> Result<Json<HexResponse>, ApiError> {
    let resolution = match q.resolution {
        Some(raw) => Resolution::try_from(raw)
            .map_err(|_| ApiError::bad_request(format!("resolution must be 0-15, got {raw}")))?,
        None => state.hex_resolution,
    };
    Ok(Json(HexResponse {
        resolution: u8::from(resolution),
        bins: aggregate_hex(&state.heatmap, resolution),
    }))
}

async fn audit_route(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AuditRequest>,
) -> Result<Json<AuditResponse>, ApiError> {
    let radius_km = payload.radius_km.unwrap_or(DEFAULT_AUDIT_RADIUS_KM);
    if radius_km.is_nan() || radius_km <= 0.0 || radius_km.is_infinite() {
        return Err(ApiError::bad_request(format!(
            "radius_km must be positive, got {radius_km}"
        )));
    }
    let path: Vec<Coordinate> = payload
        .coordinates
        .iter()
        .map(|&[lat, lon]| Coordinate::new(lat, lon))
        .collect();
    let danger_segments = state.zones.audit(&path, radius_km)?;
    Ok(Json(AuditResponse { danger_segments }))
}
