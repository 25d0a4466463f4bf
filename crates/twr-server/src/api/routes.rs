//! REST API routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use twr_core::engine::{Authorization, EngineError};
use twr_core::models::{
    AuthorizationResult, EngineStatus, MetarReading, Notam, OperationKind, OperationRequest,
    PriorityClass, RequestId, Runway,
};
use twr_core::queue::QueueError;

use crate::reference;
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/queue", post(enqueue).get(list_queue))
        .route("/v1/decisions", post(decide))
        .route("/v1/operations/complete", post(complete_operation))
        .route("/v1/status", get(get_status))
        .route("/v1/flights", get(list_flights))
        .route("/v1/audit", get(list_audit))
        .route("/v1/reference/reload", post(reload_reference))
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn unprocessable(message: impl Into<String>) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": message.into() })),
    )
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub flight: String,
    pub kind: OperationKind,
    /// Overrides the flight plan's preferred runway.
    #[serde(default)]
    pub runway_hint: Option<String>,
    /// Overrides the priority class derived from the flight plan.
    #[serde(default)]
    pub priority: Option<PriorityClass>,
    /// Defaults to now; accepted for deterministic replays.
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Enqueue a takeoff or landing request.
///
/// Input errors (unknown flight/aircraft/pilot/runway) are rejected here,
/// before anything enters a queue. Duplicate identities get 409.
async fn enqueue(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<OperationRequest>), ApiError> {
    let refdata = state.reference();

    let plan = refdata
        .flight_plan(&payload.flight)
        .ok_or_else(|| unprocessable(format!("flight {} has no filed plan", payload.flight)))?;
    if refdata.aircraft(&plan.aircraft_type).is_none() {
        return Err(unprocessable(format!(
            "aircraft type {} not in fleet",
            plan.aircraft_type
        )));
    }
    if refdata.pilot(&plan.pilot_id).is_none() {
        return Err(unprocessable(format!(
            "pilot {} not on file",
            plan.pilot_id
        )));
    }

    let runway_hint = payload
        .runway_hint
        .clone()
        .or_else(|| plan.preferred_runway.clone());
    if let Some(hint) = &runway_hint {
        if refdata.runway(hint).is_none() {
            return Err(unprocessable(format!("unknown runway {}", hint)));
        }
    }

    // Emergencies keep their class for either operation; routine plans get
    // the class matching the requested operation kind.
    let priority = payload.priority.unwrap_or(match plan.priority {
        PriorityClass::Emergency => PriorityClass::Emergency,
        _ => PriorityClass::routine_for(payload.kind),
    });

    let request = OperationRequest {
        id: RequestId::new(payload.flight.clone(), payload.kind),
        priority,
        submitted_at: payload.submitted_at.unwrap_or_else(Utc::now),
        runway_hint,
        aircraft_type: plan.aircraft_type.clone(),
        pilot_id: plan.pilot_id.clone(),
    };

    match state.enqueue(request.clone()) {
        Ok(()) => Ok((StatusCode::CREATED, Json(request))),
        Err(EngineError::Queue(QueueError::DuplicateRequest(id))) => Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": format!("request {} is already queued", id) })),
        )),
        Err(err) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )),
    }
}

/// Pending requests in serving order.
async fn list_queue(State(state): State<Arc<AppState>>) -> Json<Vec<OperationRequest>> {
    Json(state.pending())
}

#[derive(Debug, Default, Deserialize)]
pub struct DecideRequest {
    /// Defaults to now; accepted for deterministic replays.
    #[serde(default)]
    pub decision_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum DecideResponse {
    Decided { result: AuthorizationResult },
    NoOperationPending,
}

/// Decide the next eligible operation.
async fn decide(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<DecideRequest>>,
) -> impl IntoResponse {
    let decision_time = payload
        .and_then(|Json(p)| p.decision_time)
        .unwrap_or_else(Utc::now);

    match state.authorize_next(decision_time) {
        Authorization::Decided(result) => Json(DecideResponse::Decided { result }),
        Authorization::NoOperationPending => Json(DecideResponse::NoOperationPending),
    }
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub flight: String,
    pub kind: OperationKind,
}

/// Report an authorized operation complete, releasing the low-visibility
/// slot if that operation holds it.
async fn complete_operation(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CompleteRequest>,
) -> Json<serde_json::Value> {
    let id = RequestId::new(payload.flight, payload.kind);
    let released = state.complete_operation(&id);
    Json(json!({ "released": released }))
}

#[derive(Debug, Serialize)]
struct RunwayEntry {
    #[serde(flatten)]
    runway: Runway,
    notam_blocked: bool,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    engine: EngineStatus,
    runways: Vec<RunwayEntry>,
    /// Authoritative METAR at the time of the call, if any.
    metar: Option<MetarReading>,
    active_notams: Vec<Notam>,
}

/// Queue depths, counters, runway table and current weather picture.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let now = Utc::now();
    let refdata = state.reference();

    let runways = refdata
        .runways
        .iter()
        .map(|runway| RunwayEntry {
            runway: runway.clone(),
            notam_blocked: refdata.blocking_notam(&runway.id, now).is_some(),
        })
        .collect();
    let active_notams = refdata
        .notams
        .iter()
        .filter(|n| n.blocks_at(now))
        .cloned()
        .collect();

    Json(StatusResponse {
        engine: state.status(),
        runways,
        metar: refdata
            .metar_at(now, state.rules().metar_wraparound)
            .cloned(),
        active_notams,
    })
}

/// Filed flight plans from the reference snapshot.
async fn list_flights(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<twr_core::models::FlightPlan>> {
    Json(state.reference().flight_plans.clone())
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct AuditEntry {
    seq: u64,
    #[serde(flatten)]
    result: AuthorizationResult,
}

/// Decision records, newest first.
async fn list_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> Json<Vec<AuditEntry>> {
    let limit = query.limit.unwrap_or(50);
    let entries = state
        .recent_decisions(limit)
        .into_iter()
        .map(|(seq, result)| AuditEntry { seq, result })
        .collect();
    Json(entries)
}

/// Re-read the reference snapshot from disk.
async fn reload_reference(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let path = state.config().reference_path.clone();
    let data = reference::load_snapshot(&path).map_err(|err| {
        tracing::error!("Reference reload failed: {:#}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("{:#}", err) })),
        )
    })?;

    let summary = json!({
        "runways": data.runways.len(),
        "fleet": data.fleet.len(),
        "pilots": data.pilots.len(),
        "metars": data.metars.len(),
        "notams": data.notams.len(),
        "flight_plans": data.flight_plans.len(),
    });
    state.replace_reference(data);
    tracing::info!("Reference snapshot reloaded from {}", path);
    Ok(Json(summary))
}
