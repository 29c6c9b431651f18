//! Operator HTTP surface (spec.md §6): read endpoints expose health, state,
//! a recent-events tail, and open positions/orders; action endpoints only
//! ever *append an event* — the ledger remains the sole source of truth,
//! this router never mutates `TradingState` directly.
//!
//! Grounded on the teacher's axum usage in `cooprefr-bettersys`'s
//! `api::routes` (`State<AppState>` extractor, `Json<_>` request/response,
//! `StatusCode` error mapping) adapted from a signal-query API to an
//! operator control surface.

use super::state::OperatorState;
use crate::event::{Event, EventKind, Metadata};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub fn router(state: OperatorState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(trading_state))
        .route("/events", get(events_tail))
        .route("/positions", get(positions))
        .route("/orders", get(orders))
        .route("/ack-review", post(ack_review))
        .route("/kill-switch", post(kill_switch))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    kill_switch_state: String,
    requires_manual_review: bool,
    circuit_breaker_active: bool,
}

async fn health(State(state): State<OperatorState>) -> Json<HealthResponse> {
    let snapshot = state.state_manager.snapshot();
    Json(HealthResponse {
        status: "ok",
        kill_switch_state: format!("{:?}", state.kill_switch.state()),
        requires_manual_review: snapshot.requires_manual_review,
        circuit_breaker_active: snapshot.circuit_breaker_active,
    })
}

async fn trading_state(
    State(state): State<OperatorState>,
) -> Json<crate::state::TradingState> {
    Json(state.state_manager.snapshot())
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    limit: Option<usize>,
}

async fn events_tail(
    State(state): State<OperatorState>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>, StatusCode> {
    let limit = params.limit.unwrap_or(100);
    let events = state.event_bus.ledger().read_all().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let tail_start = events.len().saturating_sub(limit);
    Ok(Json(events[tail_start..].to_vec()))
}

async fn positions(
    State(state): State<OperatorState>,
) -> Json<HashMap<crate::domain::Symbol, crate::domain::Position>> {
    Json(state.state_manager.snapshot().positions)
}

async fn orders(
    State(state): State<OperatorState>,
) -> Json<HashMap<String, crate::domain::Order>> {
    Json(state.state_manager.snapshot().open_orders)
}

#[derive(Debug, Deserialize)]
struct AckReviewRequest {
    operator: String,
}

async fn ack_review(
    State(state): State<OperatorState>,
    Json(req): Json<AckReviewRequest>,
) -> Result<Json<Event>, StatusCode> {
    let event = state
        .event_bus
        .publish(EventKind::ManualReviewAcknowledged { operator: req.operator.clone() }, Metadata::source("operator"))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(event))
}

#[derive(Debug, Deserialize)]
struct KillSwitchRequest {
    reason: String,
}

async fn kill_switch(
    State(state): State<OperatorState>,
    Json(req): Json<KillSwitchRequest>,
) -> Result<Json<Event>, StatusCode> {
    let event = state
        .event_bus
        .publish(EventKind::ShutdownInitiated { reason: req.reason.clone() }, Metadata::source("operator"))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    state.kill_switch.shutdown(&req.reason);
    Ok(Json(event))
}

#[derive(Debug, Deserialize)]
struct PauseRequest {
    reason: String,
}

/// Pausing trading is modeled as a manual-intervention event: it sets
/// `requires_manual_review` via the reducer, the same flag the circuit
/// breaker trips, which blocks new proposals without inventing a
/// cooldown-specific event kind.
async fn pause(
    State(state): State<OperatorState>,
    Json(req): Json<PauseRequest>,
) -> Result<Json<Event>, StatusCode> {
    let event = state
        .event_bus
        .publish(EventKind::ManualInterventionDetected { reason: req.reason.clone() }, Metadata::source("operator"))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    state.kill_switch.pause();
    Ok(Json(event))
}

#[derive(Debug, Deserialize)]
struct ResumeRequest {
    operator: String,
}

async fn resume(
    State(state): State<OperatorState>,
    Json(req): Json<ResumeRequest>,
) -> Result<Json<Event>, StatusCode> {
    let event = state
        .event_bus
        .publish(EventKind::ManualReviewAcknowledged { operator: req.operator.clone() }, Metadata::source("operator"))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    state.kill_switch.resume();
    Ok(Json(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBus;
    use crate::resilience::KillSwitch;
    use crate::state::StateManager;
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn test_state() -> OperatorState {
        let dir = tempdir().unwrap().keep();
        let ledger = crate::event::EventLedger::open(dir.join("ledger.jsonl")).unwrap();
        let bus = Arc::new(EventBus::new(Arc::new(ledger)));
        let state_manager = StateManager::new(dec!(10000));
        OperatorState::new(state_manager, bus, KillSwitch::new())
    }

    #[tokio::test]
    async fn health_reports_running_kill_switch() {
        let app = router(test_state());
        let response = app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn kill_switch_endpoint_shuts_down_and_emits_event() {
        let state = test_state();
        let kill_switch = state.kill_switch.clone();
        let app = router(state);
        let body = serde_json::to_vec(&serde_json::json!({"reason": "operator abort"})).unwrap();
        let response = app
            .oneshot(Request::post("/kill-switch").header("content-type", "application/json").body(Body::from(body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(kill_switch.should_stop());
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips_through_kill_switch() {
        let state = test_state();
        let kill_switch = state.kill_switch.clone();
        let app = router(state);

        let pause_body = serde_json::to_vec(&serde_json::json!({"reason": "manual pause"})).unwrap();
        let response = app
            .clone()
            .oneshot(Request::post("/pause").header("content-type", "application/json").body(Body::from(pause_body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(kill_switch.is_paused());

        let resume_body = serde_json::to_vec(&serde_json::json!({"operator": "alice"})).unwrap();
        let response = app
            .oneshot(Request::post("/resume").header("content-type", "application/json").body(Body::from(resume_body)).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(kill_switch.is_running());
    }
}
