//! HTTP + WebSocket API for the marker evaluator
//!
//! Endpoints:
//! - POST /session/new - Create new session
//! - GET /session/{id} - Get session status
//! - POST /session/{id}/message - Add a message and re-evaluate
//! - GET /session/{id}/hits - Full hit list for the session
//! - POST /evaluate - Stateless single-text evaluation
//! - WS /ws/{id} - Live updates
//! - GET /health - Health check

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::core::MarkerEngine;
use crate::types::{Hit, UnitEvaluation};

/// Session state: the accumulated message sequence and the hits from its
/// most recent evaluation
pub struct Session {
    pub id: String,
    pub units: Vec<String>,
    pub hits: Vec<Hit>,
    pub update_tx: broadcast::Sender<SessionUpdate>,
}

/// Live update message
#[derive(Debug, Clone, Serialize)]
pub struct SessionUpdate {
    pub unit_count: usize,
    pub hit_count: usize,
    pub new_hits: Vec<Hit>,
}

/// App state
pub struct AppState {
    pub engine: Arc<MarkerEngine>,
    pub sessions: RwLock<HashMap<String, Session>>,
}

/// Create new session response
#[derive(Debug, Serialize)]
pub struct NewSessionResponse {
    pub session_id: String,
    pub websocket_url: String,
}

/// Session status response
#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub unit_count: usize,
    pub hit_count: usize,
}

/// Add message request
#[derive(Debug, Deserialize)]
pub struct AddMessageRequest {
    pub text: String,
}

/// Add message response
#[derive(Debug, Serialize)]
pub struct AddMessageResponse {
    pub unit_index: usize,
    pub unit: UnitEvaluation,
    pub new_hits: Vec<Hit>,
    pub hit_count: usize,
}

/// Stateless evaluation request
#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub text: String,
}

/// Session hits response
#[derive(Debug, Serialize)]
pub struct SessionHitsResponse {
    pub session_id: String,
    pub hits: Vec<Hit>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions_active: usize,
    pub markers_loaded: usize,
}

/// Create the API router
pub fn create_router(engine: Arc<MarkerEngine>) -> Router {
    let state = Arc::new(AppState {
        engine,
        sessions: RwLock::new(HashMap::new()),
    });

    Router::new()
        .route("/health", get(health))
        .route("/evaluate", post(evaluate))
        .route("/session/new", post(create_session))
        .route("/session/:id", get(get_session))
        .route("/session/:id/message", post(add_message))
        .route("/session/:id/hits", get(get_hits))
        .route("/ws/:id", get(websocket_handler))
        .with_state(state)
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sessions = state.sessions.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        sessions_active: sessions.len(),
        markers_loaded: state.engine.snapshot().len(),
    })
}

/// Stateless single-text evaluation
async fn evaluate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EvaluateRequest>,
) -> Json<UnitEvaluation> {
    Json(state.engine.evaluate_unit(&req.text))
}

/// Create new session
async fn create_session(State(state): State<Arc<AppState>>) -> Json<NewSessionResponse> {
    let session_id = generate_session_id();
    let (tx, _) = broadcast::channel(100);

    let session = Session {
        id: session_id.clone(),
        units: Vec::new(),
        hits: Vec::new(),
        update_tx: tx,
    };

    let mut sessions = state.sessions.write().await;
    sessions.insert(session_id.clone(), session);

    Json(NewSessionResponse {
        session_id: session_id.clone(),
        websocket_url: format!("/ws/{}", session_id),
    })
}

/// Get session status
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatusResponse>, StatusCode> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(SessionStatusResponse {
        session_id: session.id.clone(),
        unit_count: session.units.len(),
        hit_count: session.hits.len(),
    }))
}

/// Add a message to a session and re-evaluate the whole sequence
async fn add_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<AddMessageRequest>,
) -> Result<Json<AddMessageResponse>, StatusCode> {
    let mut sessions = state.sessions.write().await;
    let session = sessions.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;

    session.units.push(req.text.clone());
    let unit_index = session.units.len() - 1;

    let unit = state.engine.evaluate_unit(&req.text);
    let hits = state.engine.evaluate_sequence(&session.units);

    // Hits absent from the previous evaluation, keyed by (id, unit_index)
    let previous: HashSet<(String, Option<usize>)> = session
        .hits
        .iter()
        .map(|h| (h.marker_id.clone(), h.unit_index))
        .collect();
    let new_hits: Vec<Hit> = hits
        .iter()
        .filter(|h| !previous.contains(&(h.marker_id.clone(), h.unit_index)))
        .cloned()
        .collect();

    session.hits = hits;

    let update = SessionUpdate {
        unit_count: session.units.len(),
        hit_count: session.hits.len(),
        new_hits: new_hits.clone(),
    };
    let _ = session.update_tx.send(update);

    Ok(Json(AddMessageResponse {
        unit_index,
        unit,
        new_hits,
        hit_count: session.hits.len(),
    }))
}

/// Get all hits for a session
async fn get_hits(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionHitsResponse>, StatusCode> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(SessionHitsResponse {
        session_id: session.id.clone(),
        hits: session.hits.clone(),
    }))
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let sessions = state.sessions.read().await;
    let session = sessions.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let rx = session.update_tx.subscribe();
    drop(sessions);

    Ok(ws.on_upgrade(move |socket| async move {
        handle_websocket(socket, rx).await;
    }))
}

/// Handle WebSocket connection
async fn handle_websocket(mut socket: WebSocket, mut rx: broadcast::Receiver<SessionUpdate>) {
    while let Ok(update) = rx.recv().await {
        let json = serde_json::to_string(&update).unwrap_or_default();
        if socket.send(Message::Text(json)).await.is_err() {
            break;
        }
    }
}

/// Generate session ID
fn generate_session_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("session_{:x}", nanos as u64)
}

/// Run the API server
pub async fn run_server(
    addr: &str,
    engine: Arc<MarkerEngine>,
) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router(engine);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr, "marker evaluator API listening");
    println!("Marker evaluator API running on {}", addr);
    println!("  POST /evaluate            - Evaluate one text");
    println!("  POST /session/new         - Create session");
    println!("  GET  /session/:id         - Get status");
    println!("  POST /session/:id/message - Add message");
    println!("  GET  /session/:id/hits    - Full hit list");
    println!("  WS   /ws/:id              - Live updates");
    println!("  GET  /health              - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
