//! Roadmap Routes
//!
//! Routes:
//! - GET /roadmap - Public item listing
//! - POST /roadmap/:id/vote - Cookie-keyed voting (no account required)
//! - POST /admin/roadmap - Create an item
//! - PUT /admin/roadmap/:id - Update an item
//! - DELETE /admin/roadmap/:id - Delete an item

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::HeaderMap,
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{self, RoadmapItem};
use crate::services::{VoteOp, VOTE_COOKIE};
use crate::{AppState, Error, Result};

const STATUSES: [&str; 3] = ["planned", "in_progress", "completed"];

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/roadmap", get(list_items))
        .route("/roadmap/:id/vote", post(vote))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_item))
        .route("/:id", put(update_item).delete(delete_item))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RoadmapItemRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_status")]
    pub status: String,
    pub quarter: String,
}

fn default_status() -> String {
    "planned".to_string()
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub op: String,
    /// Opaque browser fingerprint supplied by the client.
    #[serde(default)]
    pub fingerprint: String,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub item: RoadmapItem,
    pub counted: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<RoadmapItem>>> {
    let items = db::list_roadmap_items(&state.db).await?;
    Ok(Json(items))
}

async fn vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    jar: CookieJar,
    Json(request): Json<VoteRequest>,
) -> Result<(CookieJar, Json<VoteResponse>)> {
    // Existence check before touching the ledger
    db::get_roadmap_item(&state.db, &id).await?;

    let op = VoteOp::parse(&request.op)?;
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let key = state.votes.visitor_key(&request.fingerprint, &ip);

    let mut ledger = state
        .votes
        .decode_ledger(jar.get(VOTE_COOKIE).map(|c| c.value()));

    let outcome = state
        .votes
        .apply(&mut ledger, &id, &key, op, chrono::Utc::now())?;

    let item = if outcome.delta != 0 {
        db::adjust_votes(&state.db, &id, outcome.delta).await?
    } else {
        db::get_roadmap_item(&state.db, &id).await?
    };

    debug!(item_id = %id, delta = outcome.delta, "Roadmap vote applied");

    let cookie = Cookie::build((VOTE_COOKIE, state.votes.encode_ledger(&ledger)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((
        jar.add(cookie),
        Json(VoteResponse {
            item,
            counted: outcome.delta != 0,
        }),
    ))
}

async fn create_item(
    State(state): State<AppState>,
    Json(request): Json<RoadmapItemRequest>,
) -> Result<Json<RoadmapItem>> {
    validate(&request)?;
    let item = db::create_roadmap_item(
        &state.db,
        request.title.trim(),
        &request.description,
        &request.status,
        &request.quarter,
    )
    .await?;
    Ok(Json(item))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RoadmapItemRequest>,
) -> Result<Json<RoadmapItem>> {
    validate(&request)?;
    let item = db::update_roadmap_item(
        &state.db,
        &id,
        request.title.trim(),
        &request.description,
        &request.status,
        &request.quarter,
    )
    .await?;
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    db::delete_roadmap_item(&state.db, &id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ============================================================================
// Helpers
// ============================================================================

fn validate(request: &RoadmapItemRequest) -> Result<()> {
    if request.title.trim().is_empty() {
        return Err(Error::Validation("Title is required".to_string()));
    }
    if !STATUSES.contains(&request.status.as_str()) {
        return Err(Error::Validation(format!(
            "Invalid status: {}",
            request.status
        )));
    }
    Ok(())
}

/// Client identity for vote keying: first x-forwarded-for hop, then the
/// socket peer address.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
