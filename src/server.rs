//!
//! gatehouse HTTP server
//! ---------------------
//! This module defines the Axum-based HTTP API for gatehouse: the login and
//! logout endpoints for both principal classes, the manager administration
//! surface, and the access-control middleware chain that fronts it.
//!
//! Responsibilities:
//! - The three composable guards (team, admin, full-manager-only) applied per
//!   route group in strict order; guards short-circuit before the handler.
//! - The shared response envelope: 2xx + `{"error":0,"msg":<payload>}` on
//!   success, status + `{"error":<code>,"msg":<localized text>}` on failure.
//! - Language negotiation from Accept-Language for display text.
//! - First-run bootstrap of an admin account on an empty store.
//!
//! Bearer credentials travel in the Authorization header as the raw opaque
//! token, no scheme prefix. Identity is recomputed from the store on every
//! request; there is no session cache to invalidate.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::AppError;
use crate::identity::{self, Principal, PrincipalKind};
use crate::locales;
use crate::storage::CredentialStore;

/// Shared server state injected into all handlers and guards. The store is
/// the single owner of credential rows; handlers only hold request-scoped
/// copies of resolved principals.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CredentialStore>,
}

fn lang_of(headers: &HeaderMap) -> &'static str {
    locales::negotiate(headers.get("accept-language").and_then(|v| v.to_str().ok()))
}

/// Raw opaque token from the Authorization header; empty when absent.
fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_string()
}

fn ok_json<T: Serialize>(payload: T) -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({"error": 0, "msg": payload})))
}

fn err_json(lang: &str, e: &AppError) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": e.wire_code(), "msg": e.message(lang)})))
}

// ----- access-control middleware chain -----

/// Guard 1: requires a token resolving to a team row and binds the team
/// principal into request extensions for downstream handlers.
async fn team_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let lang = lang_of(req.headers());
    let token = bearer(req.headers());
    if token.is_empty() {
        return err_json(lang, &AppError::NoAuth).into_response();
    }
    match identity::resolve(&state.store, &token, PrincipalKind::Team) {
        Some(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        None => err_json(lang, &AppError::Unauthorized).into_response(),
    }
}

/// Guard 2: same shape against the manager table; binds the full manager
/// principal including its check flag.
async fn admin_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let lang = lang_of(req.headers());
    let token = bearer(req.headers());
    if token.is_empty() {
        return err_json(lang, &AppError::NoAuth).into_response();
    }
    match identity::resolve(&state.store, &token, PrincipalKind::Manager) {
        Some(principal) => {
            req.extensions_mut().insert(principal);
            next.run(req).await
        }
        None => err_json(lang, &AppError::Unauthorized).into_response(),
    }
}

/// Guard 3: must run after `admin_auth`; rejects check-bot accounts so the
/// full manager surface stays closed to them.
async fn manager_required(req: Request, next: Next) -> Response {
    let lang = lang_of(req.headers());
    match req.extensions().get::<Principal>() {
        Some(p) if p.is_full_manager() => next.run(req).await,
        Some(_) => err_json(lang, &AppError::ManagerRequired).into_response(),
        // admin_auth not layered underneath; treat as unauthenticated
        None => err_json(lang, &AppError::NoAuth).into_response(),
    }
}

// ----- request payloads -----

#[derive(Debug, Deserialize)]
struct LoginPayload {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Password")]
    password: String,
}

#[derive(Debug, Deserialize)]
struct NewManagerPayload {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Password")]
    password: String,
    #[serde(rename = "IsCheck", default)]
    is_check: bool,
}

fn parse_id(params: &HashMap<String, String>) -> Result<u32, AppError> {
    let Some(raw) = params.get("id") else {
        return Err(AppError::Query);
    };
    raw.parse::<u32>().map_err(|_| AppError::must_be_number("id"))
}

// ----- handlers -----

async fn root() -> (StatusCode, Json<Value>) {
    ok_json("gatehouse")
}

async fn team_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let lang = lang_of(&headers);
    let Ok(Json(payload)) = payload else {
        return err_json(lang, &AppError::Payload);
    };
    match identity::team_login(&state.store, &payload.name, &payload.password) {
        Ok(token) => ok_json(token),
        Err(e) => err_json(lang, &e),
    }
}

async fn team_logout(State(state): State<AppState>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let lang = lang_of(&headers);
    match identity::team_logout(&state.store, &bearer(&headers)) {
        Ok(()) => ok_json(locales::t(lang, "team.logout_success")),
        Err(e) => err_json(lang, &e),
    }
}

async fn team_info(Extension(principal): Extension<Principal>) -> (StatusCode, Json<Value>) {
    ok_json(json!({"Id": principal.id, "Name": principal.name}))
}

async fn manager_login(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let lang = lang_of(&headers);
    let Ok(Json(payload)) = payload else {
        return err_json(lang, &AppError::Payload);
    };
    match identity::manager_login(&state.store, &payload.name, &payload.password) {
        Ok(token) => ok_json(token),
        Err(e) => err_json(lang, &e),
    }
}

/// Unguarded: reads the header if present and succeeds either way, so logout
/// is idempotent.
async fn manager_logout(State(state): State<AppState>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let lang = lang_of(&headers);
    match identity::manager_logout(&state.store, &bearer(&headers)) {
        Ok(()) => ok_json(locales::t(lang, "manager.logout_success")),
        Err(e) => err_json(lang, &e),
    }
}

async fn get_all_managers(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    ok_json(identity::list_managers(&state.store))
}

async fn new_manager(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<NewManagerPayload>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    let lang = lang_of(&headers);
    let Ok(Json(payload)) = payload else {
        return err_json(lang, &AppError::Payload);
    };
    let req = identity::NewManager {
        name: payload.name,
        password: payload.password,
        is_check: payload.is_check,
    };
    match identity::new_manager(&state.store, &req) {
        Ok(()) => ok_json(locales::t(lang, "manager.post_success")),
        Err(e) => err_json(lang, &e),
    }
}

async fn refresh_manager_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let lang = lang_of(&headers);
    let id = match parse_id(&params) {
        Ok(id) => id,
        Err(e) => return err_json(lang, &e),
    };
    match identity::refresh_manager_token(&state.store, id) {
        Ok(token) => ok_json(token),
        Err(e) => err_json(lang, &e),
    }
}

async fn change_manager_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let lang = lang_of(&headers);
    let id = match parse_id(&params) {
        Ok(id) => id,
        Err(e) => return err_json(lang, &e),
    };
    match identity::reset_manager_password(&state.store, id) {
        Ok(password) => ok_json(password),
        Err(e) => err_json(lang, &e),
    }
}

async fn delete_manager(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let lang = lang_of(&headers);
    let id = match parse_id(&params) {
        Ok(id) => id,
        Err(e) => return err_json(lang, &e),
    };
    match identity::delete_manager(&state.store, id) {
        Ok(()) => ok_json(locales::t(lang, "manager.delete_success")),
        Err(e) => err_json(lang, &e),
    }
}

/// Liveness acknowledgement for check bots. Sits behind the bare admin guard
/// on purpose: check accounts may reach it, the rest of the manager surface
/// rejects them.
async fn check_ack(headers: HeaderMap, Extension(principal): Extension<Principal>) -> (StatusCode, Json<Value>) {
    let lang = lang_of(&headers);
    info!(id = principal.id, name = %principal.name, is_check = principal.is_check, "check ping");
    ok_json(locales::t(lang, "manager.check_ack"))
}

async fn not_found(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    err_json(lang_of(&headers), &AppError::NotFound)
}

/// Build the full application router. Exposed so integration tests can drive
/// the exact production routing table in process.
pub fn build_router(state: AppState) -> Router {
    // Team surface: guard 1 only.
    let team_routes = Router::new()
        .route("/logout", get(team_logout))
        .route("/team/info", get(team_info))
        .route_layer(middleware::from_fn_with_state(state.clone(), team_auth));

    // Full manager surface: guard 2 then guard 3, in that order.
    let manager_routes = Router::new()
        .route("/manager/managers", get(get_all_managers))
        .route("/manager/manager", post(new_manager).delete(delete_manager))
        .route("/manager/manager/token", get(refresh_manager_token))
        .route("/manager/manager/changePassword", get(change_manager_password))
        .route_layer(middleware::from_fn(manager_required))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth));

    // Check sub-surface: guard 2 only, so check bots get through.
    let check_routes = Router::new()
        .route("/manager/check", get(check_ack))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth));

    let api = Router::new()
        .route("/", get(root))
        .route("/login", post(team_login))
        .route("/manager/login", post(manager_login))
        .route("/manager/logout", get(manager_logout))
        .merge(team_routes)
        .merge(manager_routes)
        .merge(check_routes);

    Router::new()
        .nest("/api", api)
        // `nest` matches `/api` but not the trailing-slash form; register the
        // banner at `/api/` explicitly so the documented path resolves.
        .route("/api/", get(root))
        .fallback(not_found)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Start the gatehouse HTTP server bound to the given port, backed by the
/// given credential snapshot file. Bootstraps an admin account when the
/// manager table is empty.
pub async fn run_with_config(http_port: u16, data_file: &str) -> anyhow::Result<()> {
    let store = Arc::new(CredentialStore::open(data_file)?);
    identity::ensure_bootstrap_admin(&store)?;
    let state = AppState { store };
    let app = build_router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Backward-compatible entry that reads the environment
/// Convenience entry point using `GATEHOUSE_HTTP_PORT` (default 19999) and
/// `GATEHOUSE_DATA_FILE` (default data/credentials.json).
pub async fn run() -> anyhow::Result<()> {
    let http_port = std::env::var("GATEHOUSE_HTTP_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(19999);
    let data_file =
        std::env::var("GATEHOUSE_DATA_FILE").unwrap_or_else(|_| "data/credentials.json".to_string());
    run_with_config(http_port, &data_file).await
}
