//!
//! caregate HTTP server
//! --------------------
//! Axum-based HTTP surface of the session-token authorization gateway.
//!
//! Responsibilities:
//! - Device login/logout backed by the credential store adapter.
//! - Bearer-token authentication on every protected route via an explicit
//!   `authenticate` step producing a typed `Principal` for handler logic.
//! - Login-check endpoint that authorizes and registers the caller on its
//!   sensor-report topic through the broker bridge.
//! - Account profile endpoint for the authenticated caller.
//! - First-run demo account seeding when running on the in-memory store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::broker::{BrokerAdapter, HttpBroker, MemoryBroker};
use crate::error::{AppError, CheckError, LoginError};
use crate::identity::{AuthService, LoginRequest, SessionCache, TokenCodec, SESSION_TTL_SECS};
use crate::store::{with_lookup_timeout, Account, AccountRole, CredentialStore, Gender, MemoryStore};

/// Header carrying the bearer token on authenticated endpoints.
pub const AUTH_TOKEN_HEADER: &str = "auth-token";

/// Shared server state injected into all handlers. Created once at startup
/// and torn down at shutdown; the session cache lives here, not in a global.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub store: Arc<dyn CredentialStore>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        broker: Arc<dyn BrokerAdapter>,
        ttl: Duration,
        codec: TokenCodec,
    ) -> Self {
        let auth = AuthService::new(store.clone(), broker, SessionCache::new(ttl), codec);
        Self { auth: Arc::new(auth), store }
    }
}

/// Mount all gateway routes on the given state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "caregate ok" }))
        .route("/login", put(login))
        .route("/session", delete(logout))
        .route("/session/{account_id}/check", get(check_login))
        .route("/account/me", get(account_me))
        .with_state(state)
}

pub async fn run_with_ports(http_port: u16) -> anyhow::Result<()> {
    let ttl_secs = std::env::var("CAREGATE_SESSION_TTL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(SESSION_TTL_SECS);

    let store = Arc::new(MemoryStore::new());
    seed_demo_accounts(&store)?;

    let broker: Arc<dyn BrokerAdapter> = match std::env::var("CAREGATE_BROKER_URL") {
        Ok(url) if !url.trim().is_empty() => {
            info!("using broker management API at {}", url);
            Arc::new(HttpBroker::new(url)?)
        }
        _ => {
            info!("no CAREGATE_BROKER_URL set, recording subscriptions in-process");
            Arc::new(MemoryBroker::new())
        }
    };

    let state = AppState::new(store, broker, Duration::from_secs(ttl_secs), token_codec_from_env());

    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting gateway on {} (session ttl {}s)", addr, ttl_secs);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

/// Convenience entry point using the default port (7878) or
/// `CAREGATE_HTTP_PORT`.
pub async fn run() -> anyhow::Result<()> {
    let port = std::env::var("CAREGATE_HTTP_PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(7878);
    run_with_ports(port).await
}

/// Signing key from `CAREGATE_TOKEN_KEY` (hex), or a fresh random key.
/// Sessions only live in the in-process cache, so an ephemeral key loses
/// nothing a restart does not lose anyway.
fn token_codec_from_env() -> TokenCodec {
    match std::env::var("CAREGATE_TOKEN_KEY") {
        Ok(hex_key) if !hex_key.trim().is_empty() => match hex::decode(hex_key.trim()) {
            Ok(key) => TokenCodec::new(key),
            Err(e) => {
                warn!("CAREGATE_TOKEN_KEY is not valid hex ({e}), generating an ephemeral key");
                TokenCodec::new(TokenCodec::random_key())
            }
        },
        _ => {
            info!("no CAREGATE_TOKEN_KEY set, generating an ephemeral key");
            TokenCodec::new(TokenCodec::random_key())
        }
    }
}

/// Seed a linked elder/guardian pair so the gateway is usable out of the box
/// on the in-memory store.
fn seed_demo_accounts(store: &MemoryStore) -> anyhow::Result<()> {
    store.add_account(Account {
        id: "u1001".into(),
        phone: "123456".into(),
        password_hash: crate::security::hash_password("123456")?,
        nickname: "demo-elder".into(),
        gender: Gender::Female,
        role: AccountRole::Elder,
        portrait: None,
        register_date: Utc::now(),
    });
    store.add_account(Account {
        id: "u2001".into(),
        phone: "654321".into(),
        password_hash: crate::security::hash_password("654321")?,
        nickname: "demo-guardian".into(),
        gender: Gender::Male,
        role: AccountRole::Guardian,
        portrait: None,
        register_date: Utc::now(),
    });
    store.link_guardian("u1001", "u2001");
    info!("seeded demo accounts: elder 123456, guardian 654321");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    phone: String,
    password: String,
}

/// Profile fields returned to the authenticated caller. Never the hash, and
/// never the portrait bytes themselves (static assets are served elsewhere).
#[derive(Debug, Serialize)]
struct AccountInfo {
    id: String,
    phone: String,
    nickname: String,
    gender: Gender,
    role: AccountRole,
    register_date: DateTime<Utc>,
    has_portrait: bool,
}

impl From<&Account> for AccountInfo {
    fn from(a: &Account) -> Self {
        Self {
            id: a.id.clone(),
            phone: a.phone.clone(),
            nickname: a.nickname.clone(),
            gender: a.gender,
            role: a.role,
            register_date: a.register_date,
            has_portrait: a.portrait.is_some(),
        }
    }
}

fn header_token<'a>(headers: &'a HeaderMap) -> Option<&'a str> {
    headers.get(AUTH_TOKEN_HEADER).and_then(|v| v.to_str().ok())
}

fn err_response(app: AppError) -> Response {
    let status = StatusCode::from_u16(app.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"result_code": app.code_str(), "message": app.message()}))).into_response()
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> Response {
    let req = LoginRequest { phone: payload.phone, password: payload.password };
    match state.auth.login(&req).await {
        Ok(resp) => (
            StatusCode::CREATED,
            Json(json!({"result_code": "success", "message": "Login successfully", "token": resp.token})),
        )
            .into_response(),
        Err(e) => {
            match &e {
                LoginError::Store(cause) => error!(phone = %req.phone, "login store failure: {cause}"),
                other => debug!(phone = %req.phone, "login rejected: {other}"),
            }
            err_response(e.into())
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = header_token(&headers) else {
        return err_response(AppError::invalid_token());
    };
    match state.auth.logout(token) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            debug!("logout rejected: {e}");
            err_response(AppError::invalid_token())
        }
    }
}

async fn check_login(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(token) = header_token(&headers) else {
        return err_response(AppError::invalid_token());
    };
    match state.auth.check_login(token, &account_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"result_code": "success", "message": "OK"})),
        )
            .into_response(),
        Err(e) => {
            match &e {
                CheckError::Auth(cause) => debug!(claimed = %account_id, "check rejected: {cause}"),
                CheckError::Access(cause) => warn!(claimed = %account_id, "check forbidden: {cause}"),
                CheckError::Broker(cause) => error!(claimed = %account_id, "subscribe failed: {cause}"),
            }
            err_response(e.into())
        }
    }
}

async fn account_me(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = header_token(&headers) else {
        return err_response(AppError::invalid_token());
    };
    let caller = match state.auth.authenticate(token) {
        Ok(p) => p,
        Err(e) => {
            debug!("account lookup rejected: {e}");
            return err_response(AppError::invalid_token());
        }
    };
    match with_lookup_timeout(state.store.find_account_by_id(&caller.account_id)).await {
        Ok(Some(account)) => (
            StatusCode::OK,
            Json(json!({"result_code": "success", "account": AccountInfo::from(&account)})),
        )
            .into_response(),
        Ok(None) => err_response(AppError::not_found("account_not_exist", "Account does not exist")),
        Err(e) => {
            error!(account = %caller.account_id, "account lookup store failure: {e}");
            err_response(AppError::dependency("store_unavailable", "Credential store unavailable, retry later"))
        }
    }
}
