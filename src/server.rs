//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `POST` | `/users/register` | none | Create a user |
//! | `POST` | `/users/login` | none | Exchange credentials for a bearer token |
//! | `POST` | `/chat` | Bearer | Ask the diving assistant |
//! | `GET`  | `/health` | none | Health check (version and engine state) |
//!
//! # Error Contract
//!
//! Every non-2xx response has the same shape:
//!
//! ```json
//! { "error": { "code": "unauthorized", "message": "missing bearer token" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `conflict` (409),
//! `internal` (500). `/chat` itself never fails once authenticated: engine
//! and model errors come back as a 200 with a fallback `response`.
//!
//! # Middleware
//!
//! Outermost first: request tracing, CORS, then the bearer-token check on
//! `/chat`, which attaches a [`Principal`] to the request.

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{AuthError, Authenticator, Principal};
use crate::config::{Config, ServerConfig};
use crate::embedding::create_embedder;
use crate::generator::{AnswerGenerator, EngineStatus};
use crate::ingest::CorpusPipeline;
use crate::llm::create_chat_model;
use crate::{db, migrate};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<AnswerGenerator>,
    pub auth: Arc<Authenticator>,
}

impl AppState {
    pub fn new(generator: AnswerGenerator, auth: Authenticator) -> Self {
        Self {
            generator: Arc::new(generator),
            auth: Arc::new(auth),
        }
    }
}

/// Starts the HTTP server on `[server].bind`.
///
/// Opens (and migrates) the user database, wires the configured embedding
/// and chat providers into a lazily initialized [`AnswerGenerator`], and
/// serves until the process is terminated. With `warm`, the knowledge base
/// is indexed right after binding; a failure there is logged and the
/// engine is retried on the first chat message.
pub async fn run_server(config: &Config, warm: bool) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let embedder = create_embedder(&config.embedding)?;
    let llm = create_chat_model(&config.llm)?;
    let pipeline = CorpusPipeline::new(config, embedder);

    let state = AppState::new(
        AnswerGenerator::new(Arc::new(pipeline), llm),
        Authenticator::from_config(pool, &config.auth),
    );
    let app = build_router(state.clone(), &config.server)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;

    tracing::info!(
        bind = %config.server.bind,
        embedding = %config.embedding.provider,
        llm = %config.llm.provider,
        "server listening"
    );

    if warm {
        let generator = state.generator.clone();
        tokio::spawn(async move {
            generator.warm_up().await;
        });
    }

    axum::serve(listener, app).await?;

    Ok(())
}

/// Assemble routes and the middleware stack around `state`.
pub fn build_router(state: AppState, server: &ServerConfig) -> anyhow::Result<Router> {
    let protected = Router::new()
        .route("/chat", post(handle_chat))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let app = Router::new()
        .route("/users/register", post(handle_register))
        .route("/users/login", post(handle_login))
        .route("/health", get(handle_health))
        .merge(protected)
        .layer(cors_layer(&server.cors_origins)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

/// Explicit origins allow credentials; an empty list allows any origin
/// without credentials.
fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {}", o))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        if let AuthError::Storage(reason) = &err {
            tracing::error!(%reason, "auth storage failure");
            return AppError {
                status: err.status(),
                code: err.code().to_string(),
                message: "internal server error".to_string(),
            };
        }
        AppError {
            status: err.status(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ Auth middleware ============

/// Rejects requests without a valid `Authorization: Bearer <token>` and
/// attaches the caller's [`Principal`] otherwise.
async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let principal = state.auth.verify_token(token).await?;
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    engine: EngineStatus,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.generator.status(),
    })
}

// ============ /users ============

#[derive(Deserialize)]
struct CredentialsRequest {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

async fn handle_register(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    let Json(req) = payload?;
    let username = req.username.unwrap_or_default();
    let password = req.password.unwrap_or_default();

    state.auth.register(&username, &password).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully".to_string(),
        }),
    ))
}

async fn handle_login(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(req) = payload?;
    let username = req.username.unwrap_or_default();
    let password = req.password.unwrap_or_default();

    let principal = state.auth.authenticate(&username, &password).await?;
    tracing::debug!(user_id = principal.user_id, "login succeeded");

    Ok(Json(TokenResponse {
        token: state.auth.issue_token(&principal)?,
    }))
}

// ============ POST /chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

async fn handle_chat(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = payload?;
    let message = req.message.unwrap_or_default();

    let answer = state.generator.answer(&message).await;
    tracing::info!(
        user = %principal.username,
        outcome = ?answer.outcome,
        "chat answered"
    );

    Ok(Json(ChatResponse {
        response: answer.content,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_rejects_invalid_origin() {
        assert!(cors_layer(&["http://localhost:3001".to_string()]).is_ok());
        assert!(cors_layer(&[
            "http://localhost:3001".to_string(),
            "https://thankful-smoke-08a741103.1.azurestaticapps.net".to_string(),
        ])
        .is_ok());
        assert!(cors_layer(&[]).is_ok());
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }

    #[test]
    fn test_auth_errors_map_to_contract() {
        let err: AppError = AuthError::UserExists.into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "conflict");

        let err: AppError = AuthError::Storage("disk I/O error".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "internal server error");
    }
}
