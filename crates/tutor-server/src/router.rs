//! HTTP routes and server entry point

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use tutor_core::{Error, Result};
use tutor_rag::AnswerAssembler;
use tutor_store::Database;

use crate::error::ApiError;
use crate::requests::{
    ChatRequest, ChatResponse, PersonalizeRequest, SigninRequest, SignupRequest, TranslateRequest,
};
use crate::transforms;

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<AnswerAssembler>,
    pub db: Database,
}

impl AppState {
    pub fn new(assembler: AnswerAssembler, db: Database) -> Self {
        Self {
            assembler: Arc::new(assembler),
            db,
        }
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/signup", post(signup_handler))
        .route("/signin", post(signin_handler))
        .route("/personalize", post(personalize_handler))
        .route("/translate", post(translate_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until Ctrl-C
pub async fn serve(address: &str, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|e| Error::Configuration(format!("Failed to bind {address}: {e}")))?;
    info!(address = %address, "gateway listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "Physical AI Chatbot API is running!" }))
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let Json(request) = payload?;
    let (question, selected_text) = request.validate()?;
    debug!(selected = selected_text.is_some(), "chat request");

    let answer = state
        .assembler
        .answer_question(&question, selected_text.as_deref())
        .await?;

    Ok(Json(ChatResponse {
        response: answer.text,
        sources: answer.sources,
    }))
}

async fn signup_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    let user = state.db.create_user(request.validate()?).await?;
    Ok(Json(json!({ "success": true, "user": user })))
}

async fn signin_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SigninRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    let (email, password) = request.validate()?;
    let user = state.db.authenticate(&email, &password).await?;
    Ok(Json(json!({ "success": true, "user": user })))
}

async fn personalize_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PersonalizeRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    let (content, background) = request.validate()?;
    let text =
        transforms::personalize(state.assembler.generator().as_ref(), &content, &background)
            .await?;
    Ok(Json(json!({ "personalizedContent": text })))
}

async fn translate_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TranslateRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    let (content, language) = request.validate()?;
    let text =
        transforms::translate(state.assembler.generator().as_ref(), &content, language).await?;
    Ok(Json(json!({ "translatedContent": text })))
}
