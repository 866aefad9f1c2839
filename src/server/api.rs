use crate::agent::{ AgentError, GeminiAgent };
use crate::cli::Args;
use crate::models::api::{ CompletionReply, ErrorReply, HealthReply, ResetReply, StatusReply, UidQuery };
use std::collections::HashMap;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::get,
    Router,
    Json,
    extract::{ State, Query },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use thiserror::Error as ThisError;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Debug, ThisError)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Internal server error")]
    Internal(String),
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) =>
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorReply { error: msg.to_string(), message: None }),
                ).into_response(),
            ApiError::Internal(message) =>
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorReply {
                        error: "Internal server error".to_string(),
                        message: Some(message),
                    }),
                ).into_response(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    agent: Arc<GeminiAgent>,
}

const UID_REQUIRED: &str = "UID is required";
const PROMPT_REQUIRED: &str = "Pro (prompt) is required";

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

/// `image1`, `image2`, ... up to the first index that is missing or empty.
fn image_urls(params: &HashMap<String, String>) -> Vec<String> {
    (1..)
        .map(|i| params.get(&format!("image{}", i)))
        .take_while(|v| non_empty(*v).is_some())
        .flatten()
        .cloned()
        .collect()
}

pub fn router(agent: Arc<GeminiAgent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/gemini", get(gemini_handler))
        .route("/reset", get(reset_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(AppState { agent })
}

pub async fn start_http_server(
    addr: SocketAddr,
    agent: Arc<GeminiAgent>,
    args: &Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let app = router(agent);

    if args.enable_tls {
        let (cert_path, key_path) = match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert), Some(key)) => (cert, key),
            _ => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("TLS enabled without cert/key".into());
            }
        };
        info!("TLS enabled. Loading certificate from '{}' and key from '{}'", cert_path, key_path);
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("Starting HTTPS server on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service()).await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            e
        })?;
        info!("Starting HTTP server on: http://{}", addr);
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal()).await?;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, stopping HTTP server");
}

async fn gemini_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>
) -> Result<Json<CompletionReply>, ApiError> {
    let uid = non_empty(params.get("uid")).ok_or(ApiError::BadRequest(UID_REQUIRED))?;
    let prompt = non_empty(params.get("pro")).ok_or(ApiError::BadRequest(PROMPT_REQUIRED))?;
    let urls = image_urls(&params);

    let outcome = state.agent.process_message(uid, prompt, &urls).await?;

    Ok(
        Json(CompletionReply {
            success: true,
            uid: uid.to_string(),
            prompt: prompt.to_string(),
            images_count: outcome.images_count,
            new_images_added: outcome.new_images_added,
            conversation_length: outcome.conversation_length,
            response: outcome.response,
        })
    )
}

async fn reset_handler(
    State(state): State<AppState>,
    Query(req): Query<UidQuery>
) -> Result<Json<ResetReply>, ApiError> {
    let uid = non_empty(req.uid.as_ref()).ok_or(ApiError::BadRequest(UID_REQUIRED))?;
    state.agent.reset(uid).await;

    Ok(
        Json(ResetReply {
            success: true,
            message: format!("Memory reset for user {}", uid),
        })
    )
}

async fn status_handler(
    State(state): State<AppState>,
    Query(req): Query<UidQuery>
) -> Result<Json<StatusReply>, ApiError> {
    let uid = non_empty(req.uid.as_ref()).ok_or(ApiError::BadRequest(UID_REQUIRED))?;
    let status = state.agent.status(uid).await;

    Ok(
        Json(StatusReply {
            uid: uid.to_string(),
            exists: status.exists,
            images_stored: status.images_stored,
            conversation_length: status.conversation_length,
        })
    )
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthReply { status: "ok" })
}
