//! Axum handlers for the four endpoints.

use std::sync::Arc;

use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use escalation::{StartParams, TokenError, TokenQuery, ValidationError, VoiceScript, WebhookEvent};
use thiserror::Error;
use tracing::{error, warn};

use crate::service::StartReply;
use crate::AppState;

const TWIML_CONTENT_TYPE: &str = "text/xml";

/// Errors surfaced to HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Malformed form body: {0}")]
    Form(#[from] FormRejection),

    #[error("Malformed continuation token: {0}")]
    Json(#[from] JsonRejection),

    #[error("Invalid continuation token: {0}")]
    Token(#[from] TokenError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Form(_) | Self::Json(_) | Self::Token(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

impl IntoResponse for StartReply {
    fn into_response(self) -> Response {
        let body = match self {
            StartReply::Dialing(to) => format!("call starting to {to}"),
            StartReply::LoopOver => "Loop is over".to_string(),
            StartReply::Accepted(_) => String::new(),
        };
        (StatusCode::OK, body).into_response()
    }
}

/// TwiML response wrapper.
pub struct Twiml(pub VoiceScript);

impl IntoResponse for Twiml {
    fn into_response(self) -> Response {
        match self.0.to_twiml() {
            Ok(body) => ([(header::CONTENT_TYPE, TWIML_CONTENT_TYPE)], body).into_response(),
            Err(e) => {
                error!(error = %e, "Failed to render TwiML");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// `POST /start`
pub async fn start(
    State(state): State<Arc<AppState>>,
    params: Result<Form<StartParams>, FormRejection>,
) -> Result<StartReply, ApiError> {
    let Form(params) = params?;
    Ok(state.service.start(params).await?)
}

/// `POST /call/start`
///
/// Answers as soon as the token checks out; the call is placed in the
/// background.
pub async fn launch(
    State(state): State<Arc<AppState>>,
    query: Result<Json<TokenQuery>, JsonRejection>,
) -> Result<(StatusCode, String), ApiError> {
    let Json(query) = query?;
    let to = state.service.launch(&query)?;
    Ok((StatusCode::ACCEPTED, format!("call starting to {to}")))
}

/// `POST /call/webhook?v=&state=`
///
/// Always answers with TwiML; the provider would otherwise play an error
/// message to whoever picked up.
pub async fn webhook(
    State(state): State<Arc<AppState>>,
    query: Result<Query<TokenQuery>, QueryRejection>,
    event: Result<Form<WebhookEvent>, FormRejection>,
) -> Twiml {
    let Query(query) = match query {
        Ok(query) => query,
        Err(e) => {
            warn!(error = %e, "Webhook without continuation state, hanging up");
            return Twiml(VoiceScript::hang_up());
        }
    };
    let event = match event {
        Ok(Form(event)) => event,
        Err(e) => {
            warn!(error = %e, "Unreadable webhook body, ignoring");
            return Twiml(VoiceScript::empty());
        }
    };
    Twiml(state.service.handle_webhook(&query, event).await)
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}
