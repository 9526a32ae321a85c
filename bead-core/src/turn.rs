//! One conversational turn: the inbound turn API and the session's
//! outbound seam.
//!
//! [`TurnService`] is what an HTTP `/api/chat` handler runs: validate the
//! request, call the model, interpret its text. [`TurnClient`] is what a
//! [`crate::session::GameSession`] calls; it is implemented both by the
//! service itself (in-process play) and by [`HttpTurnClient`] (talking to a
//! running server).

use crate::interpret::{interpret, Interpretation, Source};
use crate::oracle::{Oracle, OracleError};
use crate::trajectory::{AiResponse, Message};
use crate::validate::{validate, MalformedAiResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Body of an inbound turn request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub messages: Vec<Message>,
}

impl TurnRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Decode a request body, reporting shape problems as
    /// [`TurnError::BadRequest`].
    pub fn from_value(body: serde_json::Value) -> Result<Self, TurnError> {
        let messages = body
            .get("messages")
            .cloned()
            .ok_or_else(|| TurnError::BadRequest("Invalid messages format".to_string()))?;
        if !messages.is_array() {
            return Err(TurnError::BadRequest("Invalid messages format".to_string()));
        }
        let messages: Vec<Message> = serde_json::from_value(messages)
            .map_err(|e| TurnError::BadRequest(format!("Invalid messages format: {e}")))?;
        if messages.is_empty() {
            return Err(TurnError::BadRequest("messages must not be empty".to_string()));
        }
        Ok(Self { messages })
    }
}

/// Hard failures of the inbound turn API. Never retried.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("{0}")]
    BadRequest(String),

    #[error("API key not configured")]
    MissingCredential,

    #[error("{0}")]
    Upstream(#[from] OracleError),
}

impl TurnError {
    /// HTTP-equivalent status code.
    pub fn status(&self) -> u16 {
        match self {
            TurnError::BadRequest(_) => 400,
            TurnError::MissingCredential | TurnError::Upstream(_) => 500,
        }
    }
}

/// Runs a turn against a model.
pub struct TurnService<O> {
    oracle: O,
}

impl<O: Oracle> TurnService<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Call the model with the full history and interpret the reply.
    ///
    /// Once the model has answered this cannot fail: malformed output is
    /// salvaged or shown verbatim.
    pub async fn handle(&self, request: &TurnRequest) -> Result<Interpretation, TurnError> {
        if request.messages.is_empty() {
            return Err(TurnError::BadRequest("messages must not be empty".to_string()));
        }

        let raw = self.oracle.complete(&request.messages).await?;
        let interpretation = interpret(&raw);

        match interpretation.source {
            Source::Structured { .. } => tracing::debug!(
                lines = interpretation.response.trajectory_state.trajectory.len(),
                commentary = interpretation.response.trajectory_state.commentary.len(),
                "interpreted structured turn"
            ),
            source => tracing::warn!(?source, "turn recovered from unstructured output"),
        }

        Ok(interpretation)
    }
}

/// Why a single turn attempt failed. Both kinds are retryable.
#[derive(Debug, Error)]
pub enum TurnFailure {
    #[error("transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Malformed(#[from] MalformedAiResponse),
}

/// The session's outbound call.
#[async_trait]
pub trait TurnClient: Send + Sync {
    async fn request_turn(&self, messages: &[Message]) -> Result<AiResponse, TurnFailure>;
}

#[async_trait]
impl<T: TurnClient + ?Sized> TurnClient for Arc<T> {
    async fn request_turn(&self, messages: &[Message]) -> Result<AiResponse, TurnFailure> {
        (**self).request_turn(messages).await
    }
}

#[async_trait]
impl<O: Oracle> TurnClient for TurnService<O> {
    async fn request_turn(&self, messages: &[Message]) -> Result<AiResponse, TurnFailure> {
        let request = TurnRequest::new(messages.to_vec());
        self.handle(&request)
            .await
            .map(|interpretation| interpretation.response)
            .map_err(|e| TurnFailure::Transport(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`TurnClient`] that POSTs to a server's `/api/chat`.
#[derive(Clone)]
pub struct HttpTurnClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTurnClient {
    /// `base_url` is the server root, e.g. `http://localhost:8300`.
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TurnClient for HttpTurnClient {
    async fn request_turn(&self, messages: &[Message]) -> Result<AiResponse, TurnFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&TurnRequest::new(messages.to_vec()))
            .send()
            .await
            .map_err(|e| TurnFailure::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TurnFailure::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error)
                .unwrap_or(body);
            return Err(TurnFailure::Transport(format!(
                "API error (status {}): {message}",
                status.as_u16()
            )));
        }

        Ok(validate(&body, &body)?)
    }
}
