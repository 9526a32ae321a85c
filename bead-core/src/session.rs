//! GameSession - one player's game against the AI partner.
//!
//! Owns the message history and the current trajectory state, sends each
//! user turn with bounded retries, replaces the trajectory state wholesale
//! on success, and mirrors every change into a persisted slot.

use crate::gallery::NewGame;
use crate::persist::{SavedSession, SlotStore};
use crate::trajectory::{Message, TrajectoryState};
use crate::turn::{TurnClient, TurnFailure};
use thiserror::Error;

pub const DEFAULT_SLOT_KEY: &str = "gbg_game_state";
pub const DEFAULT_MAX_RETRIES: usize = 2;
pub const DEFAULT_FAILURE_MESSAGE: &str =
    "I encountered an error processing your message. Please try rephrasing or starting fresh.";

/// Errors from GameSession operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a turn is already in progress")]
    TurnInProgress,
}

/// Configuration for a game session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Persisted slot name.
    pub slot_key: String,

    /// Retries after the first attempt.
    pub max_retries: usize,

    /// Assistant message appended when every attempt fails.
    pub failure_message: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            slot_key: DEFAULT_SLOT_KEY.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slot_key(mut self, key: impl Into<String>) -> Self {
        self.slot_key = key.into();
        self
    }

    pub fn with_max_retries(mut self, retries: usize) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    /// Total attempts per turn.
    pub fn attempts(&self) -> usize {
        self.max_retries.saturating_add(1)
    }
}

/// What a call to [`GameSession::send_turn`] did.
#[derive(Debug)]
pub enum TurnOutcome {
    /// Blank input; nothing changed.
    Ignored,

    /// A response was accepted on attempt number `attempts`.
    Completed { attempts: usize },

    /// Every attempt failed. The trajectory state is untouched and the
    /// failure text was appended as an assistant message.
    Failed {
        attempts: usize,
        last_error: TurnFailure,
    },
}

/// A Glass Bead Game session.
pub struct GameSession<C, S> {
    client: C,
    store: S,
    config: SessionConfig,
    messages: Vec<Message>,
    trajectory_state: TrajectoryState,
    is_loading: bool,
    error: Option<String>,
}

impl<C: TurnClient, S: SlotStore> GameSession<C, S> {
    /// A fresh, empty session. Nothing is read from the slot.
    pub fn new(client: C, store: S, config: SessionConfig) -> Self {
        Self {
            client,
            store,
            config,
            messages: Vec::new(),
            trajectory_state: TrajectoryState::default(),
            is_loading: false,
            error: None,
        }
    }

    /// A session resumed from the slot when it holds a readable document.
    ///
    /// An absent, unreadable or mismatched document yields an empty session.
    pub async fn restore(client: C, store: S, config: SessionConfig) -> Self {
        let mut session = Self::new(client, store, config);

        match session.store.read(&session.config.slot_key).await {
            Ok(Some(content)) => match SavedSession::from_json(&content) {
                Ok(saved) => {
                    tracing::info!(
                        messages = saved.messages.len(),
                        lines = saved.trajectory_state.trajectory.len(),
                        "session restored"
                    );
                    session.messages = saved.messages;
                    session.trajectory_state = saved.trajectory_state;
                }
                Err(e) => tracing::warn!(error = %e, "ignoring unreadable saved session"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "could not read saved session"),
        }

        session
    }

    /// Send one user turn.
    ///
    /// The user message is appended immediately and stays in the history
    /// whatever happens next. The full history goes out on every attempt.
    pub async fn send_turn(&mut self, text: &str) -> Result<TurnOutcome, SessionError> {
        if text.trim().is_empty() {
            return Ok(TurnOutcome::Ignored);
        }
        if self.is_loading {
            return Err(SessionError::TurnInProgress);
        }

        self.messages.push(Message::user(text));
        self.is_loading = true;
        self.error = None;
        self.persist().await;

        let attempts = self.config.attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.client.request_turn(&self.messages).await {
                Ok(response) => {
                    self.messages
                        .push(Message::assistant(response.conversational_response));
                    self.trajectory_state = response.trajectory_state;
                    self.is_loading = false;
                    self.persist().await;

                    tracing::info!(
                        attempt,
                        lines = self.trajectory_state.trajectory.len(),
                        "turn completed"
                    );
                    return Ok(TurnOutcome::Completed { attempts: attempt });
                }
                Err(e) => {
                    tracing::warn!(attempt, max = attempts, error = %e, "turn attempt failed");
                    last_error = Some(e);
                }
            }
        }

        let last_error = last_error.unwrap_or_else(|| {
            TurnFailure::Transport("no attempts were made".to_string())
        });
        self.error = Some(format!("Failed to process message: {last_error}"));
        self.messages
            .push(Message::assistant(self.config.failure_message.clone()));
        self.is_loading = false;
        self.persist().await;

        Ok(TurnOutcome::Failed {
            attempts,
            last_error,
        })
    }

    /// Clear the session and delete its slot.
    pub async fn reset_game(&mut self) {
        self.messages.clear();
        self.trajectory_state = TrajectoryState::default();
        self.is_loading = false;
        self.error = None;

        if let Err(e) = self.store.remove(&self.config.slot_key).await {
            tracing::warn!(error = %e, "could not remove saved session");
        }
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// The current state serialized for the gallery.
    pub fn publish(
        &self,
        pseudonym: impl Into<String>,
        title: impl Into<String>,
        reflection: impl Into<String>,
    ) -> NewGame {
        NewGame::from_state(pseudonym, title, &self.trajectory_state, reflection)
    }

    pub fn snapshot(&self) -> SavedSession {
        SavedSession::new(self.messages.clone(), self.trajectory_state.clone())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn trajectory_state(&self) -> &TrajectoryState {
        &self.trajectory_state
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn persist(&self) {
        let result = match self.snapshot().to_json() {
            Ok(json) => self.store.write(&self.config.slot_key, &json).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "could not persist session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemorySlotStore;
    use crate::testing::{sample_response, ScriptedTurns};

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.slot_key, "gbg_game_state");
        assert_eq!(config.attempts(), 3);
        assert!(config.failure_message.starts_with("I encountered an error"));
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let turns = ScriptedTurns::new();
        let mut session = GameSession::new(turns, MemorySlotStore::new(), SessionConfig::default());

        let outcome = session.send_turn("   \n").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Ignored));
        assert!(session.messages().is_empty());
        assert!(session.client().calls().is_empty());
    }

    #[tokio::test]
    async fn test_reentrant_turn_is_rejected() {
        let turns = ScriptedTurns::new().then_ok(sample_response("Hi"));
        let mut session = GameSession::new(turns, MemorySlotStore::new(), SessionConfig::default());
        session.is_loading = true;

        assert!(matches!(
            session.send_turn("hello").await,
            Err(SessionError::TurnInProgress)
        ));
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_clear_error() {
        let turns = ScriptedTurns::new().then_transport_error("down");
        let config = SessionConfig::default().with_max_retries(0);
        let mut session = GameSession::new(turns, MemorySlotStore::new(), config);

        let outcome = session.send_turn("hello").await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Failed { attempts: 1, .. }));
        assert!(session.error().is_some());

        session.clear_error();
        assert!(session.error().is_none());
        assert_eq!(session.messages().len(), 2);
    }
}
