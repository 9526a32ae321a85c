//! Testing utilities.
//!
//! - `ScriptedOracle` stands in for the model behind a `TurnService`
//! - `ScriptedTurns` stands in for the whole turn API behind a `GameSession`
//! - `FaultyStore` fails every slot operation
//!
//! Scripted collaborators record the histories they were called with.

use crate::oracle::{Oracle, OracleError};
use crate::persist::{PersistError, SlotStore};
use crate::trajectory::{AiResponse, Commentary, Message, TrajectoryLine, TrajectoryState};
use crate::turn::{TurnClient, TurnFailure};
use crate::validate::MalformedAiResponse;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A turn payload with no trajectory.
pub fn sample_response(text: impl Into<String>) -> AiResponse {
    AiResponse {
        conversational_response: text.into(),
        trajectory_state: TrajectoryState::default(),
    }
}

/// A turn payload carrying `lines` and `commentary`.
pub fn response_with(
    text: impl Into<String>,
    lines: &[&str],
    commentary: &[(u32, &str)],
) -> AiResponse {
    AiResponse {
        conversational_response: text.into(),
        trajectory_state: TrajectoryState::new(
            lines.iter().map(|l| TrajectoryLine::new(*l)).collect(),
            commentary.iter().map(|(n, t)| (*n, *t)).collect::<Commentary>(),
        ),
    }
}

/// An [`Oracle`] that returns queued raw texts.
///
/// Once the queue is empty every call fails.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_reply(self, raw: impl Into<String>) -> Self {
        self.push(Ok(raw.into()));
        self
    }

    pub fn then_fail(self, reason: impl Into<String>) -> Self {
        self.push(Err(reason.into()));
        self
    }

    fn push(&self, reply: Result<String, String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Histories passed to `complete`, in call order.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    async fn complete(&self, messages: &[Message]) -> Result<String, OracleError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        let next = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front());

        match next {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(reason)) => Err(OracleError::Api(openrouter::Error::Api {
                status: 502,
                message: reason,
            })),
            None => Err(OracleError::EmptyResponse),
        }
    }
}

/// A [`TurnClient`] that returns queued results.
///
/// Once the queue is empty every call is a transport failure.
#[derive(Debug, Default)]
pub struct ScriptedTurns {
    results: Mutex<VecDeque<Result<AiResponse, TurnFailure>>>,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedTurns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_ok(self, response: AiResponse) -> Self {
        self.push(Ok(response));
        self
    }

    pub fn then_transport_error(self, reason: impl Into<String>) -> Self {
        self.push(Err(TurnFailure::Transport(reason.into())));
        self
    }

    pub fn then_malformed(self, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        self.push(Err(TurnFailure::Malformed(MalformedAiResponse::new(
            "missing trajectory_state",
            raw,
        ))));
        self
    }

    fn push(&self, result: Result<AiResponse, TurnFailure>) {
        if let Ok(mut results) = self.results.lock() {
            results.push_back(result);
        }
    }

    /// Histories passed to `request_turn`, in call order.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn remaining(&self) -> usize {
        self.results.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TurnClient for ScriptedTurns {
    async fn request_turn(&self, messages: &[Message]) -> Result<AiResponse, TurnFailure> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        self.results
            .lock()
            .ok()
            .and_then(|mut results| results.pop_front())
            .unwrap_or_else(|| Err(TurnFailure::Transport("script exhausted".to_string())))
    }
}

/// A [`SlotStore`] whose every operation fails.
#[derive(Debug, Default)]
pub struct FaultyStore;

#[async_trait]
impl SlotStore for FaultyStore {
    async fn read(&self, _key: &str) -> Result<Option<String>, PersistError> {
        Err(PersistError::Unavailable("storage disabled".to_string()))
    }

    async fn write(&self, _key: &str, _value: &str) -> Result<(), PersistError> {
        Err(PersistError::Unavailable("storage full".to_string()))
    }

    async fn remove(&self, _key: &str) -> Result<(), PersistError> {
        Err(PersistError::Unavailable("storage disabled".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_turns_replay_in_order() {
        let turns = ScriptedTurns::new()
            .then_transport_error("timeout")
            .then_ok(sample_response("ok"));

        assert!(turns.request_turn(&[Message::user("a")]).await.is_err());
        let response = turns.request_turn(&[Message::user("b")]).await.unwrap();
        assert_eq!(response.conversational_response, "ok");
        assert!(turns.request_turn(&[]).await.is_err());
        assert_eq!(turns.calls().len(), 3);
    }

    #[test]
    fn test_response_with_builds_state() {
        let response = response_with("r", &["[A]1 ═══ [B]2"], &[(1, "A"), (2, "B")]);
        assert_eq!(response.trajectory_state.trajectory.len(), 1);
        assert_eq!(response.trajectory_state.commentary.get(2), Some("B"));
    }
}
