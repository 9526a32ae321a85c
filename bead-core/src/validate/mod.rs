//! Strict decoding of an extracted candidate into an [`AiResponse`].
//!
//! The canonical payload nests the state under `trajectory_state`:
//!
//! ```json
//! {
//!   "conversational_response": "...",
//!   "trajectory_state": {
//!     "trajectory": [{ "text": "[Time]1 ~~~ [Memory]2 ※" }],
//!     "commentary": { "1": "Time: ...", "2": "Memory: ..." }
//!   }
//! }
//! ```
//!
//! Older deployments emitted a flat shape; that is decoded separately in
//! [`legacy`] and converted once, so nothing past this module sees it.

pub mod legacy;

use crate::trajectory::{AiResponse, Commentary, TrajectoryLine, TrajectoryState};
use serde::Deserialize;
use thiserror::Error;

/// The model's output could not be turned into a turn payload.
#[derive(Debug, Clone, Error)]
#[error("malformed AI response: {reason}")]
pub struct MalformedAiResponse {
    pub reason: String,
    /// The untouched model output, for diagnostics.
    pub raw: String,
}

impl MalformedAiResponse {
    pub fn new(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

/// Which payload shape a response was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    Canonical,
    Legacy,
}

#[derive(Debug, Deserialize)]
struct CanonicalPayload {
    conversational_response: String,
    trajectory_state: CanonicalState,
}

#[derive(Debug, Deserialize)]
struct CanonicalState {
    trajectory: Vec<TrajectoryLine>,
    commentary: Commentary,
}

/// Decode `candidate` as a turn payload.
///
/// `raw` is the full model output the candidate was cut from; it is only
/// carried along in the error. Model-provided numbering passes through
/// untouched.
pub fn validate(candidate: &str, raw: &str) -> Result<AiResponse, MalformedAiResponse> {
    validate_with_shape(candidate, raw).map(|(response, _)| response)
}

/// Like [`validate`], also reporting which shape matched.
pub fn validate_with_shape(
    candidate: &str,
    raw: &str,
) -> Result<(AiResponse, PayloadShape), MalformedAiResponse> {
    let value: serde_json::Value = serde_json::from_str(candidate)
        .map_err(|e| MalformedAiResponse::new(format!("invalid JSON: {e}"), raw))?;

    if !value.is_object() {
        return Err(MalformedAiResponse::new(
            "top-level JSON value is not an object",
            raw,
        ));
    }

    let (response, shape) = match serde_json::from_value::<CanonicalPayload>(value.clone()) {
        Ok(payload) => (
            AiResponse {
                conversational_response: payload.conversational_response,
                trajectory_state: TrajectoryState::new(
                    payload.trajectory_state.trajectory,
                    payload.trajectory_state.commentary,
                ),
            },
            PayloadShape::Canonical,
        ),
        Err(canonical_err) => match serde_json::from_value::<legacy::LegacyPayload>(value) {
            Ok(payload) => (legacy::into_canonical(payload), PayloadShape::Legacy),
            Err(legacy_err) => {
                return Err(MalformedAiResponse::new(
                    format!(
                        "payload matches neither the canonical shape ({canonical_err}) \
                         nor the legacy shape ({legacy_err})"
                    ),
                    raw,
                ));
            }
        },
    };

    if response.conversational_response.trim().is_empty() {
        return Err(MalformedAiResponse::new(
            "conversational response is empty",
            raw,
        ));
    }

    Ok((response, shape))
}

/// Encode a response in the canonical shape.
pub fn encode(response: &AiResponse) -> Result<String, serde_json::Error> {
    serde_json::to_string(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = r#"{
        "conversational_response": "Let us begin with time.",
        "trajectory_state": {
            "trajectory": [{"text": "[Time]1 ~~~ [Memory]2 ※"}],
            "commentary": {"1": "Time: the river", "2": "Memory: the bank"}
        }
    }"#;

    #[test]
    fn test_canonical_payload_passes_through() {
        let (response, shape) = validate_with_shape(CANONICAL, CANONICAL).unwrap();
        assert_eq!(shape, PayloadShape::Canonical);
        assert_eq!(response.conversational_response, "Let us begin with time.");
        assert_eq!(
            response.trajectory_state.trajectory,
            vec![TrajectoryLine::new("[Time]1 ~~~ [Memory]2 ※")]
        );
        assert_eq!(
            response.trajectory_state.commentary.get(2),
            Some("Memory: the bank")
        );
    }

    #[test]
    fn test_encode_then_validate_is_lossless() {
        let response = validate(CANONICAL, CANONICAL).unwrap();
        let encoded = encode(&response).unwrap();
        assert_eq!(validate(&encoded, &encoded).unwrap(), response);
    }

    #[test]
    fn test_invalid_json_is_rejected_with_raw_text() {
        let err = validate("{not json", "raw output").unwrap_err();
        assert!(err.reason.starts_with("invalid JSON"));
        assert_eq!(err.raw, "raw output");
    }

    #[test]
    fn test_missing_trajectory_state_is_rejected() {
        let candidate = r#"{"conversational_response": "hi"}"#;
        assert!(validate(candidate, candidate).is_err());
    }

    #[test]
    fn test_missing_conversational_response_is_rejected() {
        let candidate = r#"{"trajectory_state": {"trajectory": [], "commentary": {}}}"#;
        assert!(validate(candidate, candidate).is_err());
    }

    #[test]
    fn test_blank_conversational_response_is_rejected() {
        let candidate = r#"{"conversational_response": "  ",
            "trajectory_state": {"trajectory": [], "commentary": {}}}"#;
        let err = validate(candidate, candidate).unwrap_err();
        assert_eq!(err.reason, "conversational response is empty");
    }

    #[test]
    fn test_incomplete_trajectory_state_is_rejected() {
        let candidate = r#"{"conversational_response": "hi",
            "trajectory_state": {"trajectory": []}}"#;
        assert!(validate(candidate, candidate).is_err());
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(validate("[1, 2]", "[1, 2]").is_err());
    }

    #[test]
    fn test_mixed_shapes_are_rejected() {
        // Canonical message field with a legacy flat trajectory.
        let candidate = r#"{
            "conversational_response": "hi",
            "trajectory": [{"left": "A", "connection": "~~~", "right": "B"}],
            "commentary": {}
        }"#;
        assert!(validate(candidate, candidate).is_err());

        // Legacy message field with a canonical state.
        let candidate = r#"{
            "response": "hi",
            "trajectory_state": {"trajectory": [], "commentary": {}}
        }"#;
        assert!(validate(candidate, candidate).is_err());

        // Legacy envelope around canonical lines.
        let candidate = r#"{
            "response": "hi",
            "trajectory": [{"text": "[A]1 ~~~ [B]2"}],
            "commentary": {"1": "A"}
        }"#;
        let err = validate_with_shape(candidate, candidate).unwrap_err();
        assert_eq!(err.raw, candidate);
    }

    #[test]
    fn test_bad_commentary_key_is_rejected() {
        let candidate = r#"{"conversational_response": "hi",
            "trajectory_state": {"trajectory": [], "commentary": {"one": "x"}}}"#;
        assert!(validate(candidate, candidate).is_err());
    }
}
