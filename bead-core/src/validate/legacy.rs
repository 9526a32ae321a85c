//! The older flat payload: `response`, a `trajectory` of discrete steps and
//! a `commentary` map.
//!
//! ```json
//! {
//!   "response": "...",
//!   "trajectory": [{ "left": "Time", "connection": "~~~", "right": "Memory", "synthesis": "※" }],
//!   "commentary": { "1": "..." }
//! }
//! ```

use crate::grammar::format_concept;
use crate::trajectory::{AiResponse, Commentary, TrajectoryLine, TrajectoryState};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct LegacyPayload {
    pub response: String,
    pub trajectory: Vec<LegacyStep>,
    pub commentary: Commentary,
}

/// One `left connection right [synthesis]` step.
///
/// Unknown keys are rejected so a canonical `{"text": ...}` line never
/// passes for an empty legacy step.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LegacyStep {
    #[serde(default)]
    pub left: Option<String>,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub right: Option<String>,
    #[serde(default)]
    pub synthesis: Option<String>,
}

/// Rebuild unified line text from legacy steps.
///
/// Concepts are numbered 1, 2, ... in first-seen order across all steps;
/// a concept that reappears keeps its number. Steps missing a side or the
/// connection are dropped.
pub fn into_canonical(payload: LegacyPayload) -> AiResponse {
    let mut numbers: HashMap<String, u32> = HashMap::new();
    let mut next = 1u32;
    let mut number_for = |name: &str| -> u32 {
        *numbers.entry(name.to_string()).or_insert_with(|| {
            let n = next;
            next += 1;
            n
        })
    };

    let trajectory = payload
        .trajectory
        .into_iter()
        .filter_map(|step| {
            let left = non_empty(step.left)?;
            let connection = non_empty(step.connection)?;
            let right = non_empty(step.right)?;

            let left_number = number_for(&left);
            let right_number = number_for(&right);

            let mut text = format!(
                "{} {} {}",
                format_concept(&left, left_number),
                connection,
                format_concept(&right, right_number)
            );
            if let Some(synthesis) = non_empty(step.synthesis) {
                text.push(' ');
                text.push_str(&synthesis);
            }
            Some(TrajectoryLine { text })
        })
        .collect();

    AiResponse {
        conversational_response: payload.response,
        trajectory_state: TrajectoryState::new(trajectory, payload.commentary),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
