//! Salvage a turn from model output that failed JSON validation.
//!
//! Models often write correct bracket/connector notation inside prose even
//! when they never produce valid JSON. Two tiers:
//!
//! - **Pattern salvage**: every `[X] <connector> [Y]` pair becomes a line
//!   `[X]n <connector> [Y]n+1` (n = 1, 3, 5, ...), and every line-initial
//!   numbered item `<n>. text` / `<n>) text` becomes commentary entry `n`.
//! - **Raw text**: nothing matched; empty trajectory and commentary.
//!
//! In both tiers the conversational response is the raw text verbatim.

use crate::grammar::{connector_pattern, format_concept};
use crate::trajectory::{parse_reference_number, AiResponse, Commentary, TrajectoryLine, TrajectoryState};
use once_cell::sync::Lazy;
use regex::Regex;

/// `[X] <connector> [Y]`. Digits after a bracket are tolerated and
/// discarded since salvage renumbers everything.
static PAIR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\[([^\]\[\n]+)\]\d*[ \t]*({})[ \t]*\[([^\]\[\n]+)\]",
        connector_pattern()
    ))
    .expect("connector alphabet builds a valid pattern")
});

static NUMBERED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*(\d+)[.)][ \t]*(\S[^\n]*)$")
        .expect("numbered list pattern is valid")
});

/// How much of the turn was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTier {
    PatternSalvage,
    RawText,
}

/// Result of fallback synthesis. Always usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Salvage {
    pub response: AiResponse,
    pub tier: FallbackTier,
}

/// Derive a trajectory state directly from raw text.
pub fn synthesize(raw: &str) -> Salvage {
    let trajectory = salvage_trajectory(raw);
    let commentary = salvage_commentary(raw);

    let tier = if trajectory.is_empty() && commentary.is_empty() {
        FallbackTier::RawText
    } else {
        FallbackTier::PatternSalvage
    };

    tracing::debug!(
        ?tier,
        lines = trajectory.len(),
        commentary = commentary.len(),
        "synthesized fallback state"
    );

    Salvage {
        response: AiResponse {
            conversational_response: raw.to_string(),
            trajectory_state: TrajectoryState::new(trajectory, commentary),
        },
        tier,
    }
}

fn salvage_trajectory(raw: &str) -> Vec<TrajectoryLine> {
    PAIR_PATTERN
        .captures_iter(raw)
        .enumerate()
        .map(|(index, caps)| {
            let first = (index as u32) * 2 + 1;
            TrajectoryLine {
                text: format!(
                    "{} {} {}",
                    format_concept(caps[1].trim(), first),
                    &caps[2],
                    format_concept(caps[3].trim(), first + 1)
                ),
            }
        })
        .collect()
}

/// Later duplicates of a number overwrite earlier ones.
fn salvage_commentary(raw: &str) -> Commentary {
    let mut commentary = Commentary::new();
    for caps in NUMBERED_PATTERN.captures_iter(raw) {
        if let Some(number) = parse_reference_number(&caps[1]) {
            commentary.insert(number, caps[2].trim_end());
        }
    }
    commentary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_in_prose_is_salvaged() {
        let raw = "I think [Alpha] ~~~ [Beta] captures it, though I forgot the JSON.";
        let salvage = synthesize(raw);

        assert_eq!(salvage.tier, FallbackTier::PatternSalvage);
        assert_eq!(
            salvage.response.trajectory_state.trajectory,
            vec![TrajectoryLine::new("[Alpha]1 ~~~ [Beta]2")]
        );
        assert!(salvage.response.trajectory_state.commentary.is_empty());
        assert_eq!(salvage.response.conversational_response, raw);
    }

    #[test]
    fn test_numbering_advances_by_two_per_match() {
        let raw = "[A] ═══ [B] then [C]7 ??? [D]8 and finally [E]>>>[F]";
        let lines: Vec<_> = synthesize(raw)
            .response
            .trajectory_state
            .trajectory
            .into_iter()
            .map(|l| l.text)
            .collect();
        assert_eq!(
            lines,
            vec!["[A]1 ═══ [B]2", "[C]3 ??? [D]4", "[E]5 >>> [F]6"]
        );
    }

    #[test]
    fn test_numbered_lines_become_commentary() {
        let raw = "Notes:\n1. Time: a river\n2) Memory: its bank\n  3. Dream: the delta\r\nnot 4. this";
        let commentary = synthesize(raw).response.trajectory_state.commentary;

        assert_eq!(commentary.len(), 3);
        assert_eq!(commentary.get(1), Some("Time: a river"));
        assert_eq!(commentary.get(2), Some("Memory: its bank"));
        assert_eq!(commentary.get(3), Some("Dream: the delta"));
    }

    #[test]
    fn test_zero_is_not_a_commentary_key() {
        let commentary = synthesize("0. nothing").response.trajectory_state.commentary;
        assert!(commentary.is_empty());
    }

    #[test]
    fn test_synthesis_symbol_between_concepts() {
        let raw = "[Order] ★ [Chaos]";
        assert_eq!(
            synthesize(raw).response.trajectory_state.trajectory[0].text,
            "[Order]1 ★ [Chaos]2"
        );
    }

    #[test]
    fn test_nothing_recognisable_degrades_to_raw_text() {
        let raw = "The model rambled with no notation at all.";
        let salvage = synthesize(raw);

        assert_eq!(salvage.tier, FallbackTier::RawText);
        assert!(salvage.response.trajectory_state.trajectory.is_empty());
        assert!(salvage.response.trajectory_state.commentary.is_empty());
        assert_eq!(salvage.response.conversational_response, raw);
    }

    #[test]
    fn test_unknown_connector_is_not_salvaged() {
        let salvage = synthesize("[A] -- [B]");
        assert_eq!(salvage.tier, FallbackTier::RawText);
    }
}
