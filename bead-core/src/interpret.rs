//! Raw model text in, turn payload out.
//!
//! Extraction, then strict validation, then fallback synthesis when the
//! first two fail.

use crate::extract::{extract_candidate, Strategy};
use crate::fallback::{synthesize, FallbackTier};
use crate::trajectory::AiResponse;
use crate::validate::{validate_with_shape, MalformedAiResponse, PayloadShape};

/// Where an interpreted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Valid JSON found by `strategy`, in `shape`.
    Structured {
        strategy: Strategy,
        shape: PayloadShape,
    },
    /// Notation recovered from prose.
    Salvaged,
    /// Nothing recovered; raw text shown as the reply.
    RawText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpretation {
    pub response: AiResponse,
    pub source: Source,
}

impl Interpretation {
    pub fn is_structured(&self) -> bool {
        matches!(self.source, Source::Structured { .. })
    }
}

/// Interpret raw model output. Never fails.
pub fn interpret(raw: &str) -> Interpretation {
    match interpret_strict(raw) {
        Ok(interpretation) => interpretation,
        Err(err) => {
            tracing::warn!(reason = %err.reason, "model output failed validation, salvaging");
            let salvage = synthesize(raw);
            let source = match salvage.tier {
                FallbackTier::PatternSalvage => Source::Salvaged,
                FallbackTier::RawText => Source::RawText,
            };
            Interpretation {
                response: salvage.response,
                source,
            }
        }
    }
}

/// Extract and validate only; a failure is returned instead of salvaged.
pub fn interpret_strict(raw: &str) -> Result<Interpretation, MalformedAiResponse> {
    let candidate = extract_candidate(raw);
    tracing::debug!(strategy = ?candidate.strategy, "extracted JSON candidate");

    let (response, shape) = validate_with_shape(candidate.text, raw)?;
    Ok(Interpretation {
        response,
        source: Source::Structured {
            strategy: candidate.strategy,
            shape,
        },
    })
}
