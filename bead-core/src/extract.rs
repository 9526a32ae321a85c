//! Locate the JSON payload inside raw model output.

const FENCE: &str = "```";
const JSON_TAG: &str = "json";

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Inner contents of a ```json fenced block.
    FencedJson,
    /// First `{` through last `}`.
    BraceSpan,
    /// The whole trimmed input.
    WholeText,
}

/// The best substring believed to contain a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub text: &'a str,
    pub strategy: Strategy,
}

/// Extract a JSON candidate, first strategy that applies wins:
/// a ```json fence, then the outermost brace span, then the whole text.
///
/// The whole-text fallback means this never comes back empty-handed for
/// non-empty input; a bad candidate is left for the parser to reject.
pub fn extract_candidate(raw: &str) -> Candidate<'_> {
    if let Some(text) = fenced_json(raw) {
        return Candidate {
            text,
            strategy: Strategy::FencedJson,
        };
    }

    if let Some(text) = brace_span(raw) {
        return Candidate {
            text,
            strategy: Strategy::BraceSpan,
        };
    }

    Candidate {
        text: raw.trim(),
        strategy: Strategy::WholeText,
    }
}

/// Trimmed contents of the first closed ```json block.
///
/// The tag is the word right after the fence, matched without case, so
/// `jsonc` or `json5` fences are not taken for JSON.
fn fenced_json(raw: &str) -> Option<&str> {
    let (start, _) = raw.match_indices(FENCE).find(|(at, _)| {
        let after = &raw[at + FENCE.len()..];
        let tag_end = after.find(char::is_whitespace).unwrap_or(after.len());
        after[..tag_end].eq_ignore_ascii_case(JSON_TAG)
    })?;
    let content_start = start + FENCE.len() + JSON_TAG.len();
    let end = raw[content_start..].find(FENCE)?;
    Some(raw[content_start..content_start + end].trim())
}

fn brace_span(raw: &str) -> Option<&str> {
    let open = raw.find('{')?;
    let close = raw.rfind('}')?;
    (close > open).then(|| &raw[open..=close])
}
