//! Display formatting for trajectory lines.
//!
//! A best-effort lexer over the notation in [`crate::grammar`]: it never
//! rejects input, it only annotates. Concatenating the source text of the
//! segments returned by [`format_line`] reproduces the line exactly.

use crate::grammar::{self, ConnectorClass};
use crate::trajectory::{parse_reference_number, TrajectoryState};
use serde::Serialize;

/// One annotated run of a trajectory line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    /// Anything that is neither a concept nor a connector.
    Text { text: String },
    Connector {
        symbol: String,
        class: ConnectorClass,
    },
    /// `[name]` with its trailing reference number, when present.
    Concept {
        name: String,
        number: Option<String>,
    },
}

impl Segment {
    /// The exact input text this segment was lexed from.
    pub fn source(&self) -> String {
        match self {
            Segment::Text { text } => text.clone(),
            Segment::Connector { symbol, .. } => symbol.clone(),
            Segment::Concept { name, number } => {
                format!("[{name}]{}", number.as_deref().unwrap_or(""))
            }
        }
    }
}

/// Split a trajectory line into annotated segments.
pub fn format_line(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut plain = String::new();
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        if ch == '[' {
            if let Some((name, number, consumed)) = lex_concept(rest) {
                flush_text(&mut plain, &mut segments);
                segments.push(Segment::Concept {
                    name: name.to_string(),
                    number: number.map(str::to_string),
                });
                rest = &rest[consumed..];
                continue;
            }
        } else if let Some(connector) = grammar::connector_at(rest) {
            flush_text(&mut plain, &mut segments);
            segments.push(Segment::Connector {
                symbol: connector.symbol.to_string(),
                class: connector.class,
            });
            rest = &rest[connector.symbol.len()..];
            continue;
        }

        plain.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    flush_text(&mut plain, &mut segments);
    segments
}

fn flush_text(plain: &mut String, segments: &mut Vec<Segment>) {
    if !plain.is_empty() {
        segments.push(Segment::Text {
            text: std::mem::take(plain),
        });
    }
}

/// Lex `[name]digits` at the start of `text`.
///
/// Returns the name, the optional digit run and the number of bytes
/// consumed. A nested `[`, a line break or a missing `]` means this bracket
/// is plain text.
fn lex_concept(text: &str) -> Option<(&str, Option<&str>, usize)> {
    let body = text.strip_prefix('[')?;
    let close = body.find(|c: char| c == ']' || c == '[' || c == '\n')?;
    if close == 0 || !body[close..].starts_with(']') {
        return None;
    }

    let name = &body[..close];
    let after = &body[close + 1..];
    let digits = after.bytes().take_while(u8::is_ascii_digit).count();
    let number = (digits > 0).then(|| &after[..digits]);

    Some((name, number, 1 + close + 1 + digits))
}

/// Render segments as HTML spans.
pub fn render_html(segments: &[Segment]) -> String {
    let mut html = String::new();
    for segment in segments {
        match segment {
            Segment::Text { text } => html.push_str(&escape_html(text)),
            Segment::Connector { symbol, class } => {
                html.push_str(&format!(
                    r#"<span class="{}">{}</span>"#,
                    class.css_class(),
                    escape_html(symbol)
                ));
            }
            Segment::Concept { name, number } => {
                html.push_str(r#"<span class="concept-reference">["#);
                html.push_str(&escape_html(name));
                html.push(']');
                if let Some(n) = number {
                    html.push_str(&format!(r#"<span class="concept-number">{n}</span>"#));
                }
                html.push_str("</span>");
            }
        }
    }
    html
}

/// Lex and render one line.
pub fn line_html(text: &str) -> String {
    render_html(&format_line(text))
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

// ============================================================================
// Concept graph
// ============================================================================

/// Whether a concept sits on the main path or closes a synthesis line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Concept,
    Synthesis,
}

/// A distinct concept, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConceptNode {
    pub name: String,
    pub number: u32,
    pub kind: NodeKind,
    /// First seen on the last line of the trajectory.
    pub recent: bool,
    pub line: usize,
}

/// A connector between two adjacent concepts of one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionEdge {
    pub from: String,
    pub to: String,
    pub symbol: String,
    pub class: ConnectorClass,
    pub line: usize,
}

/// Transient structure recovered from trajectory text for visual display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrajectoryGraph {
    pub concepts: Vec<ConceptNode>,
    pub connections: Vec<ConnectionEdge>,
}

impl TrajectoryGraph {
    pub fn from_state(state: &TrajectoryState) -> Self {
        Self::from_lines(state.trajectory.iter().map(|l| l.text.as_str()))
    }

    /// Build from raw lines; blank lines are skipped.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let lines: Vec<&str> = lines.into_iter().filter(|l| !l.trim().is_empty()).collect();
        let last = lines.len().saturating_sub(1);
        let mut graph = TrajectoryGraph::default();
        let mut highest = 0u32;

        for (index, line) in lines.iter().enumerate() {
            let segments = format_line(line);
            let is_synthesis = segments.iter().any(|s| {
                matches!(
                    s,
                    Segment::Connector {
                        class: ConnectorClass::Synthesis,
                        ..
                    }
                )
            });

            let mut previous: Option<&str> = None;
            let mut pending: Option<(&str, ConnectorClass)> = None;

            for segment in &segments {
                match segment {
                    Segment::Concept { name, number } => {
                        if !graph.concepts.iter().any(|c| &c.name == name) {
                            let number = match number.as_deref().and_then(parse_reference_number) {
                                Some(n) => n,
                                None => highest.saturating_add(1),
                            };
                            highest = highest.max(number);
                            graph.concepts.push(ConceptNode {
                                name: name.clone(),
                                number,
                                kind: if is_synthesis {
                                    NodeKind::Synthesis
                                } else {
                                    NodeKind::Concept
                                },
                                recent: index == last,
                                line: index,
                            });
                        } else if let Some(n) = number.as_deref().and_then(parse_reference_number) {
                            highest = highest.max(n);
                        }

                        if let (Some(from), Some((symbol, class))) = (previous, pending.take()) {
                            graph.connections.push(ConnectionEdge {
                                from: from.to_string(),
                                to: name.clone(),
                                symbol: symbol.to_string(),
                                class,
                                line: index,
                            });
                        }
                        previous = Some(name.as_str());
                    }
                    Segment::Connector { symbol, class } => {
                        if previous.is_some() && pending.is_none() {
                            pending = Some((symbol.as_str(), *class));
                        }
                    }
                    Segment::Text { .. } => {}
                }
            }
        }

        graph
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::TrajectoryLine;

    fn concept(name: &str, number: Option<&str>) -> Segment {
        Segment::Concept {
            name: name.to_string(),
            number: number.map(str::to_string),
        }
    }

    fn connector(symbol: &str, class: ConnectorClass) -> Segment {
        Segment::Connector {
            symbol: symbol.to_string(),
            class,
        }
    }

    fn text(t: &str) -> Segment {
        Segment::Text {
            text: t.to_string(),
        }
    }

    fn source(segments: &[Segment]) -> String {
        segments.iter().map(Segment::source).collect()
    }

    #[test]
    fn test_format_full_line() {
        let line = "[Time]1 ~~~ [Memory]2 ═══ [Forgetting]3 ※";
        let segments = format_line(line);
        assert_eq!(
            segments,
            vec![
                concept("Time", Some("1")),
                text(" "),
                connector("~~~", ConnectorClass::Aesthetic),
                text(" "),
                concept("Memory", Some("2")),
                text(" "),
                connector("═══", ConnectorClass::Structural),
                text(" "),
                concept("Forgetting", Some("3")),
                text(" "),
                connector("※", ConnectorClass::Synthesis),
            ]
        );
        assert_eq!(source(&segments), line);
    }

    #[test]
    fn test_triple_diamond_is_aesthetic_single_is_synthesis() {
        let segments = format_line("[A]1 ◊◊◊ [B]2 ◊");
        assert!(segments.contains(&connector("◊◊◊", ConnectorClass::Aesthetic)));
        assert!(segments.contains(&connector("◊", ConnectorClass::Synthesis)));
    }

    #[test]
    fn test_no_connectors_or_concepts() {
        assert_eq!(format_line("just words"), vec![text("just words")]);
        assert!(format_line("").is_empty());
    }

    #[test]
    fn test_concept_without_number() {
        let segments = format_line("[Alpha] >>> [Beta]");
        assert_eq!(segments[0], concept("Alpha", None));
        assert_eq!(segments[4], concept("Beta", None));
    }

    #[test]
    fn test_malformed_brackets_stay_text() {
        let line = "[unclosed >>> [] [A [B]2";
        let segments = format_line(line);
        assert_eq!(source(&segments), line);
        assert!(segments.contains(&concept("B", Some("2"))));
        assert!(!segments
            .iter()
            .any(|s| matches!(s, Segment::Concept { name, .. } if name.contains("unclosed"))));
    }

    #[test]
    fn test_render_html() {
        let html = line_html("[Time]1 ~~~ [A<b>]");
        assert_eq!(
            html,
            concat!(
                r#"<span class="concept-reference">[Time]<span class="concept-number">1</span></span>"#,
                r#" <span class="symbol-aesthetic">~~~</span> "#,
                r#"<span class="concept-reference">[A&lt;b&gt;]</span>"#
            )
        );
    }

    #[test]
    fn test_render_escapes_structural_arrows() {
        let html = line_html("[A]1 >>> [B]2");
        assert!(html.contains(r#"<span class="symbol-structural">&gt;&gt;&gt;</span>"#));
    }

    #[test]
    fn test_graph_dedupes_concepts_and_links_neighbours() {
        let state = TrajectoryState::new(
            vec![
                TrajectoryLine::new("[Time]1 ~~~ [Memory]2"),
                TrajectoryLine::new("[Memory]2 >>> [Dream]3 ★"),
            ],
            Default::default(),
        );
        let graph = TrajectoryGraph::from_state(&state);

        let names: Vec<_> = graph.concepts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Time", "Memory", "Dream"]);
        assert_eq!(graph.concepts[2].kind, NodeKind::Synthesis);
        assert!(graph.concepts[2].recent);
        assert!(!graph.concepts[0].recent);

        assert_eq!(graph.connections.len(), 2);
        assert_eq!(graph.connections[1].from, "Memory");
        assert_eq!(graph.connections[1].to, "Dream");
        assert_eq!(graph.connections[1].class, ConnectorClass::Structural);
    }

    #[test]
    fn test_graph_assigns_numbers_to_unnumbered_concepts() {
        let graph = TrajectoryGraph::from_lines(["[A]4 ~~~ [B]", ""]);
        assert_eq!(graph.concepts[0].number, 4);
        assert_eq!(graph.concepts[1].number, 5);
        assert!(graph.concepts[1].recent);
    }

    #[test]
    fn test_graph_numbering_saturates_at_max() {
        let graph = TrajectoryGraph::from_lines(["[A]4294967295 ~~~ [B]"]);
        assert_eq!(graph.concepts[0].number, u32::MAX);
        assert_eq!(graph.concepts[1].number, u32::MAX);
        assert_eq!(graph.connections.len(), 1);
    }

    #[test]
    fn test_graph_skips_pairs_without_connector() {
        let graph = TrajectoryGraph::from_lines(["[A]1 and [B]2"]);
        assert_eq!(graph.concepts.len(), 2);
        assert!(graph.connections.is_empty());
    }
}
