//! Trajectory text notation.
//!
//! A trajectory line is a run of concept tokens `[Name]n` joined by
//! connector symbols, optionally closed by a synthesis marker:
//!
//! ```text
//! [Time]1 ~~~ [Memory]2 ═══ [Forgetting]3 ※
//! ```
//!
//! Connectors come from three disjoint classes. The table below is the
//! complete alphabet; anything else between concepts is plain text.

use serde::{Deserialize, Serialize};

/// Visual/semantic class of a connector symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorClass {
    Structural,
    Aesthetic,
    Synthesis,
}

impl ConnectorClass {
    /// Class name used when rendering markup.
    pub fn css_class(&self) -> &'static str {
        match self {
            ConnectorClass::Structural => "symbol-structural",
            ConnectorClass::Aesthetic => "symbol-aesthetic",
            ConnectorClass::Synthesis => "symbol-synthesis",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectorClass::Structural => "structural",
            ConnectorClass::Aesthetic => "aesthetic",
            ConnectorClass::Synthesis => "synthesis",
        }
    }
}

/// One entry of the connector alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connector {
    pub symbol: &'static str,
    pub class: ConnectorClass,
    pub meaning: &'static str,
}

/// The full connector alphabet.
///
/// Ordered so that every multi-character symbol precedes any shorter symbol
/// it starts with (`◊◊◊` before `◊`); prefix matching walks it in order.
pub const CONNECTORS: &[Connector] = &[
    Connector {
        symbol: "═══",
        class: ConnectorClass::Structural,
        meaning: "logical necessity",
    },
    Connector {
        symbol: "───",
        class: ConnectorClass::Structural,
        meaning: "logical dependency",
    },
    Connector {
        symbol: ">>>",
        class: ConnectorClass::Structural,
        meaning: "temporal sequence",
    },
    Connector {
        symbol: "^^^",
        class: ConnectorClass::Structural,
        meaning: "emergence",
    },
    Connector {
        symbol: "vvv",
        class: ConnectorClass::Structural,
        meaning: "reduction",
    },
    Connector {
        symbol: "~~~",
        class: ConnectorClass::Aesthetic,
        meaning: "metaphorical resonance",
    },
    Connector {
        symbol: "◊◊◊",
        class: ConnectorClass::Aesthetic,
        meaning: "ironic reflection",
    },
    Connector {
        symbol: "∞∞∞",
        class: ConnectorClass::Aesthetic,
        meaning: "recursive relationship",
    },
    Connector {
        symbol: "???",
        class: ConnectorClass::Aesthetic,
        meaning: "productive tension",
    },
    Connector {
        symbol: "!!!",
        class: ConnectorClass::Aesthetic,
        meaning: "revelatory leap",
    },
    Connector {
        symbol: "※",
        class: ConnectorClass::Synthesis,
        meaning: "minor synthesis",
    },
    Connector {
        symbol: "◊",
        class: ConnectorClass::Synthesis,
        meaning: "major synthesis",
    },
    Connector {
        symbol: "★",
        class: ConnectorClass::Synthesis,
        meaning: "transcendent synthesis",
    },
];

/// Classify an exact connector symbol.
pub fn classify(symbol: &str) -> Option<ConnectorClass> {
    CONNECTORS
        .iter()
        .find(|c| c.symbol == symbol)
        .map(|c| c.class)
}

/// Longest connector that `text` starts with.
pub fn connector_at(text: &str) -> Option<&'static Connector> {
    CONNECTORS.iter().find(|c| text.starts_with(c.symbol))
}

/// Regex alternation matching any connector, longest symbols first.
pub fn connector_pattern() -> String {
    CONNECTORS
        .iter()
        .map(|c| regex::escape(c.symbol))
        .collect::<Vec<_>>()
        .join("|")
}

/// Render a concept token, `[Name]n`.
pub fn format_concept(name: &str, number: u32) -> String {
    format!("[{name}]{number}")
}
