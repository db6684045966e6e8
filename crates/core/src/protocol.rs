//! Wire protocol model.
//!
//! The service speaks a small envelope protocol over a single duplex
//! channel: the client sends destination-tagged envelopes and receives
//! category-tagged frames. Both directions are one JSON object per frame.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Lifecycle phase of a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No channel exists.
    #[default]
    Idle,
    /// A channel has been requested but the ready handshake is outstanding.
    Connecting,
    /// The handshake completed and subscriptions are open.
    Connected,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Connecting => write!(f, "connecting"),
            Phase::Connected => write!(f, "connected"),
        }
    }
}

/// Inbound event category.
///
/// Exactly these three categories are subscribed while a session is
/// connected; frames for anything else are dropped at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Display,
    Result,
    AnalysisSituation,
}

impl Category {
    pub const ALL: [Category; 3] = [
        Category::Display,
        Category::Result,
        Category::AnalysisSituation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Display => "display",
            Category::Result => "result",
            Category::AnalysisSituation => "analysis-situation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound envelope: destination tag plus a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub destination: String,
    #[serde(default)]
    pub body: Value,
}

impl Envelope {
    /// Subscription request for one inbound category.
    pub fn subscribe(category: Category) -> Self {
        Envelope {
            destination: "subscribe".to_string(),
            body: json!({ "category": category.as_str() }),
        }
    }

    /// Conversation start. `initial_sentence` is `null` when the user has
    /// not typed ahead of the connect.
    pub fn start(locale: &str, initial_sentence: Option<&str>) -> Self {
        Envelope {
            destination: "start".to_string(),
            body: json!({ "locale": locale, "initialSentence": initial_sentence }),
        }
    }

    /// A user input turn.
    pub fn input(text: &str) -> Self {
        Envelope {
            destination: "input".to_string(),
            body: json!({ "userInput": text }),
        }
    }

    /// Request to revise the current query. Carries no payload.
    pub fn revise_query() -> Self {
        Envelope {
            destination: "reviseQuery".to_string(),
            body: Value::Null,
        }
    }
}

/// An inbound frame: category tag plus the raw payload for that category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    pub category: Category,
    #[serde(default)]
    pub body: Value,
}
