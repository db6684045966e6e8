//! Display payloads.
//!
//! The service renders the dialogue through a small union of display
//! shapes, adjacently tagged on `type`/`display`. The client never
//! interprets the contents beyond routing; rendering belongs to the
//! presentation surfaces.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One selectable entry of a list display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayable_id: Option<Value>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDisplay {
    pub display_message: String,
    #[serde(default)]
    pub data: Vec<DisplayItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TwoListDisplay {
    pub display_message: String,
    #[serde(default)]
    pub data_left: Vec<DisplayItem>,
    #[serde(default)]
    pub data_right: Vec<DisplayItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDisplay {
    pub display_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDisplay {
    pub display_message: String,
}

/// Sent by the service when the dialogue has finished. Receiving this
/// obliges the client to tear the session down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitDisplay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_message: Option<String>,
}

/// The display union. Unknown `type` tags fail to parse and are treated
/// as malformed payloads by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "display")]
pub enum DisplayEvent {
    #[serde(rename = "ListDisplay")]
    List(ListDisplay),
    #[serde(rename = "TwoListDisplay")]
    TwoList(TwoListDisplay),
    #[serde(rename = "MessageDisplay")]
    Message(MessageDisplay),
    #[serde(rename = "ErrorDisplay")]
    Error(ErrorDisplay),
    #[serde(rename = "ExitDisplay")]
    Exit(ExitDisplay),
}

impl DisplayEvent {
    /// The message text of the payload, if it carries one.
    pub fn display_message(&self) -> Option<&str> {
        match self {
            DisplayEvent::List(d) => Some(&d.display_message),
            DisplayEvent::TwoList(d) => Some(&d.display_message),
            DisplayEvent::Message(d) => Some(&d.display_message),
            DisplayEvent::Error(d) => Some(&d.display_message),
            DisplayEvent::Exit(d) => d.display_message.as_deref(),
        }
    }

    pub fn is_exit(&self) -> bool {
        matches!(self, DisplayEvent::Exit(_))
    }

    /// Convenience constructor for client-synthesized notices.
    pub fn message(text: impl Into<String>) -> Self {
        DisplayEvent::Message(MessageDisplay {
            display_message: text.into(),
        })
    }
}
