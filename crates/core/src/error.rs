//! Error taxonomy shared across the workspace.
//!
//! Only a small set of conditions is surfaced synchronously to callers
//! (illegal state, missing configuration, blank input). Malformed inbound
//! payloads and channel faults are logged where they occur and dropped;
//! they must never tear down the session on their own.

use thiserror::Error;

use crate::protocol::Phase;

#[derive(Error, Debug)]
pub enum Error {
    /// The operation is not valid in the session's current phase.
    #[error("operation `{operation}` is not valid while {phase}")]
    IllegalState {
        operation: &'static str,
        phase: Phase,
    },

    /// A send was attempted before any endpoint was supplied.
    #[error("no endpoint configured")]
    NotConfigured,

    /// The user submitted blank input.
    #[error("input is empty")]
    EmptyInput,

    /// An inbound payload failed validation for its category.
    #[error("malformed `{category}` payload: {reason}")]
    Malformed { category: String, reason: String },

    /// A channel-level failure (connect refused, broken pipe, codec error).
    #[error("transport fault: {0}")]
    Transport(String),

    /// A locale tag that is neither `xx` nor `xx-YY`.
    #[error("invalid locale tag `{0}`")]
    InvalidLocale(String),

    /// A platform voice adapter failure.
    #[error("voice adapter error: {0}")]
    Voice(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn malformed(category: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Malformed {
            category: category.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Error::Transport(reason.into())
    }
}
