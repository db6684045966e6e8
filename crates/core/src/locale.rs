//! Locale helpers.
//!
//! The protocol carries short locale tags (`en`, `de`); only the speech
//! synthesizer needs the full BCP-47 tag. Localized notice texts live
//! here as well so the session can synthesize messages without a
//! resource-bundle dependency.

use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::error::{Error, Result};

static RESULT_READY_NOTICES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("en", "The result is now available."),
        ("de", "Das Ergebnis ist nun verfügbar."),
    ])
});

/// Validate a locale tag. Accepts `xx` and `xx-YY` shapes.
pub fn validate(tag: &str) -> Result<()> {
    let valid = match tag.len() {
        2 => tag.chars().all(|c| c.is_ascii_lowercase()),
        5 => {
            let bytes = tag.as_bytes();
            bytes[2] == b'-'
                && tag[..2].chars().all(|c| c.is_ascii_lowercase())
                && tag[3..].chars().all(|c| c.is_ascii_uppercase())
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidLocale(tag.to_string()))
    }
}

/// Map a short tag to the tag the speech synthesizer expects.
pub fn speech_tag(tag: &str) -> &str {
    match tag {
        "en" => "en-GB",
        "de" => "de-DE",
        other => other,
    }
}

/// Localized notice spoken and displayed when a query result arrives.
/// Falls back to English for unknown locales.
pub fn result_ready_notice(tag: &str) -> &'static str {
    let short = tag.split('-').next().unwrap_or(tag);
    RESULT_READY_NOTICES
        .get(short)
        .or_else(|| RESULT_READY_NOTICES.get("en"))
        .copied()
        .unwrap_or_default()
}
