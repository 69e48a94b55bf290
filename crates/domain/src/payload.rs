//! Payload encoding for messages travelling on part topics.
//!
//! Remote devices speak plain strings: analog readings are forwarded as-is,
//! binary states use a configurable token pair (`TRUE`/`FALSE`,
//! `ON`/`OFF`, ... depending on the firmware).

use crate::error::ValidationError;
use crate::part::SignalKind;
use crate::state::RemoteState;

/// The two tokens used to encode a binary state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryTokens {
    on: String,
    off: String,
}

impl Default for BinaryTokens {
    fn default() -> Self {
        Self {
            on: "TRUE".to_string(),
            off: "FALSE".to_string(),
        }
    }
}

impl BinaryTokens {
    /// Create a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyToken`] when either token is blank, or
    /// [`ValidationError::AmbiguousTokens`] when they compare equal ignoring
    /// ASCII case (decoding would be ambiguous).
    pub fn new(on: impl Into<String>, off: impl Into<String>) -> Result<Self, ValidationError> {
        let on = on.into().trim().to_string();
        let off = off.into().trim().to_string();
        if on.is_empty() || off.is_empty() {
            return Err(ValidationError::EmptyToken);
        }
        if on.eq_ignore_ascii_case(&off) {
            return Err(ValidationError::AmbiguousTokens);
        }
        Ok(Self { on, off })
    }

    #[must_use]
    pub fn encode(&self, on: bool) -> &str {
        if on { &self.on } else { &self.off }
    }

    /// Decode a payload, ignoring surrounding whitespace and ASCII case.
    #[must_use]
    pub fn decode(&self, payload: &[u8]) -> Option<bool> {
        let text = std::str::from_utf8(payload).ok()?.trim();
        if text.eq_ignore_ascii_case(&self.on) {
            Some(true)
        } else if text.eq_ignore_ascii_case(&self.off) {
            Some(false)
        } else {
            None
        }
    }
}

/// Decode an inbound payload into the remote state of a part of `kind`.
///
/// Analog payloads are kept as trimmed text (invalid UTF-8 is replaced);
/// binary payloads must match one of `tokens`.
#[must_use]
pub fn decode_remote(
    kind: SignalKind,
    payload: &[u8],
    tokens: &BinaryTokens,
) -> Option<RemoteState> {
    match kind {
        SignalKind::Analog => Some(RemoteState::Analog {
            value: String::from_utf8_lossy(payload).trim().to_string(),
        }),
        SignalKind::Binary => tokens.decode(payload).map(|on| RemoteState::Binary { on }),
    }
}
