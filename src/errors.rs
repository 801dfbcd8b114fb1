//! Error taxonomy for the orchestration engine
//!
//! Three families of failure, mirroring how they surface to the user:
//! - Precondition errors: thrown before any step begins, the progress dialog
//!   is never shown (or is force-closed).
//! - Step-local errors: caught at the failing external call, decoded into a
//!   display string, attached to the current step, and re-thrown.
//! - Validation errors: rejected client-side before any flow starts.

use thiserror::Error;

/// Error type covering the whole orchestration lifecycle
#[derive(Error, Debug)]
pub enum EngineError {
    /// A required client, address or chain id was missing before any step ran
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// A step transition referenced an id not present in the current run.
    /// Always a programming error in the calling flow, never ignored.
    #[error("Unknown step id: {id}")]
    UnknownStep { id: String },

    /// A transition was requested before `set_steps` declared a run
    #[error("No steps declared for this run")]
    NoStepsDeclared,

    /// The user rejected a signature or transaction request in their wallet
    #[error("Signature rejected: {0}")]
    SignatureRejected(String),

    /// A contract call reverted; `reason` is already decoded into human text
    #[error("Transaction reverted: {reason}")]
    ContractRevert { reason: String },

    /// RPC / chain communication failure
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Non-OK response from the backend API
    #[error("Backend error ({status}): {message}")]
    Http { status: u16, message: String },

    /// Client-side validation failure (allowlist sums, addresses, parameters)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller does not own the resource it tried to mutate
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The run was cancelled while an external call was in flight
    #[error("Operation cancelled")]
    Cancelled,

    /// Wrapped error from external crates
    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl EngineError {
    /// Error category for structured logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "precondition",
            Self::UnknownStep { .. } | Self::NoStepsDeclared => "step",
            Self::SignatureRejected(_) => "signature",
            Self::ContractRevert { .. } => "revert",
            Self::Rpc(_) => "rpc",
            Self::Http { .. } => "http",
            Self::Validation(_) => "validation",
            Self::Unauthorized(_) => "unauthorized",
            Self::Cancelled => "cancelled",
            Self::External(_) => "external",
        }
    }

    /// True when the user declined in their wallet, as opposed to an
    /// infrastructure failure. Callers use this to soften the toast.
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, Self::SignatureRejected(_) | Self::Cancelled)
    }

    /// Display text attached to the failing step
    pub fn user_message(&self) -> String {
        match self {
            Self::ContractRevert { reason } => reason.clone(),
            Self::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

// Convenience constructors for common scenarios
impl EngineError {
    pub fn precondition(what: impl Into<String>) -> Self {
        Self::Precondition(what.into())
    }

    pub fn unknown_step(id: impl Into<String>) -> Self {
        Self::UnknownStep { id: id.into() }
    }

    /// Build a revert error from raw revert data, decoding ABI-encoded
    /// `Error(string)` payloads into readable text.
    pub fn revert(raw: impl AsRef<str>) -> Self {
        Self::ContractRevert {
            reason: decode_revert_reason(raw.as_ref()),
        }
    }

    pub fn rpc(message: impl Into<String>) -> Self {
        Self::Rpc(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

/// Selector of the standard solidity `Error(string)` revert
const ERROR_STRING_SELECTOR: &str = "08c379a0";

/// Decode raw revert data into a human-readable reason.
///
/// Accepts either ABI-encoded `Error(string)` hex (with or without `0x`) or
/// free-form text, which is passed through unchanged. Undecodable hex falls
/// back to a generic message rather than showing the user raw calldata.
pub fn decode_revert_reason(raw: &str) -> String {
    let trimmed = raw.trim();
    let hex_body = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if !hex_body.starts_with(ERROR_STRING_SELECTOR) {
        if looks_like_hex(hex_body) && !hex_body.is_empty() {
            return format!("Transaction reverted (selector 0x{})", &hex_body[..8.min(hex_body.len())]);
        }
        return trimmed.to_string();
    }

    let payload = &hex_body[ERROR_STRING_SELECTOR.len()..];
    match decode_abi_string(payload) {
        Some(reason) => reason,
        None => "Transaction reverted without a readable reason".to_string(),
    }
}

/// Decode a single ABI-encoded string: 32-byte offset, 32-byte length, data.
fn decode_abi_string(payload_hex: &str) -> Option<String> {
    let bytes = hex::decode(payload_hex).ok()?;
    if bytes.len() < 64 {
        return None;
    }
    let offset = be_word_as_usize(&bytes[..32])?;
    let len_start = offset.checked_add(32)?;
    if bytes.len() < len_start {
        return None;
    }
    let length = be_word_as_usize(&bytes[offset..len_start])?;
    let data_end = len_start.checked_add(length)?;
    if bytes.len() < data_end {
        return None;
    }
    String::from_utf8(bytes[len_start..data_end].to_vec()).ok()
}

fn be_word_as_usize(word: &[u8]) -> Option<usize> {
    if word.len() != 32 || word[..24].iter().any(|&b| b != 0) {
        return None;
    }
    let mut value = [0u8; 8];
    value.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(value)).ok()
}

fn looks_like_hex(s: &str) -> bool {
    s.len() >= 8 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Error(string) with reason "insufficient allowance"
    fn encoded_reason() -> String {
        let reason = b"insufficient allowance";
        let mut body = Vec::new();
        let mut offset = [0u8; 32];
        offset[31] = 0x20;
        body.extend_from_slice(&offset);
        let mut length = [0u8; 32];
        length[31] = reason.len() as u8;
        body.extend_from_slice(&length);
        body.extend_from_slice(reason);
        body.resize(body.len().div_ceil(32) * 32, 0);
        format!("0x{}{}", ERROR_STRING_SELECTOR, hex::encode(body))
    }

    #[test]
    fn decodes_abi_error_string() {
        assert_eq!(decode_revert_reason(&encoded_reason()), "insufficient allowance");
    }

    #[test]
    fn free_text_passes_through() {
        assert_eq!(decode_revert_reason("user rejected the request"), "user rejected the request");
    }

    #[test]
    fn unknown_selector_is_summarized() {
        let decoded = decode_revert_reason("0xdeadbeef00000000");
        assert!(decoded.contains("0xdeadbeef"), "got: {decoded}");
    }

    #[test]
    fn truncated_payload_falls_back() {
        let raw = format!("0x{}{}", ERROR_STRING_SELECTOR, "00");
        assert_eq!(
            decode_revert_reason(&raw),
            "Transaction reverted without a readable reason"
        );
    }

    #[test]
    fn revert_constructor_decodes() {
        let err = EngineError::revert(encoded_reason());
        assert_eq!(err.user_message(), "insufficient allowance");
        assert_eq!(err.category(), "revert");
    }

    #[test]
    fn user_rejection_classification() {
        assert!(EngineError::SignatureRejected("denied".into()).is_user_rejection());
        assert!(EngineError::Cancelled.is_user_rejection());
        assert!(!EngineError::rpc("timeout").is_user_rejection());
    }

    #[test]
    fn http_error_surfaces_body_message() {
        let err = EngineError::Http {
            status: 422,
            message: "units do not sum to total supply".to_string(),
        };
        assert_eq!(err.user_message(), "units do not sum to total supply");
    }
}
