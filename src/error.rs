//! Error taxonomy of the bridge core.
//!
//! On-chain call failures are captured as [`VmError`] values and never
//! propagate past the task governor; the only errors the tasks surface to
//! the scheduler are storage failures
//! ([`StorageError`](crate::storage::StorageError)).

use alloy::transports::{RpcError, TransportErrorKind};

/// An on-chain call failure (VM revert or RPC-level failure), reduced to the
/// `message`/`code` pair the contracts encode into revert strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmError {
    /// Human-readable failure message.
    pub message: String,
    /// Contract error code, empty when the failure was not a coded revert.
    pub code: String,
}

/// Marker geth puts in front of decoded revert reasons.
const REVERT_MARKER: &str = "reverted with reason string";

impl VmError {
    /// Builds a [`VmError`] from a raw failure string.
    ///
    /// Extracts the text after the revert marker when present, strips
    /// quoting, and splits the contracts' `message|code` convention.
    pub fn parse(raw: &str) -> Self {
        let message = match raw.find(REVERT_MARKER) {
            Some(idx) => &raw[idx + REVERT_MARKER.len()..],
            None => raw,
        };
        let message: String = message.chars().filter(|c| !matches!(c, '\'' | '"')).collect();
        let message = message.trim();
        match message.split_once('|') {
            Some((message, code)) => {
                Self { message: message.to_string(), code: code.to_string() }
            }
            None => Self { message: message.to_string(), code: String::new() },
        }
    }

    /// Classifies a transport-level failure, decoding revert data when the
    /// node reports any.
    pub fn from_transport_error(err: &RpcError<TransportErrorKind>) -> Self {
        if let Some(payload) = err.as_error_resp() {
            if let Some(data) = payload.as_revert_data() {
                if let Some(reason) = alloy::sol_types::decode_revert_reason(&data) {
                    return Self::parse(&reason);
                }
            }
            let mut parsed = Self::parse(&payload.message);
            if parsed.code.is_empty() {
                parsed.code = payload.code.to_string();
            }
            return parsed;
        }
        Self::parse(&err.to_string())
    }

    /// Classifies a typed contract-call failure.
    pub fn from_contract_error(err: &alloy::contract::Error) -> Self {
        match err {
            alloy::contract::Error::TransportError(err) => Self::from_transport_error(err),
            other => Self::parse(&other.to_string()),
        }
    }
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.code.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{} (code {})", self.message, self.code)
        }
    }
}
