//! Error kinds surfaced by layout construction, dispatch and differentiation.

use thiserror::Error;

/// Every fallible operation in this crate returns this error.
///
/// None of the variants is recovered internally; the workload is
/// deterministic numerics, so there is no retry anywhere.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CintError {
    /// Malformed basis input, detected while building a layout.
    #[error("invalid basis layout: {0}")]
    InvalidLayout(String),

    /// The requested family (or one of its derivatives) has no native symbol.
    #[error("integral {family} is not available from the native library (symbol `{symbol}`)")]
    UnsupportedIntegral { family: String, symbol: String },

    /// The native evaluator faulted or produced an unusable result.
    #[error("native call `{symbol}` failed: {reason}")]
    NativeCallFailure { symbol: String, reason: String },

    /// Two layout views do not share the same atm/bas/env tables.
    #[error("layouts do not share the same atm/bas/env tables: {0}")]
    IdentityMismatch(String),

    /// An upstream gradient does not match the shape of the forward value.
    #[error("gradient shape {found:?} does not match integral shape {expected:?}")]
    ShapeMismatch { expected: Vec<usize>, found: Vec<usize> },
}

pub type Result<T> = std::result::Result<T, CintError>;

impl CintError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        CintError::InvalidLayout(msg.into())
    }

    pub(crate) fn native(symbol: &str, reason: impl Into<String>) -> Self {
        CintError::NativeCallFailure {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// `true` for the "feature gap" signal, as opposed to a runtime fault.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, CintError::UnsupportedIntegral { .. })
    }
}
