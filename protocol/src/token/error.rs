//! Error types for locked tokens.
//!
//! These cover building, parsing and issuing tokens. A rejected
//! redemption is not an error; it comes back as a
//! [`RedemptionOutcome`](super::RedemptionOutcome).

use thiserror::Error;

use super::funding::FundingError;
use crate::crypto::signatures::SignatureError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token or proof JSON did not have the expected shape.
    #[error("token parse error: {0}")]
    Parse(String),

    /// Denominations must be positive, and totals must fit in a u64.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The text is not a token format this crate reads.
    #[error("unsupported token format: {0}")]
    UnsupportedFormat(String),

    /// A proof's lock key is not a valid curve point.
    #[error("invalid lock key: {0}")]
    InvalidLockKey(String),

    /// Signing a redemption request failed.
    #[error("redemption signing failed: {0}")]
    Signing(#[from] SignatureError),

    /// The funding collaborator failed or the request was not paid.
    #[error(transparent)]
    Funding(#[from] FundingError),
}
