//! The funding collaborator.
//!
//! Before an authority issues value, something has to be paid: in
//! practice a Lightning invoice. That lifecycle lives outside this crate.
//! The authority only needs two things from it, expressed as
//! [`FundingSource`]: turn an amount into a payable request, and wait
//! until that request has settled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::encoding::Token;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FundingError {
    #[error("funding source unavailable: {0}")]
    Unavailable(String),

    #[error("funding request {reference} was not paid: {reason}")]
    Unpaid { reference: String, reason: String },

    #[error("funding request refused: {0}")]
    Refused(String),
}

/// A payable request handed back to whoever asked for a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRequest {
    /// Source-specific id used to track settlement.
    pub reference: String,
    pub amount: u64,
    /// What the payer pays, e.g. a BOLT11 invoice string.
    pub payment_request: String,
}

#[async_trait]
pub trait FundingSource: Send + Sync {
    /// Create a payable request for `amount`. `memo` is the description
    /// shown to the payer.
    async fn request_funding(&self, amount: u64, memo: &str) -> Result<FundingRequest, FundingError>;

    /// Resolve once `request` is paid, or fail if it never will be.
    async fn await_settlement(&self, request: &FundingRequest) -> Result<(), FundingError>;
}

/// A paid-for token together with the request that funded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub funding_request: FundingRequest,
    pub token: Token,
}
