//! # Locked Tokens
//!
//! Bearer value that can be pinned to a public key. A mint issues a proof
//! locked to key K; the proof travels out-of-band (a string in a chat, a
//! QR code); and only someone who can sign under K gets the mint to
//! honour it. Once.
//!
//! ## Architecture
//!
//! ```text
//! proof.rs      Proof, LockCondition, boundary validation
//! encoding.rs   Token batches, cashuA text form
//! redemption.rs RedemptionRequest, build/check, outcomes
//! authority.rs  LockedTokenAuthority: issue + spent-state machine
//! funding.rs    FundingSource seam, IssuedToken
//! error.rs      TokenError
//! ```
//!
//! ## Why a signature and not encryption
//!
//! Direct messages only need to be readable by one recipient. A
//! redemption has to convince a third party (the mint) that the holder
//! owns K. So this path signs and verifies, and never encrypts.

pub mod authority;
pub mod encoding;
pub mod error;
pub mod funding;
pub mod proof;
pub mod redemption;

pub use authority::{LockedTokenAuthority, ProofState};
pub use encoding::{MintProofs, Token};
pub use error::TokenError;
pub use funding::{FundingError, FundingRequest, FundingSource, IssuedToken};
pub use proof::{LockCondition, Proof};
pub use redemption::{
    build_redemption, check_redemption, RedemptionOutcome, RedemptionRequest, RejectReason,
};
