//! Redemption requests and the stateless signature check.
//!
//! The holder of a locked proof signs `SHA-256(proof id)` with the key the
//! proof is locked to and hands over
//! `{ proof_id, pubkey, signature }`. Carrying the signer's key lets the
//! authority tell "right signature, wrong key" ([`RejectReason::KeyMismatch`])
//! apart from "garbage signature" ([`RejectReason::InvalidSignature`]).
//!
//! [`check_redemption`] is pure: it knows nothing about spent state, so a
//! holder can run it locally before ever contacting the mint. The
//! [`LockedTokenAuthority`](super::LockedTokenAuthority) wraps it with the
//! state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::TokenError;
use super::proof::{LockCondition, Proof};
use crate::crypto::keys::{Keypair, PublicKey};
use crate::crypto::signatures::{sign_digest, verify_digest, Signature};

/// A signed request to redeem one proof. All fields are hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedemptionRequest {
    pub proof_id: String,
    /// Signer's x-only public key.
    pub pubkey: String,
    /// BIP-340 signature over `SHA-256(proof_id)`.
    pub signature: String,
}

/// Why a redemption was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// The authority never issued this proof, or the presented copy
    /// differs from what it issued.
    UnknownProof,
    /// Already redeemed. Terminal.
    AlreadyRedeemed,
    /// Signed by a key other than the lock key.
    KeyMismatch,
    /// Malformed, or does not verify for this proof.
    InvalidSignature,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnknownProof => "unknown proof",
            Self::AlreadyRedeemed => "already redeemed",
            Self::KeyMismatch => "signer does not match the lock key",
            Self::InvalidSignature => "invalid signature",
        };
        f.write_str(s)
    }
}

/// Result of a redemption attempt. Rejection is an expected outcome, not
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RedemptionOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl RedemptionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Self::Accepted => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

impl fmt::Display for RedemptionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => f.write_str("accepted"),
            Self::Rejected(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

/// Sign a redemption for `proof` with `keys`.
///
/// This works for any key; whether the key is the right one is for the
/// verifier to decide.
pub fn build_redemption(proof: &Proof, keys: &Keypair) -> Result<RedemptionRequest, TokenError> {
    let signature = sign_digest(keys, &proof.redemption_digest())?;
    Ok(RedemptionRequest {
        proof_id: proof.id().to_string(),
        pubkey: keys.public_key().to_hex(),
        signature: signature.to_hex(),
    })
}

/// Check a request against a proof, ignoring spent state.
///
/// Order: unlocked proofs pass; then the request must name this proof,
/// come from the lock key, and carry a signature that verifies.
pub fn check_redemption(proof: &Proof, request: &RedemptionRequest) -> Result<(), RejectReason> {
    let lock_key = match proof.lock() {
        LockCondition::Unlocked => return Ok(()),
        LockCondition::P2pk(key) => key,
    };

    // A signature for a different proof is not a signature for this one.
    if request.proof_id != proof.id() {
        return Err(RejectReason::InvalidSignature);
    }

    let signer = PublicKey::from_hex(&request.pubkey).map_err(|_| RejectReason::InvalidSignature)?;
    if signer != *lock_key {
        return Err(RejectReason::KeyMismatch);
    }

    let signature =
        Signature::from_hex(&request.signature).map_err(|_| RejectReason::InvalidSignature)?;
    verify_digest(lock_key, &proof.redemption_digest(), &signature)
        .map_err(|_| RejectReason::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locked_to(keys: &Keypair) -> Proof {
        Proof::new(
            "5f0c0e2a1b3d4c6e",
            100,
            "secret",
            "00",
            LockCondition::P2pk(keys.public_key()),
        )
        .unwrap()
    }

    #[test]
    fn owner_signature_passes() {
        let owner = Keypair::generate();
        let proof = locked_to(&owner);
        let request = build_redemption(&proof, &owner).unwrap();
        assert_eq!(check_redemption(&proof, &request), Ok(()));
    }

    #[test]
    fn other_key_is_key_mismatch() {
        let owner = Keypair::generate();
        let thief = Keypair::generate();
        let proof = locked_to(&owner);
        let request = build_redemption(&proof, &thief).unwrap();
        assert_eq!(
            check_redemption(&proof, &request),
            Err(RejectReason::KeyMismatch)
        );
    }

    #[test]
    fn claiming_the_lock_key_without_its_secret_fails() {
        let owner = Keypair::generate();
        let thief = Keypair::generate();
        let proof = locked_to(&owner);
        let mut request = build_redemption(&proof, &thief).unwrap();
        request.pubkey = owner.public_key().to_hex();
        assert_eq!(
            check_redemption(&proof, &request),
            Err(RejectReason::InvalidSignature)
        );
    }

    #[test]
    fn signature_for_another_proof_fails() {
        let owner = Keypair::generate();
        let proof = locked_to(&owner);
        let other = Proof::new("other", 1, "s", "00", LockCondition::P2pk(owner.public_key()))
            .unwrap();
        let mut request = build_redemption(&other, &owner).unwrap();
        assert_eq!(
            check_redemption(&proof, &request),
            Err(RejectReason::InvalidSignature)
        );

        // Relabelling the request does not help either.
        request.proof_id = proof.id().to_string();
        assert_eq!(
            check_redemption(&proof, &request),
            Err(RejectReason::InvalidSignature)
        );
    }

    #[test]
    fn malformed_encodings_fail() {
        let owner = Keypair::generate();
        let proof = locked_to(&owner);
        let good = build_redemption(&proof, &owner).unwrap();

        let mut short_sig = good.clone();
        short_sig.signature.truncate(64);
        assert_eq!(
            check_redemption(&proof, &short_sig),
            Err(RejectReason::InvalidSignature)
        );

        let mut bad_key = good.clone();
        bad_key.pubkey = "not hex".into();
        assert_eq!(
            check_redemption(&proof, &bad_key),
            Err(RejectReason::InvalidSignature)
        );
    }

    #[test]
    fn compressed_signer_key_is_accepted() {
        let owner = Keypair::generate();
        let proof = locked_to(&owner);
        let mut request = build_redemption(&proof, &owner).unwrap();
        request.pubkey = owner.public_key().to_compressed_hex();
        assert_eq!(check_redemption(&proof, &request), Ok(()));
    }

    #[test]
    fn unlocked_proofs_need_no_signature() {
        let proof = Proof::new("bearer", 1, "s", "00", LockCondition::Unlocked).unwrap();
        let request = RedemptionRequest {
            proof_id: proof.id().to_string(),
            pubkey: String::new(),
            signature: String::new(),
        };
        assert_eq!(check_redemption(&proof, &request), Ok(()));
    }

    #[test]
    fn outcome_display() {
        assert_eq!(RedemptionOutcome::Accepted.to_string(), "accepted");
        assert_eq!(
            RedemptionOutcome::Rejected(RejectReason::AlreadyRedeemed).to_string(),
            "rejected: already redeemed"
        );
    }
}
