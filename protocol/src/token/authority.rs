//! # Locked-Token Authority
//!
//! The issuer side: mint proofs, remember them, and decide redemptions.
//!
//! ## State machine
//!
//! ```text
//!            verify_redemption: accepted
//! Unspent ─────────────────────────────────▶ Redeemed   (terminal)
//!    ▲  │
//!    └──┘ rejected attempt (proof stays Unspent, may be retried)
//! ```
//!
//! ## Concurrency
//!
//! Proof records live in a `DashMap`. A redemption takes the shard write
//! guard for its proof id with `get_mut` and holds it across the state
//! check, the signature check and the transition. Two concurrent requests
//! for the same proof serialize on that guard; the first valid one flips
//! the state and the second sees `Redeemed`. Requests for different
//! proofs only contend when they hash to the same shard.
//!
//! There is no administrative path that marks a locked proof redeemed:
//! the only way to `Redeemed` runs through [`check_redemption`].

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::encoding::Token;
use super::error::TokenError;
use super::funding::{FundingSource, IssuedToken};
use super::proof::{LockCondition, Proof};
use super::redemption::{check_redemption, RedemptionOutcome, RedemptionRequest, RejectReason};
use crate::config::{MINT_COMMITMENT_BYTES, PROOF_ID_BYTES, PROOF_SECRET_BYTES};
use crate::crypto::keys::PublicKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProofState {
    Unspent,
    Redeemed,
}

#[derive(Debug)]
struct ProofRecord {
    proof: Proof,
    state: ProofState,
    redeemed_at: Option<DateTime<Utc>>,
}

/// Issues proofs for one mint URL and tracks their spent state.
#[derive(Debug)]
pub struct LockedTokenAuthority {
    mint_url: String,
    proofs: DashMap<String, ProofRecord>,
}

impl LockedTokenAuthority {
    pub fn new(mint_url: impl Into<String>) -> Self {
        Self {
            mint_url: mint_url.into(),
            proofs: DashMap::new(),
        }
    }

    pub fn mint_url(&self) -> &str {
        &self.mint_url
    }

    /// Number of proofs ever issued.
    pub fn issued(&self) -> usize {
        self.proofs.len()
    }

    /// Issue a proof of `amount` locked to `key`.
    pub fn create_locked(&self, amount: u64, key: &PublicKey) -> Result<Proof, TokenError> {
        self.create(amount, LockCondition::P2pk(*key))
    }

    /// Issue a proof under any lock condition, including a bearer proof.
    pub fn create(&self, amount: u64, lock: LockCondition) -> Result<Proof, TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount("amount must be > 0".into()));
        }

        loop {
            let proof = Proof::new(
                random_hex(PROOF_ID_BYTES),
                amount,
                random_hex(PROOF_SECRET_BYTES),
                random_hex(MINT_COMMITMENT_BYTES),
                lock,
            )?;

            // Id collisions at 128 bits do not happen, but an overwrite
            // would silently resurrect a spent proof, so check anyway.
            if let Entry::Vacant(slot) = self.proofs.entry(proof.id().to_string()) {
                slot.insert(ProofRecord {
                    proof: proof.clone(),
                    state: ProofState::Unspent,
                    redeemed_at: None,
                });
                info!(
                    proof_id = %proof.id(),
                    amount,
                    locked = lock.is_locked(),
                    "proof issued"
                );
                return Ok(proof);
            }
        }
    }

    /// Fund, then issue a single-proof token for this mint.
    pub async fn issue(
        &self,
        amount: u64,
        lock: LockCondition,
        funding: &dyn FundingSource,
    ) -> Result<IssuedToken, TokenError> {
        if amount == 0 {
            return Err(TokenError::InvalidAmount("amount must be > 0".into()));
        }

        let memo = format!("{amount} locked token from {}", self.mint_url);
        let funding_request = funding.request_funding(amount, &memo).await?;
        funding.await_settlement(&funding_request).await?;

        let proof = self.create(amount, lock)?;
        Ok(IssuedToken {
            funding_request,
            token: Token::new(self.mint_url.clone(), vec![proof]),
        })
    }

    pub fn state(&self, proof_id: &str) -> Option<ProofState> {
        self.proofs.get(proof_id).map(|r| r.state)
    }

    pub fn redeemed_at(&self, proof_id: &str) -> Option<DateTime<Utc>> {
        self.proofs.get(proof_id).and_then(|r| r.redeemed_at)
    }

    /// Decide a redemption and, if accepted, mark the proof redeemed.
    pub fn verify_redemption(
        &self,
        proof: &Proof,
        request: &RedemptionRequest,
    ) -> RedemptionOutcome {
        let outcome = self.decide(proof, request);
        match outcome {
            RedemptionOutcome::Accepted => {
                info!(proof_id = %proof.id(), amount = proof.amount(), "redemption accepted")
            }
            RedemptionOutcome::Rejected(reason) => {
                info!(proof_id = %proof.id(), %reason, "redemption rejected")
            }
        }
        outcome
    }

    fn decide(&self, proof: &Proof, request: &RedemptionRequest) -> RedemptionOutcome {
        // Write guard held until the end of this function.
        let Some(mut record) = self.proofs.get_mut(proof.id()) else {
            return RedemptionOutcome::Rejected(RejectReason::UnknownProof);
        };

        // The presented proof must be the one we issued, lock included.
        if record.proof != *proof {
            return RedemptionOutcome::Rejected(RejectReason::UnknownProof);
        }
        if record.state == ProofState::Redeemed {
            return RedemptionOutcome::Rejected(RejectReason::AlreadyRedeemed);
        }

        match check_redemption(&record.proof, request) {
            Ok(()) => {
                record.state = ProofState::Redeemed;
                record.redeemed_at = Some(Utc::now());
                RedemptionOutcome::Accepted
            }
            Err(reason) => RedemptionOutcome::Rejected(reason),
        }
    }
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
