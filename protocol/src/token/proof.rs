//! Proofs: the individual units of value inside a token.
//!
//! JSON never reaches a [`Proof`] directly. It lands in a permissive wire
//! struct first and is converted with `TryFrom`, which is where every
//! invariant is enforced: positive amount, non-empty fields, a lock key
//! that is an actual curve point. Unknown fields are a parse error. Past
//! that boundary, code can rely on a `Proof` being well-formed.

use serde::{Deserialize, Serialize};

use super::error::TokenError;
use crate::crypto::hash::{sha256, DIGEST_LENGTH};
use crate::crypto::keys::PublicKey;

/// Who may redeem a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockCondition {
    /// Bearer proof: anyone holding it can redeem.
    Unlocked,
    /// Pay-to-public-key: redemption needs a signature under this key.
    P2pk(PublicKey),
}

impl LockCondition {
    pub fn key(&self) -> Option<&PublicKey> {
        match self {
            Self::Unlocked => None,
            Self::P2pk(key) => Some(key),
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::P2pk(_))
    }
}

/// One proof, validated.
///
/// Wire shape:
/// `{ "id", "amount", "secret", "mint_commitment" (or "C"), "pubkey"? }`.
/// The lock key is written as 33-byte compressed hex; 32-byte x-only hex
/// is also accepted on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireProof", into = "WireProof")]
pub struct Proof {
    id: String,
    amount: u64,
    secret: String,
    mint_commitment: String,
    lock: LockCondition,
}

impl Proof {
    pub fn new(
        id: impl Into<String>,
        amount: u64,
        secret: impl Into<String>,
        mint_commitment: impl Into<String>,
        lock: LockCondition,
    ) -> Result<Self, TokenError> {
        let proof = Self {
            id: id.into(),
            amount,
            secret: secret.into(),
            mint_commitment: mint_commitment.into(),
            lock,
        };
        proof.validate()?;
        Ok(proof)
    }

    fn validate(&self) -> Result<(), TokenError> {
        if self.amount == 0 {
            return Err(TokenError::InvalidAmount("proof amount must be > 0".into()));
        }
        if self.id.is_empty() || !self.id.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(TokenError::Parse("proof id must be non-empty printable ASCII".into()));
        }
        if self.secret.is_empty() {
            return Err(TokenError::Parse("proof secret is empty".into()));
        }
        if self.mint_commitment.is_empty() || hex::decode(&self.mint_commitment).is_err() {
            return Err(TokenError::Parse("mint commitment must be non-empty hex".into()));
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn mint_commitment(&self) -> &str {
        &self.mint_commitment
    }

    pub fn lock(&self) -> &LockCondition {
        &self.lock
    }

    /// Is this proof locked to `key`? Compared on the x-only form.
    pub fn is_locked_to(&self, key: &PublicKey) -> bool {
        self.lock.key() == Some(key)
    }

    /// What a redeemer signs: `SHA-256` of the proof id's bytes.
    pub fn redemption_digest(&self) -> [u8; DIGEST_LENGTH] {
        sha256(self.id.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireProof {
    id: String,
    amount: u64,
    secret: String,
    #[serde(alias = "C")]
    mint_commitment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pubkey: Option<String>,
}

impl TryFrom<WireProof> for Proof {
    type Error = TokenError;

    fn try_from(wire: WireProof) -> Result<Self, Self::Error> {
        let lock = match wire.pubkey {
            None => LockCondition::Unlocked,
            Some(hex_key) => LockCondition::P2pk(
                PublicKey::from_hex(&hex_key)
                    .map_err(|e| TokenError::InvalidLockKey(e.to_string()))?,
            ),
        };
        Proof::new(wire.id, wire.amount, wire.secret, wire.mint_commitment, lock)
    }
}

impl From<Proof> for WireProof {
    fn from(proof: Proof) -> Self {
        Self {
            pubkey: proof.lock.key().map(PublicKey::to_compressed_hex),
            id: proof.id,
            amount: proof.amount,
            secret: proof.secret,
            mint_commitment: proof.mint_commitment,
        }
    }
}
