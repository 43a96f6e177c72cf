//! # Token Batches and Their Text Form
//!
//! A [`Token`] batches proofs from one or more mints:
//!
//! ```text
//! { "token": [ { "mint": "<url>", "proofs": [ <proof>, ... ] }, ... ], "memo"?: "..." }
//! ```
//!
//! The shareable text form is `cashuA` followed by URL-safe base64 of that
//! JSON. Decoding also takes plain JSON (what a lot of tooling passes
//! around) and base64 with or without padding.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::error::TokenError;
use super::proof::Proof;
use crate::config::TOKEN_PREFIX;
use crate::crypto::keys::PublicKey;

/// Proofs issued by one mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MintProofs {
    pub mint: String,
    pub proofs: Vec<Proof>,
}

/// A batch of proofs, possibly from several mints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Token {
    pub token: Vec<MintProofs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl Token {
    /// A single-mint token.
    pub fn new(mint: impl Into<String>, proofs: Vec<Proof>) -> Self {
        Self {
            token: vec![MintProofs {
                mint: mint.into(),
                proofs,
            }],
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    /// Add proofs, merging into an existing entry for the same mint.
    pub fn push(&mut self, mint: &str, proofs: impl IntoIterator<Item = Proof>) {
        match self.token.iter_mut().find(|entry| entry.mint == mint) {
            Some(entry) => entry.proofs.extend(proofs),
            None => self.token.push(MintProofs {
                mint: mint.to_string(),
                proofs: proofs.into_iter().collect(),
            }),
        }
    }

    /// Every proof with the mint it came from.
    pub fn proofs(&self) -> impl Iterator<Item = (&str, &Proof)> {
        self.token
            .iter()
            .flat_map(|entry| entry.proofs.iter().map(move |p| (entry.mint.as_str(), p)))
    }

    /// Proofs a holder of `key` can redeem.
    pub fn proofs_locked_to(&self, key: &PublicKey) -> impl Iterator<Item = (&str, &Proof)> + '_ {
        let key = *key;
        self.proofs().filter(move |(_, p)| p.is_locked_to(&key))
    }

    /// Sum of all denominations.
    pub fn total_amount(&self) -> Result<u64, TokenError> {
        self.proofs().try_fold(0u64, |acc, (_, p)| {
            acc.checked_add(p.amount())
                .ok_or_else(|| TokenError::InvalidAmount("token total overflows u64".into()))
        })
    }

    pub fn to_json(&self) -> Result<String, TokenError> {
        serde_json::to_string(self).map_err(|e| TokenError::Parse(e.to_string()))
    }

    /// `cashuA` + URL-safe base64 of the JSON.
    pub fn encode(&self) -> Result<String, TokenError> {
        Ok(format!("{TOKEN_PREFIX}{}", URL_SAFE.encode(self.to_json()?)))
    }

    /// Decode either the `cashuA…` text form or plain JSON.
    pub fn decode(input: &str) -> Result<Self, TokenError> {
        let input = input.trim();
        let json = if input.starts_with('{') {
            input.as_bytes().to_vec()
        } else if let Some(b64) = input.strip_prefix(TOKEN_PREFIX) {
            decode_base64(b64)?
        } else if input.starts_with("cashu") {
            let version = input.get(5..6).unwrap_or("?");
            return Err(TokenError::UnsupportedFormat(format!(
                "token version '{version}'"
            )));
        } else {
            return Err(TokenError::UnsupportedFormat(format!(
                "expected JSON or a '{TOKEN_PREFIX}' prefix"
            )));
        };

        let token: Token =
            serde_json::from_slice(&json).map_err(|e| TokenError::Parse(e.to_string()))?;
        token.validate()?;
        Ok(token)
    }

    fn validate(&self) -> Result<(), TokenError> {
        if self.token.is_empty() {
            return Err(TokenError::Parse("token has no mint entries".into()));
        }
        for entry in &self.token {
            if entry.mint.is_empty() {
                return Err(TokenError::Parse("mint url is empty".into()));
            }
            if entry.proofs.is_empty() {
                return Err(TokenError::Parse(format!("mint {} has no proofs", entry.mint)));
            }
        }
        self.total_amount().map(|_| ())
    }
}

fn decode_base64(b64: &str) -> Result<Vec<u8>, TokenError> {
    let unpadded = b64.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(unpadded)
        .or_else(|_| STANDARD_NO_PAD.decode(unpadded))
        .map_err(|e| TokenError::Parse(format!("base64: {e}")))
}

impl std::str::FromStr for Token {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}
