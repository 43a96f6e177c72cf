//! # Protocol Configuration & Constants
//!
//! Every magic number in PARCEL lives here. If you're hardcoding a constant
//! somewhere else, move it here first.
//!
//! Most of these values are fixed by the wire formats we interoperate with
//! (bech32 prefixes, event kinds, cipher sizes). Changing them breaks
//! compatibility with every other client on the relays, so don't.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The library's protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Key Encoding
// ---------------------------------------------------------------------------

/// Bech32 human-readable prefix for shareable public keys.
pub const PUBLIC_KEY_HRP: &str = "npub";

/// Bech32 human-readable prefix for exported secret keys.
pub const SECRET_KEY_HRP: &str = "nsec";

/// Length of a secp256k1 secret scalar in bytes.
pub const SECRET_KEY_LENGTH: usize = 32;

/// Length of a BIP-340 x-only public key in bytes.
pub const X_ONLY_KEY_LENGTH: usize = 32;

/// Length of a SEC1 compressed public key in bytes.
pub const COMPRESSED_KEY_LENGTH: usize = 33;

/// Length of a BIP-340 Schnorr signature in bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Length of a bech32-encoded 32-byte key, prefix and separator excluded:
/// 52 data characters plus the 6-character checksum.
pub const BECH32_KEY_DATA_CHARS: usize = 58;

// ---------------------------------------------------------------------------
// Envelope Cipher
// ---------------------------------------------------------------------------

/// AES-256 key length in bytes (the ECDH x-coordinate).
pub const AES_KEY_LENGTH: usize = 32;

/// AES-CBC block size, which is also the IV length.
pub const AES_BLOCK_LENGTH: usize = 16;

/// Separator between ciphertext and IV in the envelope text form.
pub const ENVELOPE_IV_SEPARATOR: &str = "?iv=";

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Kind for an encrypted direct message.
pub const DIRECT_MESSAGE_KIND: u16 = 4;

/// Tag name carrying a recipient public key.
pub const PUBKEY_TAG: &str = "p";

// ---------------------------------------------------------------------------
// Relays
// ---------------------------------------------------------------------------

/// Relays used when nothing else is configured.
pub const DEFAULT_RELAYS: &[&str] = &[
    "wss://relay.damus.io",
    "wss://nostr.bitcoiner.social",
    "wss://nostr.fmt.wiz.biz",
];

/// How long to wait for a relay connection to open.
pub const RELAY_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for a relay to acknowledge a published event.
pub const RELAY_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Capacity of the channel between relay tasks and a subscription consumer.
pub const SUBSCRIPTION_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the live broadcast channel inside an in-memory relay.
pub const MEMORY_RELAY_BROADCAST_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Prefix of the text-encoded token format.
pub const TOKEN_PREFIX: &str = "cashuA";

/// Random bytes in a proof identifier (hex-encoded to 32 characters).
pub const PROOF_ID_BYTES: usize = 16;

/// Random bytes in a proof secret.
pub const PROOF_SECRET_BYTES: usize = 32;

/// Bytes in the mint's commitment value.
pub const MINT_COMMITMENT_BYTES: usize = 32;

// ---------------------------------------------------------------------------
// Gateway Configuration
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`RelayGateway`](crate::relay::RelayGateway).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Relay endpoints events are published to and read from.
    pub relays: Vec<String>,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Publish acknowledgement timeout in milliseconds.
    pub publish_timeout_ms: u64,
    /// Buffered events per subscription before relay tasks apply backpressure.
    pub channel_capacity: usize,
}

impl GatewayConfig {
    /// Config pointing at the given relays, defaults elsewhere.
    pub fn with_relays<I, S>(relays: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            relays: relays.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Connection timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Publish timeout as a `Duration`.
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            relays: DEFAULT_RELAYS.iter().map(|r| r.to_string()).collect(),
            connect_timeout_ms: RELAY_CONNECT_TIMEOUT.as_millis() as u64,
            publish_timeout_ms: RELAY_PUBLISH_TIMEOUT.as_millis() as u64,
            channel_capacity: SUBSCRIPTION_CHANNEL_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_default_relays() {
        let config = GatewayConfig::default();
        assert_eq!(config.relays.len(), DEFAULT_RELAYS.len());
        assert_eq!(config.connect_timeout(), RELAY_CONNECT_TIMEOUT);
        assert_eq!(config.publish_timeout(), RELAY_PUBLISH_TIMEOUT);
    }

    #[test]
    fn partial_json_config_fills_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"relays": ["ws://localhost:7000"]}"#).unwrap();
        assert_eq!(config.relays, vec!["ws://localhost:7000".to_string()]);
        assert_eq!(config.channel_capacity, SUBSCRIPTION_CHANNEL_CAPACITY);
    }

    #[test]
    fn bech32_key_length_matches_32_bytes() {
        // 256 bits / 5 bits per char, rounded up, plus checksum.
        assert_eq!(BECH32_KEY_DATA_CHARS, 256_usize.div_ceil(5) + 6);
    }
}
