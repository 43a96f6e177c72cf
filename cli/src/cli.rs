//! # CLI Interface
//!
//! Argument structure for `parcel`, via `clap` derive. Anything secret or
//! environment-specific can come from a `PARCEL_*` variable instead of a
//! flag, which keeps keys out of shell history.

use clap::{Args, Parser, Subcommand};

/// PARCEL: encrypted relay messages and key-locked tokens.
#[derive(Parser, Debug)]
#[command(
    name = "parcel",
    about = "Encrypted relay messages and key-locked tokens",
    version,
    propagate_version = true
)]
pub struct ParcelCli {
    /// Log format: "pretty" or "json". Logs go to stderr.
    #[arg(long, global = true, env = "PARCEL_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a fresh keypair.
    Keygen(KeygenArgs),
    /// Encode a hex key as npub (or nsec with --secret).
    Encode(EncodeArgs),
    /// Decode an npub or nsec to hex.
    Decode(DecodeArgs),
    /// Send an encrypted direct message.
    Send(SendArgs),
    /// Print direct messages addressed to you as they arrive.
    Listen(ListenArgs),
    /// Issue a locked token from an in-process authority.
    Lock(LockArgs),
    /// Sign redemption requests for the proofs in a token that you own.
    Redeem(RedeemArgs),
    /// Print version information and exit.
    Version,
}

/// Relay selection shared by `send` and `listen`.
#[derive(Args, Debug)]
pub struct RelayArgs {
    /// Relay URL. Repeat the flag or comma-separate in PARCEL_RELAYS.
    /// Defaults to the built-in relay list.
    #[arg(long = "relay", env = "PARCEL_RELAYS", value_delimiter = ',')]
    pub relays: Vec<String>,
}

/// The caller's secret key.
#[derive(Args, Debug)]
pub struct SecretArgs {
    /// Secret key as nsec1… or 64-char hex.
    ///
    /// Prefer the environment variable over the flag.
    #[arg(long, env = "PARCEL_SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Print as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// 64-char hex key (x-only public key, or secret with --secret).
    pub key: String,

    /// Treat the input as a secret key and encode as nsec.
    #[arg(long)]
    pub secret: bool,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// npub1… or nsec1… string.
    pub encoded: String,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub secret: SecretArgs,

    #[command(flatten)]
    pub relays: RelayArgs,

    /// Recipient public key: npub1… or hex.
    #[arg(long)]
    pub to: String,

    /// Message text.
    pub message: String,

    /// Build and print the signed event without publishing it.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub secret: SecretArgs,

    #[command(flatten)]
    pub relays: RelayArgs,

    /// Backfill cap per relay.
    #[arg(long, default_value_t = 50)]
    pub limit: usize,

    /// Exit after this many messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct LockArgs {
    /// Denomination (positive).
    #[arg(long)]
    pub amount: u64,

    /// Lock key: npub1… or hex (x-only or compressed).
    #[arg(long)]
    pub to: String,

    /// Mint URL recorded in the token.
    #[arg(long, env = "PARCEL_MINT_URL", default_value = "https://mint.parcel.local")]
    pub mint: String,

    /// Optional memo carried in the token.
    #[arg(long)]
    pub memo: Option<String>,
}

#[derive(Args, Debug)]
pub struct RedeemArgs {
    #[command(flatten)]
    pub secret: SecretArgs,

    /// Token as cashuA… or JSON.
    pub token: String,
}
