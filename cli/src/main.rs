// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # PARCEL Command Line
//!
//! Entry point for the `parcel` binary. It's a thin shell around
//! `parcel-protocol`: parse arguments, set up logging, call the library,
//! and print results to stdout.
//!
//! - `keygen`  : new keypair as npub/nsec/hex
//! - `encode`  / `decode`: convert between hex and npub/nsec
//! - `send`    : encrypt, sign, and publish a direct message
//! - `listen`  : stream direct messages addressed to you
//! - `lock`    : issue a token locked to a public key
//! - `redeem`  : sign redemption requests for proofs you own
//! - `version` : build information

mod cli;
mod logging;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;
use tokio::signal;

use parcel_protocol::config::{GatewayConfig, PROTOCOL_VERSION};
use parcel_protocol::identity::{self, DecodedKey, Keypair, PublicKey};
use parcel_protocol::messaging::Messenger;
use parcel_protocol::relay::{RelayGateway, WebSocketConnector};
use parcel_protocol::token::{build_redemption, check_redemption, LockedTokenAuthority, Token};

use cli::{Commands, ParcelCli};
use logging::LogFormat;

const DEFAULT_LOG_FILTER: &str = "parcel=info,parcel_protocol=info";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ParcelCli::parse();
    logging::init_logging(DEFAULT_LOG_FILTER, LogFormat::from_str_lossy(&cli.log_format));

    match cli.command {
        Commands::Keygen(args) => keygen(args),
        Commands::Encode(args) => encode(args),
        Commands::Decode(args) => decode(args),
        Commands::Send(args) => send(args).await,
        Commands::Listen(args) => listen(args).await,
        Commands::Lock(args) => lock(args),
        Commands::Redeem(args) => redeem(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn keygen(args: cli::KeygenArgs) -> Result<()> {
    let keys = Keypair::generate();
    let public = keys.public_key();

    if args.json {
        let out = json!({
            "npub": identity::encode_public(&public),
            "nsec": identity::encode_secret(&keys),
            "public_hex": public.to_hex(),
            "secret_hex": keys.secret_hex(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("npub       : {}", identity::encode_public(&public));
        println!("nsec       : {}", identity::encode_secret(&keys));
        println!("public hex : {}", public.to_hex());
        println!("secret hex : {}", keys.secret_hex());
    }
    Ok(())
}

fn encode(args: cli::EncodeArgs) -> Result<()> {
    if args.secret {
        let keys = Keypair::from_hex(&args.key).context("invalid secret key hex")?;
        println!("{}", identity::encode_secret(&keys));
    } else {
        let key = PublicKey::from_hex(&args.key).context("invalid public key hex")?;
        println!("{}", identity::encode_public(&key));
    }
    Ok(())
}

fn decode(args: cli::DecodeArgs) -> Result<()> {
    match identity::decode(&args.encoded).context("could not decode key")? {
        DecodedKey::Public(key) => println!("{}", key.to_hex()),
        DecodedKey::Secret(keys) => println!("{}", keys.secret_hex()),
    }
    Ok(())
}

async fn send(args: cli::SendArgs) -> Result<()> {
    let keys = parse_secret(&args.secret.secret_key)?;
    let recipient = PublicKey::parse(&args.to).context("invalid recipient key")?;
    let messenger = Messenger::new(keys, Arc::new(gateway(args.relays)));

    if args.dry_run {
        let event = messenger.seal(&recipient, &args.message)?;
        println!("{}", event.to_json()?);
        return Ok(());
    }

    tracing::info!(
        to = %identity::encode_public(&recipient),
        relays = messenger.gateway().relays().len(),
        "sending direct message"
    );

    let sent = messenger.send(&recipient, &args.message).await?;
    for (relay, err) in sent.report.errors() {
        tracing::warn!(%relay, error = %err, "relay did not accept the message");
    }
    if sent.report.is_undelivered() {
        bail!("no relay accepted event {}", sent.event.id());
    }

    println!("event    : {}", sent.event.id());
    println!(
        "accepted : {}/{}",
        sent.report.successes(),
        sent.report.outcomes.len()
    );
    for relay in sent.report.accepted_by() {
        println!("  ok     {relay}");
    }
    Ok(())
}

async fn listen(args: cli::ListenArgs) -> Result<()> {
    let keys = parse_secret(&args.secret.secret_key)?;
    let messenger = Messenger::new(keys, Arc::new(gateway(args.relays)));
    let me = identity::encode_public(&messenger.public_key());

    tracing::info!(npub = %me, limit = args.limit, "listening for direct messages");
    let mut inbox = messenger.inbox(Some(args.limit));
    let mut received = 0usize;

    loop {
        if args.count.is_some_and(|n| received >= n) {
            break;
        }
        tokio::select! {
            message = inbox.next() => {
                let Some(message) = message else {
                    tracing::info!("all relays closed the subscription");
                    break;
                };
                received += 1;
                let at = chrono::DateTime::from_timestamp(message.created_at as i64, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| message.created_at.to_string());
                println!(
                    "[{at}] {}: {}",
                    identity::encode_public(&message.from),
                    message.content
                );
            }
            _ = shutdown_signal() => {
                tracing::info!("shutdown signal received");
                break;
            }
        }
    }

    inbox.cancel();
    tracing::info!(received, "stopped listening");
    Ok(())
}

fn lock(args: cli::LockArgs) -> Result<()> {
    let key = PublicKey::parse(&args.to).context("invalid lock key")?;
    let authority = LockedTokenAuthority::new(args.mint.clone());
    let proof = authority
        .create_locked(args.amount, &key)
        .context("could not issue proof")?;

    let mut token = Token::new(authority.mint_url(), vec![proof]);
    if let Some(memo) = args.memo {
        token = token.with_memo(memo);
    }
    println!("{}", token.encode()?);
    Ok(())
}

fn redeem(args: cli::RedeemArgs) -> Result<()> {
    let keys = parse_secret(&args.secret.secret_key)?;
    let me = keys.public_key();
    let token = Token::decode(&args.token).context("could not decode token")?;

    let mut requests = Vec::new();
    for (mint, proof) in token.proofs_locked_to(&me) {
        let request = build_redemption(proof, &keys)?;
        let local_check = match check_redemption(proof, &request) {
            Ok(()) => "ok".to_string(),
            Err(reason) => reason.to_string(),
        };
        requests.push(json!({
            "mint": mint,
            "amount": proof.amount(),
            "request": request,
            "local_check": local_check,
        }));
    }

    if requests.is_empty() {
        bail!(
            "no proofs in this token are locked to {}",
            identity::encode_public(&me)
        );
    }
    println!("{}", serde_json::to_string_pretty(&requests)?);
    Ok(())
}

/// Accepts `nsec1…` or 64-char hex.
fn parse_secret(input: &str) -> Result<Keypair> {
    let input = input.trim();
    if input.to_ascii_lowercase().starts_with("nsec1") {
        identity::decode_secret(input).context("invalid nsec")
    } else {
        Keypair::from_hex(input).context("invalid secret key hex")
    }
}

fn gateway(args: cli::RelayArgs) -> RelayGateway {
    let config = if args.relays.is_empty() {
        GatewayConfig::default()
    } else {
        GatewayConfig::with_relays(args.relays)
    };
    RelayGateway::new(WebSocketConnector::new(), config)
}

fn print_version() {
    println!("parcel   {}", env!("CARGO_PKG_VERSION"));
    println!("protocol {}", PROTOCOL_VERSION);
}

/// Waits for Ctrl+C or SIGTERM. If a handler can't be installed, that
/// branch never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
