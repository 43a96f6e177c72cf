//! Walkthrough of both PARCEL flows, entirely in-process.
//!
//! Alice messages Bob across three in-memory relays (one of them down),
//! then pays him with a token only he can redeem. Output is colored with
//! ANSI escapes for a storytelling-style terminal rendering.
//!
//! Run with:
//!   cargo run --example demo

use std::sync::Arc;
use std::time::{Duration, Instant};

use parcel_protocol::config::GatewayConfig;
use parcel_protocol::crypto::keys::Keypair;
use parcel_protocol::identity;
use parcel_protocol::messaging::Messenger;
use parcel_protocol::relay::{MemoryConnector, RelayGateway};
use parcel_protocol::token::{build_redemption, LockedTokenAuthority, Token};

// ---------------------------------------------------------------------------
// ANSI color constants
// ---------------------------------------------------------------------------

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const CYAN: &str = "\x1b[36m";
const WHITE: &str = "\x1b[37m";

// ---------------------------------------------------------------------------
// Display helpers
// ---------------------------------------------------------------------------

fn section(num: u32, title: &str) {
    println!();
    println!("{BOLD}{CYAN}===[{YELLOW} Step {num} {CYAN}]==================================================={RESET}");
    println!("{BOLD}{WHITE}  {title}{RESET}");
}

fn success(text: &str) {
    println!("{GREEN}  [OK] {text}{RESET}");
}

fn failure(text: &str) {
    println!("{RED}  [--] {text}{RESET}");
}

fn info(label: &str, value: &str) {
    println!("{WHITE}  {BOLD}{label}:{RESET} {YELLOW}{value}{RESET}");
}

fn timing(label: &str, elapsed: Duration) {
    let ms = elapsed.as_secs_f64() * 1000.0;
    println!("{DIM}{MAGENTA}  [{label}: {ms:.2} ms]{RESET}");
}

fn short(s: &str) -> String {
    if s.len() <= 20 {
        return s.to_string();
    }
    format!("{}...{}", &s[..12], &s[s.len() - 8..])
}

#[tokio::main]
async fn main() {
    println!("{BOLD}{WHITE}PARCEL: encrypted relay messages and key-locked tokens{RESET}");

    // -----------------------------------------------------------------------
    section(1, "Identities");
    // -----------------------------------------------------------------------
    let alice_keys = Keypair::generate();
    let bob_keys = Keypair::generate();
    info("alice", &short(&identity::encode_public(&alice_keys.public_key())));
    info("bob  ", &short(&identity::encode_public(&bob_keys.public_key())));

    // -----------------------------------------------------------------------
    section(2, "Relays");
    // -----------------------------------------------------------------------
    let live = ["mem://relay-one", "mem://relay-two"];
    let all = ["mem://relay-one", "mem://relay-two", "mem://relay-down"];
    let connector = MemoryConnector::with_relays(live);
    let gateway = |c: &MemoryConnector| {
        Arc::new(RelayGateway::new(c.clone(), GatewayConfig::with_relays(all)))
    };
    for url in all {
        if connector.relay(url).is_some() {
            success(url);
        } else {
            failure(&format!("{url} (offline)"));
        }
    }

    let alice = Messenger::new(alice_keys.clone(), gateway(&connector));
    let bob = Messenger::new(bob_keys.clone(), gateway(&connector));

    // -----------------------------------------------------------------------
    section(3, "Alice sends Bob a direct message");
    // -----------------------------------------------------------------------
    let mut inbox = bob.inbox(Some(20));
    let start = Instant::now();
    let sent = match alice.send(&bob.public_key(), "lunch is on me today").await {
        Ok(sent) => sent,
        Err(e) => {
            failure(&format!("send failed: {e}"));
            return;
        }
    };
    timing("encrypt + sign + publish", start.elapsed());
    info("event", &short(sent.event.id()));
    info("wire content", &short(sent.event.content()));
    for outcome in &sent.report.outcomes {
        match &outcome.result {
            Ok(()) => success(&format!("{} accepted", outcome.relay)),
            Err(e) => failure(&format!("{}: {e}", outcome.relay)),
        }
    }

    match tokio::time::timeout(Duration::from_secs(2), inbox.next()).await {
        Ok(Some(message)) => {
            success(&format!("bob reads: \"{}\"", message.content));
        }
        _ => failure("bob's inbox stayed empty"),
    }
    inbox.cancel();

    // -----------------------------------------------------------------------
    section(4, "A token only Bob can redeem");
    // -----------------------------------------------------------------------
    let mint = LockedTokenAuthority::new("https://mint.parcel.local");
    let proof = match mint.create_locked(100, &bob.public_key()) {
        Ok(p) => p,
        Err(e) => {
            failure(&format!("issue failed: {e}"));
            return;
        }
    };
    let text = match Token::new(mint.mint_url(), vec![proof]).encode() {
        Ok(t) => t,
        Err(e) => {
            failure(&format!("encode failed: {e}"));
            return;
        }
    };
    info("token", &short(&text));

    // -----------------------------------------------------------------------
    section(5, "Redemption");
    // -----------------------------------------------------------------------
    let Ok(token) = Token::decode(&text) else {
        failure("token did not decode");
        return;
    };
    for (_, proof) in token.proofs_locked_to(&bob.public_key()) {
        let Ok(by_alice) = build_redemption(proof, &alice_keys) else {
            continue;
        };
        let outcome = mint.verify_redemption(proof, &by_alice);
        failure(&format!("alice tries: {outcome}"));

        let Ok(by_bob) = build_redemption(proof, &bob_keys) else {
            continue;
        };
        success(&format!("bob redeems: {}", mint.verify_redemption(proof, &by_bob)));
        failure(&format!(
            "bob again: {}",
            mint.verify_redemption(proof, &by_bob)
        ));
    }

    println!();
}
