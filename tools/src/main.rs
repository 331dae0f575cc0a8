//! wallet-runner: exercises the authorization core end to end against a
//! real database and prints a security report.
//!
//! Usage:
//!   wallet-runner --db wallet.db
//!   wallet-runner --db wallet.db --config core.json

use anyhow::Result;
use paisa_core::{
    clock::SystemClock, notify::StoreNotifier, store::WalletStore, CoreConfig, TransferOutcome,
    WalletAuthorizer, WalletError,
};
use std::env;
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let config = match args.windows(2).find(|w| w[0] == "--config") {
        Some(w) => CoreConfig::from_json_file(std::path::Path::new(&w[1]))?,
        None => CoreConfig::default(),
    };

    println!("paisa wallet-runner");
    println!("  db: {db}");
    println!();

    let store = WalletStore::open(db)?;
    store.migrate()?;
    log::info!("database ready at {db}");

    let clock: Arc<dyn paisa_core::Clock> = Arc::new(SystemClock);
    let notifier = Arc::new(StoreNotifier::new(store.clone(), Arc::clone(&clock)));
    let auth = WalletAuthorizer::new(store.clone(), clock.clone(), notifier, config);

    // Watch for high/critical alerts while the demo runs.
    let alerts = auth.monitor().subscribe();

    let now = clock.now_millis();
    store.create_wallet("user-alice", "alice@example.com", 10_000, now)?;
    store.create_wallet("user-bob", "bob@example.com", 2_500, now)?;

    auth.set_pin("user-alice", "4821", None)?;

    // Transfer without a PIN stops at the PIN gate; retry with it.
    match auth.authorize_transfer("user-alice", "bob@example.com", 3_000, Some("lunch"), None)? {
        TransferOutcome::PinRequired => println!("transfer: PIN required, retrying"),
        TransferOutcome::Completed(_) => {}
    }
    match auth.authorize_transfer(
        "user-alice",
        "bob@example.com",
        3_000,
        Some("lunch"),
        Some("4821"),
    )? {
        TransferOutcome::Completed(receipt) => println!(
            "transfer: {} sender_balance={} recipient_balance={}",
            receipt.reference_id, receipt.sender_new_balance, receipt.recipient_new_balance
        ),
        TransferOutcome::PinRequired => unreachable!("PIN was supplied"),
    }

    // Card issuance followed by a payment and a deliberate wrong PIN.
    let card = auth.issue_card("user-bob", "7362", Some(5_000), Some(20_000))?;
    println!(
        "card issued: {} cvv={} ({})",
        paisa_core::card_number::formatted(&card.card_number),
        card.cvv,
        card.expiry
    );

    let receipt = auth.authorize_card_payment(
        &card.card_number,
        "7362",
        1_200,
        "merchant-001",
        Some("coffee"),
    )?;
    println!(
        "payment: {} daily_remaining={}",
        receipt.reference_id, receipt.limits.daily_remaining
    );

    for _ in 0..3 {
        match auth.authorize_card_payment(&card.card_number, "0001", 100, "merchant-001", None) {
            Err(WalletError::InvalidPin) => {}
            other => println!("unexpected wrong-PIN outcome: {other:?}"),
        }
    }

    for row in auth.cards("user-bob")? {
        println!(
            "card on file: {} status={} expiry={}",
            row.masked_number,
            row.status.as_str(),
            row.expiry
        );
    }

    while let Ok(alert) = alerts.try_recv() {
        println!(
            "ALERT [{}] {}",
            alert.severity.as_str(),
            alert.event_type
        );
    }

    println!();
    println!("=== SECURITY REPORT ===");
    let report = auth.monitor().report()?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
