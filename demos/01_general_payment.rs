/// general payment - spread one payment over every open debt, oldest first
use chrono::{Duration, TimeZone, Utc};
use debt_ledger_rs::{
    AgingScope, Client, InMemoryStore, Ledger, LedgerConfig, Money, Order, PaymentMethod,
    PaymentRequest, SafeTimeProvider, TimeSource, Uuid,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let ledger = Ledger::<InMemoryStore>::in_memory(LedgerConfig::with_client_credit())?;
    let client_id = Uuid::new_v4();
    ledger.open_account(Client::new(client_id, "Jose Rivas"))?;

    // three orders on consecutive days
    for total in [30, 50, 20] {
        let order = Order::new(Uuid::new_v4(), client_id, Money::from_major(total), time.now());
        ledger.record_order(order, &time)?;
        controller.advance(Duration::days(1));
    }

    println!("=== payment of 70.00 ===");
    let receipt = ledger.apply_payment(
        PaymentRequest::general(client_id, Money::from_major(70), PaymentMethod::Cash),
        &time,
    )?;
    for line in &receipt.per_obligation {
        println!("{} applied {} balance {}", line.obligation_id, line.applied, line.balance_after);
    }

    println!("\n=== payment of 80.00, more than what is owed ===");
    let receipt = ledger.apply_payment(
        PaymentRequest::general(client_id, Money::from_major(80), PaymentMethod::BankTransfer),
        &time,
    )?;
    println!(
        "applied {} unapplied {} credited {}",
        receipt.total_applied, receipt.unapplied_remainder, receipt.credit_recorded
    );

    controller.advance(Duration::days(45));
    let aging = ledger.classify_aging(AgingScope::All, time.now().date_naive())?;
    println!("\n{}", aging.to_json_pretty()?);

    for event in ledger.take_events() {
        println!("{:?}", event);
    }

    Ok(())
}
