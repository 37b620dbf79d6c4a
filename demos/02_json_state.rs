/// json state - serialized views for debugging and monitoring
use chrono::{Duration, TimeZone, Utc};
use debt_ledger_rs::{
    AccountView, Client, Frequency, InMemoryStore, Ledger, LedgerConfig, Money, Order,
    PaymentMethod, PaymentRequest, PlanTerms, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== json state serialization ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let ledger = Ledger::<InMemoryStore>::in_memory(LedgerConfig::standard())?;
    let client_id = Uuid::new_v4();
    ledger.open_account(Client::new(client_id, "Carla Gomez"))?;

    let order = Order::new(Uuid::new_v4(), client_id, Money::from_major(300), time.now());
    let order_id = order.id;
    ledger.record_order(order, &time)?;

    // stage 1: order recorded
    println!("stage 1: order recorded");
    println!("-----------------------");
    println!("{}\n", AccountView::from_account(&ledger.account(client_id)?).to_json_pretty()?);

    // stage 2: financed in six biweekly cuotas
    let terms = PlanTerms::new(6, Frequency::Biweekly, time.now().date_naive())
        .with_initial_payment(Money::from_major(60));
    ledger.generate_plan(order_id, terms, PaymentMethod::Card, &time)?;
    println!("stage 2: financed");
    println!("-----------------");
    if let Some(summary) = ledger.plan_summary(order_id, time.now().date_naive())? {
        println!("{}\n", summary.to_json_pretty()?);
    }

    // stage 3: one payment, then time passes without another
    ledger.apply_payment(
        PaymentRequest::to_order(order_id, Money::from_major(55), PaymentMethod::MobilePayment),
        &time,
    )?;
    controller.advance(Duration::days(40));
    let today = time.now().date_naive();
    println!("stage 3: 40 days later");
    println!("----------------------");
    if let Some(summary) = ledger.plan_summary(order_id, today)? {
        println!("{}\n", summary.to_json_pretty()?);
    }

    println!("ledger statistics");
    println!("-----------------");
    println!("{}", ledger.stats(today)?.to_json_pretty()?);

    Ok(())
}
