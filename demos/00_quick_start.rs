/// quick start - finance an order and pay the first installment
use chrono::{NaiveDate, TimeZone, Utc};
use debt_ledger_rs::{
    Client, Frequency, Ledger, LedgerConfig, Money, Order, PaymentMethod, PaymentRequest,
    PlanTerms, SafeTimeProvider, TimeSource, Uuid,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
    ));

    let ledger = Ledger::<debt_ledger_rs::InMemoryStore>::in_memory(LedgerConfig::standard())?;

    // a client buys for 100.00
    let client_id = Uuid::new_v4();
    ledger.open_account(Client::new(client_id, "Maria Perez"))?;
    let order = Order::new(Uuid::new_v4(), client_id, Money::from_major(100), time.now());
    let order_id = order.id;
    ledger.record_order(order, &time)?;

    // 20.00 down, the rest in four monthly cuotas
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let terms = PlanTerms::new(4, Frequency::Monthly, start).with_initial_payment(Money::from_major(20));
    let plan = ledger.generate_plan(order_id, terms, PaymentMethod::Cash, &time)?;

    for installment in &plan.installments {
        println!("cuota {} due {} amount {}", installment.number, installment.due_date, installment.amount);
    }

    // pay the first cuota exactly
    let receipt = ledger.apply_payment(
        PaymentRequest::to_installment(plan.installments[0].id, Money::from_major(20), PaymentMethod::Zelle),
        &time,
    )?;
    println!("applied {} remaining debt {}", receipt.total_applied, ledger.client_debt(client_id)?);

    Ok(())
}
