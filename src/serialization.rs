/// serialization support for ledger reports
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::obligations::{InstallmentPlan, Obligation, Order};
use crate::state::ClientAccount;
use crate::status::days_until_due;
use crate::types::{
    ClientId, Frequency, InstallmentId, InstallmentStatus, OrderId, OrderStatus, PlanId,
};

/// serializable view of one installment on a given day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentView {
    pub id: InstallmentId,
    pub number: u32,
    pub due_date: NaiveDate,
    pub amount: Money,
    pub paid_amount: Money,
    pub remaining: Money,
    pub status: InstallmentStatus,
    pub days_until_due: i64,
    /// open and due within the configured horizon
    pub due_soon: bool,
}

/// progress of a financed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub plan_id: PlanId,
    pub order_id: OrderId,
    pub as_of: NaiveDate,
    pub frequency: Frequency,
    pub total_amount: Money,
    pub initial_payment: Money,
    pub total_installments: u32,
    pub paid_installments: u32,
    pub overdue_installments: u32,
    pub amount_paid: Money,
    pub amount_remaining: Money,
    /// installment money collected over installment money financed
    pub progress_percent: Decimal,
    pub next_due: Option<InstallmentView>,
    pub installments: Vec<InstallmentView>,
}

impl PlanSummary {
    pub fn from_plan(plan: &InstallmentPlan, today: NaiveDate, due_soon_days: u32) -> Self {
        let installments: Vec<InstallmentView> = plan
            .installments
            .iter()
            .map(|i| {
                let status = i.status(today);
                let days = days_until_due(i.due_date, today);
                InstallmentView {
                    id: i.id,
                    number: i.number,
                    due_date: i.due_date,
                    amount: i.amount,
                    paid_amount: i.paid_amount,
                    remaining: i.remaining(),
                    status,
                    days_until_due: days,
                    due_soon: !status.is_paid() && (0..=i64::from(due_soon_days)).contains(&days),
                }
            })
            .collect();

        let overdue = installments
            .iter()
            .filter(|i| i.status == InstallmentStatus::Overdue)
            .count();
        let next_due = installments.iter().find(|i| !i.status.is_paid()).cloned();
        let amount_paid = plan.total_paid();

        PlanSummary {
            plan_id: plan.id,
            order_id: plan.order_id,
            as_of: today,
            frequency: plan.frequency,
            total_amount: plan.total_amount,
            initial_payment: plan.initial_payment,
            total_installments: plan.number_of_installments,
            paid_installments: plan.paid_count() as u32,
            overdue_installments: overdue as u32,
            amount_paid,
            amount_remaining: plan.remaining(),
            progress_percent: amount_paid.percent_of(plan.financed_amount()),
            next_due,
            installments,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// debt position of one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientBalance {
    pub client_id: ClientId,
    pub name: String,
    pub open_orders: u32,
    pub total_sales: Money,
    pub total_paid: Money,
    pub balance: Money,
    pub credit: Money,
}

impl ClientBalance {
    pub fn from_account(account: &ClientAccount) -> Self {
        let live: Vec<&Order> = account.orders.values().filter(|o| !o.is_cancelled()).collect();

        ClientBalance {
            client_id: account.client.id,
            name: account.client.name.clone(),
            open_orders: account.open_orders().count() as u32,
            total_sales: live.iter().map(|o| o.total_amount).sum(),
            total_paid: live.iter().map(|o| o.amount_paid).sum(),
            balance: account.outstanding_debt(),
            credit: account.credit_balance,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// portfolio-wide collection figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub as_of: NaiveDate,
    pub client_count: u32,
    pub open_orders: u32,
    pub total_sales: Money,
    pub total_collected: Money,
    pub total_receivable: Money,
    pub total_credit: Money,
    pub total_installments: u32,
    pub paid_installments: u32,
    pub overdue_installments: u32,
    pub overdue_amount: Money,
    /// unpaid installments falling due within the due-soon horizon
    pub due_soon_installments: u32,
    pub due_soon_amount: Money,
    /// collected over sales, percent
    pub collection_rate: Decimal,
    /// paid installments over all installments, percent
    pub compliance_rate: Decimal,
}

impl LedgerStats {
    pub fn from_accounts(accounts: &[ClientAccount], today: NaiveDate, due_soon_days: u32) -> Self {
        let mut stats = LedgerStats {
            as_of: today,
            client_count: accounts.len() as u32,
            open_orders: 0,
            total_sales: Money::ZERO,
            total_collected: Money::ZERO,
            total_receivable: Money::ZERO,
            total_credit: Money::ZERO,
            total_installments: 0,
            paid_installments: 0,
            overdue_installments: 0,
            overdue_amount: Money::ZERO,
            due_soon_installments: 0,
            due_soon_amount: Money::ZERO,
            collection_rate: Decimal::ZERO,
            compliance_rate: Decimal::ZERO,
        };

        for account in accounts {
            let balance = ClientBalance::from_account(account);
            stats.open_orders += balance.open_orders;
            stats.total_sales += balance.total_sales;
            stats.total_collected += balance.total_paid;
            stats.total_receivable += balance.balance;
            stats.total_credit += balance.credit;

            for order in account.orders.values().filter(|o| !o.is_cancelled()) {
                let Some(plan) = account.plan_for(order.id) else {
                    continue;
                };
                for installment in &plan.installments {
                    stats.total_installments += 1;
                    match installment.status(today) {
                        InstallmentStatus::Paid => stats.paid_installments += 1,
                        InstallmentStatus::Overdue => {
                            stats.overdue_installments += 1;
                            stats.overdue_amount += installment.remaining();
                        }
                        _ => {
                            let days = days_until_due(installment.due_date, today);
                            if (0..=i64::from(due_soon_days)).contains(&days) {
                                stats.due_soon_installments += 1;
                                stats.due_soon_amount += installment.remaining();
                            }
                        }
                    }
                }
            }
        }

        stats.collection_rate = stats.total_collected.percent_of(stats.total_sales);
        stats.compliance_rate = Money::from(stats.paid_installments)
            .percent_of(Money::from(stats.total_installments));
        stats
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// serializable view of an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: OrderId,
    pub total_amount: Money,
    pub amount_paid: Money,
    pub balance: Money,
    pub status: OrderStatus,
    pub due_date: Option<NaiveDate>,
    pub financed: bool,
}

/// serializable view of a client account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub balance: ClientBalance,
    pub version: u64,
    pub payment_count: u32,
    pub orders: Vec<OrderView>,
}

impl AccountView {
    pub fn from_account(account: &ClientAccount) -> Self {
        AccountView {
            balance: ClientBalance::from_account(account),
            version: account.version,
            payment_count: account.payments.len() as u32,
            orders: account
                .orders
                .values()
                .map(|o| OrderView {
                    id: o.id,
                    total_amount: o.total_amount,
                    amount_paid: o.amount_paid,
                    balance: o.balance(),
                    status: o.status,
                    due_date: o.due_date,
                    financed: account.plan_for(o.id).is_some(),
                })
                .collect(),
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
