use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::AgingConfig;
use crate::decimal::Money;
use crate::types::{ClientId, ObligationId};

/// one outstanding balance to be aged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingEntry {
    pub obligation_id: ObligationId,
    pub client_id: ClientId,
    pub remaining_balance: Money,
    /// due date, or order date when the debt has no due date
    pub reference_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgingBucket {
    Current,
    Days31To60,
    Days61To90,
    Over90,
}

/// balance totals per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgingBuckets {
    pub current: Money,
    pub days30: Money,
    pub days60: Money,
    pub days90_plus: Money,
}

impl AgingBuckets {
    pub fn add(&mut self, bucket: AgingBucket, amount: Money) {
        match bucket {
            AgingBucket::Current => self.current += amount,
            AgingBucket::Days31To60 => self.days30 += amount,
            AgingBucket::Days61To90 => self.days60 += amount,
            AgingBucket::Over90 => self.days90_plus += amount,
        }
    }

    pub fn get(&self, bucket: AgingBucket) -> Money {
        match bucket {
            AgingBucket::Current => self.current,
            AgingBucket::Days31To60 => self.days30,
            AgingBucket::Days61To90 => self.days60,
            AgingBucket::Over90 => self.days90_plus,
        }
    }

    pub fn total(&self) -> Money {
        self.current + self.days30 + self.days60 + self.days90_plus
    }

    /// everything past the current bucket
    pub fn past_due(&self) -> Money {
        self.days30 + self.days60 + self.days90_plus
    }
}

/// aging report, globally and per client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingReport {
    pub as_of: NaiveDate,
    pub totals: AgingBuckets,
    pub by_client: BTreeMap<ClientId, AgingBuckets>,
    pub entry_count: usize,
}

impl AgingReport {
    pub fn client(&self, client_id: ClientId) -> AgingBuckets {
        self.by_client.get(&client_id).copied().unwrap_or_default()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// buckets outstanding balances by elapsed days; reads no clock
#[derive(Debug, Clone, Copy, Default)]
pub struct AgingClassifier {
    config: AgingConfig,
}

impl AgingClassifier {
    pub fn new(config: AgingConfig) -> Self {
        Self { config }
    }

    /// bucket for a number of elapsed days; debt not yet due is current
    pub fn bucket_for(&self, days_elapsed: i64) -> AgingBucket {
        if days_elapsed <= self.config.current_max_days {
            AgingBucket::Current
        } else if days_elapsed <= self.config.second_max_days {
            AgingBucket::Days31To60
        } else if days_elapsed <= self.config.third_max_days {
            AgingBucket::Days61To90
        } else {
            AgingBucket::Over90
        }
    }

    pub fn classify(&self, entries: &[AgingEntry], as_of: NaiveDate) -> AgingReport {
        let mut totals = AgingBuckets::default();
        let mut by_client: BTreeMap<ClientId, AgingBuckets> = BTreeMap::new();
        let mut entry_count = 0;

        for entry in entries.iter().filter(|e| e.remaining_balance.is_positive()) {
            let days_elapsed = as_of.signed_duration_since(entry.reference_date).num_days();
            let bucket = self.bucket_for(days_elapsed);

            totals.add(bucket, entry.remaining_balance);
            by_client
                .entry(entry.client_id)
                .or_default()
                .add(bucket, entry.remaining_balance);
            entry_count += 1;
        }

        AgingReport {
            as_of,
            totals,
            by_client,
            entry_count,
        }
    }
}
