use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};
use crate::types::OverpaymentPolicy;

/// ledger configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub overpayment_policy: OverpaymentPolicy,
    pub plan_limits: PlanLimits,
    pub aging: AgingConfig,
    /// installments due within this many days are flagged in plan views
    pub due_soon_days: u32,
}

/// bounds on installment plans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub min_installments: u32,
    pub max_installments: u32,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            min_installments: 2,
            max_installments: 12,
        }
    }
}

impl PlanLimits {
    pub fn contains(&self, count: u32) -> bool {
        (self.min_installments..=self.max_installments).contains(&count)
    }
}

/// upper bound, in days, of each aging bucket; anything past `third` is 90+
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgingConfig {
    pub current_max_days: i64,
    pub second_max_days: i64,
    pub third_max_days: i64,
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self {
            current_max_days: 30,
            second_max_days: 60,
            third_max_days: 90,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl LedgerConfig {
    /// clamp overpayments and report the excess back to the caller
    pub fn standard() -> Self {
        Self {
            overpayment_policy: OverpaymentPolicy::ReportRemainder,
            plan_limits: PlanLimits::default(),
            aging: AgingConfig::default(),
            due_soon_days: 7,
        }
    }

    /// keep overpayments as client credit
    pub fn with_client_credit() -> Self {
        Self {
            overpayment_policy: OverpaymentPolicy::RecordCredit,
            ..Self::standard()
        }
    }

    /// refuse any payment larger than what is owed
    pub fn strict() -> Self {
        Self {
            overpayment_policy: OverpaymentPolicy::Reject,
            ..Self::standard()
        }
    }

    /// load configuration from json
    pub fn from_json(json: &str) -> Result<Self> {
        let config: LedgerConfig =
            serde_json::from_str(json).map_err(|e| LedgerError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<()> {
        let limits = &self.plan_limits;
        if limits.min_installments < 2 || limits.min_installments > limits.max_installments {
            return Err(LedgerError::InvalidConfiguration {
                message: format!(
                    "installment bounds must satisfy 2 <= min <= max, got {}..{}",
                    limits.min_installments, limits.max_installments
                ),
            });
        }

        let aging = &self.aging;
        if aging.current_max_days < 0
            || aging.current_max_days >= aging.second_max_days
            || aging.second_max_days >= aging.third_max_days
        {
            return Err(LedgerError::InvalidConfiguration {
                message: "aging bucket bounds must be non-negative and strictly increasing"
                    .to_string(),
            });
        }

        Ok(())
    }
}
