use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Percentage};
use crate::errors::{CreditError, Result};

/// longest settlement cycle a policy may configure
pub const MAX_SETTLEMENT_CYCLE_DAYS: u32 = 365;

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub credit_policy: CreditPolicy,
    pub default_policy: DefaultPolicy,
    pub utilization_alerts: UtilizationAlerts,
}

/// balance a lazily created profile starts with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialBalance {
    /// nothing spendable until credit is granted
    Zero,
    /// the whole cap is spendable immediately
    FullLimit,
}

/// defaults applied when a profile is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditPolicy {
    pub default_percentage: Percentage,
    pub default_max_amount: Money,
    pub initial_balance: InitialBalance,
    /// days between first credit use and the settlement deadline
    pub settlement_cycle_days: u32,
}

impl Default for CreditPolicy {
    fn default() -> Self {
        Self {
            default_percentage: Percentage::from_whole(70),
            default_max_amount: Money::from_major(100_000),
            initial_balance: InitialBalance::Zero,
            settlement_cycle_days: 30,
        }
    }
}

/// severity bands for overdue settlements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultPolicy {
    /// up to this many days a default is `overdue`
    pub overdue_max_days: u32,
    /// up to this many days a default is `past_due`, beyond it `severely_overdue`
    pub past_due_max_days: u32,
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self {
            overdue_max_days: 15,
            past_due_max_days: 30,
        }
    }
}

/// utilization thresholds that trigger warnings after credit use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilizationAlerts {
    pub low_credit_percentage: Percentage,
    pub over_limit_percentage: Percentage,
}

impl Default for UtilizationAlerts {
    fn default() -> Self {
        Self {
            low_credit_percentage: Percentage::from_whole(80),
            over_limit_percentage: Percentage::from_whole(90),
        }
    }
}

impl EngineConfig {
    /// parse a json config document and validate it
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| CreditError::validation(format!("invalid engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.credit_policy.default_max_amount.is_negative() {
            return Err(CreditError::validation("default_max_amount must be >= 0"));
        }

        let cycle = self.credit_policy.settlement_cycle_days;
        if cycle == 0 || cycle > MAX_SETTLEMENT_CYCLE_DAYS {
            return Err(CreditError::validation(format!(
                "settlement_cycle_days must be between 1 and {} (got {})",
                MAX_SETTLEMENT_CYCLE_DAYS, cycle
            )));
        }

        if self.default_policy.overdue_max_days == 0
            || self.default_policy.past_due_max_days <= self.default_policy.overdue_max_days
        {
            return Err(CreditError::validation(format!(
                "default bands must satisfy 0 < overdue_max_days ({}) < past_due_max_days ({})",
                self.default_policy.overdue_max_days, self.default_policy.past_due_max_days
            )));
        }

        if self.utilization_alerts.low_credit_percentage.as_decimal()
            > self.utilization_alerts.over_limit_percentage.as_decimal()
        {
            return Err(CreditError::validation(
                "low_credit_percentage must not exceed over_limit_percentage",
            ));
        }

        Ok(())
    }

    /// configuration where new profiles start fully funded
    pub fn prefunded() -> Self {
        Self {
            credit_policy: CreditPolicy {
                initial_balance: InitialBalance::FullLimit,
                ..CreditPolicy::default()
            },
            ..Self::default()
        }
    }

    /// tier used for farmers registered less than three months ago
    pub fn new_farmer_tier() -> Self {
        Self {
            credit_policy: CreditPolicy {
                default_percentage: Percentage::from_whole(30),
                default_max_amount: Money::from_major(50_000),
                ..CreditPolicy::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.credit_policy.default_percentage, Percentage::from_whole(70));
        assert_eq!(config.credit_policy.default_max_amount, Money::from_major(100_000));
        assert_eq!(config.credit_policy.initial_balance, InitialBalance::Zero);
        assert_eq!(config.default_policy.overdue_max_days, 15);
        assert_eq!(config.default_policy.past_due_max_days, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial_document() {
        let json = r#"{
            "credit_policy": { "default_percentage": "60", "initial_balance": "full_limit" },
            "default_policy": { "overdue_max_days": 10, "past_due_max_days": 20 }
        }"#;

        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.credit_policy.default_percentage, Percentage::from_whole(60));
        assert_eq!(config.credit_policy.initial_balance, InitialBalance::FullLimit);
        assert_eq!(config.credit_policy.default_max_amount, Money::from_major(100_000));
        assert_eq!(config.default_policy.past_due_max_days, 20);
    }

    #[test]
    fn test_from_json_rejects_bad_bands() {
        let json = r#"{ "default_policy": { "overdue_max_days": 30, "past_due_max_days": 15 } }"#;
        let err = EngineConfig::from_json(json).unwrap_err();
        assert!(matches!(err, CreditError::Validation { .. }));
    }

    #[test]
    fn test_validate_bounds_settlement_cycle() {
        let mut config = EngineConfig::default();
        config.credit_policy.settlement_cycle_days = u32::MAX;
        assert!(matches!(config.validate(), Err(CreditError::Validation { .. })));

        config.credit_policy.settlement_cycle_days = MAX_SETTLEMENT_CYCLE_DAYS;
        assert!(config.validate().is_ok());

        let json = r#"{ "credit_policy": { "settlement_cycle_days": 400 } }"#;
        assert!(EngineConfig::from_json(json).is_err());
    }

    #[test]
    fn test_from_json_rejects_bad_percentage() {
        let json = r#"{ "credit_policy": { "default_percentage": "120" } }"#;
        assert!(EngineConfig::from_json(json).is_err());
    }

    #[test]
    fn test_presets() {
        assert_eq!(
            EngineConfig::prefunded().credit_policy.initial_balance,
            InitialBalance::FullLimit
        );
        assert_eq!(
            EngineConfig::new_farmer_tier().credit_policy.default_max_amount,
            Money::from_major(50_000)
        );
    }
}
