use std::collections::HashMap;
use std::sync::RwLock;

use serde::Deserialize;
use serde::Serialize;

use crate::error::LedgerError;
use crate::error::LedgerResult;

/// A currency code (≤8 chars), decimals, min/max allowed amount
/// (minor units), active flag, demo sandbox support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub code: String,
    pub decimals: u8,
    pub min_amount: i64,
    pub max_amount: Option<i64>,
    pub is_active: bool,
    pub demo_enabled: bool,
    pub demo_initial_balance: i64,
}

impl Currency {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.code.is_empty() || self.code.len() > 8 {
            return Err(LedgerError::InvalidArgument(format!(
                "currency code must be 1-8 characters: {:?}",
                self.code
            )));
        }
        if self.min_amount < 0 {
            return Err(LedgerError::InvalidArgument(
                "currency min_amount must not be negative".into(),
            ));
        }
        if let Some(max) = self.max_amount
            && max < self.min_amount
        {
            return Err(LedgerError::InvalidArgument(
                "currency max_amount must not be below min_amount".into(),
            ));
        }
        Ok(())
    }

    pub fn check_amount(&self, amount: i64) -> LedgerResult<()> {
        if amount <= 0 {
            return Err(LedgerError::InvalidArgument(
                "amount must be positive".into(),
            ));
        }
        if amount < self.min_amount {
            return Err(LedgerError::FailedPrecondition(format!(
                "amount {amount} is below {} minimum {}",
                self.code, self.min_amount
            )));
        }
        if let Some(max) = self.max_amount
            && amount > max
        {
            return Err(LedgerError::FailedPrecondition(format!(
                "amount {amount} exceeds {} maximum {max}",
                self.code
            )));
        }
        Ok(())
    }
}

/// Construction-time-seeded registry of active currencies. Not async: this
/// is pure in-process lookup with no I/O, unlike the other service traits
/// in this workspace which all cross an (eventual) storage boundary.
pub trait CurrencyRegistry: Send + Sync {
    fn get(&self, code: &str) -> LedgerResult<Currency>;
    fn list_active(&self) -> Vec<Currency>;
    fn upsert(&self, currency: Currency) -> LedgerResult<()>;
}

#[derive(Default)]
pub struct InMemoryCurrencyRegistry {
    currencies: RwLock<HashMap<String, Currency>>,
}

impl InMemoryCurrencyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn seeded(currencies: Vec<Currency>) -> Self {
        let registry = Self::new();
        for currency in currencies {
            // Seeding is construction-time only; a bad seed is a programmer
            // error, so panicking here is acceptable (this is not a runtime
            // request path).
            registry.upsert(currency).expect("valid seed currency");
        }
        registry
    }
}

impl CurrencyRegistry for InMemoryCurrencyRegistry {
    fn get(&self, code: &str) -> LedgerResult<Currency> {
        self.currencies
            .read()
            .expect("currency registry lock poisoned")
            .get(code)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("currency {code}")))
    }

    fn list_active(&self) -> Vec<Currency> {
        self.currencies
            .read()
            .expect("currency registry lock poisoned")
            .values()
            .filter(|currency| currency.is_active)
            .cloned()
            .collect()
    }

    fn upsert(&self, currency: Currency) -> LedgerResult<()> {
        currency.validate()?;
        self.currencies
            .write()
            .expect("currency registry lock poisoned")
            .insert(currency.code.clone(), currency);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn usd() -> Currency {
        Currency {
            code: "USD".into(),
            decimals: 2,
            min_amount: 1,
            max_amount: Some(1_000_000_00),
            is_active: true,
            demo_enabled: true,
            demo_initial_balance: 10_000_00,
        }
    }

    #[test]
    fn rejects_overlong_currency_code() {
        let mut bad = usd();
        bad.code = "TOOLONGCODE".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn check_amount_enforces_bounds() {
        let currency = usd();
        assert!(currency.check_amount(0).is_err());
        assert!(currency.check_amount(1_000_001_00).is_err());
        assert!(currency.check_amount(500).is_ok());
    }

    #[test]
    fn registry_round_trips_seeded_currency() {
        let registry = InMemoryCurrencyRegistry::seeded(vec![usd()]);
        let found = registry.get("USD").expect("usd present");
        assert_eq!(found.decimals, 2);
        assert_eq!(registry.list_active().len(), 1);
        assert!(registry.get("EUR").is_err());
    }
}
