use std::collections::HashMap;

use ledger_accounts::AccountId;
use ledger_core::LedgerError;
use ledger_core::LedgerResult;

/// Per-currency system account wiring the Orchestrator needs to book the
/// "system side" of every operation (booking table). Supplied
/// at construction rather than discovered at runtime, since this workspace
/// has no admin-provisioning flow for system accounts (out of scope per
/// §1 non-goals).
#[derive(Debug, Clone, Default)]
pub struct SystemAccounts {
    pub clearing: HashMap<String, AccountId>,
    pub trade_pool: HashMap<String, AccountId>,
    pub commission_pool: HashMap<String, AccountId>,
    pub liquidity: HashMap<String, AccountId>,
    pub rounding: HashMap<String, AccountId>,
}

impl SystemAccounts {
    fn lookup(kind: &str, map: &HashMap<String, AccountId>, currency: &str) -> LedgerResult<AccountId> {
        map.get(currency).copied().ok_or_else(|| {
            LedgerError::FailedPrecondition(format!(
                "no {kind} account configured for currency {currency}"
            ))
        })
    }

    pub fn clearing(&self, currency: &str) -> LedgerResult<AccountId> {
        Self::lookup("clearing", &self.clearing, currency)
    }

    pub fn trade_pool(&self, currency: &str) -> LedgerResult<AccountId> {
        Self::lookup("trade pool", &self.trade_pool, currency)
    }

    pub fn commission_pool(&self, currency: &str) -> LedgerResult<AccountId> {
        Self::lookup("commission pool", &self.commission_pool, currency)
    }

    pub fn liquidity(&self, currency: &str) -> LedgerResult<AccountId> {
        Self::lookup("liquidity", &self.liquidity, currency)
    }

    pub fn rounding(&self, currency: &str) -> LedgerResult<AccountId> {
        Self::lookup("rounding", &self.rounding, currency)
    }
}
