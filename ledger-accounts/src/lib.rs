#![deny(clippy::print_stdout, clippy::print_stderr)]

mod memory;

pub use memory::InMemoryAccountService;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use ledger_core::AccountKind;
use ledger_core::AccountPurpose;
use ledger_core::DrCr;
use ledger_core::LedgerResult;
use ledger_core::OwnerType;
use serde::Deserialize;
use serde::Serialize;

pub type AccountId = u64;

/// Account. Created by the Orchestrator on first use for an
/// owner/currency/purpose triple, or by explicit admin create; never
/// destroyed, only deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub account_number: String,
    pub owner_type: OwnerType,
    pub owner_id: String,
    pub currency: String,
    pub purpose: AccountPurpose,
    pub account_kind: AccountKind,
    pub is_active: bool,
    pub is_locked: bool,
    pub overdraft_limit: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_agent_external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_rate: Option<rust_decimal::Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Ordinary user-initiated flows against a locked/inactive account fail;
    /// only `system`/`admin`-initiated reversal/adjustment flows may still
    /// target it.
    #[must_use]
    pub fn accepts_ordinary_posting(&self) -> bool {
        self.is_active && !self.is_locked
    }

    #[must_use]
    pub fn accepts_privileged_posting(&self, initiator: OwnerType) -> bool {
        self.accepts_ordinary_posting()
            || matches!(initiator, OwnerType::System | OwnerType::Admin)
    }
}

/// Balance. One row per account, 1:1 with its Account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub account_id: AccountId,
    pub balance: i64,
    pub available_balance: i64,
    pub pending_debit: i64,
    pub pending_credit: i64,
    pub last_ledger_id: Option<u64>,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Balance {
    #[must_use]
    pub fn zero(account_id: AccountId, at: DateTime<Utc>) -> Self {
        Self {
            account_id,
            balance: 0,
            available_balance: 0,
            pending_debit: 0,
            pending_credit: 0,
            last_ledger_id: None,
            version: 0,
            updated_at: at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateAccountRequest {
    pub owner_type: OwnerType,
    pub owner_id: String,
    pub currency: String,
    pub purpose: AccountPurpose,
    pub account_kind: AccountKind,
    pub overdraft_limit: i64,
    pub parent_agent_external_id: Option<String>,
    pub commission_rate: Option<rust_decimal::Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateAccountRequest {
    pub is_active: Option<bool>,
    pub is_locked: Option<bool>,
    pub overdraft_limit: Option<i64>,
}

/// Account Registry.
#[async_trait]
pub trait AccountRegistry: Send + Sync {
    async fn create(&self, request: CreateAccountRequest) -> LedgerResult<Account>;
    async fn get_by_id(&self, account_id: AccountId) -> LedgerResult<Account>;
    async fn get_by_number(&self, account_number: &str) -> LedgerResult<Account>;
    async fn list_by_owner(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
        account_kind: Option<AccountKind>,
    ) -> LedgerResult<Vec<Account>>;
    /// Every account for an `owner_type` regardless of `owner_id`, e.g. all
    /// `system` accounts across every system owner id. Used by reporting
    /// (`get_system_holdings`) rather than ordinary request
    /// paths, which always know the specific owner they're scoped to.
    async fn list_by_owner_type(
        &self,
        owner_type: OwnerType,
        account_kind: Option<AccountKind>,
    ) -> LedgerResult<Vec<Account>>;
    /// Atomically ensures a wallet account exists for each currency code in
    /// `currencies` for this owner.
    async fn get_or_create_user_accounts(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
        account_kind: AccountKind,
        currencies: &[String],
    ) -> LedgerResult<Vec<Account>>;
    async fn update(
        &self,
        account_id: AccountId,
        request: UpdateAccountRequest,
    ) -> LedgerResult<Account>;
    async fn get_balance(&self, account_id: AccountId) -> LedgerResult<Balance>;
}

/// Balance Store. `apply` is invoked once per ledger
/// entry, in the same in-memory transaction as the Journal/Ledger write.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    async fn apply(
        &self,
        account_id: AccountId,
        dr_cr: DrCr,
        amount: i64,
        expected_version: u64,
    ) -> LedgerResult<Balance>;
}
