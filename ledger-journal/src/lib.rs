#![deny(clippy::print_stdout, clippy::print_stderr)]

mod memory;

pub use memory::InMemoryJournalWriter;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use ledger_accounts::AccountId;
use ledger_core::AccountKind;
use ledger_core::DrCr;
use ledger_core::FeeType;
use ledger_core::LedgerResult;
use ledger_core::OwnerType;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;

pub type JournalId = u64;
pub type LedgerEntryId = u64;
pub type FeeId = u64;

/// Journal: the header for one balanced set of Ledger lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    pub id: JournalId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub transaction_type: String,
    pub account_kind: AccountKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_by_external_id: String,
    pub created_by_type: OwnerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger. Invariant: for every Journal and currency, Σ DR = Σ CR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub id: LedgerEntryId,
    pub journal_id: JournalId,
    pub account_id: AccountId,
    pub account_kind: AccountKind,
    pub amount: i64,
    pub dr_cr: DrCr,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<i64>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// TransactionFee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFee {
    pub id: FeeId,
    pub receipt_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee_rule_id: Option<u64>,
    pub fee_type: FeeType,
    pub amount: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_by_account_id: Option<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_id: Option<LedgerEntryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_rate: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct JournalHeader {
    pub idempotency_key: Option<String>,
    pub transaction_type: String,
    pub account_kind: AccountKind,
    pub external_ref: Option<String>,
    pub description: Option<String>,
    pub created_by_external_id: String,
    pub created_by_type: OwnerType,
    pub ip: Option<String>,
    pub ua: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EntryInput {
    pub account_id: AccountId,
    pub dr_cr: DrCr,
    pub amount: i64,
    pub currency: String,
    pub metadata: serde_json::Value,
}

impl EntryInput {
    #[must_use]
    pub fn new(account_id: AccountId, dr_cr: DrCr, amount: i64, currency: impl Into<String>) -> Self {
        Self {
            account_id,
            dr_cr,
            amount,
            currency: currency.into(),
            metadata: serde_json::Value::Null,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Points at `entries[ledger_entry_index]` so the writer can back-fill
/// `TransactionFee::ledger_id` from the posting it actually collected
///.
#[derive(Debug, Clone)]
pub struct FeeInput {
    pub fee_type: FeeType,
    pub fee_rule_id: Option<u64>,
    pub amount: i64,
    pub currency: String,
    pub collected_by_account_id: Option<AccountId>,
    pub ledger_entry_index: usize,
    pub agent_external_id: Option<String>,
    pub commission_rate: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub journal: Journal,
    pub ledgers: Vec<Ledger>,
    pub fees: Vec<TransactionFee>,
    pub receipt_code: String,
}

#[derive(Debug, Clone, Default)]
pub struct JournalFilter {
    pub account_kind: Option<AccountKind>,
    pub transaction_type: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Journal & Ledger Writer. `write` is one atomic unit:
/// validate everything, then mutate nothing until every precondition and
/// every balance `apply` is known to succeed.
///
/// # Schema Draft
/// `Journal(idempotency_key)` unique where not null; `Ledger(account_id,
/// created_at)`, `Ledger(journal_id)`, `Ledger(receipt_code)` indexed;
/// `Journal(created_at)`, `Journal(external_ref)` indexed.
#[async_trait]
pub trait JournalWriter: Send + Sync {
    async fn write(
        &self,
        header: JournalHeader,
        entries: Vec<EntryInput>,
        fees: Vec<FeeInput>,
    ) -> LedgerResult<WriteOutcome>;

    async fn get_journal(&self, journal_id: JournalId) -> LedgerResult<Journal>;
    async fn get_by_idempotency_key(&self, key: &str) -> LedgerResult<Option<WriteOutcome>>;
    async fn get_by_receipt(&self, receipt_code: &str) -> LedgerResult<WriteOutcome>;
    async fn list_journals(&self, filter: JournalFilter) -> LedgerResult<Vec<Journal>>;
    async fn list_ledgers_by_journal(&self, journal_id: JournalId) -> LedgerResult<Vec<Ledger>>;
    async fn list_ledgers_by_account(
        &self,
        account_id: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<Ledger>>;
}
