#![deny(clippy::print_stdout, clippy::print_stderr)]

mod service;

pub use service::InMemoryReportingService;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use ledger_accounts::AccountId;
use ledger_core::AccountKind;
use ledger_core::LedgerResult;
use ledger_core::OwnerType;
use ledger_journal::Ledger;
use serde::Deserialize;
use serde::Serialize;

/// `get_account_statement`: opening/closing balance derived
/// from the nearest preceding ledger snapshot, never from the live
/// `Balance` row (that row is not a point-in-time source of truth).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStatement {
    pub account_number: String,
    pub currency: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub opening_balance: i64,
    pub closing_balance: i64,
    pub total_debits: i64,
    pub total_credits: i64,
    pub entries: Vec<Ledger>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerStatement {
    pub owner_type: OwnerType,
    pub owner_id: String,
    pub statements: Vec<AccountStatement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSummaryLine {
    pub account_number: String,
    pub currency: String,
    pub balance: i64,
    pub reporting_currency_value: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSummary {
    pub owner_type: OwnerType,
    pub owner_id: String,
    pub reporting_currency: String,
    pub lines: Vec<OwnerSummaryLine>,
    pub total_in_reporting_currency: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReportLine {
    pub owner_type: OwnerType,
    pub owner_id: String,
    pub account_id: AccountId,
    pub currency: String,
    pub total_debits: i64,
    pub total_credits: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub account_kind: AccountKind,
    pub lines: Vec<DailyReportLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSummaryLine {
    pub transaction_type: String,
    pub currency: String,
    pub count: u64,
    pub total: i64,
    pub min: i64,
    pub max: i64,
    pub average: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHoldingsLine {
    pub currency: String,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHoldings {
    pub account_kind: AccountKind,
    pub lines: Vec<SystemHoldingsLine>,
}

/// Statement & Reporting. Every operation reads through
/// indexed ledger/journal scans; none consult the `Balance` row for a
/// historical point, matching the spec's "source-of-truth for a
/// point-in-time is the ledger stream, not the Balance row".
#[async_trait]
pub trait ReportingService: Send + Sync {
    async fn get_account_statement(
        &self,
        account_number: &str,
        account_kind: AccountKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<AccountStatement>;

    async fn get_owner_statement(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
        account_kind: AccountKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<OwnerStatement>;

    async fn get_owner_summary(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
        account_kind: AccountKind,
        reporting_currency: &str,
    ) -> LedgerResult<OwnerSummary>;

    async fn generate_daily_report(
        &self,
        date: NaiveDate,
        account_kind: AccountKind,
    ) -> LedgerResult<DailyReport>;

    async fn get_transaction_summary(
        &self,
        account_kind: AccountKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<TransactionSummaryLine>>;

    async fn get_system_holdings(&self, account_kind: AccountKind) -> LedgerResult<SystemHoldings>;
}
