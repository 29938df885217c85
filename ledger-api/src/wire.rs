use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use ledger_accounts::Account;
use ledger_accounts::AccountId;
use ledger_accounts::Balance;
use ledger_approvals::ApprovalId;
use ledger_approvals::ApprovalQueueFilter;
use ledger_approvals::ApprovalStatus;
use ledger_approvals::TransactionApproval;
use ledger_core::AccountKind;
use ledger_core::AccountPurpose;
use ledger_core::OwnerType;
use ledger_fees::FeeCalculation;
use ledger_journal::Journal;
use ledger_journal::JournalFilter;
use ledger_journal::JournalId;
use ledger_journal::Ledger;
use ledger_journal::TransactionFee;
use ledger_journal::WriteOutcome;
use ledger_orchestrator::TransactionResult;
use ledger_reporting::AccountStatement;
use ledger_reporting::DailyReport;
use ledger_reporting::OwnerStatement;
use ledger_reporting::OwnerSummary;
use ledger_reporting::SystemHoldings;
use ledger_reporting::TransactionSummaryLine;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;

/// Every request that mutates state carries a `Caller` identifying who is
/// asking, for dedup and audit attribution (, mirroring
/// `LedgerTenantContext` in the teacher's facade).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caller {
    pub external_id: String,
    pub owner_type: OwnerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ua: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountParams {
    pub owner_type: OwnerType,
    pub owner_id: String,
    pub currency: String,
    pub purpose: AccountPurpose,
    pub account_kind: AccountKind,
    #[serde(default)]
    pub overdraft_limit: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_agent_external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountResponse {
    pub account: Account,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountsParams {
    pub accounts: Vec<CreateAccountParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountsResponse {
    pub accounts: Vec<Account>,
}

/// `GetAccount{by id | by number}`: exactly one lookup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountLookup {
    Id(AccountId),
    Number(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccountParams {
    pub lookup: AccountLookup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccountResponse {
    pub account: Account,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccountsByOwnerParams {
    pub owner_type: OwnerType,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_kind: Option<AccountKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccountsByOwnerResponse {
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOrCreateUserAccountsParams {
    pub owner_type: OwnerType,
    pub owner_id: String,
    pub account_kind: AccountKind,
    pub currencies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOrCreateUserAccountsResponse {
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAccountParams {
    pub account_id: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overdraft_limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAccountResponse {
    pub account: Account,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBalanceParams {
    pub account_id: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBalanceResponse {
    pub balance: Balance,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGetBalancesParams {
    pub account_ids: Vec<AccountId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGetBalancesResponse {
    pub balances: Vec<Balance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditParams {
    pub caller: Caller,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub account_number: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebitParams {
    pub caller: Caller,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub account_number: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferParams {
    pub caller: Caller,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub from_account_number: String,
    pub to_account_number: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_external_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertAndTransferParams {
    pub caller: Caller,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub from_account_number: String,
    pub to_account_number: String,
    pub amount: i64,
    pub from_currency: String,
    pub to_currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcomeParams {
    pub caller: Caller,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub account_number: String,
    pub amount: i64,
    pub currency: String,
    pub trade_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCommissionParams {
    pub caller: Caller,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub agent_external_id: String,
    pub agent_account_number: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReverseParams {
    pub caller: Caller,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub original_journal_id: JournalId,
    pub reason: String,
}

/// Tags one of the typed convenience ops for the generic
/// `execute_transaction`/`execute_transaction_sync`/`batch_execute_transactions`
/// entry points ("ExecuteTransaction ... plus typed convenience
/// ops").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransactionRequest {
    Credit(CreditParams),
    Debit(DebitParams),
    Transfer(TransferParams),
    ConvertAndTransfer(ConvertAndTransferParams),
    ProcessTradeWin(TradeOutcomeParams),
    ProcessTradeLoss(TradeOutcomeParams),
    ProcessAgentCommission(AgentCommissionParams),
    Reverse(ReverseParams),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub result: TransactionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproveTransactionParams {
    pub approval_id: ApprovalId,
    pub approver_external_id: String,
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPendingApprovalsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalsResponse {
    pub approvals: Vec<TransactionApproval>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetApprovalHistoryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApprovalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
}

impl From<GetApprovalHistoryParams> for ApprovalQueueFilter {
    fn from(params: GetApprovalHistoryParams) -> Self {
        ApprovalQueueFilter {
            status: params.status,
            requested_by: params.requested_by,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetJournalParams {
    pub journal_id: JournalId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetJournalResponse {
    pub journal: Journal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListJournalsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_kind: Option<AccountKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

impl From<ListJournalsParams> for JournalFilter {
    fn from(params: ListJournalsParams) -> Self {
        JournalFilter {
            account_kind: params.account_kind,
            transaction_type: params.transaction_type,
            from: params.from,
            to: params.to,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListJournalsResponse {
    pub journals: Vec<Journal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListLedgersByJournalParams {
    pub journal_id: JournalId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListLedgersByAccountParams {
    pub account_id: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgersResponse {
    pub entries: Vec<Ledger>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTransactionByReceiptParams {
    pub receipt_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionDetailResponse {
    pub journal: Journal,
    pub entries: Vec<Ledger>,
    pub fees: Vec<TransactionFee>,
    pub receipt_code: String,
}

impl From<WriteOutcome> for TransactionDetailResponse {
    fn from(outcome: WriteOutcome) -> Self {
        Self {
            journal: outcome.journal,
            entries: outcome.ledgers,
            fees: outcome.fees,
            receipt_code: outcome.receipt_code,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAccountStatementParams {
    pub account_number: String,
    pub account_kind: AccountKind,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Resume after this ledger entry id (exclusive). `None` starts from the
    /// beginning of the window.
    #[serde(default)]
    pub cursor: Option<u64>,
    /// Caps the number of ledger entries returned in one call; the rest are
    /// available via `next_cursor`. `None` returns the whole window.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOwnerStatementParams {
    pub owner_type: OwnerType,
    pub owner_id: String,
    pub account_kind: AccountKind,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOwnerSummaryParams {
    pub owner_type: OwnerType,
    pub owner_id: String,
    pub account_kind: AccountKind,
    #[serde(default = "default_reporting_currency")]
    pub reporting_currency: String,
}

fn default_reporting_currency() -> String {
    "USD".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateDailyReportParams {
    pub date: NaiveDate,
    pub account_kind: AccountKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTransactionSummaryParams {
    pub account_kind: AccountKind,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTransactionSummaryResponse {
    pub lines: Vec<TransactionSummaryLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSystemHoldingsParams {
    pub account_kind: AccountKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountStatementResponse {
    pub statement: AccountStatement,
    /// Pass this back as `cursor` to fetch the next page of entries; `None`
    /// means the window was returned in full.
    pub next_cursor: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerStatementResponse {
    pub statement: OwnerStatement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSummaryResponse {
    pub summary: OwnerSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyReportResponse {
    pub report: DailyReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemHoldingsResponse {
    pub holdings: SystemHoldings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateFeeParams {
    pub transaction_type: String,
    pub amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_kind: Option<AccountKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_type: Option<OwnerType>,
    #[serde(default = "Utc::now")]
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculateFeeResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<FeeCalculation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAgentCommissionSummaryParams {
    pub agent_external_id: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAgentCommissionSummaryResponse {
    pub currency_totals: Vec<(String, i64)>,
    pub fee_count: u64,
}

/// `HealthCheck`: per-dependency status, aggregated by the
/// facade the same way `ControlsFacade` aggregates policy/approvals state
/// (this workspace has no network dependencies to probe, so each component
/// reports healthy iff a cheap read against it succeeds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub component: String,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    pub components: Vec<ComponentHealth>,
    pub checked_at: DateTime<Utc>,
}

impl HealthCheckResponse {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.components
            .iter()
            .all(|component| component.status == HealthStatus::Healthy)
    }
}
