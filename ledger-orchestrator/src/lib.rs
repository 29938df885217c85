#![deny(clippy::print_stdout, clippy::print_stderr)]

mod orchestrator;
mod system_accounts;

pub use orchestrator::TransactionOrchestrator;
pub use system_accounts::SystemAccounts;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use ledger_core::LedgerResult;
use ledger_journal::JournalId;
use serde::Deserialize;
use serde::Serialize;

/// Shared by every transaction request: who is asking, how to dedupe the
/// request, and the request metadata carried through to the Journal
/// (pipeline step 1/2).
#[derive(Debug, Clone)]
pub struct Envelope {
    pub idempotency_key: Option<String>,
    pub requested_by_external_id: String,
    pub requested_by_type: ledger_core::OwnerType,
    pub ip: Option<String>,
    pub ua: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Executed,
    PendingApproval,
}

/// The outcome of one pipeline operation: receipt, journal id, status,
/// amount, currency, fee, processing time, creation timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResult {
    pub receipt_code: Option<String>,
    pub journal_id: Option<JournalId>,
    pub approval_id: Option<ledger_approvals::ApprovalId>,
    pub status: TransactionStatus,
    pub amount: i64,
    pub currency: String,
    pub fee: i64,
    pub processing_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreditRequest {
    pub envelope: Envelope,
    pub account_number: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct DebitRequest {
    pub envelope: Envelope,
    pub account_number: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub envelope: Envelope,
    pub from_account_number: String,
    pub to_account_number: String,
    pub amount: i64,
    pub currency: String,
    pub agent_external_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConvertAndTransferRequest {
    pub envelope: Envelope,
    pub from_account_number: String,
    pub to_account_number: String,
    pub amount: i64,
    pub from_currency: String,
    pub to_currency: String,
}

#[derive(Debug, Clone)]
pub struct TradeOutcomeRequest {
    pub envelope: Envelope,
    pub account_number: String,
    pub amount: i64,
    pub currency: String,
    pub trade_id: String,
}

#[derive(Debug, Clone)]
pub struct AgentCommissionRequest {
    pub envelope: Envelope,
    pub agent_external_id: String,
    pub agent_account_number: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct ReverseRequest {
    pub envelope: Envelope,
    pub original_journal_id: JournalId,
    pub reason: String,
}

/// Transaction Orchestrator. `execute` persists the
/// journal (and, if it fell to the Approval Gate, the pending approval
/// row) before returning; it never waits out an approval. `execute_sync`
/// is the same operation plus driving the approval to a terminal state
/// before returning, used by callers who need a single synchronous result
/// (e.g. batch replay in tests).
#[async_trait]
pub trait TransactionPipeline: Send + Sync {
    async fn credit(&self, request: CreditRequest) -> LedgerResult<TransactionResult>;
    async fn debit(&self, request: DebitRequest) -> LedgerResult<TransactionResult>;
    async fn transfer(&self, request: TransferRequest) -> LedgerResult<TransactionResult>;
    async fn convert_and_transfer(
        &self,
        request: ConvertAndTransferRequest,
    ) -> LedgerResult<TransactionResult>;
    async fn process_trade_win(
        &self,
        request: TradeOutcomeRequest,
    ) -> LedgerResult<TransactionResult>;
    async fn process_trade_loss(
        &self,
        request: TradeOutcomeRequest,
    ) -> LedgerResult<TransactionResult>;
    async fn process_agent_commission(
        &self,
        request: AgentCommissionRequest,
    ) -> LedgerResult<TransactionResult>;
    async fn reverse(&self, request: ReverseRequest) -> LedgerResult<TransactionResult>;
    async fn approve_pending(
        &self,
        approval_id: ledger_approvals::ApprovalId,
        approver_external_id: &str,
    ) -> LedgerResult<TransactionResult>;
}
