#![deny(clippy::print_stdout, clippy::print_stderr)]

mod memory;

pub use memory::InMemoryApprovalGate;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use ledger_core::LedgerResult;
use serde::Deserialize;
use serde::Serialize;

pub type ApprovalId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    Failed,
}

impl ApprovalStatus {
    /// `true` once no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ApprovalStatus::Rejected | ApprovalStatus::Executed | ApprovalStatus::Failed
        )
    }
}

/// TransactionApproval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionApproval {
    pub id: ApprovalId,
    pub requested_by: String,
    pub transaction_type: String,
    pub account_number: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_account_number: Option<String>,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub request_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct SubmitApprovalRequest {
    pub requested_by: String,
    pub transaction_type: String,
    pub account_number: String,
    pub amount: i64,
    pub currency: String,
    pub to_account_number: Option<String>,
    pub request_metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct ApprovalQueueFilter {
    pub status: Option<ApprovalStatus>,
    pub requested_by: Option<String>,
}

/// Approval Gate. `approve`/`reject` enforce the
/// four-eyes rule (`approver != requested_by`) and refuse to transition a
/// terminal approval. Executing the stored request against the rest of
/// the pipeline is the Orchestrator's job; this trait only owns the
/// state machine.
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn submit(&self, request: SubmitApprovalRequest) -> LedgerResult<TransactionApproval>;
    async fn get(&self, approval_id: ApprovalId) -> LedgerResult<TransactionApproval>;
    async fn approve(
        &self,
        approval_id: ApprovalId,
        approver_id: &str,
    ) -> LedgerResult<TransactionApproval>;
    async fn reject(
        &self,
        approval_id: ApprovalId,
        approver_id: &str,
        reason: String,
    ) -> LedgerResult<TransactionApproval>;
    async fn mark_executed(
        &self,
        approval_id: ApprovalId,
        receipt_code: String,
    ) -> LedgerResult<TransactionApproval>;
    async fn mark_failed(
        &self,
        approval_id: ApprovalId,
        error_message: String,
    ) -> LedgerResult<TransactionApproval>;
    async fn list(&self, filter: ApprovalQueueFilter) -> LedgerResult<Vec<TransactionApproval>>;
}
