use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use chrono::Utc;
use ledger_core::LedgerError;
use ledger_core::LedgerResult;
use tokio::sync::RwLock;

use crate::ApprovalId;
use crate::ApprovalQueueFilter;
use crate::ApprovalGate;
use crate::ApprovalStatus;
use crate::SubmitApprovalRequest;
use crate::TransactionApproval;

/// In-memory `ApprovalGate`. Uses its own counter rather than the shared
/// Snowflake `IdGenerator`: approval ids are a process-local queue
/// sequence, never referenced across the receipt/journal id space
///.
pub struct InMemoryApprovalGate {
    next_id: AtomicU64,
    approvals: RwLock<HashMap<ApprovalId, TransactionApproval>>,
}

impl Default for InMemoryApprovalGate {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            approvals: RwLock::new(HashMap::new()),
        }
    }
}

impl InMemoryApprovalGate {
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn check_four_eyes(approval: &TransactionApproval, approver_id: &str) -> LedgerResult<()> {
        if approval.requested_by == approver_id {
            return Err(LedgerError::FailedPrecondition(
                "an approver may not approve or reject their own request".into(),
            ));
        }
        Ok(())
    }

    fn check_not_terminal(approval: &TransactionApproval) -> LedgerResult<()> {
        if approval.status.is_terminal() {
            return Err(LedgerError::FailedPrecondition(format!(
                "approval {} is already terminal",
                approval.id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ApprovalGate for InMemoryApprovalGate {
    async fn submit(&self, request: SubmitApprovalRequest) -> LedgerResult<TransactionApproval> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();
        let approval = TransactionApproval {
            id,
            requested_by: request.requested_by,
            transaction_type: request.transaction_type,
            account_number: request.account_number,
            amount: request.amount,
            currency: request.currency,
            to_account_number: request.to_account_number,
            status: ApprovalStatus::Pending,
            approved_by: None,
            rejection_reason: None,
            receipt_code: None,
            error_message: None,
            request_metadata: request.request_metadata,
            created_at: now,
            updated_at: now,
            approved_at: None,
            executed_at: None,
        };
        self.approvals.write().await.insert(id, approval.clone());
        Ok(approval)
    }

    async fn get(&self, approval_id: ApprovalId) -> LedgerResult<TransactionApproval> {
        self.approvals
            .read()
            .await
            .get(&approval_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("approval {approval_id}")))
    }

    async fn approve(
        &self,
        approval_id: ApprovalId,
        approver_id: &str,
    ) -> LedgerResult<TransactionApproval> {
        let mut approvals = self.approvals.write().await;
        let approval = approvals
            .get_mut(&approval_id)
            .ok_or_else(|| LedgerError::NotFound(format!("approval {approval_id}")))?;
        Self::check_not_terminal(approval)?;
        Self::check_four_eyes(approval, approver_id)?;

        approval.status = ApprovalStatus::Approved;
        approval.approved_by = Some(approver_id.to_string());
        approval.approved_at = Some(Utc::now());
        approval.updated_at = Utc::now();
        Ok(approval.clone())
    }

    async fn reject(
        &self,
        approval_id: ApprovalId,
        approver_id: &str,
        reason: String,
    ) -> LedgerResult<TransactionApproval> {
        let mut approvals = self.approvals.write().await;
        let approval = approvals
            .get_mut(&approval_id)
            .ok_or_else(|| LedgerError::NotFound(format!("approval {approval_id}")))?;
        Self::check_not_terminal(approval)?;
        Self::check_four_eyes(approval, approver_id)?;

        approval.status = ApprovalStatus::Rejected;
        approval.approved_by = Some(approver_id.to_string());
        approval.rejection_reason = Some(reason);
        approval.updated_at = Utc::now();
        Ok(approval.clone())
    }

    async fn mark_executed(
        &self,
        approval_id: ApprovalId,
        receipt_code: String,
    ) -> LedgerResult<TransactionApproval> {
        let mut approvals = self.approvals.write().await;
        let approval = approvals
            .get_mut(&approval_id)
            .ok_or_else(|| LedgerError::NotFound(format!("approval {approval_id}")))?;
        if approval.status != ApprovalStatus::Approved {
            return Err(LedgerError::FailedPrecondition(format!(
                "approval {approval_id} must be approved before it can execute"
            )));
        }
        approval.status = ApprovalStatus::Executed;
        approval.receipt_code = Some(receipt_code);
        approval.executed_at = Some(Utc::now());
        approval.updated_at = Utc::now();
        Ok(approval.clone())
    }

    async fn mark_failed(
        &self,
        approval_id: ApprovalId,
        error_message: String,
    ) -> LedgerResult<TransactionApproval> {
        let mut approvals = self.approvals.write().await;
        let approval = approvals
            .get_mut(&approval_id)
            .ok_or_else(|| LedgerError::NotFound(format!("approval {approval_id}")))?;
        if approval.status != ApprovalStatus::Approved {
            return Err(LedgerError::FailedPrecondition(format!(
                "approval {approval_id} must be approved before it can fail execution"
            )));
        }
        approval.status = ApprovalStatus::Failed;
        approval.error_message = Some(error_message);
        approval.updated_at = Utc::now();
        Ok(approval.clone())
    }

    async fn list(&self, filter: ApprovalQueueFilter) -> LedgerResult<Vec<TransactionApproval>> {
        let approvals = self.approvals.read().await;
        let mut matched: Vec<TransactionApproval> = approvals
            .values()
            .filter(|approval| filter.status.is_none_or(|status| approval.status == status))
            .filter(|approval| {
                filter
                    .requested_by
                    .as_ref()
                    .is_none_or(|requested_by| &approval.requested_by == requested_by)
            })
            .cloned()
            .collect();
        matched.sort_by_key(|approval| approval.id);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn submit_request() -> SubmitApprovalRequest {
        SubmitApprovalRequest {
            requested_by: "user-1".into(),
            transaction_type: "withdrawal".into(),
            account_number: "R-USD-000000000001".into(),
            amount: 500_000,
            currency: "USD".into(),
            to_account_number: None,
            request_metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn four_eyes_rule_rejects_self_approval() {
        let gate = InMemoryApprovalGate::shared();
        let approval = gate.submit(submit_request()).await.expect("submit");

        let err = gate.approve(approval.id, "user-1").await.unwrap_err();
        assert!(matches!(err, LedgerError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn approve_then_execute_transitions_to_executed() {
        let gate = InMemoryApprovalGate::shared();
        let approval = gate.submit(submit_request()).await.expect("submit");

        let approved = gate
            .approve(approval.id, "approver-1")
            .await
            .expect("approve");
        assert_eq!(approved.status, ApprovalStatus::Approved);

        let executed = gate
            .mark_executed(approval.id, "RECEIPT123".into())
            .await
            .expect("execute");
        assert_eq!(executed.status, ApprovalStatus::Executed);
        assert_eq!(executed.receipt_code.as_deref(), Some("RECEIPT123"));
    }

    #[tokio::test]
    async fn terminal_approval_cannot_transition_again() {
        let gate = InMemoryApprovalGate::shared();
        let approval = gate.submit(submit_request()).await.expect("submit");
        gate.reject(approval.id, "approver-1", "risk flag".into())
            .await
            .expect("reject");

        let err = gate
            .approve(approval.id, "approver-2")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn list_filters_by_status_and_requester() {
        let gate = InMemoryApprovalGate::shared();
        let first = gate.submit(submit_request()).await.expect("submit");
        let mut second_request = submit_request();
        second_request.requested_by = "user-2".into();
        gate.submit(second_request).await.expect("submit");

        gate.approve(first.id, "approver-1").await.expect("approve");

        let pending = gate
            .list(ApprovalQueueFilter {
                status: Some(ApprovalStatus::Pending),
                requested_by: None,
            })
            .await
            .expect("list");
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].requested_by, "user-2");
    }
}
