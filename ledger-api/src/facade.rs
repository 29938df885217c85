use std::sync::Arc;

use chrono::Utc;
use ledger_accounts::AccountRegistry;
use ledger_accounts::CreateAccountRequest;
use ledger_accounts::UpdateAccountRequest;
use ledger_approvals::ApprovalGate;
use ledger_approvals::SubmitApprovalRequest;
use ledger_core::LedgerError;
use ledger_core::LedgerResult;
use ledger_fees::FeeQuery;
use ledger_fees::FeeRuleRegistry;
use ledger_journal::JournalWriter;
use ledger_orchestrator::AgentCommissionRequest;
use ledger_orchestrator::ConvertAndTransferRequest;
use ledger_orchestrator::CreditRequest;
use ledger_orchestrator::DebitRequest;
use ledger_orchestrator::Envelope;
use ledger_orchestrator::ReverseRequest;
use ledger_orchestrator::TradeOutcomeRequest;
use ledger_orchestrator::TransactionPipeline;
use ledger_orchestrator::TransactionStatus;
use ledger_orchestrator::TransferRequest;
use ledger_reporting::ReportingService;

use crate::telemetry::ApiTelemetry;
use crate::wire::AccountLookup;
use crate::wire::AccountStatementResponse;
use crate::wire::ApprovalsResponse;
use crate::wire::ApproveTransactionParams;
use crate::wire::BatchGetBalancesParams;
use crate::wire::BatchGetBalancesResponse;
use crate::wire::CalculateFeeParams;
use crate::wire::CalculateFeeResponse;
use crate::wire::Caller;
use crate::wire::ComponentHealth;
use crate::wire::CreateAccountParams;
use crate::wire::CreateAccountResponse;
use crate::wire::CreateAccountsParams;
use crate::wire::CreateAccountsResponse;
use crate::wire::DailyReportResponse;
use crate::wire::GenerateDailyReportParams;
use crate::wire::GetAccountParams;
use crate::wire::GetAccountResponse;
use crate::wire::GetAccountStatementParams;
use crate::wire::GetAccountsByOwnerParams;
use crate::wire::GetAccountsByOwnerResponse;
use crate::wire::GetAgentCommissionSummaryParams;
use crate::wire::GetAgentCommissionSummaryResponse;
use crate::wire::GetApprovalHistoryParams;
use crate::wire::GetBalanceParams;
use crate::wire::GetBalanceResponse;
use crate::wire::GetJournalParams;
use crate::wire::GetJournalResponse;
use crate::wire::GetOrCreateUserAccountsParams;
use crate::wire::GetOrCreateUserAccountsResponse;
use crate::wire::GetOwnerStatementParams;
use crate::wire::GetOwnerSummaryParams;
use crate::wire::GetPendingApprovalsParams;
use crate::wire::GetSystemHoldingsParams;
use crate::wire::GetTransactionByReceiptParams;
use crate::wire::GetTransactionSummaryParams;
use crate::wire::GetTransactionSummaryResponse;
use crate::wire::HealthCheckResponse;
use crate::wire::HealthStatus;
use crate::wire::LedgersResponse;
use crate::wire::ListJournalsParams;
use crate::wire::ListJournalsResponse;
use crate::wire::ListLedgersByAccountParams;
use crate::wire::ListLedgersByJournalParams;
use crate::wire::OwnerStatementResponse;
use crate::wire::OwnerSummaryResponse;
use crate::wire::SystemHoldingsResponse;
use crate::wire::TransactionDetailResponse;
use crate::wire::TransactionRequest;
use crate::wire::TransactionResponse;
use crate::wire::UpdateAccountParams;
use crate::wire::UpdateAccountResponse;
use ledger_approvals::ApprovalQueueFilter;

fn envelope(caller: Caller, idempotency_key: Option<String>) -> Envelope {
    Envelope {
        idempotency_key,
        requested_by_external_id: caller.external_id,
        requested_by_type: caller.owner_type,
        ip: caller.ip,
        ua: caller.ua,
    }
}

/// The query/command surface: wraps `Arc<dyn ...>` handles to every other
/// component, converts wire Params into internal Request types and
/// internal results into wire Responses, and records telemetry on success.
#[derive(Clone)]
pub struct LedgerApiFacade {
    accounts: Arc<dyn AccountRegistry>,
    journals: Arc<dyn JournalWriter>,
    fee_rules: Arc<dyn FeeRuleRegistry>,
    approvals: Arc<dyn ApprovalGate>,
    pipeline: Arc<dyn TransactionPipeline>,
    reporting: Arc<dyn ReportingService>,
    telemetry: Option<Arc<ApiTelemetry>>,
}

impl LedgerApiFacade {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountRegistry>,
        journals: Arc<dyn JournalWriter>,
        fee_rules: Arc<dyn FeeRuleRegistry>,
        approvals: Arc<dyn ApprovalGate>,
        pipeline: Arc<dyn TransactionPipeline>,
        reporting: Arc<dyn ReportingService>,
    ) -> Self {
        Self::with_telemetry(accounts, journals, fee_rules, approvals, pipeline, reporting, None)
    }

    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn with_telemetry(
        accounts: Arc<dyn AccountRegistry>,
        journals: Arc<dyn JournalWriter>,
        fee_rules: Arc<dyn FeeRuleRegistry>,
        approvals: Arc<dyn ApprovalGate>,
        pipeline: Arc<dyn TransactionPipeline>,
        reporting: Arc<dyn ReportingService>,
        telemetry: Option<Arc<ApiTelemetry>>,
    ) -> Self {
        Self {
            accounts,
            journals,
            fee_rules,
            approvals,
            pipeline,
            reporting,
            telemetry,
        }
    }

    // ---- Accounts ----

    pub async fn create_account(&self, params: CreateAccountParams) -> LedgerResult<CreateAccountResponse> {
        let account = self
            .accounts
            .create(CreateAccountRequest {
                owner_type: params.owner_type,
                owner_id: params.owner_id,
                currency: params.currency,
                purpose: params.purpose,
                account_kind: params.account_kind,
                overdraft_limit: params.overdraft_limit,
                parent_agent_external_id: params.parent_agent_external_id,
                commission_rate: params.commission_rate,
            })
            .await?;
        if let Some(telemetry) = &self.telemetry {
            telemetry.record_account_created();
        }
        Ok(CreateAccountResponse { account })
    }

    pub async fn create_accounts(&self, params: CreateAccountsParams) -> LedgerResult<CreateAccountsResponse> {
        let mut accounts = Vec::with_capacity(params.accounts.len());
        for one in params.accounts {
            accounts.push(self.create_account(one).await?.account);
        }
        Ok(CreateAccountsResponse { accounts })
    }

    pub async fn get_account(&self, params: GetAccountParams) -> LedgerResult<GetAccountResponse> {
        let account = match params.lookup {
            AccountLookup::Id(id) => self.accounts.get_by_id(id).await?,
            AccountLookup::Number(number) => self.accounts.get_by_number(&number).await?,
        };
        Ok(GetAccountResponse { account })
    }

    pub async fn get_accounts_by_owner(
        &self,
        params: GetAccountsByOwnerParams,
    ) -> LedgerResult<GetAccountsByOwnerResponse> {
        let accounts = self
            .accounts
            .list_by_owner(params.owner_type, &params.owner_id, params.account_kind)
            .await?;
        Ok(GetAccountsByOwnerResponse { accounts })
    }

    pub async fn get_or_create_user_accounts(
        &self,
        params: GetOrCreateUserAccountsParams,
    ) -> LedgerResult<GetOrCreateUserAccountsResponse> {
        let accounts = self
            .accounts
            .get_or_create_user_accounts(
                params.owner_type,
                &params.owner_id,
                params.account_kind,
                &params.currencies,
            )
            .await?;
        Ok(GetOrCreateUserAccountsResponse { accounts })
    }

    pub async fn update_account(&self, params: UpdateAccountParams) -> LedgerResult<UpdateAccountResponse> {
        let account = self
            .accounts
            .update(
                params.account_id,
                UpdateAccountRequest {
                    is_active: params.is_active,
                    is_locked: params.is_locked,
                    overdraft_limit: params.overdraft_limit,
                },
            )
            .await?;
        Ok(UpdateAccountResponse { account })
    }

    pub async fn get_balance(&self, params: GetBalanceParams) -> LedgerResult<GetBalanceResponse> {
        let balance = self.accounts.get_balance(params.account_id).await?;
        Ok(GetBalanceResponse { balance })
    }

    pub async fn batch_get_balances(
        &self,
        params: BatchGetBalancesParams,
    ) -> LedgerResult<BatchGetBalancesResponse> {
        let mut balances = Vec::with_capacity(params.account_ids.len());
        for account_id in params.account_ids {
            balances.push(self.accounts.get_balance(account_id).await?);
        }
        Ok(BatchGetBalancesResponse { balances })
    }

    // ---- Transactions ----

    pub async fn execute_transaction(&self, request: TransactionRequest) -> LedgerResult<TransactionResponse> {
        let result = match request {
            TransactionRequest::Credit(params) => {
                self.pipeline
                    .credit(CreditRequest {
                        envelope: envelope(params.caller, params.idempotency_key),
                        account_number: params.account_number,
                        amount: params.amount,
                        currency: params.currency,
                    })
                    .await?
            }
            TransactionRequest::Debit(params) => {
                self.pipeline
                    .debit(DebitRequest {
                        envelope: envelope(params.caller, params.idempotency_key),
                        account_number: params.account_number,
                        amount: params.amount,
                        currency: params.currency,
                    })
                    .await?
            }
            TransactionRequest::Transfer(params) => {
                self.pipeline
                    .transfer(TransferRequest {
                        envelope: envelope(params.caller, params.idempotency_key),
                        from_account_number: params.from_account_number,
                        to_account_number: params.to_account_number,
                        amount: params.amount,
                        currency: params.currency,
                        agent_external_id: params.agent_external_id,
                    })
                    .await?
            }
            TransactionRequest::ConvertAndTransfer(params) => {
                self.pipeline
                    .convert_and_transfer(ConvertAndTransferRequest {
                        envelope: envelope(params.caller, params.idempotency_key),
                        from_account_number: params.from_account_number,
                        to_account_number: params.to_account_number,
                        amount: params.amount,
                        from_currency: params.from_currency,
                        to_currency: params.to_currency,
                    })
                    .await?
            }
            TransactionRequest::ProcessTradeWin(params) => {
                self.pipeline
                    .process_trade_win(TradeOutcomeRequest {
                        envelope: envelope(params.caller, params.idempotency_key),
                        account_number: params.account_number,
                        amount: params.amount,
                        currency: params.currency,
                        trade_id: params.trade_id,
                    })
                    .await?
            }
            TransactionRequest::ProcessTradeLoss(params) => {
                self.pipeline
                    .process_trade_loss(TradeOutcomeRequest {
                        envelope: envelope(params.caller, params.idempotency_key),
                        account_number: params.account_number,
                        amount: params.amount,
                        currency: params.currency,
                        trade_id: params.trade_id,
                    })
                    .await?
            }
            TransactionRequest::ProcessAgentCommission(params) => {
                self.pipeline
                    .process_agent_commission(AgentCommissionRequest {
                        envelope: envelope(params.caller, params.idempotency_key),
                        agent_external_id: params.agent_external_id,
                        agent_account_number: params.agent_account_number,
                        amount: params.amount,
                        currency: params.currency,
                    })
                    .await?
            }
            TransactionRequest::Reverse(params) => {
                self.pipeline
                    .reverse(ReverseRequest {
                        envelope: envelope(params.caller, params.idempotency_key),
                        original_journal_id: params.original_journal_id,
                        reason: params.reason,
                    })
                    .await?
            }
        };
        if let Some(telemetry) = &self.telemetry {
            telemetry.record_transaction(result.status);
        }
        Ok(TransactionResponse { result })
    }

    /// Drives a `pending_approval` result to a terminal state before
    /// returning, for callers who need one synchronous round trip
    ///. `approver_external_id` is required when the
    /// transaction actually lands pending; it is ignored otherwise.
    pub async fn execute_transaction_sync(
        &self,
        request: TransactionRequest,
        approver_external_id: Option<&str>,
    ) -> LedgerResult<TransactionResponse> {
        let response = self.execute_transaction(request).await?;
        if response.result.status != TransactionStatus::PendingApproval {
            return Ok(response);
        }
        let approver = approver_external_id.ok_or_else(|| {
            LedgerError::FailedPrecondition(
                "transaction fell to approval; approver_external_id is required for a synchronous result"
                    .into(),
            )
        })?;
        let approval_id = response.result.approval_id.ok_or_else(|| {
            LedgerError::Internal("pending_approval result missing approval_id".into())
        })?;
        let result = self.pipeline.approve_pending(approval_id, approver).await?;
        if let Some(telemetry) = &self.telemetry {
            telemetry.record_transaction(result.status);
        }
        Ok(TransactionResponse { result })
    }

    pub async fn batch_execute_transactions(
        &self,
        requests: Vec<TransactionRequest>,
    ) -> Vec<LedgerResult<TransactionResponse>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.execute_transaction(request).await);
        }
        results
    }

    pub async fn get_transaction_status(&self, params: GetJournalParams) -> LedgerResult<TransactionDetailResponse> {
        let journal = self.journals.get_journal(params.journal_id).await?;
        let entries = self.journals.list_ledgers_by_journal(journal.id).await?;
        let receipt_code = entries
            .first()
            .and_then(|entry| entry.receipt_code.clone())
            .unwrap_or_default();
        Ok(TransactionDetailResponse {
            journal,
            entries,
            fees: Vec::new(),
            receipt_code,
        })
    }

    pub async fn get_transaction_by_receipt(
        &self,
        params: GetTransactionByReceiptParams,
    ) -> LedgerResult<TransactionDetailResponse> {
        let outcome = self.journals.get_by_receipt(&params.receipt_code).await?;
        Ok(outcome.into())
    }

    // ---- Journal / Ledger ----

    pub async fn get_journal(&self, params: GetJournalParams) -> LedgerResult<GetJournalResponse> {
        let journal = self.journals.get_journal(params.journal_id).await?;
        Ok(GetJournalResponse { journal })
    }

    pub async fn list_journals(&self, params: ListJournalsParams) -> LedgerResult<ListJournalsResponse> {
        let journals = self.journals.list_journals(params.into()).await?;
        Ok(ListJournalsResponse { journals })
    }

    pub async fn list_ledgers_by_journal(
        &self,
        params: ListLedgersByJournalParams,
    ) -> LedgerResult<LedgersResponse> {
        let entries = self.journals.list_ledgers_by_journal(params.journal_id).await?;
        Ok(LedgersResponse { entries })
    }

    pub async fn list_ledgers_by_account(
        &self,
        params: ListLedgersByAccountParams,
    ) -> LedgerResult<LedgersResponse> {
        let entries = self
            .journals
            .list_ledgers_by_account(params.account_id, params.from, params.to)
            .await?;
        Ok(LedgersResponse { entries })
    }

    // ---- Statements ----

    pub async fn get_account_statement(
        &self,
        params: GetAccountStatementParams,
    ) -> LedgerResult<AccountStatementResponse> {
        let mut statement = self
            .reporting
            .get_account_statement(&params.account_number, params.account_kind, params.from, params.to)
            .await?;

        if let Some(cursor) = params.cursor
            && let Some(pos) = statement.entries.iter().position(|entry| entry.id == cursor)
        {
            statement.entries.drain(0..=pos);
        }
        let next_cursor = match params.limit {
            Some(limit) if statement.entries.len() > limit => {
                statement.entries.truncate(limit);
                statement.entries.last().map(|entry| entry.id)
            }
            _ => None,
        };
        Ok(AccountStatementResponse { statement, next_cursor })
    }

    pub async fn get_owner_statement(&self, params: GetOwnerStatementParams) -> LedgerResult<OwnerStatementResponse> {
        let statement = self
            .reporting
            .get_owner_statement(
                params.owner_type,
                &params.owner_id,
                params.account_kind,
                params.from,
                params.to,
            )
            .await?;
        Ok(OwnerStatementResponse { statement })
    }

    pub async fn get_owner_summary(&self, params: GetOwnerSummaryParams) -> LedgerResult<OwnerSummaryResponse> {
        let summary = self
            .reporting
            .get_owner_summary(
                params.owner_type,
                &params.owner_id,
                params.account_kind,
                &params.reporting_currency,
            )
            .await?;
        Ok(OwnerSummaryResponse { summary })
    }

    pub async fn generate_daily_report(&self, params: GenerateDailyReportParams) -> LedgerResult<DailyReportResponse> {
        let report = self
            .reporting
            .generate_daily_report(params.date, params.account_kind)
            .await?;
        Ok(DailyReportResponse { report })
    }

    pub async fn get_transaction_summary(
        &self,
        params: GetTransactionSummaryParams,
    ) -> LedgerResult<GetTransactionSummaryResponse> {
        let lines = self
            .reporting
            .get_transaction_summary(params.account_kind, params.from, params.to)
            .await?;
        Ok(GetTransactionSummaryResponse { lines })
    }

    pub async fn get_system_holdings(&self, params: GetSystemHoldingsParams) -> LedgerResult<SystemHoldingsResponse> {
        let holdings = self.reporting.get_system_holdings(params.account_kind).await?;
        Ok(SystemHoldingsResponse { holdings })
    }

    // ---- Fees ----

    pub async fn calculate_fee(&self, params: CalculateFeeParams) -> LedgerResult<CalculateFeeResponse> {
        let rules = self.fee_rules.list_active(&params.transaction_type).await?;
        let query = FeeQuery {
            transaction_type: params.transaction_type,
            amount: params.amount,
            source_currency: params.source_currency,
            target_currency: params.target_currency,
            account_kind: params.account_kind,
            owner_type: params.owner_type,
            as_of: params.as_of,
        };
        let fee = ledger_fees::calculate(&rules, &query);
        Ok(CalculateFeeResponse { fee })
    }

    pub async fn get_fees_by_receipt(&self, params: GetTransactionByReceiptParams) -> LedgerResult<Vec<ledger_journal::TransactionFee>> {
        let outcome = self.journals.get_by_receipt(&params.receipt_code).await?;
        Ok(outcome.fees)
    }

    /// Sums agent-commission fees for `agent_external_id` by scanning
    /// `agent_commission` journals in `[from, to)` (
    /// `GetAgentCommissionSummary`); there is no dedicated commission index
    /// in this workspace, so this walks the same journal/fee path
    /// `GetFeesByReceipt` uses, one receipt at a time.
    pub async fn get_agent_commission_summary(
        &self,
        params: GetAgentCommissionSummaryParams,
    ) -> LedgerResult<GetAgentCommissionSummaryResponse> {
        let journals = self
            .journals
            .list_journals(ledger_journal::JournalFilter {
                account_kind: None,
                transaction_type: Some("agent_commission".into()),
                from: Some(params.from),
                to: Some(params.to),
            })
            .await?;

        let mut totals: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
        let mut fee_count = 0u64;
        for journal in journals {
            let entries = self.journals.list_ledgers_by_journal(journal.id).await?;
            let Some(receipt_code) = entries.first().and_then(|entry| entry.receipt_code.clone()) else {
                continue;
            };
            let outcome = self.journals.get_by_receipt(&receipt_code).await?;
            for fee in outcome.fees {
                if fee.agent_external_id.as_deref() != Some(params.agent_external_id.as_str()) {
                    continue;
                }
                *totals.entry(fee.currency.clone()).or_insert(0) += fee.amount;
                fee_count += 1;
            }
        }

        let mut currency_totals: Vec<(String, i64)> = totals.into_iter().collect();
        currency_totals.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(GetAgentCommissionSummaryResponse {
            currency_totals,
            fee_count,
        })
    }

    // ---- Approvals ----

    pub async fn create_transaction_approval(
        &self,
        request: SubmitApprovalRequest,
    ) -> LedgerResult<ledger_approvals::TransactionApproval> {
        self.approvals.submit(request).await
    }

    pub async fn get_pending_approvals(&self, params: GetPendingApprovalsParams) -> LedgerResult<ApprovalsResponse> {
        let approvals = self
            .approvals
            .list(ApprovalQueueFilter {
                status: Some(ledger_approvals::ApprovalStatus::Pending),
                requested_by: params.requested_by,
            })
            .await?;
        Ok(ApprovalsResponse { approvals })
    }

    pub async fn approve_transaction(
        &self,
        params: ApproveTransactionParams,
    ) -> LedgerResult<ledger_approvals::TransactionApproval> {
        if params.approved {
            self.approvals
                .approve(params.approval_id, &params.approver_external_id)
                .await
        } else {
            let reason = params
                .reason
                .ok_or_else(|| LedgerError::InvalidArgument("reason is required to reject".into()))?;
            self.approvals
                .reject(params.approval_id, &params.approver_external_id, reason)
                .await
        }
    }

    pub async fn get_approval_history(&self, params: GetApprovalHistoryParams) -> LedgerResult<ApprovalsResponse> {
        let approvals = self.approvals.list(params.into()).await?;
        Ok(ApprovalsResponse { approvals })
    }

    // ---- Health ----

    /// Cheap per-dependency liveness probe (`HealthCheck`), each
    /// a read already guaranteed not to mutate state.
    pub async fn health_check(&self) -> HealthCheckResponse {
        let mut components = Vec::with_capacity(4);
        components.push(ComponentHealth {
            component: "fee_rules".into(),
            status: status_of(self.fee_rules.list_active("health_check").await),
        });
        components.push(ComponentHealth {
            component: "approvals".into(),
            status: status_of(
                self.approvals
                    .list(ApprovalQueueFilter::default())
                    .await,
            ),
        });
        components.push(ComponentHealth {
            component: "journals".into(),
            status: status_of(self.journals.list_journals(Default::default()).await),
        });
        HealthCheckResponse {
            components,
            checked_at: Utc::now(),
        }
    }
}

fn status_of<T>(result: LedgerResult<T>) -> HealthStatus {
    match result {
        Ok(_) => HealthStatus::Healthy,
        Err(_) => HealthStatus::Down,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_accounts::InMemoryAccountService;
    use ledger_approvals::InMemoryApprovalGate;
    use ledger_audit::InMemoryAuditTrail;
    use ledger_core::AccountKind;
    use ledger_core::AccountPurpose;
    use ledger_core::Currency;
    use ledger_core::IdGenerator;
    use ledger_core::InMemoryCurrencyRegistry;
    use ledger_core::OwnerType;
    use ledger_fees::CalculationMethod;
    use ledger_fees::FeeRule;
    use ledger_fees::InMemoryFeeRuleRegistry;
    use ledger_fx::InMemoryFxRateRegistry;
    use ledger_journal::InMemoryJournalWriter;
    use ledger_orchestrator::TransactionOrchestrator;
    use ledger_reporting::InMemoryReportingService;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    fn usd() -> Currency {
        Currency {
            code: "USD".into(),
            decimals: 2,
            min_amount: 1,
            max_amount: Some(10_000_000_00),
            is_active: true,
            demo_enabled: true,
            demo_initial_balance: 0,
        }
    }

    fn caller(external_id: &str) -> Caller {
        Caller {
            external_id: external_id.into(),
            owner_type: OwnerType::User,
            ip: None,
            ua: None,
        }
    }

    async fn harness() -> (LedgerApiFacade, ledger_accounts::Account, ledger_accounts::Account) {
        let ids = Arc::new(IdGenerator::new(1));
        let accounts_impl = Arc::new(InMemoryAccountService::new(ids.clone()));
        let accounts: Arc<dyn AccountRegistry> = accounts_impl.clone();
        let balances: Arc<dyn ledger_accounts::BalanceStore> = accounts_impl.clone();
        let audit = InMemoryAuditTrail::shared();
        let journals: Arc<dyn JournalWriter> = Arc::new(InMemoryJournalWriter::new(
            ids.clone(),
            accounts.clone(),
            balances,
            audit.clone(),
        ));
        let fee_rules: Arc<dyn FeeRuleRegistry> = Arc::new(InMemoryFeeRuleRegistry::new());
        fee_rules
            .upsert(FeeRule {
                id: 1,
                rule_name: "transfer-fixed".into(),
                transaction_type: "transfer".into(),
                source_currency: None,
                target_currency: None,
                account_kind: None,
                owner_type: None,
                fee_type: ledger_core::FeeType::Platform,
                calculation_method: CalculationMethod::Fixed,
                fee_value: Decimal::new(50, 0),
                min_fee: None,
                max_fee: None,
                tiers: Vec::new(),
                valid_from: chrono::DateTime::UNIX_EPOCH,
                valid_to: None,
                is_active: true,
                priority: 1,
            })
            .await
            .expect("seed fee rule");
        let fx: Arc<dyn ledger_fx::FxResolver> = Arc::new(InMemoryFxRateRegistry::new(ids.clone()));
        let approvals: Arc<dyn ApprovalGate> = InMemoryApprovalGate::shared();
        let currencies: Arc<dyn ledger_core::CurrencyRegistry> =
            Arc::new(InMemoryCurrencyRegistry::seeded(vec![usd()]));

        let mut system_accounts = ledger_orchestrator::SystemAccounts::default();
        let clearing = accounts_impl
            .create(CreateAccountRequest {
                owner_type: OwnerType::System,
                owner_id: "system".into(),
                currency: "USD".into(),
                purpose: AccountPurpose::Clearing,
                account_kind: AccountKind::Real,
                overdraft_limit: i64::MAX / 2,
                parent_agent_external_id: None,
                commission_rate: None,
            })
            .await
            .expect("clearing account");
        system_accounts.clearing.insert("USD".into(), clearing.id);

        let trade_pool = accounts_impl
            .create(CreateAccountRequest {
                owner_type: OwnerType::System,
                owner_id: "system".into(),
                currency: "USD".into(),
                purpose: AccountPurpose::Clearing,
                account_kind: AccountKind::Real,
                overdraft_limit: i64::MAX / 2,
                parent_agent_external_id: None,
                commission_rate: None,
            })
            .await
            .expect("trade pool account");
        system_accounts.trade_pool.insert("USD".into(), trade_pool.id);

        let a = accounts_impl
            .create(CreateAccountRequest {
                owner_type: OwnerType::User,
                owner_id: "user-a".into(),
                currency: "USD".into(),
                purpose: AccountPurpose::Wallet,
                account_kind: AccountKind::Real,
                overdraft_limit: 0,
                parent_agent_external_id: None,
                commission_rate: None,
            })
            .await
            .expect("account a");
        accounts_impl
            .apply(a.id, ledger_core::DrCr::Cr, 5_000, 0)
            .await
            .expect("seed balance a");

        let b = accounts_impl
            .create(CreateAccountRequest {
                owner_type: OwnerType::User,
                owner_id: "user-b".into(),
                currency: "USD".into(),
                purpose: AccountPurpose::Wallet,
                account_kind: AccountKind::Real,
                overdraft_limit: 0,
                parent_agent_external_id: None,
                commission_rate: None,
            })
            .await
            .expect("account b");

        let reporting: Arc<dyn ReportingService> = Arc::new(InMemoryReportingService::new(
            accounts.clone(),
            journals.clone(),
            fx.clone(),
            currencies.clone(),
        ));

        let pipeline: Arc<dyn TransactionPipeline> = Arc::new(TransactionOrchestrator::new(
            accounts.clone(),
            journals.clone(),
            fee_rules.clone(),
            fx,
            approvals.clone(),
            audit,
            currencies,
            system_accounts,
            HashMap::from([("USD".to_string(), 10_000_00)]),
        ));

        let facade = LedgerApiFacade::new(accounts, journals, fee_rules, approvals, pipeline, reporting);
        (facade, a, b)
    }

    #[tokio::test]
    async fn create_account_round_trips() {
        let (facade, _, _) = harness().await;
        let response = facade
            .create_account(CreateAccountParams {
                owner_type: OwnerType::User,
                owner_id: "user-c".into(),
                currency: "USD".into(),
                purpose: AccountPurpose::Wallet,
                account_kind: AccountKind::Real,
                overdraft_limit: 0,
                parent_agent_external_id: None,
                commission_rate: None,
            })
            .await
            .expect("account created");
        assert_eq!(response.account.owner_id, "user-c");

        let fetched = facade
            .get_account(GetAccountParams {
                lookup: AccountLookup::Id(response.account.id),
            })
            .await
            .expect("account fetched");
        assert_eq!(fetched.account.account_number, response.account.account_number);
    }

    #[tokio::test]
    async fn transfer_moves_funds_and_charges_fee() {
        let (facade, a, b) = harness().await;

        let response = facade
            .execute_transaction(TransactionRequest::Transfer(crate::wire::TransferParams {
                caller: caller("user-a"),
                idempotency_key: Some("k1".into()),
                from_account_number: a.account_number.clone(),
                to_account_number: b.account_number.clone(),
                amount: 1_000,
                currency: "USD".into(),
                agent_external_id: None,
            }))
            .await
            .expect("transfer executed");

        assert_eq!(response.result.status, TransactionStatus::Executed);
        assert_eq!(response.result.fee, 50);

        let a_balance = facade
            .get_balance(GetBalanceParams { account_id: a.id })
            .await
            .expect("a balance");
        assert_eq!(a_balance.balance.balance, 5_000 - 1_000 - 50);

        let receipt = response.result.receipt_code.clone().expect("receipt code present");
        let detail = facade
            .get_transaction_by_receipt(GetTransactionByReceiptParams {
                receipt_code: receipt,
            })
            .await
            .expect("transaction detail fetched");
        assert_eq!(detail.entries.len(), 3);
    }

    #[tokio::test]
    async fn account_statement_paginates_via_cursor() {
        let (facade, a, b) = harness().await;
        for idx in 0..3 {
            facade
                .execute_transaction(TransactionRequest::Transfer(crate::wire::TransferParams {
                    caller: caller("user-a"),
                    idempotency_key: Some(format!("page-{idx}")),
                    from_account_number: a.account_number.clone(),
                    to_account_number: b.account_number.clone(),
                    amount: 100,
                    currency: "USD".into(),
                    agent_external_id: None,
                }))
                .await
                .expect("transfer executed");
        }

        let from = Utc::now() - chrono::Duration::hours(1);
        let to = Utc::now() + chrono::Duration::hours(1);
        let first_page = facade
            .get_account_statement(GetAccountStatementParams {
                account_number: a.account_number.clone(),
                account_kind: AccountKind::Real,
                from,
                to,
                cursor: None,
                limit: Some(2),
            })
            .await
            .expect("first page");
        assert_eq!(first_page.statement.entries.len(), 2);
        let cursor = first_page.next_cursor.expect("more entries remain");

        let second_page = facade
            .get_account_statement(GetAccountStatementParams {
                account_number: a.account_number.clone(),
                account_kind: AccountKind::Real,
                from,
                to,
                cursor: Some(cursor),
                limit: Some(100),
            })
            .await
            .expect("second page");
        assert!(second_page.next_cursor.is_none());
        assert!(!second_page.statement.entries.is_empty());
        assert!(!second_page
            .statement
            .entries
            .iter()
            .any(|entry| first_page.statement.entries.iter().any(|seen| seen.id == entry.id)));
    }

    #[tokio::test]
    async fn calculate_fee_quotes_without_posting() {
        let (facade, _, _) = harness().await;
        let response = facade
            .calculate_fee(CalculateFeeParams {
                transaction_type: "transfer".into(),
                amount: 1_000,
                source_currency: None,
                target_currency: None,
                account_kind: None,
                owner_type: None,
                as_of: Utc::now(),
            })
            .await
            .expect("fee calculated");
        let fee = response.fee.expect("fee present");
        assert_eq!(fee.amount, 50);
    }

    #[tokio::test]
    async fn owner_summary_reports_balances() {
        let (facade, a, _) = harness().await;
        let response = facade
            .get_owner_summary(GetOwnerSummaryParams {
                owner_type: OwnerType::User,
                owner_id: a.owner_id.clone(),
                account_kind: AccountKind::Real,
                reporting_currency: "USD".into(),
            })
            .await
            .expect("summary fetched");
        assert_eq!(response.summary.total_in_reporting_currency, 5_000);
    }

    #[tokio::test]
    async fn approval_gated_transfer_requires_explicit_approver() {
        let (facade, a, b) = harness().await;

        let transfer_params = |idempotency_key: &str| {
            TransactionRequest::Transfer(crate::wire::TransferParams {
                caller: caller("user-a"),
                idempotency_key: Some(idempotency_key.into()),
                from_account_number: a.account_number.clone(),
                to_account_number: b.account_number.clone(),
                amount: 10_000_00,
                currency: "USD".into(),
                agent_external_id: None,
            })
        };

        let without_approver = facade
            .execute_transaction_sync(transfer_params("big-transfer-1"), None)
            .await;
        assert!(matches!(
            without_approver,
            Err(LedgerError::FailedPrecondition(_))
        ));

        let response = facade
            .execute_transaction(transfer_params("big-transfer-2"))
            .await
            .expect("transfer submitted");
        assert_eq!(response.result.status, TransactionStatus::PendingApproval);
        let approval_id = response.result.approval_id.expect("approval id present");

        let approved = facade
            .approve_transaction(ApproveTransactionParams {
                approval_id,
                approver_external_id: "approver-1".into(),
                approved: true,
                reason: None,
            })
            .await
            .expect("approval resolved");
        assert_eq!(approved.status, ledger_approvals::ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn health_check_reports_all_components_healthy() {
        let (facade, _, _) = harness().await;
        let health = facade.health_check().await;
        assert!(health.is_healthy());
    }
}
