use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use ledger_accounts::Account;
use ledger_accounts::AccountRegistry;
use ledger_accounts::BalanceStore;
use ledger_approvals::ApprovalGate;
use ledger_approvals::ApprovalId;
use ledger_approvals::SubmitApprovalRequest;
use ledger_audit::AppendRequest;
use ledger_audit::AuditTrail;
use ledger_core::AccountKind;
use ledger_core::AccountPurpose;
use ledger_core::Currency;
use ledger_core::CurrencyRegistry;
use ledger_core::DrCr;
use ledger_core::FeeType;
use ledger_core::LedgerError;
use ledger_core::LedgerResult;
use ledger_core::OwnerType;
use ledger_core::round_half_even;
use ledger_core::scale_factor;
use ledger_fees::FeeQuery;
use ledger_fees::FeeRuleRegistry;
use ledger_fx::FxResolver;
use ledger_journal::EntryInput;
use ledger_journal::FeeInput;
use ledger_journal::JournalHeader;
use ledger_journal::JournalWriter;
use ledger_journal::WriteOutcome;
use rust_decimal::Decimal;

use crate::AgentCommissionRequest;
use crate::ConvertAndTransferRequest;
use crate::CreditRequest;
use crate::DebitRequest;
use crate::Envelope;
use crate::ReverseRequest;
use crate::SystemAccounts;
use crate::TradeOutcomeRequest;
use crate::TransactionPipeline;
use crate::TransactionResult;
use crate::TransactionStatus;
use crate::TransferRequest;

const MAX_RETRIES: u32 = 5;

/// Transaction Orchestrator. Composes every other
/// service behind `Arc<dyn _>` handles, the same seam pattern the
/// teacher's `LedgerFacade` uses around `Arc<dyn LedgerService>`.
pub struct TransactionOrchestrator {
    accounts: Arc<dyn AccountRegistry>,
    journals: Arc<dyn JournalWriter>,
    fee_rules: Arc<dyn FeeRuleRegistry>,
    fx: Arc<dyn FxResolver>,
    approvals: Arc<dyn ApprovalGate>,
    audit: Arc<dyn AuditTrail>,
    currencies: Arc<dyn CurrencyRegistry>,
    system_accounts: SystemAccounts,
    approval_ceilings: HashMap<String, i64>,
}

impl TransactionOrchestrator {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        accounts: Arc<dyn AccountRegistry>,
        journals: Arc<dyn JournalWriter>,
        fee_rules: Arc<dyn FeeRuleRegistry>,
        fx: Arc<dyn FxResolver>,
        approvals: Arc<dyn ApprovalGate>,
        audit: Arc<dyn AuditTrail>,
        currencies: Arc<dyn CurrencyRegistry>,
        system_accounts: SystemAccounts,
        approval_ceilings: HashMap<String, i64>,
    ) -> Self {
        Self {
            accounts,
            journals,
            fee_rules,
            fx,
            approvals,
            audit,
            currencies,
            system_accounts,
            approval_ceilings,
        }
    }

    fn requires_approval(&self, currency: &str, amount: i64) -> bool {
        self.approval_ceilings
            .get(currency)
            .is_some_and(|&ceiling| amount >= ceiling)
    }

    fn validated_currency(&self, code: &str, amount: i64) -> LedgerResult<Currency> {
        let currency = self.currencies.get(code)?;
        currency.check_amount(amount)?;
        Ok(currency)
    }

    async fn resolve(&self, account_number: &str) -> LedgerResult<Account> {
        self.accounts.get_by_number(account_number).await
    }

    fn ensure_not_demo(account: &Account, operation: &str) -> LedgerResult<()> {
        if account.account_kind == AccountKind::Demo {
            return Err(LedgerError::FailedPrecondition(format!(
                "{operation} is not permitted on demo accounts"
            )));
        }
        Ok(())
    }

    fn ensure_same_scope(a: &Account, b: &Account) -> LedgerResult<()> {
        if a.account_kind != b.account_kind {
            return Err(LedgerError::FailedPrecondition(
                "demo and real accounts may not appear in the same journal".into(),
            ));
        }
        Ok(())
    }

    fn header(&self, envelope: &Envelope, transaction_type: &str, account_kind: AccountKind) -> JournalHeader {
        JournalHeader {
            idempotency_key: envelope.idempotency_key.clone(),
            transaction_type: transaction_type.to_string(),
            account_kind,
            external_ref: None,
            description: None,
            created_by_external_id: envelope.requested_by_external_id.clone(),
            created_by_type: envelope.requested_by_type,
            ip: envelope.ip.clone(),
            ua: envelope.ua.clone(),
        }
    }

    /// Pipeline step 2: idempotency short-circuit, checked before any
    /// account resolution or pricing work.
    async fn short_circuit(&self, envelope: &Envelope) -> LedgerResult<Option<TransactionResult>> {
        let Some(key) = &envelope.idempotency_key else {
            return Ok(None);
        };
        let Some(outcome) = self.journals.get_by_idempotency_key(key).await? else {
            return Ok(None);
        };
        Ok(Some(Self::result_from_outcome(&outcome)))
    }

    fn result_from_outcome(outcome: &WriteOutcome) -> TransactionResult {
        let fee_total: i64 = outcome.fees.iter().map(|fee| fee.amount).sum();
        let amount = outcome.ledgers.first().map(|ledger| ledger.amount).unwrap_or(0);
        let currency = outcome
            .ledgers
            .first()
            .map(|ledger| ledger.currency.clone())
            .unwrap_or_default();
        TransactionResult {
            receipt_code: Some(outcome.receipt_code.clone()),
            journal_id: Some(outcome.journal.id),
            approval_id: None,
            status: TransactionStatus::Executed,
            amount,
            currency,
            fee: fee_total,
            processing_time_ms: 0,
            created_at: outcome.journal.created_at,
        }
    }

    fn to_result(
        outcome: &WriteOutcome,
        amount: i64,
        currency: &str,
        fee_total: i64,
        started_at: DateTime<Utc>,
    ) -> TransactionResult {
        TransactionResult {
            receipt_code: Some(outcome.receipt_code.clone()),
            journal_id: Some(outcome.journal.id),
            approval_id: None,
            status: TransactionStatus::Executed,
            amount,
            currency: currency.to_string(),
            fee: fee_total,
            processing_time_ms: (Utc::now() - started_at).num_milliseconds(),
            created_at: outcome.journal.created_at,
        }
    }

    async fn audit_best_effort(&self, entity_id: String, actor: String, action: String, metadata: serde_json::Value) {
        if let Err(err) = self
            .audit
            .append(AppendRequest {
                entity_id,
                actor,
                action,
                metadata,
            })
            .await
        {
            tracing::warn!(error = %err, "failed to append orchestrator action to audit trail");
        }
    }

    /// Step 6, with the bounded optimistic-concurrency retry 
    /// commits to: up to five attempts on `Aborted` with short randomized
    /// backoff. The in-memory `JournalWriter` this workspace ships
    /// serializes writes behind its own lock, so `Aborted` is rare in
    /// practice today; the retry stays because the trait boundary is the
    /// documented seam for a future contended/DB-backed writer.
    async fn write_with_retry(
        &self,
        header: JournalHeader,
        entries: Vec<EntryInput>,
        fees: Vec<FeeInput>,
    ) -> LedgerResult<WriteOutcome> {
        let mut attempt = 0u32;
        loop {
            match self
                .journals
                .write(header.clone(), entries.clone(), fees.clone())
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_retriable() && attempt < MAX_RETRIES => {
                    attempt += 1;
                    let jitter_ms = u64::from(rand::random::<u8>() % 40 + 10) * u64::from(attempt);
                    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fee_for(
        &self,
        transaction_type: &str,
        amount: i64,
        source_currency: Option<&str>,
        target_currency: Option<&str>,
        account_kind: AccountKind,
        owner_type: OwnerType,
    ) -> LedgerResult<Option<ledger_fees::FeeCalculation>> {
        if account_kind == AccountKind::Demo {
            return Ok(None);
        }
        let rules = self.fee_rules.list_active(transaction_type).await?;
        let query = FeeQuery {
            transaction_type: transaction_type.to_string(),
            amount,
            source_currency: source_currency.map(str::to_string),
            target_currency: target_currency.map(str::to_string),
            account_kind: Some(account_kind),
            owner_type: Some(owner_type),
            as_of: Utc::now(),
        };
        Ok(ledger_fees::calculate(&rules, &query))
    }

    /// Shared by `transfer` and approval-gate replay: steps 4-6 of the
    /// pipeline once accounts are resolved and the approval check (if
    /// any) has already passed.
    async fn execute_transfer(
        &self,
        envelope: &Envelope,
        amount: i64,
        currency: &Currency,
        from: &Account,
        to: &Account,
        agent_external_id: Option<&str>,
        started_at: DateTime<Utc>,
    ) -> LedgerResult<TransactionResult> {
        let mut entries = vec![
            EntryInput::new(from.id, DrCr::Dr, amount, &currency.code),
            EntryInput::new(to.id, DrCr::Cr, amount, &currency.code),
        ];
        let mut fees = Vec::new();
        let mut fee_total = 0i64;

        if let Some(calc) = self
            .fee_for(
                "transfer",
                amount,
                Some(&currency.code),
                None,
                from.account_kind,
                envelope.requested_by_type,
            )
            .await?
        {
            let fee_collector = self.system_accounts.clearing(&currency.code)?;
            entries.push(EntryInput::new(from.id, DrCr::Dr, calc.amount, &currency.code));
            let collector_index = entries.len();
            entries.push(EntryInput::new(fee_collector, DrCr::Cr, calc.amount, &currency.code));
            fees.push(FeeInput {
                fee_type: calc.fee_type,
                fee_rule_id: calc.fee_rule_id,
                amount: calc.amount,
                currency: currency.code.clone(),
                collected_by_account_id: Some(fee_collector),
                ledger_entry_index: collector_index,
                agent_external_id: None,
                commission_rate: None,
            });
            fee_total += calc.amount;
        }

        if let Some(agent_external_id) = agent_external_id {
            let agent_accounts = self
                .accounts
                .list_by_owner(OwnerType::Agent, agent_external_id, None)
                .await?;
            let agent_account = agent_accounts
                .into_iter()
                .find(|account| account.purpose == AccountPurpose::Commission && account.currency == currency.code)
                .ok_or_else(|| {
                    LedgerError::FailedPrecondition(format!(
                        "agent {agent_external_id} has no commission account in {}",
                        currency.code
                    ))
                })?;
            let commission_rate = agent_account.commission_rate.ok_or_else(|| {
                LedgerError::FailedPrecondition(format!(
                    "agent {agent_external_id} has no commission_rate configured"
                ))
            })?;
            let commission_amount = i64::try_from(round_half_even(Decimal::from(amount) * commission_rate))
                .map_err(|_| LedgerError::Internal("agent commission amount overflow".into()))?;

            if commission_amount > 0 {
                let pool = self.system_accounts.commission_pool(&currency.code)?;
                entries.push(EntryInput::new(pool, DrCr::Dr, commission_amount, &currency.code));
                let collector_index = entries.len();
                entries.push(EntryInput::new(
                    agent_account.id,
                    DrCr::Cr,
                    commission_amount,
                    &currency.code,
                ));
                fees.push(FeeInput {
                    fee_type: FeeType::AgentCommission,
                    fee_rule_id: None,
                    amount: commission_amount,
                    currency: currency.code.clone(),
                    collected_by_account_id: Some(agent_account.id),
                    ledger_entry_index: collector_index,
                    agent_external_id: Some(agent_external_id.to_string()),
                    commission_rate: Some(commission_rate),
                });
            }
        }

        let header = self.header(envelope, "transfer", from.account_kind);
        let outcome = self.write_with_retry(header, entries, fees).await?;
        self.audit_best_effort(
            outcome.journal.id.to_string(),
            envelope.requested_by_external_id.clone(),
            "transfer".into(),
            serde_json::json!({ "receipt_code": outcome.receipt_code }),
        )
        .await;
        Ok(Self::to_result(&outcome, amount, &currency.code, fee_total, started_at))
    }
}

#[async_trait]
impl TransactionPipeline for TransactionOrchestrator {
    async fn credit(&self, request: CreditRequest) -> LedgerResult<TransactionResult> {
        let started_at = Utc::now();
        if let Some(result) = self.short_circuit(&request.envelope).await? {
            return Ok(result);
        }
        let currency = self.validated_currency(&request.currency, request.amount)?;
        let account = self.resolve(&request.account_number).await?;
        Self::ensure_not_demo(&account, "deposit")?;
        if account.currency != currency.code {
            return Err(LedgerError::FailedPrecondition(format!(
                "account {} is denominated in {}, not {}",
                account.account_number, account.currency, currency.code
            )));
        }

        let clearing = self.system_accounts.clearing(&currency.code)?;
        let entries = vec![
            EntryInput::new(clearing, DrCr::Dr, request.amount, &currency.code),
            EntryInput::new(account.id, DrCr::Cr, request.amount, &currency.code),
        ];
        let header = self.header(&request.envelope, "credit", account.account_kind);
        let outcome = self.write_with_retry(header, entries, vec![]).await?;
        self.audit_best_effort(
            outcome.journal.id.to_string(),
            request.envelope.requested_by_external_id.clone(),
            "credit".into(),
            serde_json::json!({ "receipt_code": outcome.receipt_code }),
        )
        .await;
        Ok(Self::to_result(&outcome, request.amount, &currency.code, 0, started_at))
    }

    async fn debit(&self, request: DebitRequest) -> LedgerResult<TransactionResult> {
        let started_at = Utc::now();
        if let Some(result) = self.short_circuit(&request.envelope).await? {
            return Ok(result);
        }
        let currency = self.validated_currency(&request.currency, request.amount)?;
        let account = self.resolve(&request.account_number).await?;
        Self::ensure_not_demo(&account, "withdrawal")?;
        if account.currency != currency.code {
            return Err(LedgerError::FailedPrecondition(format!(
                "account {} is denominated in {}, not {}",
                account.account_number, account.currency, currency.code
            )));
        }

        let clearing = self.system_accounts.clearing(&currency.code)?;
        let entries = vec![
            EntryInput::new(account.id, DrCr::Dr, request.amount, &currency.code),
            EntryInput::new(clearing, DrCr::Cr, request.amount, &currency.code),
        ];
        let header = self.header(&request.envelope, "debit", account.account_kind);
        let outcome = self.write_with_retry(header, entries, vec![]).await?;
        self.audit_best_effort(
            outcome.journal.id.to_string(),
            request.envelope.requested_by_external_id.clone(),
            "debit".into(),
            serde_json::json!({ "receipt_code": outcome.receipt_code }),
        )
        .await;
        Ok(Self::to_result(&outcome, request.amount, &currency.code, 0, started_at))
    }

    async fn transfer(&self, request: TransferRequest) -> LedgerResult<TransactionResult> {
        let started_at = Utc::now();
        if let Some(result) = self.short_circuit(&request.envelope).await? {
            return Ok(result);
        }
        let currency = self.validated_currency(&request.currency, request.amount)?;
        let from = self.resolve(&request.from_account_number).await?;
        let to = self.resolve(&request.to_account_number).await?;
        Self::ensure_same_scope(&from, &to)?;
        if from.currency != currency.code || to.currency != currency.code {
            return Err(LedgerError::FailedPrecondition(
                "transfer accounts do not match the requested currency".into(),
            ));
        }

        if self.requires_approval(&currency.code, request.amount) {
            let approval = self
                .approvals
                .submit(SubmitApprovalRequest {
                    requested_by: request.envelope.requested_by_external_id.clone(),
                    transaction_type: "transfer".into(),
                    account_number: request.from_account_number.clone(),
                    amount: request.amount,
                    currency: currency.code.clone(),
                    to_account_number: Some(request.to_account_number.clone()),
                    request_metadata: serde_json::json!({ "agent_external_id": request.agent_external_id }),
                })
                .await?;
            return Ok(TransactionResult {
                receipt_code: None,
                journal_id: None,
                approval_id: Some(approval.id),
                status: TransactionStatus::PendingApproval,
                amount: request.amount,
                currency: currency.code,
                fee: 0,
                processing_time_ms: (Utc::now() - started_at).num_milliseconds(),
                created_at: approval.created_at,
            });
        }

        self.execute_transfer(
            &request.envelope,
            request.amount,
            &currency,
            &from,
            &to,
            request.agent_external_id.as_deref(),
            started_at,
        )
        .await
    }

    async fn convert_and_transfer(
        &self,
        request: ConvertAndTransferRequest,
    ) -> LedgerResult<TransactionResult> {
        let started_at = Utc::now();
        if let Some(result) = self.short_circuit(&request.envelope).await? {
            return Ok(result);
        }
        let from_currency = self.validated_currency(&request.from_currency, request.amount)?;
        let to_currency = self.currencies.get(&request.to_currency)?;
        let from = self.resolve(&request.from_account_number).await?;
        let to = self.resolve(&request.to_account_number).await?;
        Self::ensure_not_demo(&from, "currency conversion")?;
        Self::ensure_not_demo(&to, "currency conversion")?;
        Self::ensure_same_scope(&from, &to)?;

        let fx_rate = self
            .fx
            .get_rate(&from_currency.code, &to_currency.code, Utc::now())
            .await?;

        let converted_raw = Decimal::from(request.amount) * fx_rate.rate * scale_factor(to_currency.decimals)
            / scale_factor(from_currency.decimals);
        let converted_amount = i64::try_from(round_half_even(converted_raw))
            .map_err(|_| LedgerError::Internal("converted amount overflow".into()))?;

        let fx_metadata = serde_json::json!({ "fx_rate": fx_rate.rate, "fx_rate_id": fx_rate.id });

        let liquidity_from = self.system_accounts.liquidity(&from_currency.code)?;
        let liquidity_to = self.system_accounts.liquidity(&to_currency.code)?;

        let mut entries = vec![
            EntryInput::new(from.id, DrCr::Dr, request.amount, &from_currency.code)
                .with_metadata(fx_metadata.clone()),
            EntryInput::new(liquidity_from, DrCr::Cr, request.amount, &from_currency.code),
            EntryInput::new(liquidity_to, DrCr::Dr, converted_amount, &to_currency.code),
            EntryInput::new(to.id, DrCr::Cr, converted_amount, &to_currency.code).with_metadata(fx_metadata),
        ];
        let mut fees = Vec::new();
        let mut fee_total = 0i64;

        if let Some(calc) = self
            .fee_for(
                "conversion",
                request.amount,
                Some(&from_currency.code),
                Some(&to_currency.code),
                from.account_kind,
                request.envelope.requested_by_type,
            )
            .await?
        {
            let fee_collector = self.system_accounts.clearing(&from_currency.code)?;
            entries.push(EntryInput::new(from.id, DrCr::Dr, calc.amount, &from_currency.code));
            let collector_index = entries.len();
            entries.push(EntryInput::new(
                fee_collector,
                DrCr::Cr,
                calc.amount,
                &from_currency.code,
            ));
            fees.push(FeeInput {
                fee_type: calc.fee_type,
                fee_rule_id: calc.fee_rule_id,
                amount: calc.amount,
                currency: from_currency.code.clone(),
                collected_by_account_id: Some(fee_collector),
                ledger_entry_index: collector_index,
                agent_external_id: None,
                commission_rate: None,
            });
            fee_total += calc.amount;
        }

        let header = self.header(&request.envelope, "convert_and_transfer", from.account_kind);
        let outcome = self.write_with_retry(header, entries, fees).await?;
        self.audit_best_effort(
            outcome.journal.id.to_string(),
            request.envelope.requested_by_external_id.clone(),
            "convert_and_transfer".into(),
            serde_json::json!({ "receipt_code": outcome.receipt_code, "fx_rate_id": fx_rate.id }),
        )
        .await;
        Ok(Self::to_result(
            &outcome,
            request.amount,
            &from_currency.code,
            fee_total,
            started_at,
        ))
    }

    async fn process_trade_win(&self, request: TradeOutcomeRequest) -> LedgerResult<TransactionResult> {
        let started_at = Utc::now();
        if let Some(result) = self.short_circuit(&request.envelope).await? {
            return Ok(result);
        }
        let currency = self.validated_currency(&request.currency, request.amount)?;
        let account = self.resolve(&request.account_number).await?;
        if account.currency != currency.code {
            return Err(LedgerError::FailedPrecondition(
                "trade outcome account currency mismatch".into(),
            ));
        }
        let pool = self.system_accounts.trade_pool(&currency.code)?;
        let metadata = serde_json::json!({ "trade_id": request.trade_id });
        let entries = vec![
            EntryInput::new(pool, DrCr::Dr, request.amount, &currency.code),
            EntryInput::new(account.id, DrCr::Cr, request.amount, &currency.code).with_metadata(metadata),
        ];
        let header = self.header(&request.envelope, "trade_win", account.account_kind);
        let outcome = self.write_with_retry(header, entries, vec![]).await?;
        self.audit_best_effort(
            outcome.journal.id.to_string(),
            request.envelope.requested_by_external_id.clone(),
            "trade_win".into(),
            serde_json::json!({ "trade_id": request.trade_id }),
        )
        .await;
        Ok(Self::to_result(&outcome, request.amount, &currency.code, 0, started_at))
    }

    async fn process_trade_loss(&self, request: TradeOutcomeRequest) -> LedgerResult<TransactionResult> {
        let started_at = Utc::now();
        if let Some(result) = self.short_circuit(&request.envelope).await? {
            return Ok(result);
        }
        let currency = self.validated_currency(&request.currency, request.amount)?;
        let account = self.resolve(&request.account_number).await?;
        if account.currency != currency.code {
            return Err(LedgerError::FailedPrecondition(
                "trade outcome account currency mismatch".into(),
            ));
        }
        let pool = self.system_accounts.trade_pool(&currency.code)?;
        let metadata = serde_json::json!({ "trade_id": request.trade_id });
        let entries = vec![
            EntryInput::new(account.id, DrCr::Dr, request.amount, &currency.code).with_metadata(metadata),
            EntryInput::new(pool, DrCr::Cr, request.amount, &currency.code),
        ];
        let header = self.header(&request.envelope, "trade_loss", account.account_kind);
        let outcome = self.write_with_retry(header, entries, vec![]).await?;
        self.audit_best_effort(
            outcome.journal.id.to_string(),
            request.envelope.requested_by_external_id.clone(),
            "trade_loss".into(),
            serde_json::json!({ "trade_id": request.trade_id }),
        )
        .await;
        Ok(Self::to_result(&outcome, request.amount, &currency.code, 0, started_at))
    }

    async fn process_agent_commission(
        &self,
        request: AgentCommissionRequest,
    ) -> LedgerResult<TransactionResult> {
        let started_at = Utc::now();
        if let Some(result) = self.short_circuit(&request.envelope).await? {
            return Ok(result);
        }
        let currency = self.validated_currency(&request.currency, request.amount)?;
        let agent_account = self.resolve(&request.agent_account_number).await?;
        if agent_account.owner_type != OwnerType::Agent {
            return Err(LedgerError::FailedPrecondition(
                "commission target must be an agent account".into(),
            ));
        }
        Self::ensure_not_demo(&agent_account, "agent commission payout")?;

        let pool = self.system_accounts.commission_pool(&currency.code)?;
        let entries = vec![
            EntryInput::new(pool, DrCr::Dr, request.amount, &currency.code),
            EntryInput::new(agent_account.id, DrCr::Cr, request.amount, &currency.code),
        ];
        let fees = vec![FeeInput {
            fee_type: FeeType::AgentCommission,
            fee_rule_id: None,
            amount: request.amount,
            currency: currency.code.clone(),
            collected_by_account_id: Some(agent_account.id),
            ledger_entry_index: 1,
            agent_external_id: Some(request.agent_external_id.clone()),
            commission_rate: None,
        }];
        let header = self.header(&request.envelope, "agent_commission", agent_account.account_kind);
        let outcome = self.write_with_retry(header, entries, fees).await?;
        self.audit_best_effort(
            outcome.journal.id.to_string(),
            request.envelope.requested_by_external_id.clone(),
            "agent_commission".into(),
            serde_json::json!({ "receipt_code": outcome.receipt_code }),
        )
        .await;
        Ok(Self::to_result(&outcome, request.amount, &currency.code, request.amount, started_at))
    }

    async fn reverse(&self, request: ReverseRequest) -> LedgerResult<TransactionResult> {
        let started_at = Utc::now();
        if let Some(result) = self.short_circuit(&request.envelope).await? {
            return Ok(result);
        }
        let original = self.journals.get_journal(request.original_journal_id).await?;
        let original_ledgers = self
            .journals
            .list_ledgers_by_journal(request.original_journal_id)
            .await?;
        if original_ledgers.is_empty() {
            return Err(LedgerError::NotFound(format!(
                "journal {} has no ledger entries to reverse",
                request.original_journal_id
            )));
        }

        let metadata = serde_json::json!({ "references": original.external_ref });
        let entries: Vec<EntryInput> = original_ledgers
            .iter()
            .map(|ledger| {
                EntryInput::new(ledger.account_id, ledger.dr_cr.opposite(), ledger.amount, ledger.currency.clone())
                    .with_metadata(metadata.clone())
            })
            .collect();

        let header = JournalHeader {
            idempotency_key: request.envelope.idempotency_key.clone(),
            transaction_type: format!("reversal:{}", original.transaction_type),
            account_kind: original.account_kind,
            external_ref: None,
            description: Some(request.reason.clone()),
            created_by_external_id: request.envelope.requested_by_external_id.clone(),
            created_by_type: request.envelope.requested_by_type,
            ip: request.envelope.ip.clone(),
            ua: request.envelope.ua.clone(),
        };
        let outcome = self.write_with_retry(header, entries, vec![]).await?;
        let amount = original_ledgers.first().map(|ledger| ledger.amount).unwrap_or(0);
        let currency = original_ledgers
            .first()
            .map(|ledger| ledger.currency.clone())
            .unwrap_or_default();
        self.audit_best_effort(
            outcome.journal.id.to_string(),
            request.envelope.requested_by_external_id.clone(),
            "reversal".into(),
            serde_json::json!({ "original_journal_id": request.original_journal_id }),
        )
        .await;
        Ok(Self::to_result(&outcome, amount, &currency, 0, started_at))
    }

    async fn approve_pending(
        &self,
        approval_id: ApprovalId,
        approver_external_id: &str,
    ) -> LedgerResult<TransactionResult> {
        let started_at = Utc::now();
        let approved = self.approvals.approve(approval_id, approver_external_id).await?;

        let currency = self.currencies.get(&approved.currency)?;
        let from = self.resolve(&approved.account_number).await?;
        let to_number = approved.to_account_number.clone().ok_or_else(|| {
            LedgerError::Internal("approved transfer is missing its destination account".into())
        })?;
        let to = self.resolve(&to_number).await?;
        let agent_external_id = approved
            .request_metadata
            .get("agent_external_id")
            .and_then(|value| value.as_str())
            .map(str::to_string);
        let envelope = Envelope {
            idempotency_key: None,
            requested_by_external_id: approved.requested_by.clone(),
            requested_by_type: OwnerType::User,
            ip: None,
            ua: None,
        };

        let outcome = self
            .execute_transfer(
                &envelope,
                approved.amount,
                &currency,
                &from,
                &to,
                agent_external_id.as_deref(),
                started_at,
            )
            .await;

        match outcome {
            Ok(mut result) => {
                let receipt = result.receipt_code.clone().unwrap_or_default();
                self.approvals.mark_executed(approval_id, receipt).await?;
                result.approval_id = Some(approval_id);
                Ok(result)
            }
            Err(err) => {
                self.approvals.mark_failed(approval_id, err.to_string()).await?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_accounts::CreateAccountRequest;
    use ledger_accounts::InMemoryAccountService;
    use ledger_approvals::InMemoryApprovalGate;
    use ledger_audit::InMemoryAuditTrail;
    use ledger_core::IdGenerator;
    use ledger_core::InMemoryCurrencyRegistry;
    use ledger_fees::CalculationMethod;
    use ledger_fees::FeeRule;
    use ledger_fees::InMemoryFeeRuleRegistry;
    use ledger_fx::InMemoryFxRateRegistry;
    use ledger_journal::InMemoryJournalWriter;
    use pretty_assertions::assert_eq;

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

    async fn harness() -> (TransactionOrchestrator, Arc<InMemoryAccountService>, ledger_accounts::Account, ledger_accounts::Account) {
        let ids = Arc::new(IdGenerator::new(1));
        let accounts_impl = Arc::new(InMemoryAccountService::new(ids.clone()));
        let accounts: Arc<dyn AccountRegistry> = accounts_impl.clone();
        let balances: Arc<dyn BalanceStore> = accounts_impl.clone();
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
                fee_type: FeeType::Platform,
                calculation_method: CalculationMethod::Fixed,
                fee_value: Decimal::new(50, 0),
                min_fee: None,
                max_fee: None,
                tiers: Vec::new(),
                valid_from: DateTime::UNIX_EPOCH,
                valid_to: None,
                is_active: true,
                priority: 1,
            })
            .await
            .expect("seed fee rule");
        let fx: Arc<dyn FxResolver> = Arc::new(InMemoryFxRateRegistry::new(ids.clone()));
        let approvals: Arc<dyn ApprovalGate> = InMemoryApprovalGate::shared();
        let currencies: Arc<dyn CurrencyRegistry> = Arc::new(InMemoryCurrencyRegistry::seeded(vec![usd()]));

        let mut system_accounts = SystemAccounts::default();
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
            .apply(a.id, DrCr::Cr, 5_000, 0)
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

        let orchestrator = TransactionOrchestrator::new(
            accounts,
            journals,
            fee_rules,
            fx,
            approvals,
            audit,
            currencies,
            system_accounts,
            HashMap::from([("USD".to_string(), 10_000_00)]),
        );

        (orchestrator, accounts_impl, a, b)
    }

    fn envelope(idempotency_key: Option<&str>) -> Envelope {
        Envelope {
            idempotency_key: idempotency_key.map(str::to_string),
            requested_by_external_id: "user-a".into(),
            requested_by_type: OwnerType::User,
            ip: None,
            ua: None,
        }
    }

    #[tokio::test]
    async fn transfer_moves_funds_and_charges_fixed_fee() {
        let (orchestrator, accounts_impl, a, b) = harness().await;

        let result = orchestrator
            .transfer(TransferRequest {
                envelope: envelope(Some("k1")),
                from_account_number: a.account_number.clone(),
                to_account_number: b.account_number.clone(),
                amount: 1_000,
                currency: "USD".into(),
                agent_external_id: None,
            })
            .await
            .expect("transfer succeeds");

        assert_eq!(result.status, TransactionStatus::Executed);
        assert_eq!(result.fee, 50);

        let a_balance = accounts_impl.get_balance(a.id).await.expect("a balance");
        let b_balance = accounts_impl.get_balance(b.id).await.expect("b balance");
        assert_eq!(a_balance.balance, 5_000 - 1_000 - 50);
        assert_eq!(b_balance.balance, 1_000);
    }

    #[tokio::test]
    async fn debit_beyond_balance_fails_and_leaves_balance_unchanged() {
        let (orchestrator, accounts_impl, a, _b) = harness().await;

        let err = orchestrator
            .debit(DebitRequest {
                envelope: envelope(None),
                account_number: a.account_number.clone(),
                amount: 15_000,
                currency: "USD".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::FailedPrecondition(_)));

        let balance = accounts_impl.get_balance(a.id).await.expect("balance");
        assert_eq!(balance.balance, 5_000);
    }

    #[tokio::test]
    async fn idempotent_transfer_replay_returns_identical_receipt() {
        let (orchestrator, _accounts_impl, a, b) = harness().await;

        let first = orchestrator
            .transfer(TransferRequest {
                envelope: envelope(Some("k1")),
                from_account_number: a.account_number.clone(),
                to_account_number: b.account_number.clone(),
                amount: 1_000,
                currency: "USD".into(),
                agent_external_id: None,
            })
            .await
            .expect("first transfer");
        let second = orchestrator
            .transfer(TransferRequest {
                envelope: envelope(Some("k1")),
                from_account_number: a.account_number.clone(),
                to_account_number: b.account_number.clone(),
                amount: 1_000,
                currency: "USD".into(),
                agent_external_id: None,
            })
            .await
            .expect("replayed transfer");

        assert_eq!(first.receipt_code, second.receipt_code);
        assert_eq!(first.journal_id, second.journal_id);
    }

    #[tokio::test]
    async fn transfer_above_ceiling_requires_approval_then_executes() {
        let (orchestrator, accounts_impl, a, b) = harness().await;
        accounts_impl
            .apply(a.id, DrCr::Cr, 20_000_00, 1)
            .await
            .expect("top up a");

        let pending = orchestrator
            .transfer(TransferRequest {
                envelope: envelope(Some("big-transfer")),
                from_account_number: a.account_number.clone(),
                to_account_number: b.account_number.clone(),
                amount: 25_000_00,
                currency: "USD".into(),
                agent_external_id: None,
            })
            .await
            .expect("submits for approval");
        assert_eq!(pending.status, TransactionStatus::PendingApproval);
        let approval_id = pending.approval_id.expect("approval id present");

        let executed = orchestrator
            .approve_pending(approval_id, "approver-1")
            .await
            .expect("approval executes");
        assert_eq!(executed.status, TransactionStatus::Executed);
        assert!(executed.receipt_code.is_some());
    }

    #[tokio::test]
    async fn reverse_mirrors_original_journal_with_swapped_sides() {
        let (orchestrator, accounts_impl, a, b) = harness().await;
        let original = orchestrator
            .transfer(TransferRequest {
                envelope: envelope(Some("orig")),
                from_account_number: a.account_number.clone(),
                to_account_number: b.account_number.clone(),
                amount: 1_000,
                currency: "USD".into(),
                agent_external_id: None,
            })
            .await
            .expect("original transfer");

        let reversed = orchestrator
            .reverse(ReverseRequest {
                envelope: envelope(None),
                original_journal_id: original.journal_id.expect("journal id"),
                reason: "customer dispute".into(),
            })
            .await
            .expect("reversal succeeds");

        let a_balance = accounts_impl.get_balance(a.id).await.expect("a balance");
        let b_balance = accounts_impl.get_balance(b.id).await.expect("b balance");
        // Net of the transfer's fixed fee (which the reversal does not refund),
        // a and b both return to their starting point on the principal leg.
        assert_eq!(a_balance.balance, 5_000 - 50);
        assert_eq!(b_balance.balance, 0);
        assert!(reversed.receipt_code.is_some());
    }
}
