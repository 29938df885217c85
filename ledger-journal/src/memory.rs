use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use ledger_accounts::AccountId;
use ledger_accounts::AccountRegistry;
use ledger_accounts::BalanceStore;
use ledger_audit::AppendRequest;
use ledger_audit::AuditTrail;
use ledger_core::IdGenerator;
use ledger_core::LedgerError;
use ledger_core::LedgerResult;
use ledger_core::ReceiptCode;
use tokio::sync::Mutex;

use crate::EntryInput;
use crate::FeeInput;
use crate::Journal;
use crate::JournalFilter;
use crate::JournalHeader;
use crate::JournalId;
use crate::JournalWriter;
use crate::Ledger;
use crate::TransactionFee;
use crate::WriteOutcome;

#[derive(Default)]
struct State {
    journals: HashMap<JournalId, Journal>,
    ledgers_by_journal: HashMap<JournalId, Vec<Ledger>>,
    fees_by_journal: HashMap<JournalId, Vec<TransactionFee>>,
    ledgers_all: Vec<Ledger>,
    idempotency_index: HashMap<String, JournalId>,
    receipt_index: HashMap<String, JournalId>,
}

/// In-memory `JournalWriter`. Serializes every write behind one mutex,
/// standing in for "one atomic DB transaction": validate everything, then
/// mutate nothing until every precondition and balance `apply` is known to
/// succeed.
pub struct InMemoryJournalWriter {
    ids: Arc<IdGenerator>,
    accounts: Arc<dyn AccountRegistry>,
    balances: Arc<dyn BalanceStore>,
    audit: Arc<dyn AuditTrail>,
    state: Mutex<State>,
}

impl InMemoryJournalWriter {
    #[must_use]
    pub fn new(
        ids: Arc<IdGenerator>,
        accounts: Arc<dyn AccountRegistry>,
        balances: Arc<dyn BalanceStore>,
        audit: Arc<dyn AuditTrail>,
    ) -> Self {
        Self {
            ids,
            accounts,
            balances,
            audit,
            state: Mutex::new(State::default()),
        }
    }

    fn outcome_from_state(state: &State, journal_id: JournalId) -> Option<WriteOutcome> {
        let journal = state.journals.get(&journal_id)?.clone();
        let ledgers = state
            .ledgers_by_journal
            .get(&journal_id)
            .cloned()
            .unwrap_or_default();
        let fees = state
            .fees_by_journal
            .get(&journal_id)
            .cloned()
            .unwrap_or_default();
        let receipt_code = journal
            .external_ref
            .clone()
            .unwrap_or_else(|| ReceiptCode::from_journal_id(journal_id).to_string());
        Some(WriteOutcome {
            journal,
            ledgers,
            fees,
            receipt_code,
        })
    }
}

#[async_trait]
impl JournalWriter for InMemoryJournalWriter {
    async fn write(
        &self,
        header: JournalHeader,
        entries: Vec<EntryInput>,
        fees: Vec<FeeInput>,
    ) -> LedgerResult<WriteOutcome> {
        let mut state = self.state.lock().await;

        // Precondition 5: idempotency short-circuit — returns the existing
        // journal's ledgers+receipt verbatim, writes nothing new.
        if let Some(key) = &header.idempotency_key
            && let Some(&existing_id) = state.idempotency_index.get(key)
        {
            return Self::outcome_from_state(&state, existing_id)
                .ok_or_else(|| LedgerError::Internal("idempotent journal missing state".into()));
        }

        // Precondition 1.
        if entries.len() < 2 {
            return Err(LedgerError::InvalidArgument(
                "a journal requires at least two balanced entries".into(),
            ));
        }

        // Preconditions 3 & 4: resolve and validate every target account.
        let mut accounts = Vec::with_capacity(entries.len());
        for entry in &entries {
            let account = self.accounts.get_by_id(entry.account_id).await?;
            if account.currency != entry.currency {
                return Err(LedgerError::FailedPrecondition(format!(
                    "entry currency {} does not match account {} currency {}",
                    entry.currency, account.id, account.currency
                )));
            }
            let in_scope =
                account.account_kind == header.account_kind || account.account_kind == ledger_core::AccountKind::System;
            if !in_scope {
                return Err(LedgerError::FailedPrecondition(format!(
                    "account {} is scoped to {:?}, journal is scoped to {:?}",
                    account.id, account.account_kind, header.account_kind
                )));
            }
            if !account.accepts_privileged_posting(header.created_by_type) {
                if !account.is_active {
                    return Err(LedgerError::FailedPrecondition(format!(
                        "account {} is inactive",
                        account.id
                    )));
                }
                return Err(LedgerError::FailedPrecondition(format!(
                    "account {} is locked",
                    account.id
                )));
            }
            accounts.push(account);
        }

        // Precondition 2: per-currency DR/CR balance.
        let mut sums: HashMap<String, (i128, i128)> = HashMap::new();
        for entry in &entries {
            let sum = sums.entry(entry.currency.clone()).or_insert((0, 0));
            match entry.dr_cr {
                ledger_core::DrCr::Dr => sum.0 += i128::from(entry.amount),
                ledger_core::DrCr::Cr => sum.1 += i128::from(entry.amount),
            }
        }
        for (currency, (dr, cr)) in &sums {
            if dr != cr {
                return Err(LedgerError::FailedPrecondition(format!(
                    "journal does not balance for currency {currency}: debits={dr} credits={cr}"
                )));
            }
        }

        let journal_id = self.ids.next_id()?;
        let receipt = ReceiptCode::from_journal_id(journal_id);
        let now = Utc::now();

        let mut ledgers = Vec::with_capacity(entries.len());
        for (entry, account) in entries.iter().zip(accounts.iter()) {
            let current = self.accounts.get_balance(account.id).await?;
            let updated = self
                .balances
                .apply(account.id, entry.dr_cr, entry.amount, current.version)
                .await?;
            let ledger_id = self.ids.next_id()?;
            ledgers.push(Ledger {
                id: ledger_id,
                journal_id,
                account_id: account.id,
                account_kind: account.account_kind,
                amount: entry.amount,
                dr_cr: entry.dr_cr,
                currency: entry.currency.clone(),
                receipt_code: Some(receipt.to_string()),
                balance_after: Some(updated.balance),
                metadata: entry.metadata.clone(),
                created_at: now,
            });
        }

        let mut fee_records = Vec::with_capacity(fees.len());
        for fee in fees {
            let ledger_id = ledgers.get(fee.ledger_entry_index).map(|ledger| ledger.id);
            fee_records.push(TransactionFee {
                id: self.ids.next_id()?,
                receipt_code: receipt.to_string(),
                fee_rule_id: fee.fee_rule_id,
                fee_type: fee.fee_type,
                amount: fee.amount,
                currency: fee.currency,
                collected_by_account_id: fee.collected_by_account_id,
                ledger_id,
                agent_external_id: fee.agent_external_id,
                commission_rate: fee.commission_rate,
            });
        }

        let journal = Journal {
            id: journal_id,
            idempotency_key: header.idempotency_key.clone(),
            transaction_type: header.transaction_type,
            account_kind: header.account_kind,
            external_ref: Some(
                header
                    .external_ref
                    .unwrap_or_else(|| receipt.to_string()),
            ),
            description: header.description,
            created_by_external_id: header.created_by_external_id,
            created_by_type: header.created_by_type,
            ip: header.ip,
            ua: header.ua,
            created_at: now,
        };

        state.journals.insert(journal_id, journal.clone());
        state
            .ledgers_by_journal
            .insert(journal_id, ledgers.clone());
        state
            .fees_by_journal
            .insert(journal_id, fee_records.clone());
        state.ledgers_all.extend(ledgers.clone());
        state
            .receipt_index
            .insert(receipt.to_string(), journal_id);
        if let Some(key) = &journal.idempotency_key {
            state.idempotency_index.insert(key.clone(), journal_id);
        }

        drop(state);

        if let Err(err) = self
            .audit
            .append(AppendRequest {
                entity_id: journal_id.to_string(),
                actor: journal.created_by_external_id.clone(),
                action: format!("journal_posted:{}", journal.transaction_type),
                metadata: serde_json::json!({ "receipt_code": receipt.to_string() }),
            })
            .await
        {
            tracing::warn!(error = %err, journal_id, "failed to append journal write to audit trail");
        }

        Ok(WriteOutcome {
            journal,
            ledgers,
            fees: fee_records,
            receipt_code: receipt.to_string(),
        })
    }

    async fn get_journal(&self, journal_id: JournalId) -> LedgerResult<Journal> {
        let state = self.state.lock().await;
        state
            .journals
            .get(&journal_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("journal {journal_id}")))
    }

    async fn get_by_idempotency_key(&self, key: &str) -> LedgerResult<Option<WriteOutcome>> {
        let state = self.state.lock().await;
        Ok(state
            .idempotency_index
            .get(key)
            .and_then(|&id| Self::outcome_from_state(&state, id)))
    }

    async fn get_by_receipt(&self, receipt_code: &str) -> LedgerResult<WriteOutcome> {
        let state = self.state.lock().await;
        let &journal_id = state
            .receipt_index
            .get(receipt_code)
            .ok_or_else(|| LedgerError::NotFound(format!("receipt {receipt_code}")))?;
        Self::outcome_from_state(&state, journal_id)
            .ok_or_else(|| LedgerError::Internal("receipt indexed but journal missing".into()))
    }

    async fn list_journals(&self, filter: JournalFilter) -> LedgerResult<Vec<Journal>> {
        let state = self.state.lock().await;
        let mut journals: Vec<Journal> = state
            .journals
            .values()
            .filter(|journal| {
                filter
                    .account_kind
                    .is_none_or(|kind| journal.account_kind == kind)
            })
            .filter(|journal| {
                filter
                    .transaction_type
                    .as_ref()
                    .is_none_or(|t| &journal.transaction_type == t)
            })
            .filter(|journal| filter.from.is_none_or(|from| journal.created_at >= from))
            .filter(|journal| filter.to.is_none_or(|to| journal.created_at < to))
            .cloned()
            .collect();
        journals.sort_by_key(|journal| (journal.created_at, journal.id));
        Ok(journals)
    }

    async fn list_ledgers_by_journal(&self, journal_id: JournalId) -> LedgerResult<Vec<Ledger>> {
        let state = self.state.lock().await;
        Ok(state
            .ledgers_by_journal
            .get(&journal_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_ledgers_by_account(
        &self,
        account_id: AccountId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> LedgerResult<Vec<Ledger>> {
        let state = self.state.lock().await;
        let mut ledgers: Vec<Ledger> = state
            .ledgers_all
            .iter()
            .filter(|ledger| ledger.account_id == account_id)
            .filter(|ledger| from.is_none_or(|from| ledger.created_at >= from))
            .filter(|ledger| to.is_none_or(|to| ledger.created_at < to))
            .cloned()
            .collect();
        ledgers.sort_by_key(|ledger| (ledger.created_at, ledger.id));
        Ok(ledgers)
    }
}
