use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use ledger_accounts::Account;
use ledger_accounts::AccountRegistry;
use ledger_core::AccountKind;
use ledger_core::CurrencyRegistry;
use ledger_core::DrCr;
use ledger_core::LedgerError;
use ledger_core::LedgerResult;
use ledger_core::OwnerType;
use ledger_core::round_half_even;
use ledger_core::scale_factor;
use ledger_fx::FxResolver;
use ledger_journal::JournalFilter;
use ledger_journal::JournalWriter;
use ledger_journal::Ledger;
use rust_decimal::Decimal;

use crate::AccountStatement;
use crate::DailyReport;
use crate::DailyReportLine;
use crate::OwnerStatement;
use crate::OwnerSummary;
use crate::OwnerSummaryLine;
use crate::ReportingService;
use crate::SystemHoldings;
use crate::SystemHoldingsLine;
use crate::TransactionSummaryLine;

/// Statement & Reporting, grounded on
/// `codex-ledger::memory::list_audit_trail`'s cursor-over-a-sorted-vec shape
/// and `codex-accounting-api::reconciliation`'s windowed-scan-then-aggregate
/// shape. Holds no state of its own; every call scans the journal/account
/// services it wraps.
pub struct InMemoryReportingService {
    accounts: Arc<dyn AccountRegistry>,
    journals: Arc<dyn JournalWriter>,
    fx: Arc<dyn FxResolver>,
    currencies: Arc<dyn CurrencyRegistry>,
}

impl InMemoryReportingService {
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountRegistry>,
        journals: Arc<dyn JournalWriter>,
        fx: Arc<dyn FxResolver>,
        currencies: Arc<dyn CurrencyRegistry>,
    ) -> Self {
        Self {
            accounts,
            journals,
            fx,
            currencies,
        }
    }

    async fn statement_for_account(
        &self,
        account: &Account,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<AccountStatement> {
        let history = self
            .journals
            .list_ledgers_by_account(account.id, None, Some(to))
            .await?;

        let opening_balance = history
            .iter()
            .rev()
            .find(|entry| entry.created_at < from)
            .and_then(|entry| entry.balance_after)
            .unwrap_or(0);

        let closing_balance = history
            .last()
            .and_then(|entry| entry.balance_after)
            .unwrap_or(opening_balance);

        let window: Vec<Ledger> = history
            .into_iter()
            .filter(|entry| entry.created_at >= from)
            .collect();

        let mut total_debits = 0i64;
        let mut total_credits = 0i64;
        for entry in &window {
            match entry.dr_cr {
                DrCr::Dr => total_debits += entry.amount,
                DrCr::Cr => total_credits += entry.amount,
            }
        }

        Ok(AccountStatement {
            account_number: account.account_number.clone(),
            currency: account.currency.clone(),
            from,
            to,
            opening_balance,
            closing_balance,
            total_debits,
            total_credits,
            entries: window,
        })
    }

    async fn convert_to_reporting_currency(&self, amount: i64, from_currency: &str, reporting_currency: &str) -> LedgerResult<i64> {
        if from_currency == reporting_currency || amount == 0 {
            return Ok(amount);
        }
        let source = self.currencies.get(from_currency)?;
        let target = self.currencies.get(reporting_currency)?;
        let fx_rate = self
            .fx
            .get_rate(from_currency, reporting_currency, Utc::now())
            .await?;
        let raw =
            Decimal::from(amount) * fx_rate.rate * scale_factor(target.decimals) / scale_factor(source.decimals);
        i64::try_from(round_half_even(raw))
            .map_err(|_| LedgerError::Internal("reporting currency conversion overflow".into()))
    }
}

#[async_trait]
impl ReportingService for InMemoryReportingService {
    async fn get_account_statement(
        &self,
        account_number: &str,
        account_kind: AccountKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<AccountStatement> {
        let account = self.accounts.get_by_number(account_number).await?;
        if account.account_kind != account_kind {
            return Err(LedgerError::FailedPrecondition(format!(
                "account {account_number} is scoped to {:?}, not {account_kind:?}",
                account.account_kind
            )));
        }
        self.statement_for_account(&account, from, to).await
    }

    async fn get_owner_statement(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
        account_kind: AccountKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<OwnerStatement> {
        let accounts = self
            .accounts
            .list_by_owner(owner_type, owner_id, Some(account_kind))
            .await?;
        let mut statements = Vec::with_capacity(accounts.len());
        for account in &accounts {
            statements.push(self.statement_for_account(account, from, to).await?);
        }
        Ok(OwnerStatement {
            owner_type,
            owner_id: owner_id.to_string(),
            statements,
        })
    }

    async fn get_owner_summary(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
        account_kind: AccountKind,
        reporting_currency: &str,
    ) -> LedgerResult<OwnerSummary> {
        let accounts = self
            .accounts
            .list_by_owner(owner_type, owner_id, Some(account_kind))
            .await?;
        let mut lines = Vec::with_capacity(accounts.len());
        let mut total_in_reporting_currency = 0i64;
        for account in &accounts {
            let balance = self.accounts.get_balance(account.id).await?;
            let converted = self
                .convert_to_reporting_currency(balance.balance, &account.currency, reporting_currency)
                .await?;
            total_in_reporting_currency += converted;
            lines.push(OwnerSummaryLine {
                account_number: account.account_number.clone(),
                currency: account.currency.clone(),
                balance: balance.balance,
                reporting_currency_value: converted,
            });
        }
        Ok(OwnerSummary {
            owner_type,
            owner_id: owner_id.to_string(),
            reporting_currency: reporting_currency.to_string(),
            lines,
            total_in_reporting_currency,
        })
    }

    async fn generate_daily_report(
        &self,
        date: NaiveDate,
        account_kind: AccountKind,
    ) -> LedgerResult<DailyReport> {
        let from = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| LedgerError::Internal("invalid report date".into()))?
            .and_utc();
        let to = from + chrono::Duration::days(1);

        let journals = self
            .journals
            .list_journals(JournalFilter {
                account_kind: Some(account_kind),
                transaction_type: None,
                from: Some(from),
                to: Some(to),
            })
            .await?;

        let mut totals: HashMap<(OwnerType, String, u64, String), (i64, i64)> = HashMap::new();
        for journal in &journals {
            let ledgers = self.journals.list_ledgers_by_journal(journal.id).await?;
            for entry in ledgers {
                let account = self.accounts.get_by_id(entry.account_id).await?;
                let key = (account.owner_type, account.owner_id.clone(), account.id, entry.currency.clone());
                let bucket = totals.entry(key).or_insert((0, 0));
                match entry.dr_cr {
                    DrCr::Dr => bucket.0 += entry.amount,
                    DrCr::Cr => bucket.1 += entry.amount,
                }
            }
        }

        let mut lines: Vec<DailyReportLine> = totals
            .into_iter()
            .map(|((owner_type, owner_id, account_id, currency), (debits, credits))| DailyReportLine {
                owner_type,
                owner_id,
                account_id,
                currency,
                total_debits: debits,
                total_credits: credits,
            })
            .collect();
        lines.sort_by(|a, b| (&a.owner_id, a.account_id).cmp(&(&b.owner_id, b.account_id)));

        Ok(DailyReport {
            date,
            account_kind,
            lines,
        })
    }

    async fn get_transaction_summary(
        &self,
        account_kind: AccountKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> LedgerResult<Vec<TransactionSummaryLine>> {
        let journals = self
            .journals
            .list_journals(JournalFilter {
                account_kind: Some(account_kind),
                transaction_type: None,
                from: Some(from),
                to: Some(to),
            })
            .await?;

        let mut buckets: HashMap<(String, String), Vec<i64>> = HashMap::new();
        for journal in &journals {
            let ledgers = self.journals.list_ledgers_by_journal(journal.id).await?;
            let Some(representative) = ledgers.first() else {
                continue;
            };
            buckets
                .entry((journal.transaction_type.clone(), representative.currency.clone()))
                .or_default()
                .push(representative.amount);
        }

        let mut summaries: Vec<TransactionSummaryLine> = buckets
            .into_iter()
            .map(|((transaction_type, currency), amounts)| {
                let count = amounts.len() as u64;
                let total: i64 = amounts.iter().sum();
                let min = amounts.iter().copied().min().unwrap_or(0);
                let max = amounts.iter().copied().max().unwrap_or(0);
                let average = i64::try_from(round_half_even(Decimal::from(total) / Decimal::from(count.max(1))))
                    .unwrap_or(0);
                TransactionSummaryLine {
                    transaction_type,
                    currency,
                    count,
                    total,
                    min,
                    max,
                    average,
                }
            })
            .collect();
        summaries.sort_by(|a, b| (&a.transaction_type, &a.currency).cmp(&(&b.transaction_type, &b.currency)));
        Ok(summaries)
    }

    async fn get_system_holdings(&self, account_kind: AccountKind) -> LedgerResult<SystemHoldings> {
        let accounts = self
            .accounts
            .list_by_owner_type(OwnerType::System, Some(account_kind))
            .await?;

        let mut totals: HashMap<String, i64> = HashMap::new();
        for account in &accounts {
            let balance = self.accounts.get_balance(account.id).await?;
            *totals.entry(account.currency.clone()).or_insert(0) += balance.balance;
        }

        let mut lines: Vec<SystemHoldingsLine> = totals
            .into_iter()
            .map(|(currency, total)| SystemHoldingsLine { currency, total })
            .collect();
        lines.sort_by(|a, b| a.currency.cmp(&b.currency));

        Ok(SystemHoldings {
            account_kind,
            lines,
        })
    }
}
