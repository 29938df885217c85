use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ledger_core::AccountKind;
use ledger_core::AccountPurpose;
use ledger_core::DrCr;
use ledger_core::IdGenerator;
use ledger_core::LedgerError;
use ledger_core::LedgerResult;
use ledger_core::OwnerType;
use tokio::sync::RwLock;

use crate::Account;
use crate::AccountId;
use crate::AccountRegistry;
use crate::Balance;
use crate::BalanceStore;
use crate::CreateAccountRequest;
use crate::UpdateAccountRequest;

type OwnerKey = (OwnerType, String, String, AccountPurpose, AccountKind);

struct AccountRow {
    account: Account,
    balance: Balance,
}

#[derive(Default)]
struct State {
    accounts: HashMap<AccountId, AccountRow>,
    by_number: HashMap<String, AccountId>,
    by_owner_triple: HashMap<OwnerKey, AccountId>,
}

/// In-memory `AccountRegistry` + `BalanceStore`. Account and Balance are
/// always locked together: this workspace's in-process analogue of "the
/// same DB transaction".
pub struct InMemoryAccountService {
    ids: Arc<IdGenerator>,
    state: RwLock<State>,
}

impl InMemoryAccountService {
    #[must_use]
    pub fn new(ids: Arc<IdGenerator>) -> Self {
        Self {
            ids,
            state: RwLock::new(State::default()),
        }
    }

    fn owner_key(
        owner_type: OwnerType,
        owner_id: &str,
        currency: &str,
        purpose: AccountPurpose,
        account_kind: AccountKind,
    ) -> OwnerKey {
        (
            owner_type,
            owner_id.to_string(),
            currency.to_string(),
            purpose,
            account_kind,
        )
    }

    fn account_number(account_kind: AccountKind, currency: &str, id: AccountId) -> String {
        let scope = match account_kind {
            AccountKind::Real => "R",
            AccountKind::Demo => "D",
            AccountKind::System => "S",
        };
        format!("{scope}-{currency}-{id:012}")
    }

    fn insert_locked(state: &mut State, request: CreateAccountRequest, id: AccountId) -> Account {
        let now = Utc::now();
        let account = Account {
            id,
            account_number: Self::account_number(request.account_kind, &request.currency, id),
            owner_type: request.owner_type,
            owner_id: request.owner_id,
            currency: request.currency,
            purpose: request.purpose,
            account_kind: request.account_kind,
            is_active: true,
            is_locked: false,
            overdraft_limit: request.overdraft_limit,
            parent_agent_external_id: request.parent_agent_external_id,
            commission_rate: request.commission_rate,
            created_at: now,
            updated_at: now,
        };
        let balance = Balance::zero(id, now);

        let key = Self::owner_key(
            account.owner_type,
            &account.owner_id,
            &account.currency,
            account.purpose,
            account.account_kind,
        );
        state.by_number.insert(account.account_number.clone(), id);
        state.by_owner_triple.insert(key, id);
        state.accounts.insert(
            id,
            AccountRow {
                account: account.clone(),
                balance,
            },
        );
        account
    }
}

#[async_trait]
impl AccountRegistry for InMemoryAccountService {
    async fn create(&self, request: CreateAccountRequest) -> LedgerResult<Account> {
        if request.overdraft_limit < 0 {
            return Err(LedgerError::InvalidArgument(
                "overdraft_limit must not be negative".into(),
            ));
        }

        let mut state = self.state.write().await;
        let key = Self::owner_key(
            request.owner_type,
            &request.owner_id,
            &request.currency,
            request.purpose,
            request.account_kind,
        );
        if state.by_owner_triple.contains_key(&key) {
            return Err(LedgerError::AlreadyExists(format!(
                "account already exists for owner {:?}/{} currency {} purpose {:?} kind {:?}",
                request.owner_type,
                request.owner_id,
                request.currency,
                request.purpose,
                request.account_kind
            )));
        }

        let id = self.ids.next_id()?;
        Ok(Self::insert_locked(&mut state, request, id))
    }

    async fn get_by_id(&self, account_id: AccountId) -> LedgerResult<Account> {
        let state = self.state.read().await;
        state
            .accounts
            .get(&account_id)
            .map(|row| row.account.clone())
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))
    }

    async fn get_by_number(&self, account_number: &str) -> LedgerResult<Account> {
        let state = self.state.read().await;
        let id = state
            .by_number
            .get(account_number)
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_number}")))?;
        Ok(state.accounts[id].account.clone())
    }

    async fn list_by_owner(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
        account_kind: Option<AccountKind>,
    ) -> LedgerResult<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .map(|row| &row.account)
            .filter(|account| account.owner_type == owner_type && account.owner_id == owner_id)
            .filter(|account| account_kind.is_none_or(|kind| account.account_kind == kind))
            .cloned()
            .collect();
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }

    async fn list_by_owner_type(
        &self,
        owner_type: OwnerType,
        account_kind: Option<AccountKind>,
    ) -> LedgerResult<Vec<Account>> {
        let state = self.state.read().await;
        let mut accounts: Vec<Account> = state
            .accounts
            .values()
            .map(|row| &row.account)
            .filter(|account| account.owner_type == owner_type)
            .filter(|account| account_kind.is_none_or(|kind| account.account_kind == kind))
            .cloned()
            .collect();
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }

    async fn get_or_create_user_accounts(
        &self,
        owner_type: OwnerType,
        owner_id: &str,
        account_kind: AccountKind,
        currencies: &[String],
    ) -> LedgerResult<Vec<Account>> {
        let mut state = self.state.write().await;
        let mut accounts = Vec::with_capacity(currencies.len());

        for currency in currencies {
            let key = Self::owner_key(
                owner_type,
                owner_id,
                currency,
                AccountPurpose::Wallet,
                account_kind,
            );
            if let Some(id) = state.by_owner_triple.get(&key) {
                accounts.push(state.accounts[id].account.clone());
                continue;
            }

            let id = self.ids.next_id()?;
            let request = CreateAccountRequest {
                owner_type,
                owner_id: owner_id.to_string(),
                currency: currency.clone(),
                purpose: AccountPurpose::Wallet,
                account_kind,
                overdraft_limit: 0,
                parent_agent_external_id: None,
                commission_rate: None,
            };
            accounts.push(Self::insert_locked(&mut state, request, id));
        }

        Ok(accounts)
    }

    async fn update(
        &self,
        account_id: AccountId,
        request: UpdateAccountRequest,
    ) -> LedgerResult<Account> {
        if let Some(limit) = request.overdraft_limit
            && limit < 0
        {
            return Err(LedgerError::InvalidArgument(
                "overdraft_limit must not be negative".into(),
            ));
        }

        let mut state = self.state.write().await;
        let row = state
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))?;

        if let Some(is_active) = request.is_active {
            row.account.is_active = is_active;
        }
        if let Some(is_locked) = request.is_locked {
            row.account.is_locked = is_locked;
        }
        if let Some(overdraft_limit) = request.overdraft_limit {
            row.account.overdraft_limit = overdraft_limit;
        }
        row.account.updated_at = Utc::now();
        Ok(row.account.clone())
    }

    async fn get_balance(&self, account_id: AccountId) -> LedgerResult<Balance> {
        let state = self.state.read().await;
        state
            .accounts
            .get(&account_id)
            .map(|row| row.balance)
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))
    }
}

#[async_trait]
impl BalanceStore for InMemoryAccountService {
    async fn apply(
        &self,
        account_id: AccountId,
        dr_cr: DrCr,
        amount: i64,
        expected_version: u64,
    ) -> LedgerResult<Balance> {
        if amount <= 0 {
            return Err(LedgerError::InvalidArgument(
                "ledger amount must be positive".into(),
            ));
        }

        let mut state = self.state.write().await;
        let row = state
            .accounts
            .get_mut(&account_id)
            .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))?;

        if row.balance.version != expected_version {
            return Err(LedgerError::Aborted(format!(
                "balance version mismatch for account {account_id}: expected {expected_version}, found {}",
                row.balance.version
            )));
        }

        match dr_cr {
            DrCr::Dr => {
                let floor = -row.account.overdraft_limit;
                if row.balance.balance - amount < floor {
                    return Err(LedgerError::FailedPrecondition(format!(
                        "insufficient balance on account {account_id}"
                    )));
                }
                row.balance.balance -= amount;
            }
            DrCr::Cr => {
                row.balance.balance += amount;
            }
        }
        // Open Question 1 (DESIGN.md): available_balance always tracks
        // balance exactly; pending_debit/pending_credit stay zero until a
        // two-phase posting model exists.
        row.balance.available_balance = row.balance.balance;
        row.balance.version += 1;
        row.balance.updated_at = Utc::now();
        Ok(row.balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service() -> InMemoryAccountService {
        InMemoryAccountService::new(Arc::new(IdGenerator::new(1)))
    }

    fn request() -> CreateAccountRequest {
        CreateAccountRequest {
            owner_type: OwnerType::User,
            owner_id: "user-1".into(),
            currency: "USD".into(),
            purpose: AccountPurpose::Wallet,
            account_kind: AccountKind::Real,
            overdraft_limit: 0,
            parent_agent_external_id: None,
            commission_rate: None,
        }
    }

    #[tokio::test]
    async fn create_then_duplicate_fails() {
        let service = service();
        let account = service.create(request()).await.expect("create succeeds");
        assert!(account.is_active);
        assert!(!account.is_locked);

        let err = service.create(request()).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn get_or_create_user_accounts_is_idempotent() {
        let service = service();
        let currencies = vec!["USD".to_string(), "EUR".to_string()];
        let first = service
            .get_or_create_user_accounts(OwnerType::User, "user-2", AccountKind::Real, &currencies)
            .await
            .expect("first call creates");
        let second = service
            .get_or_create_user_accounts(OwnerType::User, "user-2", AccountKind::Real, &currencies)
            .await
            .expect("second call returns same accounts");

        assert_eq!(first.len(), 2);
        assert_eq!(
            first.iter().map(|a| a.id).collect::<Vec<_>>(),
            second.iter().map(|a| a.id).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn list_by_owner_type_ignores_owner_id() {
        let service = service();
        service.create(request()).await.expect("user-1 account");
        let mut other = request();
        other.owner_id = "user-2".into();
        service.create(other).await.expect("user-2 account");
        let mut system = request();
        system.owner_type = OwnerType::System;
        system.owner_id = "system".into();
        service.create(system).await.expect("system account");

        let users = service
            .list_by_owner_type(OwnerType::User, None)
            .await
            .expect("list");
        assert_eq!(users.len(), 2);

        let system_accounts = service
            .list_by_owner_type(OwnerType::System, None)
            .await
            .expect("list");
        assert_eq!(system_accounts.len(), 1);
    }

    #[tokio::test]
    async fn apply_rejects_overdraft_breach() {
        let service = service();
        let account = service.create(request()).await.expect("create");

        let err = service
            .apply(account.id, DrCr::Dr, 1_000, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn apply_detects_version_mismatch() {
        let service = service();
        let account = service.create(request()).await.expect("create");
        service
            .apply(account.id, DrCr::Cr, 100, 0)
            .await
            .expect("first credit");

        let err = service
            .apply(account.id, DrCr::Cr, 100, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Aborted(_)));
    }

    #[tokio::test]
    async fn credit_then_debit_round_trips_to_zero() {
        let service = service();
        let account = service.create(request()).await.expect("create");

        let after_credit = service
            .apply(account.id, DrCr::Cr, 5_000, 0)
            .await
            .expect("credit");
        assert_eq!(after_credit.balance, 5_000);

        let after_debit = service
            .apply(account.id, DrCr::Dr, 5_000, after_credit.version)
            .await
            .expect("debit");
        assert_eq!(after_debit.balance, 0);
        assert_eq!(after_debit.available_balance, 0);
    }
}
