use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::Context;
use ledger_orchestrator::TransactionStatus;
use serde::Deserialize;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryCounters {
    pub accounts_created: usize,
    pub transactions_executed: usize,
    pub transactions_pending_approval: usize,
}

#[derive(Debug)]
struct TelemetryStore {
    path: PathBuf,
}

impl TelemetryStore {
    fn from_env() -> Option<Self> {
        let home = env::var_os("LEDGER_HOME")?;
        let mut path = PathBuf::from(home);
        path.push("api");
        path.push("telemetry.json");
        Some(Self { path })
    }

    fn read(&self) -> anyhow::Result<Option<TelemetryCounters>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let counters = serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(Some(counters))
    }

    fn persist(&self, counters: &TelemetryCounters) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let data =
            serde_json::to_vec_pretty(counters).context("failed to encode telemetry counters")?;
        fs::write(&self.path, data)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct TelemetryInner {
    counters: TelemetryCounters,
    store: Option<TelemetryStore>,
}

impl TelemetryInner {
    fn with_store(store: Option<TelemetryStore>) -> Self {
        match store {
            Some(store) => {
                let counters = match store.read() {
                    Ok(Some(existing)) => existing,
                    Ok(None) => TelemetryCounters::default(),
                    Err(err) => {
                        warn!(
                            path = %store.path.display(),
                            error = %err,
                            "failed to load persisted telemetry; continuing with defaults"
                        );
                        TelemetryCounters::default()
                    }
                };
                Self {
                    counters,
                    store: Some(store),
                }
            }
            None => Self::default(),
        }
    }

    fn persist(&self) {
        if let Some(store) = &self.store
            && let Err(err) = store.persist(&self.counters)
        {
            warn!(
                path = %store.path.display(),
                error = %err,
                "failed to persist telemetry counters"
            );
        }
    }
}

/// Facade telemetry: in-process counters, optionally mirrored to a JSON
/// file so they survive process restarts. I/O failures warn and fall back
/// to in-memory defaults rather than propagate.
#[derive(Clone, Default)]
pub struct ApiTelemetry {
    inner: Arc<Mutex<TelemetryInner>>,
}

impl ApiTelemetry {
    #[must_use]
    pub fn new() -> Self {
        Self::from_store(None)
    }

    #[must_use]
    pub fn persistent_from_env() -> Self {
        Self::from_store(TelemetryStore::from_env())
    }

    #[must_use]
    pub fn with_store_path(path: PathBuf) -> Self {
        Self::from_store(Some(TelemetryStore { path }))
    }

    fn from_store(store: Option<TelemetryStore>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TelemetryInner::with_store(store))),
        }
    }

    fn update<F>(&self, mut updater: F)
    where
        F: FnMut(&mut TelemetryCounters) -> bool,
    {
        if let Ok(mut inner) = self.inner.lock()
            && updater(&mut inner.counters)
        {
            inner.persist();
        }
    }

    pub fn record_account_created(&self) {
        self.update(|counters| {
            counters.accounts_created += 1;
            true
        });
    }

    pub fn record_transaction(&self, status: TransactionStatus) {
        self.update(|counters| {
            match status {
                TransactionStatus::Executed => counters.transactions_executed += 1,
                TransactionStatus::PendingApproval => counters.transactions_pending_approval += 1,
            }
            true
        });
    }

    #[must_use]
    pub fn snapshot(&self) -> TelemetryCounters {
        self.inner
            .lock()
            .map(|inner| inner.counters.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn store_path(&self) -> Option<PathBuf> {
        self.inner
            .lock()
            .ok()
            .and_then(|inner| inner.store.as_ref().map(|store| store.path.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn counters_accumulate() {
        let telemetry = ApiTelemetry::new();
        telemetry.record_account_created();
        telemetry.record_account_created();
        telemetry.record_transaction(TransactionStatus::Executed);
        telemetry.record_transaction(TransactionStatus::PendingApproval);
        let counters = telemetry.snapshot();
        assert_eq!(counters.accounts_created, 2);
        assert_eq!(counters.transactions_executed, 1);
        assert_eq!(counters.transactions_pending_approval, 1);
    }

    #[test]
    fn persistence_survives_restart() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("telemetry.json");
        {
            let telemetry = ApiTelemetry::with_store_path(path.clone());
            telemetry.record_account_created();
            telemetry.record_transaction(TransactionStatus::Executed);
        }
        let telemetry = ApiTelemetry::with_store_path(path);
        let counters = telemetry.snapshot();
        assert_eq!(counters.accounts_created, 1);
        assert_eq!(counters.transactions_executed, 1);
    }

    #[test]
    fn persistence_recovers_from_corrupt_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("telemetry.json");
        fs::write(&path, b"not json").expect("write corrupt telemetry");

        let telemetry = ApiTelemetry::with_store_path(path.clone());
        let counters = telemetry.snapshot();
        assert_eq!(counters.accounts_created, 0);

        telemetry.record_account_created();

        let reloaded = ApiTelemetry::with_store_path(path);
        let counters = reloaded.snapshot();
        assert_eq!(counters.accounts_created, 1);

        let stored_path = reloaded.store_path().expect("telemetry path recorded");
        assert!(
            stored_path.ends_with("telemetry.json"),
            "unexpected path: {stored_path:?}"
        );
    }
}
