#![deny(clippy::print_stdout, clippy::print_stderr)]

mod cache;
mod memory;

pub use cache::CachingFxResolver;
pub use memory::InMemoryFxRateRegistry;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use ledger_core::LedgerResult;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;

pub type FxRateId = u64;

/// FXRate. `rate` is the mid rate applied to ledger amounts;
/// `bid`/`ask`/`spread` are carried verbatim and never used for posting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    pub id: FxRateId,
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread: Option<Decimal>,
    pub valid_from: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct IngestRateRequest {
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub source: String,
}

/// FX Resolver. Implementations may cache `get_rate`
/// lookups; `ingest` must bust any such cache for `(base, quote)` before
/// returning.
#[async_trait]
pub trait FxResolver: Send + Sync {
    async fn get_rate(
        &self,
        base: &str,
        quote: &str,
        as_of: DateTime<Utc>,
    ) -> LedgerResult<FxRate>;
    async fn ingest(&self, request: IngestRateRequest) -> LedgerResult<FxRate>;
}
