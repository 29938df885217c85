#![deny(clippy::print_stdout, clippy::print_stderr)]

mod memory;

pub use memory::InMemoryFeeRuleRegistry;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use ledger_core::FeeType;
use ledger_core::LedgerResult;
use ledger_core::round_half_even;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;

pub type FeeRuleId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationMethod {
    Fixed,
    Percentage,
    Tiered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeTier {
    pub min_amount: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<i64>,
}

/// FeeRule. A `None` scope field is a wildcard for that
/// dimension; `priority` breaks ties among rules whose windows both cover
/// `now`, highest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeRule {
    pub id: FeeRuleId,
    pub rule_name: String,
    pub transaction_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_kind: Option<ledger_core::AccountKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_type: Option<ledger_core::OwnerType>,
    pub fee_type: FeeType,
    pub calculation_method: CalculationMethod,
    pub fee_value: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_fee: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee: Option<i64>,
    #[serde(default)]
    pub tiers: Vec<FeeTier>,
    pub valid_from: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub priority: i32,
}

/// The inputs `select_rule`/`calculate` need to match and price a fee;
/// deliberately decoupled from `ledger_journal::EntryInput` so this crate
/// has no dependency on the journal writer.
#[derive(Debug, Clone)]
pub struct FeeQuery {
    pub transaction_type: String,
    pub amount: i64,
    pub source_currency: Option<String>,
    pub target_currency: Option<String>,
    pub account_kind: Option<ledger_core::AccountKind>,
    pub owner_type: Option<ledger_core::OwnerType>,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeCalculation {
    pub fee_rule_id: Option<FeeRuleId>,
    pub fee_type: FeeType,
    pub amount: i64,
}

/// Fee Engine storage seam: CRUD over `FeeRule`s, kept
/// separate from the pure selection/calculation logic below so the two can
/// be tested independently, mirroring the teacher's
/// `PolicyRulePersistence`/`PolicyRuleSet::evaluate` split.
#[async_trait]
pub trait FeeRuleRegistry: Send + Sync {
    async fn upsert(&self, rule: FeeRule) -> LedgerResult<FeeRule>;
    async fn list_active(&self, transaction_type: &str) -> LedgerResult<Vec<FeeRule>>;
}

fn scope_matches<T: PartialEq>(scope: Option<&T>, actual: Option<&T>) -> bool {
    match scope {
        None => true,
        Some(expected) => actual == Some(expected),
    }
}

fn specificity(rule: &FeeRule) -> u8 {
    u8::from(rule.source_currency.is_some())
        + u8::from(rule.target_currency.is_some())
        + u8::from(rule.account_kind.is_some())
        + u8::from(rule.owner_type.is_some())
}

/// Filters to rules whose scope and validity window match `query`, then
/// picks by `priority DESC`, breaking ties by most-specific-wins
///.
#[must_use]
pub fn select_rule<'a>(rules: &'a [FeeRule], query: &FeeQuery) -> Option<&'a FeeRule> {
    rules
        .iter()
        .filter(|rule| rule.is_active)
        .filter(|rule| rule.transaction_type == query.transaction_type)
        .filter(|rule| scope_matches(rule.source_currency.as_ref(), query.source_currency.as_ref()))
        .filter(|rule| scope_matches(rule.target_currency.as_ref(), query.target_currency.as_ref()))
        .filter(|rule| scope_matches(rule.account_kind.as_ref(), query.account_kind.as_ref()))
        .filter(|rule| scope_matches(rule.owner_type.as_ref(), query.owner_type.as_ref()))
        .filter(|rule| rule.valid_from <= query.as_of)
        .filter(|rule| rule.valid_to.is_none_or(|valid_to| query.as_of < valid_to))
        .max_by_key(|rule| (rule.priority, specificity(rule)))
}

/// Prices `query.amount` under `rule`'s `calculation_method`, clamping to
/// `[min_fee, max_fee]`. Amounts are already in currency
/// minor units, so `percentage`/`tiered` multiply directly and round once
/// at the end; `fixed` needs no rounding since `fee_value` is stated in
/// minor units already. Returns `None` for `tiered` when no tier's band
/// covers `amount`.
#[must_use]
pub fn apply_rule(rule: &FeeRule, query: &FeeQuery) -> Option<i64> {
    let mut fee = match rule.calculation_method {
        CalculationMethod::Fixed => i64::try_from(rule.fee_value.trunc()).ok()?,
        CalculationMethod::Percentage => {
            let raw = Decimal::from(query.amount) * rule.fee_value;
            i64::try_from(round_half_even(raw)).ok()?
        }
        CalculationMethod::Tiered => {
            let tier = rule.tiers.iter().find(|tier| {
                tier.min_amount <= query.amount
                    && tier.max_amount.is_none_or(|max| query.amount <= max)
            })?;
            let rate_component = tier
                .rate
                .map(|rate| Decimal::from(query.amount) * rate)
                .unwrap_or(Decimal::ZERO);
            let fixed_component = Decimal::from(tier.fixed.unwrap_or(0));
            i64::try_from(round_half_even(rate_component + fixed_component)).ok()?
        }
    };

    if let Some(min_fee) = rule.min_fee {
        fee = fee.max(min_fee);
    }
    if let Some(max_fee) = rule.max_fee {
        fee = fee.min(max_fee);
    }
    Some(fee)
}

/// Selects then prices in one call.
#[must_use]
pub fn calculate(rules: &[FeeRule], query: &FeeQuery) -> Option<FeeCalculation> {
    let rule = select_rule(rules, query)?;
    let amount = apply_rule(rule, query)?;
    Some(FeeCalculation {
        fee_rule_id: Some(rule.id),
        fee_type: rule.fee_type,
        amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base_rule(id: FeeRuleId, priority: i32) -> FeeRule {
        FeeRule {
            id,
            rule_name: "default".into(),
            transaction_type: "withdrawal".into(),
            source_currency: None,
            target_currency: None,
            account_kind: None,
            owner_type: None,
            fee_type: FeeType::Platform,
            calculation_method: CalculationMethod::Percentage,
            fee_value: Decimal::new(1, 2),
            min_fee: None,
            max_fee: None,
            tiers: Vec::new(),
            valid_from: DateTime::UNIX_EPOCH,
            valid_to: None,
            is_active: true,
            priority,
        }
    }

    fn query(amount: i64) -> FeeQuery {
        FeeQuery {
            transaction_type: "withdrawal".into(),
            amount,
            source_currency: Some("USD".into()),
            target_currency: None,
            account_kind: None,
            owner_type: None,
            as_of: Utc::now(),
        }
    }

    #[test]
    fn higher_priority_rule_wins_over_wildcard() {
        let mut specific = base_rule(2, 10);
        specific.source_currency = Some("USD".into());
        let wildcard = base_rule(1, 10);

        let selected = select_rule(&[wildcard, specific], &query(10_000)).expect("rule selected");
        assert_eq!(selected.id, 2);
    }

    #[test]
    fn percentage_fee_rounds_half_even() {
        let rule = base_rule(1, 1);
        let calc = calculate(&[rule], &query(10_000)).expect("fee calculated");
        assert_eq!(calc.amount, 100);
    }

    #[test]
    fn fee_is_clamped_to_max() {
        let mut rule = base_rule(1, 1);
        rule.max_fee = Some(50);
        let calc = calculate(&[rule], &query(10_000)).expect("fee calculated");
        assert_eq!(calc.amount, 50);
    }

    #[test]
    fn tiered_rule_picks_matching_band() {
        let mut rule = base_rule(1, 1);
        rule.calculation_method = CalculationMethod::Tiered;
        rule.tiers = vec![
            FeeTier {
                min_amount: 0,
                max_amount: Some(9_999),
                rate: None,
                fixed: Some(100),
            },
            FeeTier {
                min_amount: 10_000,
                max_amount: None,
                rate: Some(Decimal::new(5, 3)),
                fixed: Some(0),
            },
        ];
        let calc = calculate(&[rule], &query(20_000)).expect("fee calculated");
        assert_eq!(calc.amount, 100);
    }

    #[test]
    fn inactive_rule_is_never_selected() {
        let mut rule = base_rule(1, 100);
        rule.is_active = false;
        assert!(select_rule(&[rule], &query(1_000)).is_none());
    }

    #[test]
    fn expired_rule_is_not_selected() {
        let mut rule = base_rule(1, 100);
        rule.valid_to = Some(DateTime::UNIX_EPOCH);
        assert!(select_rule(&[rule], &query(1_000)).is_none());
    }
}
