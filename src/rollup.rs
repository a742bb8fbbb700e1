use crate::schema::{AccountNode, Scenario, TransactionFact};
use std::collections::BTreeMap;

/// Which exclusion flags apply when summing a child subtree into its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupMode {
    /// Skip children flagged `display_excluded`.
    Display,
    /// Skip children flagged `operational_excluded` or `display_excluded`.
    Operational,
}

/// Sums raw fact values per account label for one scenario. The result is
/// the `raw_totals` input to [`compute_rollups`]. Accepts any borrowed fact
/// iterator so callers can feed pre-filtered in-memory slices without
/// copying.
pub fn sum_by_account<'a, I>(facts: I, scenario: Scenario) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a TransactionFact>,
{
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();

    for fact in facts {
        if fact.scenario != scenario {
            continue;
        }
        *totals.entry(fact.account_label.clone()).or_insert(0.0) += fact.value;
    }

    totals
}

/// Computes the aggregated value of every account in `accounts`: the
/// account's own raw total plus the rolled-up totals of its non-excluded
/// children. Children are always recursed so the memo table is complete
/// regardless of visitation order; exclusion only controls whether a child's
/// total is added to its parent.
///
/// Labels listed in `children_map` but missing from `accounts` contribute
/// zero and are skipped. Raw totals under labels with no configured account
/// (e.g. the synthetic "Unknown Account" rows from ingestion) pass through
/// unchanged as their own entries, so stray codes stay visible without
/// feeding any parent. The account parent graph must already have passed the
/// load-time cycle check.
pub fn compute_rollups(
    raw_totals: &BTreeMap<String, f64>,
    accounts: &BTreeMap<String, AccountNode>,
    children_map: &BTreeMap<String, Vec<String>>,
    mode: RollupMode,
) -> BTreeMap<String, f64> {
    let mut memo: BTreeMap<String, f64> = BTreeMap::new();

    for label in accounts.keys() {
        rollup_label(label, raw_totals, accounts, children_map, mode, &mut memo);
    }

    for (label, &value) in raw_totals {
        if !accounts.contains_key(label) {
            memo.insert(label.clone(), value);
        }
    }

    memo
}

fn rollup_label(
    label: &str,
    raw_totals: &BTreeMap<String, f64>,
    accounts: &BTreeMap<String, AccountNode>,
    children_map: &BTreeMap<String, Vec<String>>,
    mode: RollupMode,
    memo: &mut BTreeMap<String, f64>,
) -> f64 {
    if let Some(&cached) = memo.get(label) {
        return cached;
    }

    let mut total = raw_totals.get(label).copied().unwrap_or(0.0);

    if let Some(children) = children_map.get(label) {
        for child in children {
            let Some(child_node) = accounts.get(child) else {
                continue;
            };

            let child_total =
                rollup_label(child, raw_totals, accounts, children_map, mode, memo);

            let excluded = match mode {
                RollupMode::Display => child_node.display_excluded,
                RollupMode::Operational => {
                    child_node.operational_excluded || child_node.display_excluded
                }
            };

            if !excluded {
                total += child_total;
            }
        }
    }

    memo.insert(label.to_string(), total);
    total
}
