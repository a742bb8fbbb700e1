use crate::schema::{Scenario, TransactionFact};
use log::debug;
use std::collections::BTreeMap;

/// One row as it comes back from the warehouse, keyed by account code rather
/// than report label.
#[derive(Debug, Clone)]
pub struct FactRow {
    pub account_code: String,
    pub customer_id: String,
    pub region_id: String,
    pub subsidiary_id: String,
    pub scenario: Scenario,
    pub value: f64,
}

/// Resolves account codes to report labels. A code with no configured
/// account maps to a synthetic "Unknown Account" label so one stray code
/// surfaces as a visible row instead of sinking the whole aggregation.
pub fn label_facts(
    rows: &[FactRow],
    code_to_label: &BTreeMap<String, String>,
) -> Vec<TransactionFact> {
    rows.iter()
        .map(|row| {
            let account_label = match code_to_label.get(&row.account_code) {
                Some(label) => label.clone(),
                None => {
                    debug!(
                        "No account configured for warehouse code '{}'",
                        row.account_code
                    );
                    format!("Unknown Account {}", row.account_code)
                }
            };

            TransactionFact {
                account_label,
                customer_id: row.customer_id.clone(),
                region_id: row.region_id.clone(),
                subsidiary_id: row.subsidiary_id.clone(),
                scenario: row.scenario,
                value: row.value,
            }
        })
        .collect()
}
