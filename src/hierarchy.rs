use crate::error::{ReportError, Result};
use crate::schema::{AccountHierarchyConfig, AccountNode};
use log::warn;
use std::collections::{BTreeMap, BTreeSet};

/// Maps each parent label to its child labels, in the order the children
/// appear in the input. Nodes without a parent do not appear as keys unless
/// something lists them as a parent; nodes with a blank label are skipped.
pub fn build_children_map(accounts: &[AccountNode]) -> BTreeMap<String, Vec<String>> {
    let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for account in accounts {
        if account.label.is_empty() {
            continue;
        }
        if let Some(parent) = &account.parent {
            children
                .entry(parent.clone())
                .or_default()
                .push(account.label.clone());
        }
    }

    children
}

/// The account tree for one report request, validated at load time.
#[derive(Debug, Clone)]
pub struct AccountHierarchy {
    accounts: BTreeMap<String, AccountNode>,
    children: BTreeMap<String, Vec<String>>,
    roots: Vec<String>,
    income_label: String,
}

impl AccountHierarchy {
    pub fn from_config(config: &AccountHierarchyConfig) -> Result<Self> {
        let mut accounts = BTreeMap::new();
        let mut roots = Vec::new();

        for node in &config.accounts {
            if node.label.is_empty() {
                continue;
            }
            if accounts
                .insert(node.label.clone(), node.clone())
                .is_some()
            {
                return Err(ReportError::DuplicateAccount(node.label.clone()));
            }
            if node.parent.is_none() {
                roots.push(node.label.clone());
            }
        }

        detect_cycles(&accounts)?;

        for node in accounts.values() {
            if let Some(parent) = &node.parent {
                if !accounts.contains_key(parent) {
                    warn!(
                        "Account '{}' references unknown parent '{}'; its subtree will not reach any report section",
                        node.label, parent
                    );
                }
            }
        }

        let children = build_children_map(&config.accounts);

        Ok(Self {
            accounts,
            children,
            roots,
            income_label: config.income_label.clone(),
        })
    }

    pub fn accounts(&self) -> &BTreeMap<String, AccountNode> {
        &self.accounts
    }

    pub fn children_map(&self) -> &BTreeMap<String, Vec<String>> {
        &self.children
    }

    /// Section accounts (no parent), in configuration order.
    pub fn root_sections(&self) -> Vec<&AccountNode> {
        self.roots
            .iter()
            .filter_map(|label| self.accounts.get(label))
            .collect()
    }

    pub fn income_label(&self) -> &str {
        &self.income_label
    }

    /// Warehouse code -> label lookup for ingestion.
    pub fn code_to_label(&self) -> BTreeMap<String, String> {
        self.accounts
            .values()
            .filter_map(|node| node.code.clone().map(|code| (code, node.label.clone())))
            .collect()
    }
}

/// Walks every parent chain once. A label revisited within a single walk is
/// a cycle and must be rejected at load time rather than surfacing as
/// runaway recursion during rollup.
fn detect_cycles(accounts: &BTreeMap<String, AccountNode>) -> Result<()> {
    let mut known_acyclic: BTreeSet<&str> = BTreeSet::new();

    for start in accounts.keys() {
        let mut walked: Vec<&str> = Vec::new();
        let mut current = start.as_str();

        loop {
            if known_acyclic.contains(current) {
                break;
            }
            if walked.contains(&current) {
                return Err(ReportError::AccountCycle(current.to_string()));
            }
            walked.push(current);

            match accounts.get(current).and_then(|n| n.parent.as_deref()) {
                Some(parent) if accounts.contains_key(parent) => current = parent,
                _ => break,
            }
        }

        known_acyclic.extend(walked);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(label: &str, parent: Option<&str>) -> AccountNode {
        AccountNode {
            label: label.to_string(),
            parent: parent.map(|p| p.to_string()),
            code: None,
            display_excluded: false,
            operational_excluded: false,
            double_lines: false,
        }
    }

    #[test]
    fn test_children_map_order_and_membership() {
        let accounts = vec![
            node("Income", None),
            node("Room Revenue", Some("Income")),
            node("Ancillary Revenue", Some("Income")),
            node("Expenses", None),
            node("Wages", Some("Expenses")),
        ];

        let children = build_children_map(&accounts);

        assert_eq!(
            children.get("Income").unwrap(),
            &vec!["Room Revenue".to_string(), "Ancillary Revenue".to_string()]
        );
        assert_eq!(children.get("Expenses").unwrap(), &vec!["Wages".to_string()]);
        assert!(!children.contains_key("Wages"));
    }

    #[test]
    fn test_children_map_skips_blank_labels() {
        let accounts = vec![node("Income", None), node("", Some("Income"))];
        let children = build_children_map(&accounts);
        assert!(!children.contains_key("Income"));
    }

    #[test]
    fn test_hierarchy_detects_cycle() {
        let config = AccountHierarchyConfig {
            accounts: vec![node("A", Some("B")), node("B", Some("A"))],
            income_label: "Income".to_string(),
        };

        let result = AccountHierarchy::from_config(&config);
        assert!(matches!(result, Err(ReportError::AccountCycle(_))));
    }

    #[test]
    fn test_hierarchy_detects_self_cycle() {
        let config = AccountHierarchyConfig {
            accounts: vec![node("A", Some("A"))],
            income_label: "Income".to_string(),
        };

        let result = AccountHierarchy::from_config(&config);
        assert!(matches!(result, Err(ReportError::AccountCycle(_))));
    }

    #[test]
    fn test_hierarchy_rejects_duplicate_labels() {
        let config = AccountHierarchyConfig {
            accounts: vec![node("Income", None), node("Income", None)],
            income_label: "Income".to_string(),
        };

        let result = AccountHierarchy::from_config(&config);
        assert!(matches!(result, Err(ReportError::DuplicateAccount(_))));
    }

    #[test]
    fn test_root_sections_keep_config_order() {
        let config = AccountHierarchyConfig {
            accounts: vec![
                node("Income", None),
                node("Expenses", None),
                node("Wages", Some("Expenses")),
            ],
            income_label: "Income".to_string(),
        };

        let hierarchy = AccountHierarchy::from_config(&config).unwrap();
        let roots: Vec<&str> = hierarchy
            .root_sections()
            .iter()
            .map(|n| n.label.as_str())
            .collect();
        assert_eq!(roots, vec!["Income", "Expenses"]);
    }

    #[test]
    fn test_unknown_parent_is_not_an_error() {
        let config = AccountHierarchyConfig {
            accounts: vec![node("Orphan", Some("Missing"))],
            income_label: "Income".to_string(),
        };

        assert!(AccountHierarchy::from_config(&config).is_ok());
    }
}
