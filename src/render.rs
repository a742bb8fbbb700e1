use crate::format::{format_amount, format_percent};
use crate::hierarchy::AccountHierarchy;
use crate::schema::AccountNode;
use crate::utils::year_start_for;
use crate::{ReportLevel, ReportNode};
use chrono::NaiveDate;
use std::collections::BTreeSet;

struct DisplayRow {
    label: String,
    depth: usize,
    double_lines: bool,
}

/// Account rows in presentation order: sections first, children depth-first,
/// display-excluded subtrees hidden. Synthetic labels that appear in the
/// rollup maps but not in the hierarchy (unknown account codes) are appended
/// at the end so they stay visible.
fn display_rows(hierarchy: &AccountHierarchy, node: &ReportNode) -> Vec<DisplayRow> {
    let mut rows = Vec::new();

    for section in hierarchy.root_sections() {
        push_subtree(hierarchy, section, 0, &mut rows);
    }

    let known: BTreeSet<&String> = rows.iter().map(|r| &r.label).collect();
    let mut extras: Vec<&String> = node
        .month_actual
        .keys()
        .chain(node.month_budget.keys())
        .chain(node.ytd_actual.keys())
        .chain(node.ytd_budget.keys())
        .filter(|label| !known.contains(label) && hierarchy.accounts().get(*label).is_none())
        .collect();
    extras.sort();
    extras.dedup();

    for label in extras {
        rows.push(DisplayRow {
            label: label.clone(),
            depth: 0,
            double_lines: false,
        });
    }

    rows
}

fn push_subtree(
    hierarchy: &AccountHierarchy,
    account: &AccountNode,
    depth: usize,
    rows: &mut Vec<DisplayRow>,
) {
    if account.display_excluded {
        return;
    }

    rows.push(DisplayRow {
        label: account.label.clone(),
        depth,
        double_lines: account.double_lines,
    });

    if let Some(children) = hierarchy.children_map().get(&account.label) {
        for child in children {
            if let Some(child_node) = hierarchy.accounts().get(child) {
                push_subtree(hierarchy, child_node, depth + 1, rows);
            }
        }
    }
}

/// Header text for one node, composed exactly once from the final child
/// counts.
fn header(node: &ReportNode) -> String {
    match node.level {
        ReportLevel::Subsidiary => format!(
            "# {} — Subsidiary P&L\n\nRegions: {} · Districts: {} · Facilities: {}\n",
            node.name, node.counts.regions, node.counts.districts, node.counts.facilities
        ),
        ReportLevel::Region => format!(
            "## Region: {} (Districts: {}, Facilities: {})\n",
            node.name, node.counts.districts, node.counts.facilities
        ),
        ReportLevel::District => format!(
            "### District: {} (Facilities: {})\n",
            node.name, node.counts.facilities
        ),
        ReportLevel::Facility => {
            let mut line = format!("#### Facility: {}", node.name);
            if let Some(census) = node.census {
                line.push_str(&format!(" — Census: {:.0}", census));
            }
            if let Some(start) = node.start_date {
                line.push_str(&format!(" — Opened: {}", start.format("%Y-%m-%d")));
            }
            line.push('\n');
            line
        }
    }
}

fn value_cells(node: &ReportNode, income_label: &str, label: &str) -> [String; 8] {
    let columns = [
        &node.month_actual,
        &node.month_budget,
        &node.ytd_actual,
        &node.ytd_budget,
    ];

    let mut cells: Vec<String> = Vec::with_capacity(8);
    for rollups in columns {
        let value = rollups.get(label).copied().unwrap_or(0.0);
        let income = rollups.get(income_label).copied().unwrap_or(0.0);
        cells.push(format_amount(value));
        cells.push(format_percent(value, income));
    }

    cells.try_into().unwrap()
}

impl ReportNode {
    pub fn to_markdown(&self, hierarchy: &AccountHierarchy, period_date: NaiveDate) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Period: {} (month) / {} – {} (YTD)\n\n",
            period_date.format("%B %Y"),
            year_start_for(period_date).format("%Y-%m-%d"),
            period_date.format("%Y-%m-%d"),
        ));

        self.markdown_section(hierarchy, &mut output);
        output
    }

    fn markdown_section(&self, hierarchy: &AccountHierarchy, output: &mut String) {
        output.push_str(&header(self));
        output.push('\n');

        output.push_str(
            "| Account | Month Actual | % | Month Budget | % | YTD Actual | % | YTD Budget | % |\n",
        );
        output.push_str("|---|---:|---:|---:|---:|---:|---:|---:|---:|\n");

        let income_label = hierarchy.income_label();
        for row in display_rows(hierarchy, self) {
            let indent = "\u{a0}\u{a0}".repeat(row.depth);
            let label = if row.double_lines {
                format!("**{}**", row.label)
            } else {
                row.label.clone()
            };
            let cells = value_cells(self, income_label, &row.label);
            output.push_str(&format!(
                "| {}{} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
                indent,
                label,
                cells[0],
                cells[1],
                cells[2],
                cells[3],
                cells[4],
                cells[5],
                cells[6],
                cells[7],
            ));
        }
        output.push('\n');

        for child in &self.children {
            child.markdown_section(hierarchy, output);
        }
    }

    pub fn to_csv(&self, hierarchy: &AccountHierarchy) -> String {
        let mut output = String::new();
        output.push_str(
            "Level,Name,Account,Month Actual,Month Actual %,Month Budget,Month Budget %,YTD Actual,YTD Actual %,YTD Budget,YTD Budget %\n",
        );
        self.csv_rows(hierarchy, &mut output);
        output
    }

    fn csv_rows(&self, hierarchy: &AccountHierarchy, output: &mut String) {
        let income_label = hierarchy.income_label();
        for row in display_rows(hierarchy, self) {
            let cells = value_cells(self, income_label, &row.label);
            output.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{}\n",
                self.level.label(),
                csv_escape(&self.name),
                csv_escape(&row.label),
                cells[0],
                cells[1],
                cells[2],
                cells[3],
                cells[4],
                cells[5],
                cells[6],
                cells[7],
            ));
        }

        for child in &self.children {
            child.csv_rows(hierarchy, output);
        }
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AccountHierarchyConfig, AccountNode};
    use crate::{ChildCounts, ReportLevel};
    use std::collections::BTreeMap;

    fn account(label: &str, parent: Option<&str>) -> AccountNode {
        AccountNode {
            label: label.to_string(),
            parent: parent.map(|p| p.to_string()),
            code: None,
            display_excluded: false,
            operational_excluded: false,
            double_lines: false,
        }
    }

    fn hierarchy() -> AccountHierarchy {
        let config = AccountHierarchyConfig {
            accounts: vec![
                account("Income", None),
                account("Room Revenue", Some("Income")),
                account("Expenses", None),
            ],
            income_label: "Income".to_string(),
        };
        AccountHierarchy::from_config(&config).unwrap()
    }

    fn leaf(values: &[(&str, f64)]) -> ReportNode {
        let map: BTreeMap<String, f64> = values
            .iter()
            .map(|(label, v)| (label.to_string(), *v))
            .collect();
        ReportNode {
            level: ReportLevel::Facility,
            name: "Sunrise Manor".to_string(),
            month_actual: map.clone(),
            month_budget: map.clone(),
            ytd_actual: map.clone(),
            ytd_budget: map,
            counts: ChildCounts::default(),
            census: None,
            start_date: None,
            children: Vec::new(),
        }
    }

    fn period() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
    }

    #[test]
    fn test_markdown_contains_header_and_rows() {
        let node = leaf(&[("Income", 1200.0), ("Room Revenue", 1200.0)]);
        let markdown = node.to_markdown(&hierarchy(), period());

        assert!(markdown.contains("#### Facility: Sunrise Manor"));
        assert!(markdown.contains("March 2024"));
        assert!(markdown.contains("| Income | 1,200 | 100% |"));
    }

    #[test]
    fn test_markdown_dashes_for_empty_columns() {
        let node = leaf(&[("Income", 500.0)]);
        let markdown = node.to_markdown(&hierarchy(), period());

        // Expenses row has no data: dash amount, 0% of income
        assert!(markdown.contains("| Expenses | - | 0% |"));
    }

    #[test]
    fn test_markdown_negative_parenthesized() {
        let node = leaf(&[("Income", 1000.0), ("Expenses", -250.0)]);
        let markdown = node.to_markdown(&hierarchy(), period());
        assert!(markdown.contains("(250)"));
        assert!(markdown.contains("(25%)"));
    }

    #[test]
    fn test_unknown_account_rows_rendered() {
        let node = leaf(&[("Income", 100.0), ("Unknown Account 9999", 7.0)]);
        let markdown = node.to_markdown(&hierarchy(), period());
        assert!(markdown.contains("Unknown Account 9999"));
    }

    #[test]
    fn test_display_excluded_subtree_hidden() {
        let mut internal = account("Intercompany", Some("Income"));
        internal.display_excluded = true;
        let config = AccountHierarchyConfig {
            accounts: vec![account("Income", None), internal],
            income_label: "Income".to_string(),
        };
        let hierarchy = AccountHierarchy::from_config(&config).unwrap();

        let node = leaf(&[("Income", 100.0), ("Intercompany", 50.0)]);
        let markdown = node.to_markdown(&hierarchy, period());
        assert!(!markdown.contains("Intercompany"));
    }

    #[test]
    fn test_header_uses_final_counts() {
        let mut district = leaf(&[("Income", 100.0)]);
        district.level = ReportLevel::District;
        district.name = "Coastal".to_string();
        district.counts = ChildCounts {
            regions: 0,
            districts: 0,
            facilities: 2,
        };

        let markdown = district.to_markdown(&hierarchy(), period());
        assert!(markdown.contains("### District: Coastal (Facilities: 2)"));
    }

    #[test]
    fn test_csv_escaping_and_shape() {
        let mut node = leaf(&[("Income", 1000.0)]);
        node.name = "Sunrise, Manor".to_string();
        let csv = node.to_csv(&hierarchy());

        assert!(csv.starts_with("Level,Name,Account"));
        assert!(csv.contains("\"Sunrise, Manor\""));
        assert!(csv.contains("Facility"));
    }
}
