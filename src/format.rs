use std::collections::BTreeMap;

/// Values closer to zero than this render as a dash and count as "no
/// revenue" for facility pruning.
pub const NEAR_ZERO: f64 = 0.0001;

pub const DASH: &str = "-";

pub fn is_effectively_zero(value: f64) -> bool {
    value.abs() < NEAR_ZERO
}

/// Report cell formatting: nearest integer, thousands separators, negatives
/// in parentheses with no minus sign, near-zero as a dash.
pub fn format_amount(value: f64) -> String {
    if is_effectively_zero(value) {
        return DASH.to_string();
    }

    let rounded = value.abs().round() as u64;
    let body = group_thousands(rounded);

    if value < 0.0 {
        format!("({})", body)
    } else {
        body
    }
}

/// Share of the rolled-up income total for the same scenario and period.
/// A zero income column has no meaningful ratio, so every row in it renders
/// as a dash rather than NaN or an infinity.
pub fn format_percent(value: f64, income_total: f64) -> String {
    if is_effectively_zero(income_total) {
        return DASH.to_string();
    }

    let percent = value / income_total * 100.0;
    let rounded = percent.abs().round() as u64;
    let body = group_thousands(rounded);

    if percent < 0.0 && rounded != 0 {
        format!("({}%)", body)
    } else {
        format!("{}%", body)
    }
}

/// Convenience for a whole column: the income total comes from the same
/// rollup map the row values do.
pub fn percent_of_income(
    rollups: &BTreeMap<String, f64>,
    label: &str,
    income_label: &str,
) -> String {
    let value = rollups.get(label).copied().unwrap_or(0.0);
    let income = rollups.get(income_label).copied().unwrap_or(0.0);
    format_percent(value, income)
}

fn group_thousands(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }

    let mut groups = Vec::new();
    while n > 0 {
        groups.push((n % 1000).to_string());
        n /= 1000;
    }

    groups
        .iter()
        .enumerate()
        .rev()
        .map(|(i, g)| {
            if i == groups.len() - 1 {
                g.clone()
            } else {
                format!("{:0>3}", g)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_zero_renders_dash() {
        assert_eq!(format_amount(0.0), DASH);
        assert_eq!(format_amount(0.00009), DASH);
        assert_eq!(format_amount(-0.00009), DASH);
    }

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(format_amount(0.0001), "0");
        assert!(is_effectively_zero(0.000099));
        assert!(!is_effectively_zero(0.0001));
    }

    #[test]
    fn test_rounding_and_grouping() {
        assert_eq!(format_amount(1234.4), "1,234");
        assert_eq!(format_amount(1234.5), "1,235");
        assert_eq!(format_amount(999.0), "999");
        assert_eq!(format_amount(1_000_000.0), "1,000,000");
        assert_eq!(format_amount(1_002_003.0), "1,002,003");
    }

    #[test]
    fn test_negative_parenthesized() {
        assert_eq!(format_amount(-1234.0), "(1,234)");
        assert_eq!(format_amount(-0.6), "(1)");
        assert!(!format_amount(-50.0).contains('-'));
    }

    #[test]
    fn test_percent_dash_on_zero_income() {
        assert_eq!(format_percent(500.0, 0.0), DASH);
        assert_eq!(format_percent(-500.0, 0.0), DASH);
        assert_eq!(format_percent(0.0, 0.0), DASH);
    }

    #[test]
    fn test_percent_values() {
        assert_eq!(format_percent(50.0, 200.0), "25%");
        assert_eq!(format_percent(200.0, 200.0), "100%");
        assert_eq!(format_percent(-50.0, 200.0), "(25%)");
        assert_eq!(format_percent(2500.0, 100.0), "2,500%");
    }

    #[test]
    fn test_percent_of_income_missing_rows() {
        let mut rollups = BTreeMap::new();
        rollups.insert("Income".to_string(), 200.0);
        rollups.insert("Wages".to_string(), 50.0);

        assert_eq!(percent_of_income(&rollups, "Wages", "Income"), "25%");
        // a row absent from the rollup map is a zero
        assert_eq!(percent_of_income(&rollups, "Ghost", "Income"), "0%");
        // absent income means a dash for everything
        let empty = BTreeMap::new();
        assert_eq!(percent_of_income(&empty, "Wages", "Income"), DASH);
    }
}
