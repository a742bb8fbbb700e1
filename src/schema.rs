use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum Scenario {
    #[schemars(description = "Actual recorded values from the general ledger")]
    Actuals,

    #[schemars(description = "Planned values from the budgeting process")]
    Budget,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountNode {
    #[schemars(
        description = "The account label as it appears on report rows (e.g., 'Income', 'Nursing Wages'). Must be unique within the hierarchy."
    )]
    pub label: String,

    #[schemars(
        description = "Label of the parent account this account rolls up into. Root section accounts (e.g., 'Income', 'Expenses') have no parent."
    )]
    #[serde(default)]
    pub parent: Option<String>,

    #[schemars(
        description = "The warehouse account code this label maps to. Facts arrive keyed by code; rows with a code not listed here are reported under a synthetic 'Unknown Account' label."
    )]
    #[serde(default)]
    pub code: Option<String>,

    #[schemars(
        description = "If true, this account's subtree is left out of its parent's total on every report."
    )]
    #[serde(default)]
    pub display_excluded: bool,

    #[schemars(
        description = "If true, this account's subtree is additionally left out of its parent's total on operational reports."
    )]
    #[serde(default)]
    pub operational_excluded: bool,

    #[schemars(
        description = "Presentation hint: render this row with a double underline (totals styling). Never affects aggregation."
    )]
    #[serde(default)]
    pub double_lines: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AccountHierarchyConfig {
    #[schemars(
        description = "Every account in the chart, parents and leaves alike. The parent references must form a forest (no cycles)."
    )]
    pub accounts: Vec<AccountNode>,

    #[schemars(
        description = "Label of the rolled-up revenue account. Drives the zero-revenue facility pruning rule and the percent-of-income column. Defaults to 'Income'."
    )]
    #[serde(default = "default_income_label")]
    pub income_label: String,
}

fn default_income_label() -> String {
    "Income".to_string()
}

impl AccountHierarchyConfig {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(AccountHierarchyConfig)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Entity {
    #[schemars(description = "Warehouse customer id for this facility")]
    pub id: String,

    #[schemars(description = "Display name of the facility")]
    pub label: String,

    #[schemars(description = "Id of the district this facility reports under")]
    pub parent_district_id: String,

    #[schemars(
        description = "Census lookup code for the side-data provider. Display metadata only."
    )]
    #[serde(default)]
    pub census_code: Option<String>,

    #[schemars(description = "Date the facility opened. Display metadata only.")]
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct District {
    pub id: String,

    pub label: String,

    #[schemars(description = "Id of the region this district rolls up into")]
    pub region_id: String,

    #[schemars(
        with = "Vec<String>",
        description = "Reporting tags. Districts sharing an identical tag set are consolidated into one reporting group. An empty or malformed value falls back to grouping by the district's own label."
    )]
    #[serde(default, deserialize_with = "tags_or_empty")]
    pub tags: Vec<String>,

    #[schemars(
        description = "Suppresses this district's own standalone report. Its facilities still contribute to tag-based groups."
    )]
    #[serde(default)]
    pub reporting_excluded: bool,

    #[schemars(
        description = "Documents in the organization store that are not districts carry false here and are skipped."
    )]
    #[serde(default = "default_true")]
    pub is_district: bool,
}

fn default_true() -> bool {
    true
}

/// A `tags` field that is absent, null, or not an array of strings is read
/// as empty, which triggers the district-label grouping fallback.
fn tags_or_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| item.as_str().map(|s| s.to_string()))
            .collect()),
        _ => Ok(Vec::new()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Region {
    pub id: String,

    pub label: String,

    #[schemars(description = "Id of the subsidiary this region rolls up into")]
    pub subsidiary_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Subsidiary {
    pub id: String,

    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OrgConfig {
    #[schemars(description = "All district documents, including non-district entries")]
    pub districts: Vec<District>,

    pub regions: Vec<Region>,

    #[serde(default)]
    pub subsidiaries: Vec<Subsidiary>,
}

impl OrgConfig {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(OrgConfig)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    /// Districts only; other documents in the store are ignored.
    pub fn districts(&self) -> impl Iterator<Item = &District> {
        self.districts.iter().filter(|d| d.is_district)
    }

    pub fn district_by_id(&self, id: &str) -> Option<&District> {
        self.districts().find(|d| d.id == id)
    }

    pub fn region_by_id(&self, id: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.id == id)
    }

    pub fn regions_in_subsidiary(&self, subsidiary_id: &str) -> Vec<&Region> {
        self.regions
            .iter()
            .filter(|r| r.subsidiary_id == subsidiary_id)
            .collect()
    }

    pub fn subsidiary_label(&self, subsidiary_id: &str) -> String {
        self.subsidiaries
            .iter()
            .find(|s| s.id == subsidiary_id)
            .map(|s| s.label.clone())
            .unwrap_or_else(|| subsidiary_id.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionFact {
    pub account_label: String,
    pub customer_id: String,
    pub region_id: String,
    pub subsidiary_id: String,
    pub scenario: Scenario,
    pub value: f64,
}
