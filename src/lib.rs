//! # P&L Report Builder
//!
//! A library for aggregating raw transaction facts into multi-level Profit &
//! Loss reports along two independent hierarchies: an account hierarchy (how
//! ledger accounts roll up into sections like Income and Expenses) and an
//! organizational hierarchy (how facilities roll up into districts, regions,
//! and subsidiaries).
//!
//! ## Core Concepts
//!
//! - **Rollup**: the recursively aggregated total of an account including its
//!   non-excluded descendants, memoized per report.
//! - **Tag group**: a derived reporting unit merging every district that
//!   shares an identical tag set; untagged districts fall back to their own
//!   label.
//! - **Pruning**: facilities with no actual revenue for the month are
//!   silently dropped from the assembled report; containers above them are
//!   always kept.
//! - **Bounded fetching**: one report issues exactly four fact queries
//!   (month and YTD, summary and batch) no matter how large the tree is;
//!   every deeper aggregate filters the batch in memory.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pnl_report_builder::*;
//! use chrono::NaiveDate;
//!
//! let accounts: AccountHierarchyConfig = serde_json::from_str(&account_doc)?;
//! let org: OrgConfig = serde_json::from_str(&org_doc)?;
//! let warehouse = InMemoryWarehouse::new(&org, entities, facts_month, facts_ytd);
//!
//! let period = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
//! let report = build_report(
//!     &accounts,
//!     &org,
//!     &warehouse,
//!     &ReportSelector::Subsidiary("s1".to_string()),
//!     period,
//! )?;
//!
//! let hierarchy = AccountHierarchy::from_config(&accounts)?;
//! println!("{}", report.to_markdown(&hierarchy, period));
//! ```

pub mod assembler;
pub mod error;
pub mod format;
pub mod grouping;
pub mod hierarchy;
pub mod ingestion;
pub mod render;
pub mod rollup;
pub mod schema;
pub mod utils;
pub mod warehouse;

pub use assembler::{ReportAssembler, ReportSelector};
pub use error::{ReportError, Result};
pub use format::{format_amount, format_percent, percent_of_income, NEAR_ZERO};
pub use grouping::{
    build_district_membership, district_tag_set, group_by_district_tags,
    standalone_report_districts, TagGroup,
};
pub use hierarchy::{build_children_map, AccountHierarchy};
pub use ingestion::{label_facts, FactRow};
pub use rollup::{compute_rollups, sum_by_account, RollupMode};
pub use schema::*;
pub use utils::*;
pub use warehouse::{
    CensusSource, FactFilter, FactSource, InMemoryCensus, InMemoryWarehouse,
};

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportLevel {
    Subsidiary,
    Region,
    District,
    Facility,
}

impl ReportLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ReportLevel::Subsidiary => "Subsidiary",
            ReportLevel::Region => "Region",
            ReportLevel::District => "District",
            ReportLevel::Facility => "Facility",
        }
    }
}

/// How many descendants of each kind survived pruning. Filled in after the
/// children are processed, so header rendering never needs a second pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChildCounts {
    pub regions: usize,
    pub districts: usize,
    pub facilities: usize,
}

/// One assembled report node: four rollup maps (scenario x period), final
/// child counts, optional display metadata, and the surviving children.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportNode {
    pub level: ReportLevel,
    pub name: String,
    pub month_actual: BTreeMap<String, f64>,
    pub month_budget: BTreeMap<String, f64>,
    pub ytd_actual: BTreeMap<String, f64>,
    pub ytd_budget: BTreeMap<String, f64>,
    pub counts: ChildCounts,
    /// Census figure from the side-data provider. Display only.
    pub census: Option<f64>,
    /// Facility opening date. Display only.
    pub start_date: Option<NaiveDate>,
    pub children: Vec<ReportNode>,
}

pub struct ReportProcessor;

impl ReportProcessor {
    /// Validates the configuration, then assembles the requested report.
    /// The period date is normalized to its month end before any fetch.
    pub fn process(
        account_config: &AccountHierarchyConfig,
        org: &OrgConfig,
        warehouse: &dyn FactSource,
        selector: &ReportSelector,
        period_date: NaiveDate,
    ) -> Result<ReportNode> {
        Self::process_with_mode(
            account_config,
            org,
            warehouse,
            selector,
            period_date,
            RollupMode::Display,
        )
    }

    pub fn process_with_mode(
        account_config: &AccountHierarchyConfig,
        org: &OrgConfig,
        warehouse: &dyn FactSource,
        selector: &ReportSelector,
        period_date: NaiveDate,
        mode: RollupMode,
    ) -> Result<ReportNode> {
        let hierarchy = AccountHierarchy::from_config(account_config)?;
        validate_org_integrity(org);

        let period = month_end_for(period_date);
        info!(
            "Building {:?} report for period ending {}",
            selector, period
        );
        debug!(
            "Configuration contains {} accounts, {} districts and {} regions",
            account_config.accounts.len(),
            org.districts().count(),
            org.regions.len()
        );

        ReportAssembler::new(org, &hierarchy, warehouse, period)
            .with_mode(mode)
            .assemble(selector)
    }

    /// Assembles and renders in one call for callers that only want the
    /// finished document.
    pub fn process_to_markdown(
        account_config: &AccountHierarchyConfig,
        org: &OrgConfig,
        warehouse: &dyn FactSource,
        selector: &ReportSelector,
        period_date: NaiveDate,
    ) -> Result<String> {
        let hierarchy = AccountHierarchy::from_config(account_config)?;
        let report = Self::process(account_config, org, warehouse, selector, period_date)?;
        Ok(report.to_markdown(&hierarchy, month_end_for(period_date)))
    }
}

pub fn build_report(
    account_config: &AccountHierarchyConfig,
    org: &OrgConfig,
    warehouse: &dyn FactSource,
    selector: &ReportSelector,
    period_date: NaiveDate,
) -> Result<ReportNode> {
    ReportProcessor::process(account_config, org, warehouse, selector, period_date)
}

pub fn build_report_markdown(
    account_config: &AccountHierarchyConfig,
    org: &OrgConfig,
    warehouse: &dyn FactSource,
    selector: &ReportSelector,
    period_date: NaiveDate,
) -> Result<String> {
    ReportProcessor::process_to_markdown(account_config, org, warehouse, selector, period_date)
}

/// Org inconsistencies are tolerated (facilities under unknown districts
/// still aggregate through tag fallbacks), but they are worth a warning.
fn validate_org_integrity(org: &OrgConfig) {
    for district in org.districts() {
        if org.region_by_id(&district.region_id).is_none() {
            warn!(
                "District '{}' references unknown region '{}'",
                district.label, district.region_id
            );
        }
    }
}
