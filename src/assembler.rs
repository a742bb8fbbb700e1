use crate::error::{ReportError, Result};
use crate::format::is_effectively_zero;
use crate::grouping::{district_tag_set, group_by_district_tags, group_key, group_label};
use crate::hierarchy::AccountHierarchy;
use crate::rollup::{compute_rollups, sum_by_account, RollupMode};
use crate::schema::{Entity, OrgConfig, Scenario, TransactionFact};
use crate::warehouse::{CensusSource, FactFilter, FactSource};
use crate::{ChildCounts, ReportLevel, ReportNode};
use chrono::NaiveDate;
use log::{debug, info};
use std::collections::{BTreeMap, BTreeSet};

/// What the caller wants a report for.
#[derive(Debug, Clone)]
pub enum ReportSelector {
    Subsidiary(String),
    Region(String),
    District(String),
    /// A consolidated report for every district whose tag set matches.
    Tags(Vec<String>),
}

/// Month and YTD facts fetched once per report and filtered in memory for
/// every node below the top level.
struct FactBatch {
    month: Vec<TransactionFact>,
    ytd: Vec<TransactionFact>,
}

impl FactBatch {
    fn for_ids<'a>(
        &'a self,
        ids: &BTreeSet<&str>,
    ) -> (Vec<&'a TransactionFact>, Vec<&'a TransactionFact>) {
        let month = self
            .month
            .iter()
            .filter(|f| ids.contains(f.customer_id.as_str()))
            .collect();
        let ytd = self
            .ytd
            .iter()
            .filter(|f| ids.contains(f.customer_id.as_str()))
            .collect();
        (month, ytd)
    }
}

struct Quad {
    month_actual: BTreeMap<String, f64>,
    month_budget: BTreeMap<String, f64>,
    ytd_actual: BTreeMap<String, f64>,
    ytd_budget: BTreeMap<String, f64>,
}

/// Walks Subsidiary -> Region -> District -> Facility, fetching facts
/// exactly four times (month and YTD, once for the top-level summary and
/// once for the union of all member facilities) and producing every deeper
/// aggregate by filtering the batch in memory.
///
/// Collaborators are injected; the assembler owns no connections.
pub struct ReportAssembler<'a> {
    org: &'a OrgConfig,
    hierarchy: &'a AccountHierarchy,
    warehouse: &'a dyn FactSource,
    census: Option<&'a dyn CensusSource>,
    mode: RollupMode,
    period_date: NaiveDate,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(
        org: &'a OrgConfig,
        hierarchy: &'a AccountHierarchy,
        warehouse: &'a dyn FactSource,
        period_date: NaiveDate,
    ) -> Self {
        Self {
            org,
            hierarchy,
            warehouse,
            census: None,
            mode: RollupMode::Display,
            period_date,
        }
    }

    pub fn with_mode(mut self, mode: RollupMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_census(mut self, census: &'a dyn CensusSource) -> Self {
        self.census = Some(census);
        self
    }

    pub fn assemble(&self, selector: &ReportSelector) -> Result<ReportNode> {
        match selector {
            ReportSelector::Subsidiary(id) => self.assemble_subsidiary(id),
            ReportSelector::Region(id) => self.assemble_region(id),
            ReportSelector::District(id) => self.assemble_district(id),
            ReportSelector::Tags(tags) => self.assemble_tag_group(tags),
        }
    }

    fn assemble_subsidiary(&self, id: &str) -> Result<ReportNode> {
        let regions = self.org.regions_in_subsidiary(id);
        if regions.is_empty() {
            return Err(ReportError::UnknownSelector {
                level: "subsidiary".to_string(),
                key: id.to_string(),
            });
        }

        let entities = self.warehouse.fetch_entities_in_subsidiary(id)?;
        if entities.is_empty() {
            return Err(ReportError::NoMatchingEntities {
                level: "subsidiary".to_string(),
                key: id.to_string(),
            });
        }

        let name = self.org.subsidiary_label(id);
        info!(
            "Assembling subsidiary report for '{}' covering {} facilities",
            name,
            entities.len()
        );

        let summary = self.fetch_pair(FactFilter::Subsidiary(id.to_string()))?;
        let batch = self.fetch_batch(&entities)?;

        let mut by_region: BTreeMap<&str, Vec<Entity>> = BTreeMap::new();
        for entity in &entities {
            match self.org.district_by_id(&entity.parent_district_id) {
                Some(district) => by_region
                    .entry(district.region_id.as_str())
                    .or_default()
                    .push(entity.clone()),
                None => debug!(
                    "Entity '{}' has unknown parent district '{}'; not placed in any region",
                    entity.id, entity.parent_district_id
                ),
            }
        }

        let mut children = Vec::new();
        for region in regions {
            let region_entities = by_region.remove(region.id.as_str()).unwrap_or_default();
            let quad = self.quad_for_members(&batch, &region_entities);
            children.push(self.build_region(&region.label, &region_entities, &batch, quad));
        }

        let counts = ChildCounts {
            regions: children.len(),
            districts: children.iter().map(|c| c.counts.districts).sum(),
            facilities: children.iter().map(|c| c.counts.facilities).sum(),
        };

        let quad = self.quad_of_batch(&summary);
        Ok(self.node(ReportLevel::Subsidiary, name, quad, counts, children))
    }

    fn assemble_region(&self, id: &str) -> Result<ReportNode> {
        let region = self
            .org
            .region_by_id(id)
            .ok_or_else(|| ReportError::UnknownSelector {
                level: "region".to_string(),
                key: id.to_string(),
            })?;

        let entities = self.warehouse.fetch_entities_in_region(id)?;
        if entities.is_empty() {
            return Err(ReportError::NoMatchingEntities {
                level: "region".to_string(),
                key: id.to_string(),
            });
        }

        info!(
            "Assembling region report for '{}' covering {} facilities",
            region.label,
            entities.len()
        );

        let summary = self.fetch_pair(FactFilter::Region(id.to_string()))?;
        let batch = self.fetch_batch(&entities)?;

        let quad = self.quad_of_batch(&summary);
        Ok(self.build_region(&region.label, &entities, &batch, quad))
    }

    fn assemble_district(&self, id: &str) -> Result<ReportNode> {
        let district = self
            .org
            .district_by_id(id)
            .ok_or_else(|| ReportError::UnknownSelector {
                level: "district".to_string(),
                key: id.to_string(),
            })?;

        let entities: Vec<Entity> = self
            .warehouse
            .fetch_entities_in_region(&district.region_id)?
            .into_iter()
            .filter(|e| e.parent_district_id == district.id)
            .collect();
        if entities.is_empty() {
            return Err(ReportError::NoMatchingEntities {
                level: "district".to_string(),
                key: id.to_string(),
            });
        }

        info!(
            "Assembling district report for '{}' covering {} facilities",
            district.label,
            entities.len()
        );

        let ids = customer_ids(&entities);
        let summary = self.fetch_pair(FactFilter::Customers(ids))?;
        let batch = self.fetch_batch(&entities)?;

        let quad = self.quad_of_batch(&summary);
        Ok(self.build_district_group(&district.label, &entities, &batch, quad))
    }

    fn assemble_tag_group(&self, tags: &[String]) -> Result<ReportNode> {
        let mut sorted: Vec<String> = tags.to_vec();
        sorted.sort();
        sorted.dedup();
        let key = group_key(&sorted);
        let label = group_label(&sorted);

        let matching: Vec<_> = self
            .org
            .districts()
            .filter(|d| group_key(&district_tag_set(d)) == key)
            .collect();
        if matching.is_empty() {
            return Err(ReportError::UnknownSelector {
                level: "tag group".to_string(),
                key: label,
            });
        }

        let district_ids: BTreeSet<&str> = matching.iter().map(|d| d.id.as_str()).collect();
        let region_ids: BTreeSet<&str> = matching.iter().map(|d| d.region_id.as_str()).collect();

        let mut entities = Vec::new();
        for region_id in region_ids {
            entities.extend(
                self.warehouse
                    .fetch_entities_in_region(region_id)?
                    .into_iter()
                    .filter(|e| district_ids.contains(e.parent_district_id.as_str())),
            );
        }
        if entities.is_empty() {
            return Err(ReportError::NoMatchingEntities {
                level: "tag group".to_string(),
                key: label,
            });
        }

        info!(
            "Assembling consolidated report for tag group '{}' covering {} facilities across {} districts",
            label,
            entities.len(),
            matching.len()
        );

        let ids = customer_ids(&entities);
        let summary = self.fetch_pair(FactFilter::Customers(ids))?;
        let batch = self.fetch_batch(&entities)?;

        let quad = self.quad_of_batch(&summary);
        Ok(self.build_district_group(&label, &entities, &batch, quad))
    }

    /// Region nodes are always kept; their district children are the tag
    /// groups derived from the region's facilities.
    fn build_region(
        &self,
        label: &str,
        entities: &[Entity],
        batch: &FactBatch,
        quad: Quad,
    ) -> ReportNode {
        let groups = group_by_district_tags(entities, &self.org.districts);

        let mut children = Vec::new();
        for group in groups {
            let group_quad = self.quad_for_members(batch, &group.members);
            children.push(self.build_district_group(
                &group.label,
                &group.members,
                batch,
                group_quad,
            ));
        }

        let counts = ChildCounts {
            regions: 0,
            districts: children.len(),
            facilities: children.iter().map(|c| c.counts.facilities).sum(),
        };

        self.node(ReportLevel::Region, label.to_string(), quad, counts, children)
    }

    /// District nodes are always kept, even when every facility below them
    /// was pruned; the facility count reflects survivors only.
    fn build_district_group(
        &self,
        label: &str,
        members: &[Entity],
        batch: &FactBatch,
        quad: Quad,
    ) -> ReportNode {
        let mut children = Vec::new();
        for member in members {
            if let Some(node) = self.build_facility(member, batch) {
                children.push(node);
            }
        }

        let counts = ChildCounts {
            regions: 0,
            districts: 0,
            facilities: children.len(),
        };

        self.node(
            ReportLevel::District,
            label.to_string(),
            quad,
            counts,
            children,
        )
    }

    /// A facility with no actual revenue for the month is pruned from the
    /// report; the parent only ever sees it through a lower facility count.
    fn build_facility(&self, entity: &Entity, batch: &FactBatch) -> Option<ReportNode> {
        let ids: BTreeSet<&str> = [entity.id.as_str()].into_iter().collect();
        let (month, ytd) = batch.for_ids(&ids);
        let quad = self.quad(&month, &ytd);

        let income = quad
            .month_actual
            .get(self.hierarchy.income_label())
            .copied()
            .unwrap_or(0.0);
        if is_effectively_zero(income) {
            debug!("Pruning facility '{}': no revenue this period", entity.label);
            return None;
        }

        let census = self.census.and_then(|source| {
            entity
                .census_code
                .as_deref()
                .and_then(|code| source.census_for(code, self.period_date))
        });

        let mut node = self.node(
            ReportLevel::Facility,
            entity.label.clone(),
            quad,
            ChildCounts::default(),
            Vec::new(),
        );
        node.census = census;
        node.start_date = entity.start_date;
        Some(node)
    }

    fn fetch_pair(&self, filter: FactFilter) -> Result<FactBatch> {
        let month = self.warehouse.fetch_facts(&filter, self.period_date, false)?;
        let ytd = self.warehouse.fetch_facts(&filter, self.period_date, true)?;
        Ok(FactBatch { month, ytd })
    }

    fn fetch_batch(&self, entities: &[Entity]) -> Result<FactBatch> {
        self.fetch_pair(FactFilter::Customers(customer_ids(entities)))
    }

    fn quad(&self, month: &[&TransactionFact], ytd: &[&TransactionFact]) -> Quad {
        Quad {
            month_actual: self.rollup(month, Scenario::Actuals),
            month_budget: self.rollup(month, Scenario::Budget),
            ytd_actual: self.rollup(ytd, Scenario::Actuals),
            ytd_budget: self.rollup(ytd, Scenario::Budget),
        }
    }

    fn quad_of_batch(&self, batch: &FactBatch) -> Quad {
        let month: Vec<&TransactionFact> = batch.month.iter().collect();
        let ytd: Vec<&TransactionFact> = batch.ytd.iter().collect();
        self.quad(&month, &ytd)
    }

    fn quad_for_members(&self, batch: &FactBatch, members: &[Entity]) -> Quad {
        let ids: BTreeSet<&str> = members.iter().map(|e| e.id.as_str()).collect();
        let (month, ytd) = batch.for_ids(&ids);
        self.quad(&month, &ytd)
    }

    fn rollup(&self, facts: &[&TransactionFact], scenario: Scenario) -> BTreeMap<String, f64> {
        let totals = sum_by_account(facts.iter().copied(), scenario);
        compute_rollups(
            &totals,
            self.hierarchy.accounts(),
            self.hierarchy.children_map(),
            self.mode,
        )
    }

    fn node(
        &self,
        level: ReportLevel,
        name: String,
        quad: Quad,
        counts: ChildCounts,
        children: Vec<ReportNode>,
    ) -> ReportNode {
        ReportNode {
            level,
            name,
            month_actual: quad.month_actual,
            month_budget: quad.month_budget,
            ytd_actual: quad.ytd_actual,
            ytd_budget: quad.ytd_budget,
            counts,
            census: None,
            start_date: None,
            children,
        }
    }
}

fn customer_ids(entities: &[Entity]) -> Vec<String> {
    entities.iter().map(|e| e.id.clone()).collect()
}
