use crate::error::Result;
use crate::schema::{Entity, OrgConfig, TransactionFact};
use chrono::NaiveDate;
use std::cell::Cell;
use std::collections::BTreeMap;

/// Which slice of the fact table a fetch covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactFilter {
    Customers(Vec<String>),
    Region(String),
    Subsidiary(String),
}

/// The analytics warehouse, injected into the assembler. `ytd` selects the
/// year-to-date fact set for the period; month and YTD sets are fetched
/// separately and never merged.
pub trait FactSource {
    fn fetch_facts(
        &self,
        filter: &FactFilter,
        period_date: NaiveDate,
        ytd: bool,
    ) -> Result<Vec<TransactionFact>>;

    fn fetch_entities_in_region(&self, region_id: &str) -> Result<Vec<Entity>>;

    fn fetch_entities_in_subsidiary(&self, subsidiary_id: &str) -> Result<Vec<Entity>>;
}

/// Optional side-data provider for per-facility census figures. Display
/// metadata only; aggregation math never reads it.
pub trait CensusSource {
    fn census_for(&self, census_code: &str, period_date: NaiveDate) -> Option<f64>;
}

struct Placement {
    entity: Entity,
    region_id: Option<String>,
    subsidiary_id: Option<String>,
}

/// A preloaded warehouse backed by plain vectors. Entity placement is derived
/// from the organization config (facility -> district -> region ->
/// subsidiary). Fact fetches are counted so tests can pin the bounded-fetch
/// property of the assembler.
///
/// The fixture holds exactly one reporting period, so `period_date` is
/// accepted and ignored.
pub struct InMemoryWarehouse {
    facts_month: Vec<TransactionFact>,
    facts_ytd: Vec<TransactionFact>,
    placements: Vec<Placement>,
    fact_queries: Cell<usize>,
}

impl InMemoryWarehouse {
    pub fn new(
        org: &OrgConfig,
        entities: Vec<Entity>,
        facts_month: Vec<TransactionFact>,
        facts_ytd: Vec<TransactionFact>,
    ) -> Self {
        let region_of_district: BTreeMap<&str, &str> = org
            .districts()
            .map(|d| (d.id.as_str(), d.region_id.as_str()))
            .collect();
        let subsidiary_of_region: BTreeMap<&str, &str> = org
            .regions
            .iter()
            .map(|r| (r.id.as_str(), r.subsidiary_id.as_str()))
            .collect();

        let placements = entities
            .into_iter()
            .map(|entity| {
                let region_id = region_of_district
                    .get(entity.parent_district_id.as_str())
                    .map(|r| r.to_string());
                let subsidiary_id = region_id
                    .as_deref()
                    .and_then(|r| subsidiary_of_region.get(r))
                    .map(|s| s.to_string());
                Placement {
                    entity,
                    region_id,
                    subsidiary_id,
                }
            })
            .collect();

        Self {
            facts_month,
            facts_ytd,
            placements,
            fact_queries: Cell::new(0),
        }
    }

    pub fn fact_query_count(&self) -> usize {
        self.fact_queries.get()
    }

    pub fn reset_fact_query_count(&self) {
        self.fact_queries.set(0);
    }

    fn matches(filter: &FactFilter, fact: &TransactionFact) -> bool {
        match filter {
            FactFilter::Customers(ids) => ids.iter().any(|id| id == &fact.customer_id),
            FactFilter::Region(id) => &fact.region_id == id,
            FactFilter::Subsidiary(id) => &fact.subsidiary_id == id,
        }
    }
}

impl FactSource for InMemoryWarehouse {
    fn fetch_facts(
        &self,
        filter: &FactFilter,
        _period_date: NaiveDate,
        ytd: bool,
    ) -> Result<Vec<TransactionFact>> {
        self.fact_queries.set(self.fact_queries.get() + 1);

        let source = if ytd { &self.facts_ytd } else { &self.facts_month };
        Ok(source
            .iter()
            .filter(|f| Self::matches(filter, f))
            .cloned()
            .collect())
    }

    fn fetch_entities_in_region(&self, region_id: &str) -> Result<Vec<Entity>> {
        Ok(self
            .placements
            .iter()
            .filter(|p| p.region_id.as_deref() == Some(region_id))
            .map(|p| p.entity.clone())
            .collect())
    }

    fn fetch_entities_in_subsidiary(&self, subsidiary_id: &str) -> Result<Vec<Entity>> {
        Ok(self
            .placements
            .iter()
            .filter(|p| p.subsidiary_id.as_deref() == Some(subsidiary_id))
            .map(|p| p.entity.clone())
            .collect())
    }
}

/// Census figures keyed by facility census code.
#[derive(Debug, Default)]
pub struct InMemoryCensus {
    figures: BTreeMap<String, f64>,
}

impl InMemoryCensus {
    pub fn new(figures: BTreeMap<String, f64>) -> Self {
        Self { figures }
    }
}

impl CensusSource for InMemoryCensus {
    fn census_for(&self, census_code: &str, _period_date: NaiveDate) -> Option<f64> {
        self.figures.get(census_code).copied()
    }
}
