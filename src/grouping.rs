use crate::schema::{District, Entity};
use log::debug;
use std::collections::BTreeMap;

/// A derived reporting unit: every district whose sorted tag set joins to
/// the same key lands in the same group, pooling their facilities.
#[derive(Debug, Clone)]
pub struct TagGroup {
    pub key: String,
    pub label: String,
    pub members: Vec<Entity>,
}

/// Facilities keyed by the label of their parent district. Entities whose
/// `parent_district_id` matches no district are left out.
pub fn build_district_membership(
    entities: &[Entity],
    districts: &[District],
) -> BTreeMap<String, Vec<Entity>> {
    let index = district_index(districts);
    let mut membership: BTreeMap<String, Vec<Entity>> = BTreeMap::new();

    for entity in entities {
        if let Some(district) = index.get(entity.parent_district_id.as_str()) {
            membership
                .entry(district.label.clone())
                .or_default()
                .push(entity.clone());
        }
    }

    membership
}

/// The grouping tag set for a district: its own tags, sorted and deduplicated
/// for a stable key. A district without tags falls back to a singleton set of
/// its own label, so every facility always has a deterministic grouping key.
pub fn district_tag_set(district: &District) -> Vec<String> {
    if district.tags.is_empty() {
        return vec![district.label.clone()];
    }

    let mut tags = district.tags.clone();
    tags.sort();
    tags.dedup();
    tags
}

pub fn group_key(tags: &[String]) -> String {
    tags.join("|")
}

pub fn group_label(tags: &[String]) -> String {
    match tags.len() {
        0 => "Other".to_string(),
        1 => tags[0].clone(),
        _ => tags.join(" - "),
    }
}

/// Partitions facilities into tag groups by their parent district's tag set.
/// Districts with identical sorted tags merge into a single group; a
/// district's `reporting_excluded` flag has no effect here. A facility whose
/// parent district is unknown lands in the catch-all "Other" group.
pub fn group_by_district_tags(entities: &[Entity], districts: &[District]) -> Vec<TagGroup> {
    let index = district_index(districts);
    let mut groups: BTreeMap<String, TagGroup> = BTreeMap::new();

    for entity in entities {
        let tags = match index.get(entity.parent_district_id.as_str()) {
            Some(district) => district_tag_set(district),
            None => {
                debug!(
                    "Entity '{}' has unknown parent district '{}'; grouping under 'Other'",
                    entity.id, entity.parent_district_id
                );
                Vec::new()
            }
        };

        let key = group_key(&tags);
        groups
            .entry(key.clone())
            .or_insert_with(|| TagGroup {
                key,
                label: group_label(&tags),
                members: Vec::new(),
            })
            .members
            .push(entity.clone());
    }

    groups.into_values().collect()
}

/// Districts eligible for their own standalone single-district report.
/// Exclusion here never removes a district's facilities from tag groups.
pub fn standalone_report_districts(districts: &[District]) -> Vec<&District> {
    districts
        .iter()
        .filter(|d| d.is_district && !d.reporting_excluded)
        .collect()
}

fn district_index(districts: &[District]) -> BTreeMap<&str, &District> {
    districts
        .iter()
        .filter(|d| d.is_district)
        .map(|d| (d.id.as_str(), d))
        .collect()
}
