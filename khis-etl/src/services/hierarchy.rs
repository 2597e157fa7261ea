//! Organisation-unit hierarchy flattening
//!
//! Joins level 5 → 4 → 3 → 2 → 1 along `parent_id` with inner-join
//! semantics: a facility whose chain breaks at any level is excluded.

use std::collections::HashMap;
use tracing::{info, warn};

use crate::models::{FlatFacility, OrganisationUnit};

/// Flattened facilities plus join losses per level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenReport {
    pub facilities: Vec<FlatFacility>,
    /// Level-5 rows in the input
    pub level5_rows: usize,
    /// Facilities lost at the ward (4), sub-county (3), county (2), country (1) joins
    pub dropped_at_level: [usize; 4],
    /// Units with a level outside 1..=5, ignored
    pub unexpected_level: usize,
}

impl FlattenReport {
    pub fn dropped_total(&self) -> usize {
        self.dropped_at_level.iter().sum()
    }
}

/// Name suffixes removed from unit names before flattening
const NAME_SUFFIXES: [&str; 3] = [" Ward", " Sub County", " County"];

/// Remove the administrative suffixes from a unit name
pub fn clean_unit_name(name: &str) -> String {
    NAME_SUFFIXES
        .iter()
        .fold(name.to_string(), |acc, suffix| acc.replace(suffix, ""))
}

fn parent_at<'a>(
    level: &HashMap<&str, &'a OrganisationUnit>,
    unit: &OrganisationUnit,
) -> Option<&'a OrganisationUnit> {
    unit.parent_id
        .as_deref()
        .and_then(|id| level.get(id).copied())
}

/// Flatten long-format units into one row per facility.
///
/// Output keeps the input order of level-5 rows.
pub fn flatten_hierarchy(units: &[OrganisationUnit]) -> FlattenReport {
    let mut by_level: [HashMap<&str, &OrganisationUnit>; 4] = Default::default();
    let mut facilities_in = Vec::new();
    let mut unexpected_level = 0;

    for unit in units {
        match unit.level {
            5 => facilities_in.push(unit),
            1..=4 => {
                by_level[(unit.level - 1) as usize].insert(unit.id.as_str(), unit);
            }
            _ => unexpected_level += 1,
        }
    }
    if unexpected_level > 0 {
        warn!(
            units = unexpected_level,
            "Ignoring organisation units with a level outside 1-5"
        );
    }

    let mut report = FlattenReport {
        level5_rows: facilities_in.len(),
        unexpected_level,
        ..Default::default()
    };

    for facility in facilities_in {
        let Some(ward) = parent_at(&by_level[3], facility) else {
            report.dropped_at_level[0] += 1;
            continue;
        };
        let Some(sub_county) = parent_at(&by_level[2], ward) else {
            report.dropped_at_level[1] += 1;
            continue;
        };
        let Some(county) = parent_at(&by_level[1], sub_county) else {
            report.dropped_at_level[2] += 1;
            continue;
        };
        let Some(country) = parent_at(&by_level[0], county) else {
            report.dropped_at_level[3] += 1;
            continue;
        };

        report.facilities.push(FlatFacility {
            facility_id: facility.id.clone(),
            facility_name: facility.name.clone(),
            mfl_code: facility.code.clone(),
            ward_id: ward.id.clone(),
            ward_name: ward.name.clone(),
            ward_code: ward.code.clone(),
            sub_county_id: sub_county.id.clone(),
            sub_county_name: sub_county.name.clone(),
            sub_county_code: sub_county.code.clone(),
            county_id: county.id.clone(),
            county_name: county.name.clone(),
            county_code: county.code.clone(),
            country_id: country.id.clone(),
            country_name: country.name.clone(),
            country_code: country.code.clone(),
        });
    }

    if report.dropped_total() > 0 {
        warn!(
            facilities = report.level5_rows,
            no_ward = report.dropped_at_level[0],
            no_sub_county = report.dropped_at_level[1],
            no_county = report.dropped_at_level[2],
            no_country = report.dropped_at_level[3],
            "Facilities dropped by hierarchy join"
        );
    }
    info!(
        "Flattened {} of {} facilities",
        report.facilities.len(),
        report.level5_rows
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, level: u8, parent: Option<&str>) -> OrganisationUnit {
        OrganisationUnit {
            id: id.to_string(),
            name: format!("{} name", id),
            parent_id: parent.map(str::to_string),
            level,
            code: None,
        }
    }

    /// Kenya → Nairobi → Westlands / Langata → one ward each → facilities
    fn tree() -> Vec<OrganisationUnit> {
        vec![
            unit("F3", 5, Some("W2")),
            unit("KE", 1, None),
            unit("F1", 5, Some("W1")),
            unit("NBI", 2, Some("KE")),
            unit("SC1", 3, Some("NBI")),
            unit("SC2", 3, Some("NBI")),
            unit("W1", 4, Some("SC1")),
            unit("W2", 4, Some("SC2")),
            unit("F2", 5, Some("W1")),
        ]
    }

    #[test]
    fn test_complete_tree_keeps_every_facility() {
        let report = flatten_hierarchy(&tree());
        assert_eq!(report.facilities.len(), 3);
        assert_eq!(report.dropped_total(), 0);

        let ids: Vec<&str> = report.facilities.iter().map(|f| f.facility_id.as_str()).collect();
        assert_eq!(ids, vec!["F3", "F1", "F2"]);

        let f1 = &report.facilities[1];
        assert_eq!(f1.ward_id, "W1");
        assert_eq!(f1.sub_county_id, "SC1");
        assert_eq!(f1.county_name, "NBI name");
        assert_eq!(f1.country_id, "KE");
    }

    #[test]
    fn test_missing_sub_county_drops_descendants() {
        let units: Vec<_> = tree().into_iter().filter(|u| u.id != "SC1").collect();
        let report = flatten_hierarchy(&units);

        let ids: Vec<&str> = report.facilities.iter().map(|f| f.facility_id.as_str()).collect();
        assert_eq!(ids, vec!["F3"]);
        assert_eq!(report.dropped_at_level, [0, 2, 0, 0]);
    }

    #[test]
    fn test_parent_at_wrong_level_breaks_chain() {
        let mut units = tree();
        // F3 points straight at a sub-county
        units[0].parent_id = Some("SC2".to_string());
        let report = flatten_hierarchy(&units);
        assert_eq!(report.facilities.len(), 2);
        assert_eq!(report.dropped_at_level[0], 1);
    }

    #[test]
    fn test_unexpected_levels_are_counted() {
        let mut units = tree();
        units.push(unit("X1", 6, Some("F1")));
        units.push(unit("X2", 0, None));
        let report = flatten_hierarchy(&units);
        assert_eq!(report.unexpected_level, 2);
        assert_eq!(report.facilities.len(), 3);
    }

    #[test]
    fn test_clean_unit_name() {
        assert_eq!(clean_unit_name("Nairobi County"), "Nairobi");
        assert_eq!(clean_unit_name("Westlands Sub County"), "Westlands");
        assert_eq!(clean_unit_name("Parklands Ward"), "Parklands");
        assert_eq!(clean_unit_name("Kenyatta Hospital"), "Kenyatta Hospital");
    }
}
