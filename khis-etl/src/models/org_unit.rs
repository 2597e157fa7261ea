//! Organisation-unit hierarchy
//!
//! Five levels form a strict tree:
//! country(1) → county(2) → sub-county(3) → ward(4) → facility(5).

use khis_common::db::{Column, ColumnType, Frame, IntoFrame, Value};
use khis_common::Result;
use serde::{Deserialize, Serialize};

/// Long-format unit as returned by the remote API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganisationUnit {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub level: u8,
    pub code: Option<String>,
}

/// Facility with its full ancestor chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatFacility {
    pub facility_id: String,
    pub facility_name: String,
    pub mfl_code: Option<String>,
    pub ward_id: String,
    pub ward_name: String,
    pub ward_code: Option<String>,
    pub sub_county_id: String,
    pub sub_county_name: String,
    pub sub_county_code: Option<String>,
    pub county_id: String,
    pub county_name: String,
    pub county_code: Option<String>,
    pub country_id: String,
    pub country_name: String,
    pub country_code: Option<String>,
}

/// Table holding flattened facilities
pub const ORGANISATION_UNITS_TABLE: &str = "organisation_units";

impl IntoFrame for FlatFacility {
    fn schema() -> Vec<Column> {
        [
            "facility_id",
            "facility_name",
            "mfl_code",
            "ward_id",
            "ward_name",
            "ward_code",
            "sub_county_id",
            "sub_county_name",
            "sub_county_code",
            "county_id",
            "county_name",
            "county_code",
            "country_id",
            "country_name",
            "country_code",
        ]
        .into_iter()
        .map(|name| Column::new(name, ColumnType::Text))
        .collect()
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.facility_id.as_str().into(),
            self.facility_name.as_str().into(),
            self.mfl_code.as_deref().into(),
            self.ward_id.as_str().into(),
            self.ward_name.as_str().into(),
            self.ward_code.as_deref().into(),
            self.sub_county_id.as_str().into(),
            self.sub_county_name.as_str().into(),
            self.sub_county_code.as_deref().into(),
            self.county_id.as_str().into(),
            self.county_name.as_str().into(),
            self.county_code.as_deref().into(),
            self.country_id.as_str().into(),
            self.country_name.as_str().into(),
            self.country_code.as_deref().into(),
        ]
    }
}

/// facility_id → county_name lookup rows read back from `organisation_units`
pub fn county_lookup_from_frame(frame: &Frame) -> Result<Vec<(String, String)>> {
    frame
        .iter_rows()
        .map(|row| {
            Ok((
                row.text("facility_id")?.to_string(),
                row.text("county_name")?.to_string(),
            ))
        })
        .collect()
}

/// Facility ids in table order
pub fn facility_ids_from_frame(frame: &Frame) -> Result<Vec<String>> {
    frame
        .iter_rows()
        .map(|row| row.text("facility_id").map(str::to_string))
        .collect()
}
