//! Remote metadata rows

use khis_common::db::{Column, ColumnType, Frame, IntoFrame, Value};
use khis_common::Result;
use serde::{Deserialize, Serialize};

pub const DATA_ELEMENTS_TABLE: &str = "data_elements";
pub const INDICATORS_TABLE: &str = "indicators";

/// Data element (raw analytic) with display names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataElement {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "shortName")]
    pub short_name: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
}

impl IntoFrame for DataElement {
    fn schema() -> Vec<Column> {
        vec![
            Column::new("id", ColumnType::Text),
            Column::new("name", ColumnType::Text),
            Column::new("short_name", ColumnType::Text),
            Column::new("display_name", ColumnType::Text),
        ]
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.id.as_str().into(),
            self.name.as_str().into(),
            self.short_name.as_deref().into(),
            self.display_name.as_deref().into(),
        ]
    }
}

/// id → raw display name rows read back from `data_elements`
pub fn element_names_from_frame(frame: &Frame) -> Result<Vec<(String, String)>> {
    frame
        .iter_rows()
        .map(|row| Ok((row.text("id")?.to_string(), row.text("name")?.to_string())))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    pub id: String,
    pub name: String,
}

impl IntoFrame for Indicator {
    fn schema() -> Vec<Column> {
        vec![
            Column::new("id", ColumnType::Text),
            Column::new("name", ColumnType::Text),
        ]
    }

    fn to_row(&self) -> Vec<Value> {
        vec![self.id.as_str().into(), self.name.as_str().into()]
    }
}
