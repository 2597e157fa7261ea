//! Raw and aggregated observation rows

use chrono::NaiveDate;
use khis_common::db::{Column, ColumnType, Frame, IntoFrame, Value};
use khis_common::Result;
use serde::{Deserialize, Serialize};

/// Columns of a raw extraction table
pub const RAW_COLUMNS: [&str; 4] = ["analytic", "org_unit", "period", "value"];

/// One extracted value: analytic × facility × month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Element id with category suffix removed
    pub analytic: String,
    /// Facility id
    pub org_unit: String,
    /// First day of the month
    pub period: NaiveDate,
    pub value: f64,
}

impl Observation {
    /// Decode rows of a frame holding `RAW_COLUMNS`
    pub fn from_frame(frame: &Frame) -> Result<Vec<Self>> {
        frame
            .iter_rows()
            .map(|row| {
                Ok(Self {
                    analytic: row.text("analytic")?.to_string(),
                    org_unit: row.text("org_unit")?.to_string(),
                    period: row.date("period")?,
                    value: row.real("value")?,
                })
            })
            .collect()
    }
}

impl IntoFrame for Observation {
    fn schema() -> Vec<Column> {
        vec![
            Column::new("analytic", ColumnType::Text),
            Column::new("org_unit", ColumnType::Text),
            Column::new("period", ColumnType::Date),
            Column::new("value", ColumnType::Real),
        ]
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.analytic.as_str().into(),
            self.org_unit.as_str().into(),
            self.period.into(),
            self.value.into(),
        ]
    }
}

/// County or national aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Standardized analytic name
    pub analytic: String,
    /// Method label ("Service", "Consumption", "Unknown Method")
    pub method: String,
    /// County name, or "Kenya" for national rows
    pub org_unit: String,
    pub period: NaiveDate,
    pub value: f64,
}

impl SummaryRow {
    pub fn from_frame(frame: &Frame) -> Result<Vec<Self>> {
        frame
            .iter_rows()
            .map(|row| {
                Ok(Self {
                    analytic: row.text("analytic")?.to_string(),
                    method: row.text("method")?.to_string(),
                    org_unit: row.text("org_unit")?.to_string(),
                    period: row.date("period")?,
                    value: row.real("value")?,
                })
            })
            .collect()
    }
}

impl IntoFrame for SummaryRow {
    fn schema() -> Vec<Column> {
        vec![
            Column::new("analytic", ColumnType::Text),
            Column::new("method", ColumnType::Text),
            Column::new("org_unit", ColumnType::Text),
            Column::new("period", ColumnType::Date),
            Column::new("value", ColumnType::Real),
        ]
    }

    fn to_row(&self) -> Vec<Value> {
        vec![
            self.analytic.as_str().into(),
            self.method.as_str().into(),
            self.org_unit.as_str().into(),
            self.period.into(),
            self.value.into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use khis_common::db::to_frame;

    #[test]
    fn test_observation_frame_shape() {
        let obs = Observation {
            analytic: "cV4qoKSYiBs".to_string(),
            org_unit: "F1".to_string(),
            period: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            value: 100.0,
        };
        let frame = to_frame(std::slice::from_ref(&obs));
        let names: Vec<&str> = frame.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, RAW_COLUMNS);

        let decoded = Observation::from_frame(&frame).unwrap();
        assert_eq!(decoded, vec![obs]);
    }
}
