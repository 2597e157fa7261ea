//! Analytic classification

use serde::{Deserialize, Serialize};

/// Reporting method of an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    /// Direct dispensing record (MOH 711)
    Service,
    /// Stock-based record (MOH 747A / MOH 647)
    Consumption,
    #[serde(rename = "Unknown Method")]
    Unknown,
}

impl Method {
    /// Classify by substring of the raw element display name.
    ///
    /// "711" is checked before "747"/"647".
    pub fn classify(raw_name: &str) -> Self {
        if raw_name.contains("711") {
            Method::Service
        } else if raw_name.contains("747") || raw_name.contains("647") {
            Method::Consumption
        } else {
            Method::Unknown
        }
    }

    /// Label stored in summary tables
    pub fn label(&self) -> &'static str {
        match self {
            Method::Service => "Service",
            Method::Consumption => "Consumption",
            Method::Unknown => "Unknown Method",
        }
    }
}

/// Exact-duplicate audit of raw rows
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateAudit {
    /// Rows inspected
    pub rows: usize,
    /// Every row belonging to a group of identical rows (a pair counts 2)
    pub duplicate_rows: usize,
    /// Groups of identical rows (a pair counts 1)
    pub duplicate_groups: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(Method::classify("MOH 711 Rev 2020_Male Condoms"), Method::Service);
        assert_eq!(Method::classify("MOH 747A_COCs"), Method::Consumption);
        assert_eq!(Method::classify("MOH 647_Oxytocin"), Method::Consumption);
        assert_eq!(Method::classify("Antenatal visits"), Method::Unknown);
    }

    #[test]
    fn test_service_wins_over_consumption() {
        assert_eq!(Method::classify("711 vs 747"), Method::Service);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Method::Unknown.label(), "Unknown Method");
        assert_eq!(
            serde_json::to_string(&Method::Unknown).unwrap(),
            "\"Unknown Method\""
        );
    }
}
