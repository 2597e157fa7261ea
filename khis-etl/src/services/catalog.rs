//! Analytic catalog
//!
//! Static lookup tables consumed by the aggregation engine: element id →
//! standardized analytic name, and the multipliers applied to FP service rows.

use std::collections::HashMap;

/// Name given to element ids absent from the catalog
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

const KENYA_ANALYTIC_NAMES: [(&str, &str); 32] = [
    // FP
    ("dl4JcBnxu0X", "POPs"),
    ("uHM6lzLXDBd", "POPs"),
    ("tfPZ6sGgh4q", "Non-Hormonal IUCD"),
    ("hRktPfPEegP", "Non-Hormonal IUCD"),
    ("cV4qoKSYiBs", "Male Condoms"),
    ("AVDzuypqGt9", "Male Condoms"),
    ("APbXNRovb5w", "Levoplant"),
    ("CJdFYcZ1zOq", "Implanon"),
    ("XgJfT71Unkn", "Implanon"),
    ("MsS41X1GEFr", "Jadelle"),
    ("zXbxl6y97mi", "Hormonal IUCD"),
    ("Wv02gixbRpT", "Hormonal IUCD"),
    ("Fxb4iVJdw2g", "Female Condoms"),
    ("AR7RhdC90IV", "Female Condoms"),
    ("paDQStynGGD", "EC Pills"),
    ("qaBPR9wbWku", "EC Pills"),
    ("NMCIxSeGpS3", "DMPA-SC"),
    ("hXa1xyUMfTa", "DMPA-SC"),
    ("PgQIx7Hq1kp", "DMPA-IM"),
    ("J6qnTev1LXw", "DMPA-IM"),
    ("fYCo4peO0yE", "Cycle Beads"),
    ("bGGT0F7iRxt", "Cycle Beads"),
    ("BQmcVE8fex4", "COCs"),
    ("hH9gmEmEhH4", "COCs"),
    ("TUHzoPGLM3t", "2 Rod"),
    // MNCH
    ("GOFxghdlf5n", "Chlorhexidine Gel"),
    ("qoEFejcajz1", "Tetracycline Eye Ointment"),
    ("WbDKZsPHAOK", "Magnesium Sulphate Injection"),
    ("pxdnKL8X8aP", "Iron and Folic Acid Supplementation"),
    ("BT8vV7Z7anH", "Gentamicin Injection"),
    ("QYT9nPwdqOz", "Benzyl Penicillin Injection"),
    ("rEQd6IDeXWT", "Oxytocin Injection"),
];

const KENYA_FP_SERVICE_ADJUSTMENTS: [(&str, f64); 4] = [
    ("COCs", 1.25),
    ("POPs", 0.5),
    ("Female Condoms", 10.0),
    ("Male Condoms", 10.0),
];

#[derive(Debug, Clone, Default)]
pub struct AnalyticCatalog {
    names: HashMap<String, String>,
    service_adjustments: HashMap<String, f64>,
}

impl AnalyticCatalog {
    pub fn new(names: HashMap<String, String>, service_adjustments: HashMap<String, f64>) -> Self {
        Self {
            names,
            service_adjustments,
        }
    }

    pub fn kenya_defaults() -> Self {
        Self::new(
            KENYA_ANALYTIC_NAMES
                .iter()
                .map(|(id, name)| (id.to_string(), name.to_string()))
                .collect(),
            KENYA_FP_SERVICE_ADJUSTMENTS
                .iter()
                .map(|(name, factor)| (name.to_string(), *factor))
                .collect(),
        )
    }

    /// Standardized name for an element id
    pub fn analytic_name(&self, analytic_id: &str) -> &str {
        self.names
            .get(analytic_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_PRODUCT)
    }

    /// Multiplier for service rows of `analytic` (1.0 when unlisted)
    pub fn service_factor(&self, analytic: &str) -> f64 {
        self.service_adjustments
            .get(analytic)
            .copied()
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let catalog = AnalyticCatalog::kenya_defaults();
        assert_eq!(catalog.analytic_name("cV4qoKSYiBs"), "Male Condoms");
        assert_eq!(catalog.analytic_name("rEQd6IDeXWT"), "Oxytocin Injection");
        assert_eq!(catalog.analytic_name("nope"), UNKNOWN_PRODUCT);
    }

    #[test]
    fn test_factors() {
        let catalog = AnalyticCatalog::kenya_defaults();
        assert_eq!(catalog.service_factor("COCs"), 1.25);
        assert_eq!(catalog.service_factor("POPs"), 0.5);
        assert_eq!(catalog.service_factor("Implanon"), 1.0);
    }
}
