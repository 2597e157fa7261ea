//! Health programs served by the pipeline
//!
//! A closed set compared structurally everywhere. Parsing from text happens
//! once at the edges (config, query strings) and nowhere else.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Program whose data a pipeline run extracts and summarises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Program {
    /// Family planning
    #[serde(rename = "FP")]
    Fp,
    /// Maternal, newborn and child health
    #[serde(rename = "MNCH")]
    Mnch,
}

impl Program {
    pub const ALL: [Program; 2] = [Program::Fp, Program::Mnch];

    /// Canonical upper-case label ("FP" / "MNCH")
    pub fn as_str(&self) -> &'static str {
        match self {
            Program::Fp => "FP",
            Program::Mnch => "MNCH",
        }
    }

    /// Prefix every destination table of this program must carry
    pub fn table_prefix(&self) -> &'static str {
        match self {
            Program::Fp => "fp_",
            Program::Mnch => "mnch_",
        }
    }

    /// Whether the "2 Rod" unit split runs after aggregation
    pub fn applies_unit_split(&self) -> bool {
        matches!(self, Program::Fp)
    }

    /// Whether service rows get the per-analytic multipliers
    pub fn applies_service_adjustments(&self) -> bool {
        matches!(self, Program::Fp)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Program {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FP" => Ok(Program::Fp),
            "MNCH" => Ok(Program::Mnch),
            other => Err(Error::Config(format!(
                "Unknown program '{}' (expected FP or MNCH)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("fp".parse::<Program>().unwrap(), Program::Fp);
        assert_eq!(" MNCH ".parse::<Program>().unwrap(), Program::Mnch);
        assert!("HIV".parse::<Program>().is_err());
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(Program::Fp.table_prefix(), "fp_");
        assert_eq!(Program::Mnch.table_prefix(), "mnch_");
    }

    #[test]
    fn test_only_fp_splits_units() {
        assert!(Program::Fp.applies_unit_split());
        assert!(!Program::Mnch.applies_unit_split());
    }

    #[test]
    fn test_serde_uses_upper_case_labels() {
        assert_eq!(serde_json::to_string(&Program::Mnch).unwrap(), "\"MNCH\"");
        let parsed: Program = serde_json::from_str("\"FP\"").unwrap();
        assert_eq!(parsed, Program::Fp);
    }
}
