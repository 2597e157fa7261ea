//! Program registry
//!
//! Maps each program to the element identifiers queried for it, and guards
//! destination tables against cross-program writes.

use khis_common::{Error, Program, Result};
use std::collections::HashMap;
use tracing::warn;

/// Category-option suffix selecting the "dispensed" value (MOH 747A)
pub const FP_DISPENSED_SUFFIX: &str = ".to0Pssxkq4S";
/// Category-option suffix selecting the "dispensed" value (MOH 647)
pub const MNCH_DISPENSED_SUFFIX: &str = ".hDCmaVTXH7W";

const FP_CONSUMPTION_IDS: [&str; 13] = [
    "hH9gmEmEhH4", "bGGT0F7iRxt", "J6qnTev1LXw", "hXa1xyUMfTa", "qaBPR9wbWku",
    "dl4JcBnxu0X", "AR7RhdC90IV", "zXbxl6y97mi", "MsS41X1GEFr", "XgJfT71Unkn",
    "APbXNRovb5w", "AVDzuypqGt9", "tfPZ6sGgh4q",
];

const FP_SERVICE_IDS: [&str; 12] = [
    "cV4qoKSYiBs", "Fxb4iVJdw2g", "paDQStynGGD", "BQmcVE8fex4", "uHM6lzLXDBd",
    "fYCo4peO0yE", "PgQIx7Hq1kp", "NMCIxSeGpS3", "CJdFYcZ1zOq", "TUHzoPGLM3t",
    "Wv02gixbRpT", "hRktPfPEegP",
];

const MNCH_CONSUMPTION_IDS: [&str; 7] = [
    "GOFxghdlf5n", "qoEFejcajz1", "WbDKZsPHAOK", "pxdnKL8X8aP", "BT8vV7Z7anH",
    "QYT9nPwdqOz", "rEQd6IDeXWT",
];

#[derive(Debug, Clone)]
pub struct ProgramRegistry {
    analytic_ids: HashMap<Program, Vec<String>>,
}

impl ProgramRegistry {
    pub fn new(analytic_ids: HashMap<Program, Vec<String>>) -> Self {
        Self { analytic_ids }
    }

    /// Element identifiers used by the Kenya FP and MNCH reports
    pub fn kenya_defaults() -> Self {
        let fp = FP_CONSUMPTION_IDS
            .iter()
            .map(|id| format!("{}{}", id, FP_DISPENSED_SUFFIX))
            .chain(FP_SERVICE_IDS.iter().map(|id| id.to_string()))
            .collect();
        let mnch = MNCH_CONSUMPTION_IDS
            .iter()
            .map(|id| format!("{}{}", id, MNCH_DISPENSED_SUFFIX))
            .collect();

        Self::new(HashMap::from([(Program::Fp, fp), (Program::Mnch, mnch)]))
    }

    /// Query identifiers for `program`, in registry order
    pub fn resolve_analytic_ids(&self, program: Program) -> &[String] {
        self.analytic_ids
            .get(&program)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fail unless `table` carries `program`'s prefix
    pub fn validate_table_alignment(&self, program: Program, table: &str) -> Result<()> {
        if table.starts_with(program.table_prefix()) {
            return Ok(());
        }
        warn!(
            program = %program,
            table = table,
            "Program does not match destination table, refusing to continue"
        );
        Err(Error::Config(format!(
            "Program {} does not align with destination table {} (expected prefix '{}')",
            program,
            table,
            program.table_prefix()
        )))
    }
}

impl Default for ProgramRegistry {
    fn default() -> Self {
        Self::kenya_defaults()
    }
}
