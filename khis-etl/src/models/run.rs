//! Pipeline run state machine
//!
//! A run progresses through fixed stages:
//! PREPARE → CLEANUP → EXTRACT/TRANSFORM → LOAD → DONE
//!
//! FAILED is reachable from any non-terminal stage. No stage is retried.

use chrono::{DateTime, NaiveDate, Utc};
use khis_common::{Error, Program, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::DuplicateAudit;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    /// Resolve inputs (facilities, periods)
    Prepare,
    /// Delete existing rows for the target periods
    Cleanup,
    /// Batched extraction and/or aggregation
    ExtractTransform,
    /// Write the summary table
    Load,
    /// Run finished successfully
    Done,
    /// Run aborted
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(&self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Prepare, Cleanup) | (Cleanup, ExtractTransform) | (ExtractTransform, Load) | (Load, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Prepare => "PREPARE",
            RunState::Cleanup => "CLEANUP",
            RunState::ExtractTransform => "EXTRACT/TRANSFORM",
            RunState::Load => "LOAD",
            RunState::Done => "DONE",
            RunState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub old_state: RunState,
    pub new_state: RunState,
    pub transitioned_at: DateTime<Utc>,
}

/// What a run does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Extract,
    Transform,
    Full,
}

/// Run request (date window inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunRequest {
    /// Cleanup + batched extraction into the raw table
    Extract { start: NaiveDate, end: NaiveDate },
    /// Aggregation of the raw table into the summary table
    Transform,
    /// Extract then transform
    Full { start: NaiveDate, end: NaiveDate },
}

impl RunRequest {
    pub fn kind(&self) -> RunKind {
        match self {
            RunRequest::Extract { .. } => RunKind::Extract,
            RunRequest::Transform => RunKind::Transform,
            RunRequest::Full { .. } => RunKind::Full,
        }
    }

    /// Extraction window, if this kind extracts
    pub fn window(&self) -> Option<(NaiveDate, NaiveDate)> {
        match *self {
            RunRequest::Extract { start, end } | RunRequest::Full { start, end } => {
                Some((start, end))
            }
            RunRequest::Transform => None,
        }
    }

    pub fn transforms(&self) -> bool {
        matches!(self, RunRequest::Transform | RunRequest::Full { .. })
    }
}

/// Outcome of one extraction batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    /// 1-based batch number
    pub batch: usize,
    pub facilities: usize,
    /// Rows appended (0 when the remote had no data)
    pub rows: usize,
}

/// In-memory run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSession {
    pub run_id: Uuid,
    pub program: Program,
    pub kind: RunKind,
    pub state: RunState,
    pub transitions: Vec<StateTransition>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunSession {
    pub fn new(program: Program, kind: RunKind) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            program,
            kind,
            state: RunState::Prepare,
            transitions: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state, rejecting illegal moves
    pub fn transition_to(&mut self, new_state: RunState) -> Result<StateTransition> {
        if !self.state.can_transition_to(new_state) {
            return Err(Error::Internal(format!(
                "Illegal run transition {} → {}",
                self.state, new_state
            )));
        }

        let transition = StateTransition {
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;
        self.transitions.push(transition.clone());

        if new_state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        Ok(transition)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub program: Program,
    pub kind: RunKind,
    /// Rows appended to the raw table
    pub rows_extracted: usize,
    pub batches: Vec<BatchResult>,
    /// Raw-table audit (transform kinds only)
    pub audit: Option<DuplicateAudit>,
    /// Rows written to the summary table
    pub rows_written: u64,
    pub transitions: Vec<StateTransition>,
}

/// Compact view of a report for response envelopes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub program: Program,
    pub kind: RunKind,
    pub final_state: Option<RunState>,
    pub rows_extracted: usize,
    pub batches: usize,
    pub rows_written: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_rows: Option<usize>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            program: self.program,
            kind: self.kind,
            final_state: self.transitions.last().map(|t| t.new_state),
            rows_extracted: self.rows_extracted,
            batches: self.batches.len(),
            rows_written: self.rows_written,
            duplicate_rows: self.audit.as_ref().map(|a| a.duplicate_rows),
        }
    }
}
