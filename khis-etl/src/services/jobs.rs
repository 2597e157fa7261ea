//! Background job tracking
//!
//! Handlers that return before their work finishes register a job here and
//! hand over the work future. The registry records the outcome and owns the
//! table claims that keep two runs off the same destination table.
//!
//! Finished records are kept up to a cap; the oldest are evicted first.
//! Running jobs are never evicted.

use chrono::{DateTime, Utc};
use khis_common::Program;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::RunKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Metadata,
    Extract,
    Transform,
    Full,
}

impl From<RunKind> for JobKind {
    fn from(kind: RunKind) -> Self {
        match kind {
            RunKind::Extract => JobKind::Extract,
            RunKind::Transform => JobKind::Transform,
            RunKind::Full => JobKind::Full,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Running,
    Completed,
    Failed,
}

/// Job status as reported by `GET /jobs/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub kind: JobKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<Program>,
    pub state: JobState,
    pub message: Option<String>,
    /// Rows written by the job, once completed
    pub rows: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// What a finished job reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub message: String,
    pub rows: u64,
}

/// A destination table already held by a running job
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Table '{0}' already has a run in progress")]
pub struct TableBusy(pub String);

/// Finished job records retained for `GET /jobs/{id}`
pub const DEFAULT_FINISHED_JOB_CAP: usize = 256;

type ClaimSet = Arc<Mutex<HashSet<String>>>;

fn lock_claims(claims: &ClaimSet) -> std::sync::MutexGuard<'_, HashSet<String>> {
    // a panic while holding the set cannot leave it half-updated
    claims.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Held destination tables, released on drop
#[derive(Debug)]
pub struct TableClaim {
    tables: Vec<String>,
    claims: ClaimSet,
}

impl TableClaim {
    pub fn tables(&self) -> &[String] {
        &self.tables
    }
}

impl Drop for TableClaim {
    fn drop(&mut self) {
        let mut held = lock_claims(&self.claims);
        for table in &self.tables {
            held.remove(table);
        }
    }
}

/// Drop the oldest finished records beyond `cap`
fn evict_finished(jobs: &mut HashMap<Uuid, JobRecord>, cap: usize) {
    let mut finished: Vec<(DateTime<Utc>, Uuid)> = jobs
        .values()
        .filter_map(|r| r.ended_at.map(|ended| (ended, r.job_id)))
        .collect();
    if finished.len() <= cap {
        return;
    }

    finished.sort();
    let excess = finished.len() - cap;
    for (_, job_id) in finished.into_iter().take(excess) {
        jobs.remove(&job_id);
    }
    debug!(evicted = excess, "Evicted finished job records");
}

#[derive(Clone)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<Uuid, JobRecord>>>,
    claims: ClaimSet,
    finished_cap: usize,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::with_finished_cap(DEFAULT_FINISHED_JOB_CAP)
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_finished_cap(finished_cap: usize) -> Self {
        Self {
            jobs: Arc::default(),
            claims: ClaimSet::default(),
            finished_cap,
        }
    }

    /// Claim every table or none of them
    pub fn claim<S: AsRef<str>>(&self, tables: &[S]) -> Result<TableClaim, TableBusy> {
        let mut held = lock_claims(&self.claims);
        if let Some(busy) = tables.iter().find(|t| held.contains(t.as_ref())) {
            return Err(TableBusy(busy.as_ref().to_string()));
        }

        let tables: Vec<String> = tables.iter().map(|t| t.as_ref().to_string()).collect();
        held.extend(tables.iter().cloned());
        Ok(TableClaim {
            tables,
            claims: self.claims.clone(),
        })
    }

    pub fn is_claimed(&self, table: &str) -> bool {
        lock_claims(&self.claims).contains(table)
    }

    pub async fn get(&self, job_id: Uuid) -> Option<JobRecord> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    /// Record a running job and drive `work` to completion on a tokio task.
    /// The claim is released once the outcome is recorded.
    pub async fn track<F>(
        &self,
        kind: JobKind,
        program: Option<Program>,
        claim: TableClaim,
        work: F,
    ) -> Uuid
    where
        F: Future<Output = Result<JobOutcome, String>> + Send + 'static,
    {
        let job_id = Uuid::new_v4();
        let record = JobRecord {
            job_id,
            kind,
            program,
            state: JobState::Running,
            message: None,
            rows: None,
            started_at: Utc::now(),
            ended_at: None,
        };
        self.jobs.write().await.insert(job_id, record);
        info!(%job_id, ?kind, tables = ?claim.tables(), "Job started");

        let jobs = self.jobs.clone();
        let finished_cap = self.finished_cap;
        tokio::spawn(async move {
            let outcome = work.await;
            let mut jobs = jobs.write().await;
            if let Some(record) = jobs.get_mut(&job_id) {
                record.ended_at = Some(Utc::now());
                match outcome {
                    Ok(done) => {
                        info!(%job_id, rows = done.rows, "Job completed: {}", done.message);
                        record.state = JobState::Completed;
                        record.message = Some(done.message);
                        record.rows = Some(done.rows);
                    }
                    Err(message) => {
                        error!(%job_id, "Job failed: {}", message);
                        record.state = JobState::Failed;
                        record.message = Some(message);
                    }
                }
            }
            evict_finished(&mut jobs, finished_cap);
            drop(jobs);
            drop(claim);
        });

        job_id
    }
}
