//! In-process KHIS stand-in

use async_trait::async_trait;
use khis_common::{Error, Result};
use khis_etl::models::{DataElement, Indicator, OrganisationUnit};
use khis_etl::services::{AnalyticsQuery, ChunkOutcome, KhisApi};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Answers analytics queries from a script (NoData once exhausted) and
/// serves fixed metadata. Every analytics query is recorded.
#[derive(Default)]
pub struct FakeKhis {
    analytics: Mutex<VecDeque<Result<ChunkOutcome>>>,
    pub queries: Mutex<Vec<AnalyticsQuery>>,
    pub units: Vec<OrganisationUnit>,
    pub elements: Vec<DataElement>,
    pub indicators: Vec<Indicator>,
    /// Metadata calls that fail with a transport error
    pub failing: Vec<&'static str>,
}

impl FakeKhis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analytics(self, answers: Vec<Result<ChunkOutcome>>) -> Self {
        *self.analytics.lock().unwrap() = answers.into();
        self
    }

    pub fn with_metadata(
        mut self,
        units: Vec<OrganisationUnit>,
        elements: Vec<DataElement>,
        indicators: Vec<Indicator>,
    ) -> Self {
        self.units = units;
        self.elements = elements;
        self.indicators = indicators;
        self
    }

    pub fn failing(mut self, dataset: &'static str) -> Self {
        self.failing.push(dataset);
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    fn metadata<T: Clone>(&self, dataset: &str, items: &[T]) -> Result<Vec<T>> {
        if self.failing.contains(&dataset) {
            return Err(Error::Transport(format!("{} unavailable", dataset)));
        }
        Ok(items.to_vec())
    }
}

#[async_trait]
impl KhisApi for FakeKhis {
    async fn analytics(&self, query: &AnalyticsQuery) -> Result<ChunkOutcome> {
        self.queries.lock().unwrap().push(query.clone());
        self.analytics
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ChunkOutcome::NoData))
    }

    async fn organisation_units(&self) -> Result<Vec<OrganisationUnit>> {
        self.metadata("organisation_units", &self.units)
    }

    async fn data_elements(&self) -> Result<Vec<DataElement>> {
        self.metadata("data_elements", &self.elements)
    }

    async fn indicators(&self) -> Result<Vec<Indicator>> {
        self.metadata("indicators", &self.indicators)
    }
}

fn unit(id: &str, name: &str, parent: Option<&str>, level: u8) -> OrganisationUnit {
    OrganisationUnit {
        id: id.to_string(),
        name: name.to_string(),
        parent_id: parent.map(str::to_string),
        level,
        code: None,
    }
}

/// Kenya → two counties → one facility each (F1 in Nairobi, F2 in Mombasa),
/// plus an orphan facility whose ward is missing
pub fn kenya_units() -> Vec<OrganisationUnit> {
    vec![
        unit("KE", "Kenya", None, 1),
        unit("C1", "Nairobi County", Some("KE"), 2),
        unit("C2", "Mombasa County", Some("KE"), 2),
        unit("S1", "Westlands Sub County", Some("C1"), 3),
        unit("S2", "Mvita Sub County", Some("C2"), 3),
        unit("W1", "Parklands Ward", Some("S1"), 4),
        unit("W2", "Majengo Ward", Some("S2"), 4),
        unit("F1", "Aga Khan Hospital", Some("W1"), 5),
        unit("F2", "Coast General", Some("W2"), 5),
        unit("F9", "Lost Clinic", Some("W404"), 5),
    ]
}
