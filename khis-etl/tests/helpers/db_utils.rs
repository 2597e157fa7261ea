//! Store fixtures

use async_trait::async_trait;
use khis_common::config::TomlConfig;
use khis_common::db::{
    init_database, to_frame, Frame, IntoFrame, SqliteStore, TableStore, WriteMode,
};
use khis_common::{Error, Result};
use khis_etl::models::org_unit::ORGANISATION_UNITS_TABLE;
use khis_etl::models::FlatFacility;
use khis_etl::services::KhisApi;
use khis_etl::AppState;
use std::sync::Arc;

/// Fresh single-connection in-memory store
pub async fn create_test_store() -> Arc<SqliteStore> {
    let pool = init_database("sqlite::memory:").await.unwrap();
    Arc::new(SqliteStore::new(pool))
}

pub async fn seed_table<T: IntoFrame>(store: &dyn TableStore, table: &str, rows: &[T]) {
    store
        .write(table, &to_frame(rows), WriteMode::Replace)
        .await
        .unwrap();
}

/// Write `organisation_units` rows for (facility_id, county_name) pairs
pub async fn seed_facilities(store: &dyn TableStore, facilities: &[(&str, &str)]) {
    let rows: Vec<FlatFacility> = facilities
        .iter()
        .map(|(facility, county)| FlatFacility {
            facility_id: facility.to_string(),
            facility_name: format!("{} facility", facility),
            mfl_code: None,
            ward_id: format!("W-{}", facility),
            ward_name: "Ward".to_string(),
            ward_code: None,
            sub_county_id: format!("S-{}", facility),
            sub_county_name: "Sub".to_string(),
            sub_county_code: None,
            county_id: format!("C-{}", county),
            county_name: county.to_string(),
            county_code: None,
            country_id: "KE".to_string(),
            country_name: "Kenya".to_string(),
            country_code: None,
        })
        .collect();
    seed_table(store, ORGANISATION_UNITS_TABLE, &rows).await;
}

pub fn test_config() -> TomlConfig {
    let mut config = TomlConfig::default();
    config.pipeline.facility_chunk_size = 2;
    config
}

pub async fn test_app_state(api: Arc<dyn KhisApi>) -> (AppState, Arc<SqliteStore>) {
    let store = create_test_store().await;
    let state = AppState::new(store.clone(), api, test_config());
    (state, store)
}

/// Store that fails writes or deletes against one table
pub struct RefusingStore {
    pub inner: Arc<SqliteStore>,
    pub refused_write: Option<&'static str>,
    pub refused_delete: Option<&'static str>,
}

#[async_trait]
impl TableStore for RefusingStore {
    async fn exists(&self, table: &str) -> Result<bool> {
        self.inner.exists(table).await
    }

    async fn write(&self, table: &str, frame: &Frame, mode: WriteMode) -> Result<u64> {
        if self.refused_write == Some(table) {
            return Err(Error::Persistence("disk full".to_string()));
        }
        self.inner.write(table, frame, mode).await
    }

    async fn delete_where(&self, table: &str, column: &str, values: &[String]) -> Result<u64> {
        if self.refused_delete == Some(table) {
            return Err(Error::Persistence("database is locked".to_string()));
        }
        self.inner.delete_where(table, column, values).await
    }

    async fn select(&self, table: &str, columns: &[&str]) -> Result<Frame> {
        self.inner.select(table, columns).await
    }
}
