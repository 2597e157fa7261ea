//! Metadata refresh integration tests

mod helpers;

use helpers::{create_test_store, kenya_units, seed_facilities, FakeKhis};
use khis_common::db::TableStore;
use khis_etl::models::org_unit::ORGANISATION_UNITS_TABLE;
use khis_etl::models::{DataElement, Indicator};
use khis_etl::services::MetadataRefresher;
use std::sync::Arc;

fn element(id: &str, name: &str) -> DataElement {
    DataElement {
        id: id.to_string(),
        name: name.to_string(),
        short_name: None,
        display_name: None,
    }
}

fn indicator(id: &str, name: &str) -> Indicator {
    Indicator {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// **Given:** a hierarchy with two complete facility chains and one orphan
/// **When:** metadata is refreshed
/// **Then:** two facilities are stored with cleaned county names
#[tokio::test]
async fn test_refresh_flattens_and_cleans_names() {
    let store = create_test_store().await;
    let api = FakeKhis::new().with_metadata(
        kenya_units(),
        vec![element("cV4qoKSYiBs", "MOH 711 Male Condoms")],
        vec![indicator("I1", "FP uptake")],
    );

    let report = MetadataRefresher::new(Arc::new(api), store.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.organisation_units, Some(2));
    assert_eq!(report.data_elements, Some(1));
    assert_eq!(report.indicators, Some(1));
    assert_eq!(report.dropped_facilities, 1);

    let frame = store
        .select(ORGANISATION_UNITS_TABLE, &["facility_id", "county_name", "ward_name"])
        .await
        .unwrap();
    let rows: Vec<(String, String, String)> = frame
        .iter_rows()
        .map(|row| {
            (
                row.text("facility_id").unwrap().to_string(),
                row.text("county_name").unwrap().to_string(),
                row.text("ward_name").unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![
            ("F1".to_string(), "Nairobi".to_string(), "Parklands".to_string()),
            ("F2".to_string(), "Mombasa".to_string(), "Majengo".to_string()),
        ]
    );
}

/// **Given:** existing facilities and a remote whose org-unit call fails
/// **When:** metadata is refreshed
/// **Then:** the facility table is left alone and the other datasets still save
#[tokio::test]
async fn test_failed_dataset_keeps_previous_table() {
    let store = create_test_store().await;
    seed_facilities(store.as_ref(), &[("OLD", "Kisumu")]).await;

    let api = FakeKhis::new()
        .with_metadata(
            kenya_units(),
            vec![element("cV4qoKSYiBs", "MOH 711 Male Condoms")],
            vec![],
        )
        .failing("organisation_units");

    let report = MetadataRefresher::new(Arc::new(api), store.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(report.organisation_units, None);
    assert_eq!(report.data_elements, Some(1));
    // empty download is skipped too
    assert_eq!(report.indicators, None);
    assert!(!store.exists("indicators").await.unwrap());

    let frame = store
        .select(ORGANISATION_UNITS_TABLE, &["facility_id"])
        .await
        .unwrap();
    assert_eq!(frame.height(), 1);
}
