//! KHIS client tests against a mock DHIS2 server

use chrono::NaiveDate;
use httpmock::prelude::*;
use khis_common::config::KhisConfig;
use khis_common::Error;
use khis_etl::services::{AnalyticsQuery, ChunkOutcome, IdScheme, KhisApi, KhisClient};
use std::time::Duration;

/// base64("admin:district")
const BASIC_AUTH: &str = "Basic YWRtaW46ZGlzdHJpY3Q=";

fn client(server: &MockServer) -> KhisClient {
    let credentials = KhisConfig {
        base_url: Some(format!("{}/", server.base_url())),
        username: Some("admin".to_string()),
        password: Some("district".to_string()),
    }
    .credentials()
    .unwrap();
    KhisClient::new(credentials, Duration::from_secs(5)).unwrap()
}

fn query() -> AnalyticsQuery {
    AnalyticsQuery {
        analytic_ids: vec!["cV4qoKSYiBs".to_string()],
        facility_ids: vec!["F1".to_string(), "F2".to_string()],
        start: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        end: NaiveDate::from_ymd_opt(2025, 2, 28).unwrap(),
        id_scheme: IdScheme::Uid,
    }
}

#[tokio::test]
async fn test_analytics_csv_parsed_with_basic_auth() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/analytics.csv")
                .header("authorization", BASIC_AUTH)
                .query_param("outputIdScheme", "UID");
            then.status(200).body(
                "Data,Organisation unit,Period,Value\n\
                 cV4qoKSYiBs.to0Pssxkq4S,F1,202501,12\n\
                 cV4qoKSYiBs,F2,202502,3.5\n",
            );
        })
        .await;

    let outcome = client(&server).analytics(&query()).await.unwrap();
    mock.assert_async().await;

    let ChunkOutcome::Rows(rows) = outcome else {
        panic!("expected rows, got {:?}", outcome);
    };
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].analytic, "cV4qoKSYiBs");
    assert_eq!(rows[0].period, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    assert_eq!(rows[1].value, 3.5);
}

#[tokio::test]
async fn test_header_only_payload_is_no_data() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/analytics.csv");
            then.status(200).body("Data,Organisation unit,Period,Value\n");
        })
        .await;

    let outcome = client(&server).analytics(&query()).await.unwrap();
    assert_eq!(outcome, ChunkOutcome::NoData);
}

#[tokio::test]
async fn test_empty_value_cells_are_skipped() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/analytics.csv");
            then.status(200).body(
                "Data,Organisation unit,Period,Value\n\
                 cV4qoKSYiBs,F1,202501,\n\
                 cV4qoKSYiBs,F2,202501,8\n",
            );
        })
        .await;

    let outcome = client(&server).analytics(&query()).await.unwrap();

    let ChunkOutcome::Rows(rows) = outcome else {
        panic!("expected rows, got {:?}", outcome);
    };
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].org_unit, "F2");
    assert_eq!(rows[0].value, 8.0);
}

#[tokio::test]
async fn test_server_error_is_transport() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/analytics.csv");
            then.status(500).body("Internal Server Error");
        })
        .await;

    let err = client(&server).analytics(&query()).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)), "{:?}", err);
}

#[tokio::test]
async fn test_unreachable_server_is_transport() {
    let credentials = KhisConfig {
        base_url: Some("http://127.0.0.1:1".to_string()),
        username: Some("admin".to_string()),
        password: Some("district".to_string()),
    }
    .credentials()
    .unwrap();
    let client = KhisClient::new(credentials, Duration::from_secs(2)).unwrap();

    let err = client.data_elements().await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

#[tokio::test]
async fn test_organisation_units_decoded() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/organisationUnits")
                .query_param("paging", "false");
            then.status(200).json_body(serde_json::json!({
                "organisationUnits": [
                    {"id": "KE", "name": "Kenya", "level": 1},
                    {"id": "C1", "name": "Nairobi County", "level": 2, "parent": {"id": "KE"}, "code": "047"}
                ]
            }));
        })
        .await;

    let units = client(&server).organisation_units().await.unwrap();
    mock.assert_async().await;

    assert_eq!(units.len(), 2);
    assert_eq!(units[0].parent_id, None);
    assert_eq!(units[1].parent_id.as_deref(), Some("KE"));
    assert_eq!(units[1].code.as_deref(), Some("047"));
}

#[tokio::test]
async fn test_non_list_metadata_is_schema_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/indicators");
            then.status(200)
                .json_body(serde_json::json!({"indicators": {"id": "x"}}));
        })
        .await;

    let err = client(&server).indicators().await.unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[tokio::test]
async fn test_invalid_json_is_schema_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/dataElements");
            then.status(200).body("<html>login</html>");
        })
        .await;

    let err = client(&server).data_elements().await.unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
}

#[tokio::test]
async fn test_data_elements_decoded() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/dataElements");
            then.status(200).json_body(serde_json::json!({
                "dataElements": [
                    {"id": "cV4qoKSYiBs", "name": "MOH 711 Male Condoms", "shortName": "Male condoms", "displayName": "Male Condoms"}
                ]
            }));
        })
        .await;

    let elements = client(&server).data_elements().await.unwrap();
    assert_eq!(elements[0].short_name.as_deref(), Some("Male condoms"));
}
