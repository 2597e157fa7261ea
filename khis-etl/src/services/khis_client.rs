//! KHIS (DHIS2) API client
//!
//! Analytics are fetched as CSV, one request per facility chunk. Metadata
//! (organisation units, data elements, indicators) is fetched as JSON.

use async_trait::async_trait;
use chrono::NaiveDate;
use khis_common::config::KhisCredentials;
use khis_common::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::models::{DataElement, Indicator, Observation, OrganisationUnit};
use crate::services::periods::{month_range, parse_period_code, period_codes};
use crate::services::registry::{FP_DISPENSED_SUFFIX, MNCH_DISPENSED_SUFFIX};

/// URL-encoded ':' between a dimension name and its items
const DIMENSION_PREFIX: &str = "%3A";
/// URL-encoded ';' between dimension items
const ITEM_SEPARATOR: &str = "%3B";

const STATIC_FLAGS: &str = "showHierarchy=false&hierarchyMeta=false&includeMetadataDetails=true\
&includeNumDen=false&skipRounding=false&completedOnly=false";

/// How the remote identifies metadata in its responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdScheme {
    #[default]
    Uid,
    Name,
    Code,
}

impl fmt::Display for IdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IdScheme::Uid => "UID",
            IdScheme::Name => "NAME",
            IdScheme::Code => "CODE",
        })
    }
}

/// One analytics request: all analytics × one facility chunk × the full window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyticsQuery {
    pub analytic_ids: Vec<String>,
    pub facility_ids: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub id_scheme: IdScheme,
}

/// Result of one analytics request that reached the server
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    Rows(Vec<Observation>),
    /// Empty body or header-only payload
    NoData,
    /// Payload could not be parsed
    Malformed(String),
}

/// Remote analytics capability
#[async_trait]
pub trait KhisApi: Send + Sync {
    async fn analytics(&self, query: &AnalyticsQuery) -> Result<ChunkOutcome>;
    async fn organisation_units(&self) -> Result<Vec<OrganisationUnit>>;
    async fn data_elements(&self) -> Result<Vec<DataElement>>;
    async fn indicators(&self) -> Result<Vec<Indicator>>;
}

/// Build the analytics CSV URL for `query`
pub fn build_analytics_url(base_url: &str, query: &AnalyticsQuery) -> String {
    let periods = period_codes(&month_range(query.start, query.end));
    format!(
        "{base}/api/analytics.csv?dimension=dx{p}{dx}&dimension=ou{p}{ou}&dimension=pe{p}{pe}&{flags}&outputIdScheme={scheme}",
        base = base_url.trim_end_matches('/'),
        p = DIMENSION_PREFIX,
        dx = query.analytic_ids.join(ITEM_SEPARATOR),
        ou = query.facility_ids.join(ITEM_SEPARATOR),
        pe = periods.join(ITEM_SEPARATOR),
        flags = STATIC_FLAGS,
        scheme = query.id_scheme,
    )
}

/// Remove the "dispensed" category suffixes from an element id
pub fn strip_dispensed_suffix(analytic: &str) -> String {
    analytic
        .replace(FP_DISPENSED_SUFFIX, "")
        .replace(MNCH_DISPENSED_SUFFIX, "")
}

/// Parse an analytics CSV payload.
///
/// Expects the columns `Data`, `Organisation unit`, `Period` and `Value`
/// (other columns are ignored). Rows with an empty `Value` carry no
/// observation and are skipped. Never fails: missing columns and
/// unparseable text come back as `ChunkOutcome::Malformed`.
pub fn parse_analytics_csv(body: &[u8]) -> ChunkOutcome {
    if body.iter().all(u8::is_ascii_whitespace) {
        return ChunkOutcome::NoData;
    }

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(body);

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => return ChunkOutcome::Malformed(format!("Unreadable header: {}", e)),
    };
    let position = |name: &str| headers.iter().position(|h| h.trim() == name);
    let (Some(data), Some(org_unit), Some(period), Some(value)) = (
        position("Data"),
        position("Organisation unit"),
        position("Period"),
        position("Value"),
    ) else {
        return ChunkOutcome::Malformed(format!(
            "Expected columns Data, Organisation unit, Period, Value; got {:?}",
            headers.iter().collect::<Vec<_>>()
        ));
    };

    let mut rows = Vec::new();
    let mut blank_values = 0usize;
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => return ChunkOutcome::Malformed(format!("Row {}: {}", line + 1, e)),
        };
        let field = |i: usize| record.get(i).unwrap_or("").trim();

        let Some(parsed_period) = parse_period_code(field(period)) else {
            return ChunkOutcome::Malformed(format!(
                "Row {}: invalid period {:?}",
                line + 1,
                field(period)
            ));
        };
        if field(value).is_empty() {
            blank_values += 1;
            continue;
        }
        let parsed_value = match field(value).parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                return ChunkOutcome::Malformed(format!(
                    "Row {}: invalid value {:?}",
                    line + 1,
                    field(value)
                ))
            }
        };

        rows.push(Observation {
            analytic: strip_dispensed_suffix(field(data)),
            org_unit: field(org_unit).to_string(),
            period: parsed_period,
            value: parsed_value,
        });
    }

    if blank_values > 0 {
        warn!(rows = blank_values, "Skipped analytics rows with an empty value");
    }

    if rows.is_empty() {
        ChunkOutcome::NoData
    } else {
        ChunkOutcome::Rows(rows)
    }
}

#[derive(Debug, Deserialize)]
struct ParentRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawOrganisationUnit {
    id: String,
    name: String,
    #[serde(default)]
    parent: Option<ParentRef>,
    level: u8,
    #[serde(default)]
    code: Option<String>,
}

impl From<RawOrganisationUnit> for OrganisationUnit {
    fn from(raw: RawOrganisationUnit) -> Self {
        Self {
            id: raw.id,
            name: raw.name,
            parent_id: raw.parent.map(|p| p.id),
            level: raw.level,
            code: raw.code,
        }
    }
}

/// reqwest-backed client
pub struct KhisClient {
    http_client: reqwest::Client,
    credentials: KhisCredentials,
}

impl KhisClient {
    pub fn new(credentials: KhisCredentials, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("khis-etl/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.credentials.base_url
    }

    /// GET with basic auth; non-2xx and network failures are transport errors
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url = %url, "Querying KHIS");

        let response = self
            .http_client
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Request to KHIS failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::Transport(format!(
                "KHIS returned {}: {}",
                status, snippet
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("Reading KHIS response failed: {}", e)))?;
        Ok(bytes.to_vec())
    }

    /// Fetch `path` and decode the list stored under `key`
    async fn get_list<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url(), path);
        info!("Requesting KHIS metadata: {}", url);

        let body = self.get_bytes(&url).await?;
        let payload: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| Error::Schema(format!("KHIS returned invalid JSON for {}: {}", path, e)))?;

        let items = match payload.get(key) {
            None => {
                warn!("KHIS response for {} has no '{}' key", path, key);
                return Ok(Vec::new());
            }
            Some(items) if items.is_array() => items.clone(),
            Some(_) => {
                return Err(Error::Schema(format!(
                    "Unexpected JSON structure: '{}' is not a list",
                    key
                )))
            }
        };

        serde_json::from_value(items)
            .map_err(|e| Error::Schema(format!("Unexpected '{}' entry shape: {}", key, e)))
    }
}

#[async_trait]
impl KhisApi for KhisClient {
    async fn analytics(&self, query: &AnalyticsQuery) -> Result<ChunkOutcome> {
        let url = build_analytics_url(self.base_url(), query);
        info!(
            facilities = query.facility_ids.len(),
            "Fetching analytics for {} to {}",
            query.start,
            query.end
        );

        let body = self.get_bytes(&url).await?;
        let outcome = parse_analytics_csv(&body);
        match &outcome {
            ChunkOutcome::Rows(rows) => debug!(rows = rows.len(), "Parsed analytics payload"),
            ChunkOutcome::NoData => debug!("Analytics payload had no rows"),
            ChunkOutcome::Malformed(reason) => warn!("Analytics payload malformed: {}", reason),
        }
        Ok(outcome)
    }

    async fn organisation_units(&self) -> Result<Vec<OrganisationUnit>> {
        let raw: Vec<RawOrganisationUnit> = self
            .get_list(
                "/api/organisationUnits?fields=name,id,parent,level,code&paging=false",
                "organisationUnits",
            )
            .await?;
        Ok(raw.into_iter().map(OrganisationUnit::from).collect())
    }

    async fn data_elements(&self) -> Result<Vec<DataElement>> {
        self.get_list(
            "/api/dataElements?fields=name,id,shortName,displayName&paging=false",
            "dataElements",
        )
        .await
    }

    async fn indicators(&self) -> Result<Vec<Indicator>> {
        self.get_list("/api/indicators?fields=name,id&paging=false", "indicators")
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_analytics_url() {
        let query = AnalyticsQuery {
            analytic_ids: vec!["hH9gmEmEhH4.to0Pssxkq4S".into(), "cV4qoKSYiBs".into()],
            facility_ids: vec!["F1".into(), "F2".into()],
            start: d(2024, 12, 15),
            end: d(2025, 2, 3),
            id_scheme: IdScheme::Uid,
        };
        assert_eq!(
            build_analytics_url("https://hiskenya.org/", &query),
            "https://hiskenya.org/api/analytics.csv?\
dimension=dx%3AhH9gmEmEhH4.to0Pssxkq4S%3BcV4qoKSYiBs&\
dimension=ou%3AF1%3BF2&\
dimension=pe%3A202412%3B202501%3B202502&\
showHierarchy=false&hierarchyMeta=false&includeMetadataDetails=true&includeNumDen=false\
&skipRounding=false&completedOnly=false&outputIdScheme=UID"
        );
    }

    #[test]
    fn test_parse_csv_renames_and_strips() {
        let body = b"Data,Organisation unit,Period,Value\n\
hH9gmEmEhH4.to0Pssxkq4S,F1,202501,12\n\
GOFxghdlf5n.hDCmaVTXH7W,F2,202502,3.5\n";
        let ChunkOutcome::Rows(rows) = parse_analytics_csv(body) else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].analytic, "hH9gmEmEhH4");
        assert_eq!(rows[0].period, d(2025, 1, 1));
        assert_eq!(rows[0].value, 12.0);
        assert_eq!(rows[1].analytic, "GOFxghdlf5n");
        assert_eq!(rows[1].org_unit, "F2");
    }

    #[test]
    fn test_parse_csv_ignores_extra_columns() {
        let body = b"Data,Data name,Organisation unit,Period,Value\ncV4qoKSYiBs,Male condoms,F1,202501,1\n";
        assert!(matches!(parse_analytics_csv(body), ChunkOutcome::Rows(r) if r.len() == 1));
    }

    #[test]
    fn test_parse_csv_empty_is_no_data() {
        assert_eq!(parse_analytics_csv(b""), ChunkOutcome::NoData);
        assert_eq!(
            parse_analytics_csv(b"Data,Organisation unit,Period,Value\n"),
            ChunkOutcome::NoData
        );
    }

    #[test]
    fn test_parse_csv_malformed() {
        assert!(matches!(
            parse_analytics_csv(b"foo,bar\n1,2\n"),
            ChunkOutcome::Malformed(_)
        ));
        assert!(matches!(
            parse_analytics_csv(b"Data,Organisation unit,Period,Value\nX,F1,2025-01,1\n"),
            ChunkOutcome::Malformed(_)
        ));
        assert!(matches!(
            parse_analytics_csv(b"Data,Organisation unit,Period,Value\nX,F1,202501,n/a\n"),
            ChunkOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_parse_csv_skips_blank_values() {
        let body = b"Data,Organisation unit,Period,Value\nX,F1,202501,\nX,F2,202501,4\n";
        let ChunkOutcome::Rows(rows) = parse_analytics_csv(body) else {
            panic!("expected rows");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].org_unit, "F2");

        // nothing left once blanks are dropped
        assert_eq!(
            parse_analytics_csv(b"Data,Organisation unit,Period,Value\nX,F1,202501, \n"),
            ChunkOutcome::NoData
        );
    }

    #[test]
    fn test_strip_suffix_is_literal() {
        assert_eq!(strip_dispensed_suffix("abcXto0Pssxkq4S"), "abcXto0Pssxkq4S");
        assert_eq!(strip_dispensed_suffix("abc.to0Pssxkq4S"), "abc");
    }
}
