//! Wire types returned by breakdown endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::Query;

/// Why the server left imported data out of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SkipImportedReason {
    /// The query shape cannot be answered from imported data.
    UnsupportedQuery,
    NotRequested,
    NoImportedData,
    OutOfRange,
    Other(String),
}

impl From<String> for SkipImportedReason {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "unsupported_query" => Self::UnsupportedQuery,
            "not_requested" => Self::NotRequested,
            "no_imported_data" => Self::NoImportedData,
            "out_of_range" => Self::OutOfRange,
            _ => Self::Other(raw),
        }
    }
}

impl From<SkipImportedReason> for String {
    fn from(reason: SkipImportedReason) -> Self {
        match reason {
            SkipImportedReason::UnsupportedQuery => "unsupported_query".to_string(),
            SkipImportedReason::NotRequested => "not_requested".to_string(),
            SkipImportedReason::NoImportedData => "no_imported_data".to_string(),
            SkipImportedReason::OutOfRange => "out_of_range".to_string(),
            SkipImportedReason::Other(raw) => raw,
        }
    }
}

/// One ranked dimension value of a breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRow {
    pub name: String,
    /// Filter value for location rows, whose display name differs from it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub visitors: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_visitors: Option<i64>,
    /// Money is pre-formatted server-side; kept opaque here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_revenue: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_revenue: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_flag: Option<String>,
}

impl BreakdownRow {
    pub fn named(name: impl Into<String>, visitors: i64) -> Self {
        Self {
            name: name.into(),
            code: None,
            visitors,
            events: None,
            percentage: None,
            conversion_rate: None,
            total_visitors: None,
            total_revenue: None,
            average_revenue: None,
            flag: None,
            country_flag: None,
        }
    }

    pub fn has_revenue(&self) -> bool {
        self.total_revenue.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    pub results: Vec<BreakdownRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_imported_reason: Option<SkipImportedReason>,
}

impl FetchResult {
    /// Whether to warn that imported data was left out of this result.
    ///
    /// Realtime never includes imported data, so it never warns.
    pub fn imported_query_unsupported(&self, query: &Query) -> bool {
        self.skip_imported_reason == Some(SkipImportedReason::UnsupportedQuery)
            && !query.is_realtime()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Period;

    #[test]
    fn deserializes_location_row_with_extras() {
        let raw = r#"{"name":"United States","code":"US","flag":"🇺🇸","visitors":12,"percentage":40.0,"extra":1}"#;
        let row: BreakdownRow = serde_json::from_str(raw).expect("row");
        assert_eq!(row.code.as_deref(), Some("US"));
        assert_eq!(row.visitors, 12);
        assert_eq!(row.conversion_rate, None);
    }

    #[test]
    fn null_revenue_counts_as_absent() {
        let row: BreakdownRow =
            serde_json::from_str(r#"{"name":"a","visitors":1,"total_revenue":null}"#).expect("row");
        assert!(!row.has_revenue());
        let row: BreakdownRow = serde_json::from_str(
            r#"{"name":"a","visitors":1,"total_revenue":{"short":"$1","long":"$1.00"}}"#,
        )
        .expect("row");
        assert!(row.has_revenue());
    }

    #[test]
    fn unsupported_query_warning_skips_realtime() {
        let result: FetchResult =
            serde_json::from_str(r#"{"results":[],"skip_imported_reason":"unsupported_query"}"#)
                .expect("result");
        let mut query = Query::default();
        assert!(result.imported_query_unsupported(&query));
        query.period = Period::Realtime;
        assert!(!result.imported_query_unsupported(&query));
    }

    #[test]
    fn other_skip_reasons_do_not_warn() {
        let result: FetchResult =
            serde_json::from_str(r#"{"results":[],"skip_imported_reason":"brand_new"}"#)
                .expect("result");
        assert_eq!(
            result.skip_imported_reason,
            Some(SkipImportedReason::Other("brand_new".to_string()))
        );
        assert!(!result.imported_query_unsupported(&Query::default()));
    }
}
