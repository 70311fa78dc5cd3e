use std::time::Instant;

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use taxidash_common::queries::DataSource;
use tracing::error;


const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";


/// Bookkeeping that accompanies every successful API response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct Metadata {
    pub row_count: usize,
    pub filters: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,
    pub execution_time_sec: f64,
    pub timestamp: String,
    #[serde(flatten)]
    pub extra: JsonMap<String, JsonValue>,
}
impl Metadata {
    pub fn new<F: Serialize>(row_count: usize, filters: &F, data_source: Option<DataSource>, started: Instant) -> Self {
        let filters_value = match serde_json::to_value(filters) {
            Ok(v) => v,
            Err(e) => {
                error!("failed to serialize filters: {}", e);
                JsonValue::Object(JsonMap::new())
            },
        };
        Self {
            row_count,
            filters: filters_value,
            data_source,
            execution_time_sec: round_millis(started.elapsed().as_secs_f64()),
            timestamp: format_timestamp(&Local::now()),
            extra: JsonMap::new(),
        }
    }

    pub fn with_extra<V: Into<JsonValue>>(mut self, key: &str, value: V) -> Self {
        self.extra.insert(key.to_owned(), value.into());
        self
    }
}


#[derive(Serialize)]
pub(crate) struct ApiResponse<'a, T> {
    pub metadata: Metadata,
    pub data: &'a T,
}


pub(crate) fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

pub(crate) fn format_timestamp(timestamp: &DateTime<Local>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}


#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;
    use taxidash_common::filters::TripFilters;

    use super::*;

    #[test]
    fn test_round_millis() {
        assert_eq!(round_millis(0.0), 0.0);
        assert_eq!(round_millis(1.23449), 1.234);
        assert_eq!(round_millis(2.0), 2.0);
    }

    #[test]
    fn test_format_timestamp() {
        let timestamp = Local.with_ymd_and_hms(2025, 6, 10, 7, 5, 1).unwrap();
        assert_eq!(format_timestamp(&timestamp), "2025-06-10 07:05:01");
    }

    #[test]
    fn test_metadata_shape() {
        let filters = TripFilters {
            hour: Some(8),
            ..TripFilters::default()
        };
        let metadata = Metadata::new(3, &filters, Some(DataSource::Trips), Instant::now())
            .with_extra("type", "pickup")
            .with_extra("limit", 150);
        let value = serde_json::to_value(&metadata).unwrap();

        assert_eq!(value["row_count"], json!(3));
        assert_eq!(value["filters"], json!({"hour": 8}));
        assert_eq!(value["data_source"], json!("trips"));
        assert_eq!(value["type"], json!("pickup"));
        assert_eq!(value["limit"], json!(150));
        assert!(value["execution_time_sec"].is_f64());
        assert_eq!(value["timestamp"].as_str().unwrap().len(), 19);
    }

    #[test]
    fn test_response_shape() {
        let data = vec![1, 2];
        let response = ApiResponse {
            metadata: Metadata::new(data.len(), &TripFilters::default(), None, Instant::now()),
            data: &data,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["data"], json!([1, 2]));
        assert_eq!(value["metadata"]["filters"], json!({}));
        assert!(value["metadata"].get("data_source").is_none());
    }
}
