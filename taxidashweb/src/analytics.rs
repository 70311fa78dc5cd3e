use std::time::Instant;

use hyper::Method;
use hyper::http::request::Parts;
use serde::Serialize;
use serde_json::json;
use taxidash_common::aggregates::refresh_aggregates;
use taxidash_common::filters::{FilterField, SummaryFilters, TripFilters};
use taxidash_common::queries::{overview, trip_summary};
use tracing::info;

use crate::{
    connect_to_db, get_query_pairs, render_api_response, return_400, return_405, return_db_error,
    ResponseResult,
};
use crate::response::Metadata;


#[derive(Clone, Debug, PartialEq, Serialize)]
struct RefreshResult {
    pub message: String,
    pub refreshed: Vec<&'static str>,
}


pub(crate) async fn handle_trip_analytics(parts: &Parts) -> ResponseResult {
    if parts.method != Method::GET {
        return return_405(&["GET"]);
    }

    let query_pairs = get_query_pairs(parts);
    let filters = match TripFilters::from_query_pairs(&query_pairs, &FilterField::ALL) {
        Ok(f) => f,
        Err(e) => return return_400(&e.to_string()),
    };

    let started = Instant::now();
    let client = match connect_to_db().await {
        Ok(c) => c,
        Err(response) => return response,
    };
    let queried = match overview(&client, &filters).await {
        Ok(q) => q,
        Err(e) => return return_db_error(&e),
    };

    let metadata = Metadata::new(queried.data.row_count(), &filters, Some(queried.data_source), started);
    render_api_response(metadata, &queried.data)
}


pub(crate) async fn handle_refresh_trip_analytics(parts: &Parts) -> ResponseResult {
    if parts.method != Method::POST {
        return return_405(&["POST"]);
    }

    let started = Instant::now();
    let mut client = match connect_to_db().await {
        Ok(c) => c,
        Err(response) => return response,
    };
    let refreshed = match refresh_aggregates(&mut client).await {
        Ok(r) => r,
        Err(e) => return return_db_error(&e),
    };
    info!("refreshed {} aggregates on request", refreshed.len());

    refresh_response(refreshed, started)
}

fn refresh_response(refreshed: Vec<&'static str>, started: Instant) -> ResponseResult {
    let metadata = Metadata::new(refreshed.len(), &json!({}), None, started);
    let result = RefreshResult {
        message: "Trip analytics refreshed".to_owned(),
        refreshed,
    };
    render_api_response(metadata, &result)
}


pub(crate) async fn handle_trip_summary(parts: &Parts) -> ResponseResult {
    if parts.method != Method::GET {
        return return_405(&["GET"]);
    }

    let query_pairs = get_query_pairs(parts);
    let filters = match SummaryFilters::from_query_pairs(&query_pairs) {
        Ok(f) => f,
        Err(e) => return return_400(&e.to_string()),
    };

    let started = Instant::now();
    let client = match connect_to_db().await {
        Ok(c) => c,
        Err(response) => return response,
    };
    let queried = match trip_summary(&client, &filters).await {
        Ok(q) => q,
        Err(e) => return return_db_error(&e),
    };

    let metadata = Metadata::new(queried.data.len(), &filters, Some(queried.data_source), started);
    render_api_response(metadata, &queried.data)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::response_json;

    #[tokio::test]
    async fn test_refresh_response_shape() {
        let response = refresh_response(vec!["analytics_kpis", "analytics_peak_hours"], Instant::now()).unwrap();
        assert_eq!(response.status(), 200);

        let value = response_json(response).await;
        assert_eq!(value["data"]["message"], json!("Trip analytics refreshed"));
        assert_eq!(value["data"]["refreshed"], json!(["analytics_kpis", "analytics_peak_hours"]));
        assert_eq!(value["metadata"]["row_count"], json!(2));
        assert_eq!(value["metadata"]["filters"], json!({}));
        assert!(value["metadata"]["execution_time_sec"].is_f64());
    }

    #[tokio::test]
    async fn test_refresh_requires_post() {
        let (parts, _) = hyper::Request::builder()
            .method(Method::GET)
            .uri("/api/refresh-trip-analytics")
            .body(())
            .unwrap()
            .into_parts();
        let response = handle_refresh_trip_analytics(&parts).await.unwrap();
        assert_eq!(response.status(), 405);
        assert_eq!(response.headers()["Allow"], "POST");
    }
}
