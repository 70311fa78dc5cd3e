use serde::Serialize;

use crate::aggregates::TRIP_SUMMARY;
use crate::errors::DbError;
use crate::filters::SummaryFilters;
use crate::queries::{DataSource, Queried};


#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TripSummaryRow {
    pub borough: Option<String>,
    pub weekday: i32,
    pub hour: i32,
    pub trip_count: i64,
    pub avg_fare: Option<f64>,
    pub avg_distance: Option<f64>,
    pub avg_duration_min: Option<f64>,
}


/// Reads the borough × weekday × hour summary. The filters apply to the aggregate's own key
/// columns, so this never needs the trips table.
pub async fn trip_summary(client: &tokio_postgres::Client, filters: &SummaryFilters) -> Result<Queried<Vec<TripSummaryRow>>, DbError> {
    let sql_filter = filters.sql_filter("agg");
    let query = TRIP_SUMMARY.select_materialized(&sql_filter.where_clause(), "");
    let rows = client.query(&query, sql_filter.values()).await
        .map_err(|e| DbError::Querying(e))?;

    let data = rows.iter()
        .map(|row| TripSummaryRow {
            borough: row.get("borough"),
            weekday: row.get("weekday"),
            hour: row.get("hour"),
            trip_count: row.get("trip_count"),
            avg_fare: row.get("avg_fare"),
            avg_distance: row.get("avg_distance"),
            avg_duration_min: row.get("avg_duration_min"),
        })
        .collect();
    Ok(Queried {
        data,
        data_source: DataSource::MaterializedViews,
    })
}
