use serde::Serialize;

use crate::aggregates::PEAK_HOURS;
use crate::errors::DbError;
use crate::filters::TripFilters;
use crate::queries::{query_aggregate, Queried};


pub const PEAK_HOUR_LIMIT: i64 = 10;


#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeakHourRow {
    pub weekday: i32,
    pub hour: i32,
    pub trip_count: i64,
    pub avg_fare: Option<f64>,
    pub avg_distance: Option<f64>,
    pub avg_duration_min: Option<f64>,
}


/// The busiest weekday × hour slots, by descending trip count.
pub async fn peak_hours(client: &tokio_postgres::Client, filters: &TripFilters) -> Result<Queried<Vec<PeakHourRow>>, DbError> {
    let (rows, data_source) = query_aggregate(client, &PEAK_HOURS, filters, |_| {
        (String::new(), format!("LIMIT {}", PEAK_HOUR_LIMIT))
    }).await?;

    let data = rows.iter()
        .map(|row| PeakHourRow {
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
        data_source,
    })
}
