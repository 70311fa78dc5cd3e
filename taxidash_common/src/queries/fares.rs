use serde::Serialize;

use crate::aggregates::FARE_TIP;
use crate::errors::DbError;
use crate::filters::TripFilters;
use crate::queries::{no_extra_clauses, query_aggregate, Queried};


#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FareTipRow {
    pub weekday: i32,
    pub hour: i32,
    pub payment_type: Option<String>,
    pub avg_fare: Option<f64>,
    pub avg_tip: Option<f64>,
    pub tip_to_fare_ratio: Option<f64>,
    pub trip_count: i64,
}


pub async fn fare_tip(client: &tokio_postgres::Client, filters: &TripFilters) -> Result<Queried<Vec<FareTipRow>>, DbError> {
    let (rows, data_source) = query_aggregate(client, &FARE_TIP, filters, no_extra_clauses).await?;

    let data = rows.iter()
        .map(|row| FareTipRow {
            weekday: row.get("weekday"),
            hour: row.get("hour"),
            payment_type: row.get("payment_type"),
            avg_fare: row.get("avg_fare"),
            avg_tip: row.get("avg_tip"),
            tip_to_fare_ratio: row.get("tip_to_fare_ratio"),
            trip_count: row.get("trip_count"),
        })
        .collect();
    Ok(Queried {
        data,
        data_source,
    })
}
