use serde::Serialize;

use crate::aggregates::VENDOR_PERFORMANCE;
use crate::errors::DbError;
use crate::filters::TripFilters;
use crate::queries::{no_extra_clauses, query_aggregate, Queried};


#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VendorPerformanceRow {
    pub vendor_id: Option<String>,
    pub vendor_name: Option<String>,
    pub avg_fare: Option<f64>,
    pub avg_tip: Option<f64>,
    pub avg_distance: Option<f64>,
    pub total_revenue: Option<f64>,
    pub trip_count: i64,
}


/// Per-vendor averages and revenue. Trips without a known vendor form their own row with a NULL
/// vendor, so the trip counts always add up to the number of matching trips.
pub async fn vendor_performance(client: &tokio_postgres::Client, filters: &TripFilters) -> Result<Queried<Vec<VendorPerformanceRow>>, DbError> {
    let (rows, data_source) = query_aggregate(client, &VENDOR_PERFORMANCE, filters, no_extra_clauses).await?;

    let data = rows.iter()
        .map(|row| VendorPerformanceRow {
            vendor_id: row.get("vendor_id"),
            vendor_name: row.get("vendor_name"),
            avg_fare: row.get("avg_fare"),
            avg_tip: row.get("avg_tip"),
            avg_distance: row.get("avg_distance"),
            total_revenue: row.get("total_revenue"),
            trip_count: row.get("trip_count"),
        })
        .collect();
    Ok(Queried {
        data,
        data_source,
    })
}
