use chrono::NaiveDateTime;
use serde::Serialize;
use tokio_postgres::Row;

use crate::aggregates::{KPIS, PAYMENT_MIX, TRIPS_BY_BOROUGH, TRIPS_BY_HOUR, TRIPS_BY_WEEKDAY};
use crate::errors::DbError;
use crate::filters::TripFilters;
use crate::queries::{no_extra_clauses, query_aggregate, Queried};


#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct KpiRow {
    pub total_trips: i64,
    pub total_revenue: Option<f64>,
    pub avg_fare: Option<f64>,
    pub avg_distance: Option<f64>,
    pub avg_duration_min: Option<f64>,
    pub min_pickup_time: Option<NaiveDateTime>,
    pub max_pickup_time: Option<NaiveDateTime>,
    pub active_pickup_zones: i64,
    pub active_dropoff_zones: i64,
}
impl KpiRow {
    fn from_row(row: &Row) -> Self {
        Self {
            total_trips: row.get("total_trips"),
            total_revenue: row.get("total_revenue"),
            avg_fare: row.get("avg_fare"),
            avg_distance: row.get("avg_distance"),
            avg_duration_min: row.get("avg_duration_min"),
            min_pickup_time: row.get("min_pickup_time"),
            max_pickup_time: row.get("max_pickup_time"),
            active_pickup_zones: row.get("active_pickup_zones"),
            active_dropoff_zones: row.get("active_dropoff_zones"),
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct PaymentMixRow {
    pub payment_type: Option<String>,
    pub trip_count: i64,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct BoroughCountRow {
    pub borough: Option<String>,
    pub trip_count: i64,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct WeekdayCountRow {
    pub weekday: i32,
    pub trip_count: i64,
}

#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct HourCountRow {
    pub hour: i32,
    pub trip_count: i64,
}


/// The dashboard headline: KPIs plus the four one-dimensional breakdowns.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Overview {
    pub kpis: KpiRow,
    pub payment_mix: Vec<PaymentMixRow>,
    pub trips_by_borough: Vec<BoroughCountRow>,
    pub trips_by_weekday: Vec<WeekdayCountRow>,
    pub trips_by_hour: Vec<HourCountRow>,
}
impl Overview {
    /// Number of breakdown rows (the KPI row is not counted).
    pub fn row_count(&self) -> usize {
        self.payment_mix.len()
            + self.trips_by_borough.len()
            + self.trips_by_weekday.len()
            + self.trips_by_hour.len()
    }
}


pub async fn overview(client: &tokio_postgres::Client, filters: &TripFilters) -> Result<Queried<Overview>, DbError> {
    let (kpi_rows, data_source) = query_aggregate(client, &KPIS, filters, no_extra_clauses).await?;
    // an aggregate without GROUP BY always yields exactly one row
    let kpis = kpi_rows.first()
        .map(KpiRow::from_row)
        .unwrap_or_default();

    let (payment_rows, _) = query_aggregate(client, &PAYMENT_MIX, filters, no_extra_clauses).await?;
    let payment_mix = payment_rows.iter()
        .map(|row| PaymentMixRow {
            payment_type: row.get("payment_type"),
            trip_count: row.get("trip_count"),
        })
        .collect();

    let (borough_rows, _) = query_aggregate(client, &TRIPS_BY_BOROUGH, filters, no_extra_clauses).await?;
    let trips_by_borough = borough_rows.iter()
        .map(|row| BoroughCountRow {
            borough: row.get("borough"),
            trip_count: row.get("trip_count"),
        })
        .collect();

    let (weekday_rows, _) = query_aggregate(client, &TRIPS_BY_WEEKDAY, filters, no_extra_clauses).await?;
    let trips_by_weekday = weekday_rows.iter()
        .map(|row| WeekdayCountRow {
            weekday: row.get("weekday"),
            trip_count: row.get("trip_count"),
        })
        .collect();

    let (hour_rows, _) = query_aggregate(client, &TRIPS_BY_HOUR, filters, no_extra_clauses).await?;
    let trips_by_hour = hour_rows.iter()
        .map(|row| HourCountRow {
            hour: row.get("hour"),
            trip_count: row.get("trip_count"),
        })
        .collect();

    Ok(Queried {
        data: Overview {
            kpis,
            payment_mix,
            trips_by_borough,
            trips_by_weekday,
            trips_by_hour,
        },
        data_source,
    })
}
