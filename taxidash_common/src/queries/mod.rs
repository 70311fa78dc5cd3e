//! Read access to the aggregates, used by the web service.
//!
//! Unfiltered requests read the materialized views; filtered requests evaluate the same defining
//! query against the trips table with the filters applied before grouping.


mod fares;
mod map;
mod overview;
mod peaks;
mod summary;
mod vendors;


pub use crate::queries::fares::{fare_tip, FareTipRow};
pub use crate::queries::map::{map_density, ZoneDensityRow};
pub use crate::queries::overview::{overview, BoroughCountRow, HourCountRow, KpiRow, Overview, PaymentMixRow, WeekdayCountRow};
pub use crate::queries::peaks::{peak_hours, PeakHourRow, PEAK_HOUR_LIMIT};
pub use crate::queries::summary::{trip_summary, TripSummaryRow};
pub use crate::queries::vendors::{vendor_performance, VendorPerformanceRow};


use serde::Serialize;
use tokio_postgres::Row;

use crate::aggregates::Aggregate;
use crate::errors::DbError;
use crate::filters::{SqlFilter, TripFilters};


/// Where the returned rows were computed from.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    MaterializedViews,
    Trips,
}
impl DataSource {
    pub fn for_filters(filters: &TripFilters) -> Self {
        if filters.is_empty() {
            Self::MaterializedViews
        } else {
            Self::Trips
        }
    }
}


#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Queried<T> {
    pub data: T,
    pub data_source: DataSource,
}


/// Runs `aggregate` either from its view or live, depending on whether any trip filters are set.
///
/// `extra` receives the filter (with the trip predicates already pushed) and returns the outer
/// `WHERE` and `LIMIT` clauses, registering any parameters they need.
pub(crate) async fn query_aggregate<'a, F>(
    client: &tokio_postgres::Client,
    aggregate: &Aggregate,
    filters: &'a TripFilters,
    extra: F,
) -> Result<(Vec<Row>, DataSource), DbError>
    where F: FnOnce(&mut SqlFilter<'a>) -> (String, String)
{
    let data_source = DataSource::for_filters(filters);
    let mut sql_filter = filters.sql_filter("t");
    let trip_where_clause = sql_filter.where_clause();
    let (outer_where_clause, limit_clause) = extra(&mut sql_filter);

    let query = match data_source {
        DataSource::MaterializedViews => aggregate.select_materialized(&outer_where_clause, &limit_clause),
        DataSource::Trips => aggregate.select_live(&trip_where_clause, &outer_where_clause, &limit_clause),
    };
    let rows = client.query(&query, sql_filter.values()).await
        .map_err(|e| DbError::Querying(e))?;
    Ok((rows, data_source))
}


fn no_extra_clauses(_sql_filter: &mut SqlFilter<'_>) -> (String, String) {
    (String::new(), String::new())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_source_follows_filters() {
        let mut filters = TripFilters::default();
        assert_eq!(DataSource::for_filters(&filters), DataSource::MaterializedViews);
        filters.hour = Some(8);
        assert_eq!(DataSource::for_filters(&filters), DataSource::Trips);
    }

    #[test]
    fn test_data_source_serialization() {
        assert_eq!(serde_json::to_value(DataSource::MaterializedViews).unwrap(), serde_json::json!("materialized_views"));
        assert_eq!(serde_json::to_value(DataSource::Trips).unwrap(), serde_json::json!("trips"));
    }
}
