use serde::Serialize;

use crate::aggregates::ZONE_DENSITY;
use crate::errors::DbError;
use crate::filters::{TripFilters, ZoneKind};
use crate::queries::{query_aggregate, Queried};


#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize)]
pub struct ZoneDensityRow {
    pub zone_id: Option<i32>,
    pub borough: Option<String>,
    pub zone_name: Option<String>,
    pub trip_count: i64,
}


/// Trip counts per pickup or dropoff zone, busiest first, at most `limit` zones.
pub async fn map_density(
    client: &tokio_postgres::Client,
    filters: &TripFilters,
    kind: ZoneKind,
    limit: i64,
) -> Result<Queried<Vec<ZoneDensityRow>>, DbError> {
    let kind_str: &'static str = kind.as_str();
    let (rows, data_source) = query_aggregate(client, &ZONE_DENSITY, filters, |sql_filter| {
        let kind_index = sql_filter.push_value(&kind_str);
        let limit_index = sql_filter.push_value(&limit);
        (
            format!("WHERE agg.kind = ${}", kind_index),
            format!("LIMIT ${}", limit_index),
        )
    }).await?;

    let data = rows.iter()
        .map(|row| ZoneDensityRow {
            zone_id: row.get("zone_id"),
            borough: row.get("borough"),
            zone_name: row.get("zone_name"),
            trip_count: row.get("trip_count"),
        })
        .collect();
    Ok(Queried {
        data,
        data_source,
    })
}
