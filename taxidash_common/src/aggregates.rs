//! Pre-computed summaries of the trips fact table.
//!
//! Each aggregate is a materialized view whose defining query is also available with an
//! arbitrary `WHERE` clause spliced in. The query service reads the view when a request carries
//! no filters and runs the defining query against `trips` when it does, so both paths return
//! identically shaped rows and an unfiltered live query reproduces the view's contents.


use tokio_postgres;
use tracing::info;

use crate::errors::DbError;
use crate::indexes::IndexDefinition;


pub struct Aggregate {
    pub name: &'static str,
    /// Output columns, in the order the readers expect them.
    pub columns: &'static str,
    pub order_by: &'static str,
    pub indexes: &'static [IndexDefinition],
    source: fn(&str) -> String,
}
impl Aggregate {
    /// The defining query; `where_clause` filters the trips table aliased as `t`.
    pub fn source_query(&self, where_clause: &str) -> String {
        (self.source)(where_clause)
    }

    pub fn create_statement(&self) -> String {
        format!("CREATE MATERIALIZED VIEW {} AS {}", self.name, self.source_query(""))
    }

    pub fn drop_statement(&self) -> String {
        format!("DROP MATERIALIZED VIEW IF EXISTS {} CASCADE", self.name)
    }

    pub fn refresh_statement(&self) -> String {
        format!("REFRESH MATERIALIZED VIEW {}", self.name)
    }

    /// Reads the materialized rows; `where_clause` and `limit_clause` apply to the view aliased as `agg`.
    pub fn select_materialized(&self, where_clause: &str, limit_clause: &str) -> String {
        format!(
            "SELECT {} FROM {} agg {} ORDER BY {} {}",
            self.columns, self.name, where_clause, self.order_by, limit_clause,
        )
    }

    /// Computes the rows from the fact table, restricted by `trip_where_clause`.
    pub fn select_live(&self, trip_where_clause: &str, outer_where_clause: &str, limit_clause: &str) -> String {
        format!(
            "SELECT {} FROM ({}) agg {} ORDER BY {} {}",
            self.columns, self.source_query(trip_where_clause), outer_where_clause, self.order_by, limit_clause,
        )
    }
}


fn rounded(expression: &str, places: u8) -> String {
    format!("ROUND(({})::numeric, {})::double precision", expression, places)
}


fn kpis_source(where_clause: &str) -> String {
    format!(
        "
            SELECT
                COUNT(*) AS total_trips,
                {} AS total_revenue,
                {} AS avg_fare,
                {} AS avg_distance,
                {} AS avg_duration_min,
                MIN(t.pickup_time) AS min_pickup_time,
                MAX(t.pickup_time) AS max_pickup_time,
                COUNT(DISTINCT t.pickup_zone_id) AS active_pickup_zones,
                COUNT(DISTINCT t.dropoff_zone_id) AS active_dropoff_zones
            FROM trips t
            {}
        ",
        rounded("SUM(t.total_amount)", 2),
        rounded("AVG(t.fare)", 2),
        rounded("AVG(t.distance)", 2),
        rounded("AVG(t.trip_duration_min)", 2),
        where_clause,
    )
}

fn payment_mix_source(where_clause: &str) -> String {
    format!(
        "
            SELECT p.payment_type, COUNT(*) AS trip_count
            FROM trips t
            LEFT OUTER JOIN payments p ON p.payment_id = t.payment_id
            {}
            GROUP BY p.payment_type
        ",
        where_clause,
    )
}

fn trips_by_borough_source(where_clause: &str) -> String {
    format!(
        "
            SELECT z.borough, COUNT(*) AS trip_count
            FROM trips t
            LEFT OUTER JOIN zones z ON z.zone_id = t.pickup_zone_id
            {}
            GROUP BY z.borough
        ",
        where_clause,
    )
}

fn trips_by_weekday_source(where_clause: &str) -> String {
    format!(
        "
            SELECT t.pickup_weekday AS weekday, COUNT(*) AS trip_count
            FROM trips t
            {}
            GROUP BY t.pickup_weekday
        ",
        where_clause,
    )
}

fn trips_by_hour_source(where_clause: &str) -> String {
    format!(
        "
            SELECT t.pickup_hour AS hour, COUNT(*) AS trip_count
            FROM trips t
            {}
            GROUP BY t.pickup_hour
        ",
        where_clause,
    )
}

fn trip_summary_source(where_clause: &str) -> String {
    format!(
        "
            SELECT
                z.borough,
                t.pickup_weekday AS weekday,
                t.pickup_hour AS hour,
                COUNT(*) AS trip_count,
                {} AS avg_fare,
                {} AS avg_distance,
                {} AS avg_duration_min
            FROM trips t
            LEFT OUTER JOIN zones z ON z.zone_id = t.pickup_zone_id
            {}
            GROUP BY z.borough, t.pickup_weekday, t.pickup_hour
        ",
        rounded("AVG(t.fare)", 2),
        rounded("AVG(t.distance)", 2),
        rounded("AVG(t.trip_duration_min)", 2),
        where_clause,
    )
}

fn zone_density_source(where_clause: &str) -> String {
    // the same predicates (and parameters) apply to both halves
    let half = |kind: &str, zone_column: &str| format!(
        "
            SELECT
                CAST('{kind}' AS text) AS kind,
                t.{zone_column} AS zone_id,
                z.borough,
                z.zone_name,
                COUNT(*) AS trip_count
            FROM trips t
            LEFT OUTER JOIN zones z ON z.zone_id = t.{zone_column}
            {where_clause}
            GROUP BY t.{zone_column}, z.borough, z.zone_name
        ",
        kind = kind,
        zone_column = zone_column,
        where_clause = where_clause,
    );
    format!(
        "{} UNION ALL {}",
        half("pickup", "pickup_zone_id"),
        half("dropoff", "dropoff_zone_id"),
    )
}

fn peak_hours_source(where_clause: &str) -> String {
    format!(
        "
            SELECT
                t.pickup_weekday AS weekday,
                t.pickup_hour AS hour,
                COUNT(*) AS trip_count,
                {} AS avg_fare,
                {} AS avg_distance,
                {} AS avg_duration_min
            FROM trips t
            {}
            GROUP BY t.pickup_weekday, t.pickup_hour
        ",
        rounded("AVG(t.fare)", 2),
        rounded("AVG(t.distance)", 2),
        rounded("AVG(t.trip_duration_min)", 2),
        where_clause,
    )
}

fn fare_tip_source(where_clause: &str) -> String {
    format!(
        "
            SELECT
                t.pickup_weekday AS weekday,
                t.pickup_hour AS hour,
                p.payment_type,
                {} AS avg_fare,
                {} AS avg_tip,
                {} AS tip_to_fare_ratio,
                COUNT(*) AS trip_count
            FROM trips t
            LEFT OUTER JOIN payments p ON p.payment_id = t.payment_id
            {}
            GROUP BY t.pickup_weekday, t.pickup_hour, p.payment_type
        ",
        rounded("AVG(t.fare)", 2),
        rounded("AVG(t.tip_amount)", 2),
        rounded("AVG(t.tip_amount) / NULLIF(AVG(t.fare), 0)", 3),
        where_clause,
    )
}

fn vendor_performance_source(where_clause: &str) -> String {
    format!(
        "
            SELECT
                t.vendor_id,
                v.name AS vendor_name,
                {} AS avg_fare,
                {} AS avg_tip,
                {} AS avg_distance,
                {} AS total_revenue,
                COUNT(*) AS trip_count
            FROM trips t
            LEFT OUTER JOIN vendors v ON v.vendor_id = t.vendor_id
            {}
            GROUP BY t.vendor_id, v.name
        ",
        rounded("AVG(t.fare)", 2),
        rounded("AVG(t.tip_amount)", 2),
        rounded("AVG(t.distance)", 2),
        rounded("SUM(t.total_amount)", 2),
        where_clause,
    )
}


pub static KPIS: Aggregate = Aggregate {
    name: "analytics_kpis",
    columns: "total_trips, total_revenue, avg_fare, avg_distance, avg_duration_min, min_pickup_time, max_pickup_time, active_pickup_zones, active_dropoff_zones",
    order_by: "total_trips",
    indexes: &[],
    source: kpis_source,
};

pub static PAYMENT_MIX: Aggregate = Aggregate {
    name: "analytics_payment_mix",
    columns: "payment_type, trip_count",
    order_by: "trip_count DESC, payment_type",
    indexes: &[
        IndexDefinition::unique("idx_analytics_payment_mix_payment_type", "analytics_payment_mix", "payment_type"),
    ],
    source: payment_mix_source,
};

pub static TRIPS_BY_BOROUGH: Aggregate = Aggregate {
    name: "analytics_trips_by_borough",
    columns: "borough, trip_count",
    order_by: "trip_count DESC, borough NULLS LAST",
    indexes: &[
        IndexDefinition::unique("idx_analytics_trips_by_borough_borough", "analytics_trips_by_borough", "borough"),
    ],
    source: trips_by_borough_source,
};

pub static TRIPS_BY_WEEKDAY: Aggregate = Aggregate {
    name: "analytics_trips_by_weekday",
    columns: "weekday, trip_count",
    order_by: "weekday",
    indexes: &[
        IndexDefinition::unique("idx_analytics_trips_by_weekday_weekday", "analytics_trips_by_weekday", "weekday"),
    ],
    source: trips_by_weekday_source,
};

pub static TRIPS_BY_HOUR: Aggregate = Aggregate {
    name: "analytics_trips_by_hour",
    columns: "hour, trip_count",
    order_by: "hour",
    indexes: &[
        IndexDefinition::unique("idx_analytics_trips_by_hour_hour", "analytics_trips_by_hour", "hour"),
    ],
    source: trips_by_hour_source,
};

pub static TRIP_SUMMARY: Aggregate = Aggregate {
    name: "analytics_trip_summary",
    columns: "borough, weekday, hour, trip_count, avg_fare, avg_distance, avg_duration_min",
    order_by: "borough NULLS LAST, weekday, hour",
    indexes: &[
        IndexDefinition::unique("idx_analytics_trip_summary_key", "analytics_trip_summary", "borough, weekday, hour"),
        IndexDefinition::new("idx_analytics_trip_summary_weekday_hour", "analytics_trip_summary", "weekday, hour"),
    ],
    source: trip_summary_source,
};

pub static ZONE_DENSITY: Aggregate = Aggregate {
    name: "analytics_zone_density",
    columns: "kind, zone_id, borough, zone_name, trip_count",
    order_by: "trip_count DESC, zone_id NULLS LAST",
    indexes: &[
        IndexDefinition::unique("idx_analytics_zone_density_key", "analytics_zone_density", "kind, zone_id"),
        IndexDefinition::new("idx_analytics_zone_density_count", "analytics_zone_density", "kind, trip_count DESC"),
    ],
    source: zone_density_source,
};

pub static PEAK_HOURS: Aggregate = Aggregate {
    name: "analytics_peak_hours",
    columns: "weekday, hour, trip_count, avg_fare, avg_distance, avg_duration_min",
    order_by: "trip_count DESC, weekday, hour",
    indexes: &[
        IndexDefinition::unique("idx_analytics_peak_hours_key", "analytics_peak_hours", "weekday, hour"),
        IndexDefinition::new("idx_analytics_peak_hours_count", "analytics_peak_hours", "trip_count DESC"),
    ],
    source: peak_hours_source,
};

pub static FARE_TIP: Aggregate = Aggregate {
    name: "analytics_fare_tip",
    columns: "weekday, hour, payment_type, avg_fare, avg_tip, tip_to_fare_ratio, trip_count",
    order_by: "weekday, hour, payment_type",
    indexes: &[
        IndexDefinition::unique("idx_analytics_fare_tip_key", "analytics_fare_tip", "weekday, hour, payment_type"),
    ],
    source: fare_tip_source,
};

pub static VENDOR_PERFORMANCE: Aggregate = Aggregate {
    name: "analytics_vendor_performance",
    columns: "vendor_id, vendor_name, avg_fare, avg_tip, avg_distance, total_revenue, trip_count",
    order_by: "total_revenue DESC NULLS LAST, vendor_id NULLS LAST",
    indexes: &[
        IndexDefinition::unique("idx_analytics_vendor_performance_vendor", "analytics_vendor_performance", "vendor_id"),
    ],
    source: vendor_performance_source,
};


pub static ALL_AGGREGATES: [&Aggregate; 10] = [
    &KPIS,
    &PAYMENT_MIX,
    &TRIPS_BY_BOROUGH,
    &TRIPS_BY_WEEKDAY,
    &TRIPS_BY_HOUR,
    &TRIP_SUMMARY,
    &ZONE_DENSITY,
    &PEAK_HOURS,
    &FARE_TIP,
    &VENDOR_PERFORMANCE,
];


/// Drops and recreates every aggregate (and its indexes) in a single transaction.
///
/// Rebuilding is idempotent; the resulting rows depend only on the current contents of the fact
/// and lookup tables.
pub async fn rebuild_aggregates(client: &mut tokio_postgres::Client) -> Result<Vec<&'static str>, DbError> {
    let transaction = client.transaction().await
        .map_err(|e| DbError::Querying(e))?;
    let mut rebuilt = Vec::with_capacity(ALL_AGGREGATES.len());
    for aggregate in ALL_AGGREGATES.iter() {
        info!("rebuilding aggregate {}", aggregate.name);
        transaction.batch_execute(&aggregate.drop_statement()).await
            .map_err(|e| DbError::Querying(e))?;
        transaction.batch_execute(&aggregate.create_statement()).await
            .map_err(|e| DbError::Querying(e))?;
        for index in aggregate.indexes {
            transaction.batch_execute(&index.create_statement()).await
                .map_err(|e| DbError::Querying(e))?;
        }
        rebuilt.push(aggregate.name);
    }
    transaction.commit().await
        .map_err(|e| DbError::Querying(e))?;
    Ok(rebuilt)
}


/// Recomputes the contents of every existing aggregate in a single transaction.
pub async fn refresh_aggregates(client: &mut tokio_postgres::Client) -> Result<Vec<&'static str>, DbError> {
    let transaction = client.transaction().await
        .map_err(|e| DbError::Querying(e))?;
    let mut refreshed = Vec::with_capacity(ALL_AGGREGATES.len());
    for aggregate in ALL_AGGREGATES.iter() {
        info!("refreshing aggregate {}", aggregate.name);
        transaction.batch_execute(&aggregate.refresh_statement()).await
            .map_err(|e| DbError::Querying(e))?;
        refreshed.push(aggregate.name);
    }
    transaction.commit().await
        .map_err(|e| DbError::Querying(e))?;
    Ok(refreshed)
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn squash(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<&str>>().join(" ")
    }

    #[test]
    fn test_names_are_unique() {
        let names: BTreeSet<&str> = ALL_AGGREGATES.iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names.len(), ALL_AGGREGATES.len());
    }

    #[test]
    fn test_statements() {
        assert_eq!(TRIPS_BY_HOUR.drop_statement(), "DROP MATERIALIZED VIEW IF EXISTS analytics_trips_by_hour CASCADE");
        assert_eq!(TRIPS_BY_HOUR.refresh_statement(), "REFRESH MATERIALIZED VIEW analytics_trips_by_hour");
        assert_eq!(
            squash(&TRIPS_BY_HOUR.create_statement()),
            "CREATE MATERIALIZED VIEW analytics_trips_by_hour AS SELECT t.pickup_hour AS hour, COUNT(*) AS trip_count FROM trips t GROUP BY t.pickup_hour",
        );
    }

    #[test]
    fn test_live_query_splices_filters() {
        let sql = squash(&PEAK_HOURS.select_live("WHERE t.vendor_id = $1", "", "LIMIT 10"));
        assert!(sql.starts_with("SELECT weekday, hour, trip_count, avg_fare, avg_distance, avg_duration_min FROM ( SELECT"));
        assert!(sql.contains("FROM trips t WHERE t.vendor_id = $1 GROUP BY t.pickup_weekday, t.pickup_hour"));
        assert!(sql.ends_with(") agg ORDER BY trip_count DESC, weekday, hour LIMIT 10"));
    }

    #[test]
    fn test_materialized_query() {
        assert_eq!(
            squash(&ZONE_DENSITY.select_materialized("WHERE agg.kind = $1", "LIMIT $2")),
            "SELECT kind, zone_id, borough, zone_name, trip_count FROM analytics_zone_density agg WHERE agg.kind = $1 ORDER BY trip_count DESC, zone_id NULLS LAST LIMIT $2",
        );
    }

    #[test]
    fn test_zone_density_filters_both_halves() {
        let sql = ZONE_DENSITY.source_query("WHERE t.hour_marker = $1");
        assert_eq!(sql.matches("WHERE t.hour_marker = $1").count(), 2);
        assert!(sql.contains("UNION ALL"));
        assert!(sql.contains("CAST('pickup' AS text) AS kind"));
        assert!(sql.contains("CAST('dropoff' AS text) AS kind"));
    }

    #[test]
    fn test_vendor_performance_keeps_unknown_vendors() {
        let sql = squash(&VENDOR_PERFORMANCE.source_query(""));
        assert!(sql.contains("FROM trips t LEFT OUTER JOIN vendors v ON v.vendor_id = t.vendor_id"));
        assert!(sql.contains("GROUP BY t.vendor_id, v.name"));
    }

    #[test]
    fn test_rounding() {
        assert_eq!(rounded("AVG(t.fare)", 2), "ROUND((AVG(t.fare))::numeric, 2)::double precision");
        assert!(FARE_TIP.source_query("").contains("ROUND((AVG(t.tip_amount) / NULLIF(AVG(t.fare), 0))::numeric, 3)"));
    }
}
