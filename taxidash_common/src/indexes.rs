use tokio_postgres;
use tracing::info;

use crate::aggregates::ALL_AGGREGATES;
use crate::errors::DbError;


#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static str,
    pub unique: bool,
}
impl IndexDefinition {
    pub const fn new(name: &'static str, table: &'static str, columns: &'static str) -> Self {
        Self { name, table, columns, unique: false }
    }

    pub const fn unique(name: &'static str, table: &'static str, columns: &'static str) -> Self {
        Self { name, table, columns, unique: true }
    }

    pub fn create_statement(&self) -> String {
        format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            self.table,
            self.columns,
        )
    }
}


/// Lookup indexes on the fact table, matching the filter and grouping columns of the queries.
pub const TRIP_INDEXES: [IndexDefinition; 7] = [
    IndexDefinition::new("idx_trips_weekday_hour", "trips", "pickup_weekday, pickup_hour"),
    IndexDefinition::new("idx_trips_pickup_time", "trips", "pickup_time"),
    IndexDefinition::new("idx_trips_pickup_zone", "trips", "pickup_zone_id"),
    IndexDefinition::new("idx_trips_dropoff_zone", "trips", "dropoff_zone_id"),
    IndexDefinition::new("idx_trips_payment", "trips", "payment_id"),
    IndexDefinition::new("idx_trips_vendor", "trips", "vendor_id"),
    IndexDefinition::new("idx_trips_zone_pair", "trips", "pickup_zone_id, dropoff_zone_id"),
];


/// Every index the builder maintains: fact table first, then the aggregates.
pub fn all_indexes() -> Vec<IndexDefinition> {
    let mut indexes: Vec<IndexDefinition> = TRIP_INDEXES.to_vec();
    for aggregate in ALL_AGGREGATES.iter() {
        indexes.extend(aggregate.indexes.iter().copied());
    }
    indexes
}


/// Creates all missing indexes. Safe to run repeatedly.
pub async fn create_indexes(client: &mut tokio_postgres::Client) -> Result<usize, DbError> {
    let indexes = all_indexes();
    let transaction = client.transaction().await
        .map_err(|e| DbError::Querying(e))?;
    for index in &indexes {
        info!("ensuring index {} on {}", index.name, index.table);
        transaction.batch_execute(&index.create_statement()).await
            .map_err(|e| DbError::Querying(e))?;
    }
    transaction.commit().await
        .map_err(|e| DbError::Querying(e))?;
    Ok(indexes.len())
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn test_create_statement() {
        assert_eq!(
            TRIP_INDEXES[0].create_statement(),
            "CREATE INDEX IF NOT EXISTS idx_trips_weekday_hour ON trips (pickup_weekday, pickup_hour)",
        );
        assert_eq!(
            IndexDefinition::unique("idx_x", "agg", "a, b").create_statement(),
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_x ON agg (a, b)",
        );
    }

    #[test]
    fn test_index_names_are_unique() {
        let indexes = all_indexes();
        let names: BTreeSet<&str> = indexes.iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names.len(), indexes.len());
    }

    #[test]
    fn test_every_aggregate_with_a_key_is_indexed() {
        let indexes = all_indexes();
        for aggregate in ALL_AGGREGATES.iter() {
            if aggregate.name == "analytics_kpis" {
                continue;
            }
            assert!(
                indexes.iter().any(|i| i.table == aggregate.name),
                "aggregate {} has no index", aggregate.name,
            );
        }
    }
}
