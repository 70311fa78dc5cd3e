//! The loader's commands, each a self-contained step against the configured database.


use taxidash_common::aggregates::{rebuild_aggregates, refresh_aggregates};
use taxidash_common::config::DashConfig;
use taxidash_common::db::connect;
use taxidash_common::indexes::create_indexes;
use tracing::info;

use crate::errors::LoadError;
use crate::schema::{
    create_reference_tables, create_trips_table, drop_trips, ensure_database_exists, ensure_schema,
    vacuum_analyze_trips,
};
use crate::trips::{load_trip_files, LoadStats};
use crate::zones::{known_zone_ids, load_zones};


/// Creates the database, the schema and the lookup tables as needed.
pub async fn setup(config: &DashConfig) -> Result<(), LoadError> {
    ensure_database_exists(&config.db.conn_string).await?;
    let mut client = connect(&config.db).await?;
    ensure_schema(&client, &config.db.schema_name).await?;
    create_reference_tables(&mut client).await?;
    Ok(())
}


/// Loads zones and trip files into a (possibly fresh) trips table.
pub async fn load(config: &DashConfig) -> Result<LoadStats, LoadError> {
    let mut client = connect(&config.db).await?;

    if config.load.drop_old_trips {
        drop_trips(&client, &config.db.schema_name).await?;
    }
    load_zones(&mut client, config.load.zones_csv_path.as_deref()).await?;
    create_trips_table(&client).await?;

    let known_zones = known_zone_ids(&client).await?;
    if known_zones.len() == 0 {
        info!("zone table is empty; all zone IDs will be stored as NULL");
    }
    let stats = load_trip_files(&mut client, &config.load.trip_files, config.load.chunk_size, &known_zones).await?;

    vacuum_analyze_trips(&client).await?;
    Ok(stats)
}


pub async fn build_aggregates(config: &DashConfig) -> Result<(), LoadError> {
    let mut client = connect(&config.db).await?;
    let rebuilt = rebuild_aggregates(&mut client).await?;
    info!("rebuilt {} aggregates", rebuilt.len());
    Ok(())
}


pub async fn build_indexes(config: &DashConfig) -> Result<(), LoadError> {
    let mut client = connect(&config.db).await?;
    let count = create_indexes(&mut client).await?;
    info!("ensured {} indexes", count);
    Ok(())
}


pub async fn refresh(config: &DashConfig) -> Result<(), LoadError> {
    let mut client = connect(&config.db).await?;
    let refreshed = refresh_aggregates(&mut client).await?;
    info!("refreshed {} aggregates", refreshed.len());
    Ok(())
}


/// Setup, load, aggregates and indexes, in that order.
pub async fn run_all(config: &DashConfig) -> Result<(), LoadError> {
    let start_time = std::time::Instant::now();
    setup(config).await?;
    load(config).await?;
    build_aggregates(config).await?;
    build_indexes(config).await?;
    info!("all steps completed in {:.1}s", start_time.elapsed().as_secs_f64());
    Ok(())
}
