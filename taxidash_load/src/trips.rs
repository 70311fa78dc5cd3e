//! Streaming bulk load of trip record files into the fact table.


use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use csv::StringRecord;
use taxidash_common::errors::DbError;
use taxidash_common::model::TripRecord;
use tokio_postgres::binary_copy::BinaryCopyInWriter;
use tokio_postgres::types::{ToSql, Type};
use tracing::{debug, info, warn};

use crate::errors::LoadError;
use crate::parquet_rows::ParquetRows;
use crate::records::ColumnMapping;


/// Columns written by the bulk copy, in order.
pub const COPY_COLUMNS: [(&str, Type); 27] = [
    ("pickup_time", Type::TIMESTAMP),
    ("dropoff_time", Type::TIMESTAMP),
    ("distance", Type::FLOAT8),
    ("fare", Type::FLOAT8),
    ("tip_amount", Type::FLOAT8),
    ("total_amount", Type::FLOAT8),
    ("passenger_count", Type::INT4),
    ("pickup_zone_id", Type::INT4),
    ("dropoff_zone_id", Type::INT4),
    ("vendor_id", Type::VARCHAR),
    ("payment_id", Type::INT4),
    ("pickup_long", Type::FLOAT8),
    ("pickup_lat", Type::FLOAT8),
    ("dropoff_long", Type::FLOAT8),
    ("dropoff_lat", Type::FLOAT8),
    ("ratecodeid", Type::INT4),
    ("store_and_fwd_flag", Type::VARCHAR),
    ("extra", Type::FLOAT8),
    ("mta_tax", Type::FLOAT8),
    ("tolls_amount", Type::FLOAT8),
    ("improvement_surcharge", Type::FLOAT8),
    ("congestion_surcharge", Type::FLOAT8),
    ("airport_fee", Type::FLOAT8),
    ("cbd_congestion_fee", Type::FLOAT8),
    ("pickup_weekday", Type::INT4),
    ("pickup_hour", Type::INT4),
    ("trip_duration_min", Type::FLOAT8),
];


#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct LoadStats {
    pub rows_read: u64,
    pub rows_inserted: u64,
    pub rows_skipped: u64,
    pub unknown_zone_ids: u64,
    pub chunks: u64,
}
impl LoadStats {
    pub fn add(&mut self, other: &LoadStats) {
        self.rows_read += other.rows_read;
        self.rows_inserted += other.rows_inserted;
        self.rows_skipped += other.rows_skipped;
        self.unknown_zone_ids += other.unknown_zone_ids;
        self.chunks += other.chunks;
    }
}


pub fn copy_statement() -> String {
    let column_names: Vec<&str> = COPY_COLUMNS.iter()
        .map(|(name, _)| *name)
        .collect();
    format!("COPY trips ({}) FROM STDIN (FORMAT binary)", column_names.join(", "))
}


/// Replaces zone IDs missing from the zone table with NULL, counting each replacement.
pub fn resolve_zones(trip: &mut TripRecord, known_zones: &HashSet<i32>) -> u64 {
    let mut unknown = 0;
    for zone_id in [&mut trip.pickup_zone_id, &mut trip.dropoff_zone_id] {
        if let Some(id) = *zone_id {
            if !known_zones.contains(&id) {
                *zone_id = None;
                unknown += 1;
            }
        }
    }
    unknown
}


/// Writes one chunk of trips through a binary COPY in its own transaction.
pub async fn copy_chunk(client: &mut tokio_postgres::Client, trips: &[TripRecord]) -> Result<u64, DbError> {
    let types: Vec<Type> = COPY_COLUMNS.iter()
        .map(|(_, t)| t.clone())
        .collect();

    let transaction = client.transaction().await
        .map_err(|e| DbError::Querying(e))?;
    let sink = transaction.copy_in(&copy_statement()).await
        .map_err(|e| DbError::Querying(e))?;
    let writer = BinaryCopyInWriter::new(sink, &types);
    let mut writer = std::pin::pin!(writer);

    for trip in trips {
        let vendor_id: Option<&str> = trip.vendor.map(|v| v.code());
        let payment_id = trip.payment.id();
        let pickup_weekday = trip.pickup_weekday();
        let pickup_hour = trip.pickup_hour();
        let trip_duration_min = trip.duration_min();
        let values: [&(dyn ToSql + Sync); 27] = [
            &trip.pickup_time,
            &trip.dropoff_time,
            &trip.distance,
            &trip.fare,
            &trip.tip_amount,
            &trip.total_amount,
            &trip.passenger_count,
            &trip.pickup_zone_id,
            &trip.dropoff_zone_id,
            &vendor_id,
            &payment_id,
            &trip.pickup_long,
            &trip.pickup_lat,
            &trip.dropoff_long,
            &trip.dropoff_lat,
            &trip.ratecodeid,
            &trip.store_and_fwd_flag,
            &trip.extra,
            &trip.mta_tax,
            &trip.tolls_amount,
            &trip.improvement_surcharge,
            &trip.congestion_surcharge,
            &trip.airport_fee,
            &trip.cbd_congestion_fee,
            &pickup_weekday,
            &pickup_hour,
            &trip_duration_min,
        ];
        writer.as_mut().write(&values).await
            .map_err(|e| DbError::Querying(e))?;
    }

    let written = writer.as_mut().finish().await
        .map_err(|e| DbError::Querying(e))?;
    transaction.commit().await
        .map_err(|e| DbError::Querying(e))?;
    Ok(written)
}


#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TripFileFormat {
    Csv,
    Parquet,
}
impl TripFileFormat {
    /// `.parquet` files are read as Parquet, everything else as CSV.
    pub fn from_path(path: &Path) -> Self {
        let is_parquet = path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("parquet"))
            .unwrap_or(false);
        if is_parquet {
            Self::Parquet
        } else {
            Self::Csv
        }
    }
}


/// Streams one trip file (CSV or Parquet) into the trips table, `chunk_size` rows per transaction.
pub async fn load_trip_file(
    client: &mut tokio_postgres::Client,
    path: &Path,
    chunk_size: usize,
    known_zones: &HashSet<i32>,
) -> Result<LoadStats, LoadError> {
    match TripFileFormat::from_path(path) {
        TripFileFormat::Csv => {
            let mut csv_reader = csv::ReaderBuilder::new()
                .has_headers(true)
                .flexible(true)
                .from_path(path)
                .map_err(|e| LoadError::Csv(path.to_owned(), e))?;
            let headers = csv_reader.headers()
                .map_err(|e| LoadError::Csv(path.to_owned(), e))?
                .clone();
            let records = csv_reader.into_records()
                .map(|r| r.map_err(|e| LoadError::Csv(path.to_owned(), e)));
            load_records(client, path, &headers, records, chunk_size, known_zones).await
        },
        TripFileFormat::Parquet => {
            let (headers, records) = ParquetRows::open(path)?;
            load_records(client, path, &headers, records, chunk_size, known_zones).await
        },
    }
}

async fn load_records<I>(
    client: &mut tokio_postgres::Client,
    path: &Path,
    headers: &StringRecord,
    records: I,
    chunk_size: usize,
    known_zones: &HashSet<i32>,
) -> Result<LoadStats, LoadError>
    where I: Iterator<Item = Result<StringRecord, LoadError>>
{
    let start_time = Instant::now();
    let mut stats = LoadStats::default();

    let mapping = ColumnMapping::from_headers(headers);
    let missing = mapping.missing_required();
    if missing.len() > 0 {
        warn!("{} lacks required columns {:?}; all of its rows will be skipped", path.display(), missing);
    }

    let mut chunk: Vec<TripRecord> = Vec::with_capacity(chunk_size);
    for record_res in records {
        let record = record_res?;
        stats.rows_read += 1;

        let mut trip = match mapping.parse_record(&record) {
            Ok(t) => t,
            Err(reason) => {
                debug!("{}: skipping row {}: {}", path.display(), stats.rows_read, reason);
                stats.rows_skipped += 1;
                continue;
            },
        };
        stats.unknown_zone_ids += resolve_zones(&mut trip, known_zones);
        chunk.push(trip);

        if chunk.len() >= chunk_size {
            flush_chunk(client, path, &mut chunk, &mut stats, start_time).await?;
        }
    }
    if chunk.len() > 0 {
        flush_chunk(client, path, &mut chunk, &mut stats, start_time).await?;
    }

    if stats.unknown_zone_ids > 0 {
        warn!("{}: {} zone IDs not in the zone table were stored as NULL", path.display(), stats.unknown_zone_ids);
    }
    info!(
        "{}: inserted {} of {} rows ({} skipped) in {:.1}s",
        path.display(), stats.rows_inserted, stats.rows_read, stats.rows_skipped, start_time.elapsed().as_secs_f64(),
    );
    Ok(stats)
}

async fn flush_chunk(
    client: &mut tokio_postgres::Client,
    path: &Path,
    chunk: &mut Vec<TripRecord>,
    stats: &mut LoadStats,
    start_time: Instant,
) -> Result<(), LoadError> {
    let inserted = copy_chunk(client, chunk).await?;
    stats.chunks += 1;
    stats.rows_inserted += inserted;
    info!(
        "{}: chunk {} inserted {} rows ({} total, {:.1}s elapsed)",
        path.display(), stats.chunks, inserted, stats.rows_inserted, start_time.elapsed().as_secs_f64(),
    );
    chunk.clear();
    Ok(())
}


/// Loads every file in turn; files that do not exist are skipped with a warning.
pub async fn load_trip_files(
    client: &mut tokio_postgres::Client,
    paths: &[impl AsRef<Path>],
    chunk_size: usize,
    known_zones: &HashSet<i32>,
) -> Result<LoadStats, LoadError> {
    let mut total = LoadStats::default();
    for (i, path_ref) in paths.iter().enumerate() {
        let path = path_ref.as_ref();
        if !path.exists() {
            warn!("trip file {} not found; skipping", path.display());
            continue;
        }
        info!("[{}/{}] loading {}", i + 1, paths.len(), path.display());
        let stats = load_trip_file(client, path, chunk_size, known_zones).await?;
        total.add(&stats);
    }
    info!("loaded {} trips in total ({} skipped)", total.rows_inserted, total.rows_skipped);
    Ok(total)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_statement() {
        let statement = copy_statement();
        assert!(statement.starts_with("COPY trips (pickup_time, dropoff_time, distance, fare, "));
        assert!(statement.ends_with("pickup_weekday, pickup_hour, trip_duration_min) FROM STDIN (FORMAT binary)"));
    }

    #[test]
    fn test_resolve_zones() {
        let known: HashSet<i32> = [1, 132, 161].into_iter().collect();

        let mut trip = TripRecord {
            pickup_zone_id: Some(161),
            dropoff_zone_id: Some(999),
            ..TripRecord::default()
        };
        assert_eq!(resolve_zones(&mut trip, &known), 1);
        assert_eq!(trip.pickup_zone_id, Some(161));
        assert_eq!(trip.dropoff_zone_id, None);

        let mut trip = TripRecord {
            pickup_zone_id: None,
            dropoff_zone_id: Some(1),
            ..TripRecord::default()
        };
        assert_eq!(resolve_zones(&mut trip, &known), 0);
        assert_eq!(trip.dropoff_zone_id, Some(1));

        let mut trip = TripRecord {
            pickup_zone_id: Some(1),
            dropoff_zone_id: Some(2),
            ..TripRecord::default()
        };
        assert_eq!(resolve_zones(&mut trip, &HashSet::new()), 2);
        assert_eq!(trip.pickup_zone_id, None);
        assert_eq!(trip.dropoff_zone_id, None);
    }

    #[test]
    fn test_file_format() {
        assert_eq!(TripFileFormat::from_path(Path::new("data/yellow_tripdata_2025-01.parquet")), TripFileFormat::Parquet);
        assert_eq!(TripFileFormat::from_path(Path::new("YELLOW.PARQUET")), TripFileFormat::Parquet);
        assert_eq!(TripFileFormat::from_path(Path::new("data/yellow_tripdata_2025-01.csv")), TripFileFormat::Csv);
        assert_eq!(TripFileFormat::from_path(Path::new("trips")), TripFileFormat::Csv);
    }

    #[test]
    fn test_stats_add() {
        let mut total = LoadStats::default();
        total.add(&LoadStats { rows_read: 10, rows_inserted: 8, rows_skipped: 2, unknown_zone_ids: 1, chunks: 1 });
        total.add(&LoadStats { rows_read: 5, rows_inserted: 5, rows_skipped: 0, unknown_zone_ids: 0, chunks: 1 });
        assert_eq!(total, LoadStats { rows_read: 15, rows_inserted: 13, rows_skipped: 2, unknown_zone_ids: 1, chunks: 2 });
    }
}
