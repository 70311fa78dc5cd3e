//! Database, schema and table creation.


use taxidash_common::db::quote_identifier;
use taxidash_common::errors::DbError;
use taxidash_common::model::{PaymentType, Vendor};
use tokio_postgres::{self, NoTls};
use tracing::{error, info};

use crate::errors::LoadError;


const REFERENCE_TABLES_DDL: &str = "
    CREATE TABLE IF NOT EXISTS vendors (
        vendor_id VARCHAR(10) NOT NULL,
        name TEXT NOT NULL,
        CONSTRAINT pkey_vendors PRIMARY KEY (vendor_id)
    );
    CREATE TABLE IF NOT EXISTS payments (
        payment_id INTEGER NOT NULL,
        payment_type VARCHAR(20) NOT NULL,
        description TEXT NULL,
        CONSTRAINT pkey_payments PRIMARY KEY (payment_id),
        CONSTRAINT uq_payments_payment_type UNIQUE (payment_type)
    );
    CREATE TABLE IF NOT EXISTS zones (
        zone_id INTEGER NOT NULL,
        borough TEXT NULL,
        zone_name TEXT NULL,
        service_zone TEXT NULL,
        CONSTRAINT pkey_zones PRIMARY KEY (zone_id)
    );
";

const TRIPS_DDL: &str = "
    CREATE TABLE IF NOT EXISTS trips (
        trip_id BIGSERIAL NOT NULL,
        pickup_time TIMESTAMP NOT NULL,
        dropoff_time TIMESTAMP NOT NULL,
        distance DOUBLE PRECISION NULL,
        fare DOUBLE PRECISION NOT NULL,
        tip_amount DOUBLE PRECISION NULL,
        total_amount DOUBLE PRECISION NULL,
        passenger_count INTEGER NULL,
        pickup_zone_id INTEGER NULL,
        dropoff_zone_id INTEGER NULL,
        vendor_id VARCHAR(10) NULL,
        payment_id INTEGER NOT NULL,
        pickup_long DOUBLE PRECISION NULL,
        pickup_lat DOUBLE PRECISION NULL,
        dropoff_long DOUBLE PRECISION NULL,
        dropoff_lat DOUBLE PRECISION NULL,
        ratecodeid INTEGER NULL,
        store_and_fwd_flag VARCHAR(1) NULL,
        extra DOUBLE PRECISION NULL,
        mta_tax DOUBLE PRECISION NULL,
        tolls_amount DOUBLE PRECISION NULL,
        improvement_surcharge DOUBLE PRECISION NULL,
        congestion_surcharge DOUBLE PRECISION NULL,
        airport_fee DOUBLE PRECISION NULL,
        cbd_congestion_fee DOUBLE PRECISION NULL,
        pickup_weekday INTEGER NOT NULL,
        pickup_hour INTEGER NOT NULL,
        trip_duration_min DOUBLE PRECISION NOT NULL,
        CONSTRAINT pkey_trips PRIMARY KEY (trip_id),
        CONSTRAINT fkey_trips_pickup_zone FOREIGN KEY (pickup_zone_id) REFERENCES zones (zone_id),
        CONSTRAINT fkey_trips_dropoff_zone FOREIGN KEY (dropoff_zone_id) REFERENCES zones (zone_id),
        CONSTRAINT fkey_trips_vendor FOREIGN KEY (vendor_id) REFERENCES vendors (vendor_id),
        CONSTRAINT fkey_trips_payment FOREIGN KEY (payment_id) REFERENCES payments (payment_id),
        CONSTRAINT check_trips_weekday CHECK (pickup_weekday BETWEEN 0 AND 6),
        CONSTRAINT check_trips_hour CHECK (pickup_hour BETWEEN 0 AND 23)
    );
";


/// Creates the database named in the connection string unless it already exists.
///
/// Connects to the `postgres` maintenance database on the same server to do so. Returns whether
/// the database was created.
pub async fn ensure_database_exists(conn_string: &str) -> Result<bool, LoadError> {
    let mut pg_config: tokio_postgres::Config = conn_string.parse()
        .map_err(|e| LoadError::InvalidConnectionString(e))?;
    let db_name = pg_config.get_dbname()
        .ok_or(LoadError::NoDatabaseName)?
        .to_owned();
    pg_config.dbname("postgres");

    let (client, connection) = pg_config.connect(NoTls).await
        .map_err(|e| DbError::Connecting(e))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("maintenance connection error: {}", e);
        }
    });

    let existing = client.query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&db_name]).await
        .map_err(|e| DbError::Querying(e))?;
    if existing.is_some() {
        info!("database {:?} already exists", db_name);
        return Ok(false);
    }

    info!("creating database {:?}", db_name);
    client.batch_execute(&format!("CREATE DATABASE {}", quote_identifier(&db_name))).await
        .map_err(|e| DbError::Querying(e))?;
    Ok(true)
}


pub async fn ensure_schema(client: &tokio_postgres::Client, schema_name: &str) -> Result<(), DbError> {
    client.batch_execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(schema_name))).await
        .map_err(|e| DbError::Querying(e))?;
    info!("schema {:?} ready", schema_name);
    Ok(())
}


/// Creates the vendor, payment and zone tables and seeds the first two.
pub async fn create_reference_tables(client: &mut tokio_postgres::Client) -> Result<(), DbError> {
    let transaction = client.transaction().await
        .map_err(|e| DbError::Querying(e))?;
    transaction.batch_execute(REFERENCE_TABLES_DDL).await
        .map_err(|e| DbError::Querying(e))?;

    let vendor_stmt = transaction.prepare(
        "INSERT INTO vendors (vendor_id, name) VALUES ($1, $2) ON CONFLICT DO NOTHING"
    ).await
        .map_err(|e| DbError::Querying(e))?;
    for vendor in Vendor::ALL {
        transaction.execute(&vendor_stmt, &[&vendor.code(), &vendor.name()]).await
            .map_err(|e| DbError::Querying(e))?;
    }

    let payment_stmt = transaction.prepare(
        "INSERT INTO payments (payment_id, payment_type, description) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING"
    ).await
        .map_err(|e| DbError::Querying(e))?;
    for payment in PaymentType::ALL {
        transaction.execute(&payment_stmt, &[&payment.id(), &payment.code(), &payment.description()]).await
            .map_err(|e| DbError::Querying(e))?;
    }

    transaction.commit().await
        .map_err(|e| DbError::Querying(e))?;
    info!("reference tables ready (vendors, payments, zones)");
    Ok(())
}


/// Drops the trips table of the given schema along with everything that depends on it.
pub async fn drop_trips(client: &tokio_postgres::Client, schema_name: &str) -> Result<(), DbError> {
    let statement = format!("DROP TABLE IF EXISTS {}.trips CASCADE", quote_identifier(schema_name));
    client.batch_execute(&statement).await
        .map_err(|e| DbError::Querying(e))?;
    info!("dropped old trips table (if any)");
    Ok(())
}


pub async fn create_trips_table(client: &tokio_postgres::Client) -> Result<(), DbError> {
    client.batch_execute(TRIPS_DDL).await
        .map_err(|e| DbError::Querying(e))?;
    info!("trips table ready");
    Ok(())
}


pub async fn vacuum_analyze_trips(client: &tokio_postgres::Client) -> Result<(), DbError> {
    info!("running VACUUM ANALYZE on trips");
    client.batch_execute("VACUUM ANALYZE trips").await
        .map_err(|e| DbError::Querying(e))?;
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trips_columns_match_copy_columns() {
        for (column, _) in crate::trips::COPY_COLUMNS.iter() {
            let needle = format!("\n        {} ", column);
            assert!(TRIPS_DDL.contains(&needle), "column {} missing from trips DDL", column);
        }
    }
}
