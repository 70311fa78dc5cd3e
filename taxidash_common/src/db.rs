use tokio_postgres::{self, NoTls};
use tracing::error;

use crate::config::DbConfig;
use crate::errors::DbError;


/// Quotes an identifier for interpolation into SQL.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn search_path_statement(schema_name: &str) -> String {
    format!("SET search_path TO {}, public", quote_identifier(schema_name))
}


/// Connects to the database and points the session at the configured schema.
pub async fn connect(db_config: &DbConfig) -> Result<tokio_postgres::Client, DbError> {
    let (client, connection) = tokio_postgres::connect(&db_config.conn_string, NoTls).await
        .map_err(|e| DbError::Connecting(e))?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("connection error: {}", e);
        }
    });

    client.batch_execute(&search_path_statement(&db_config.schema_name)).await
        .map_err(|e| DbError::Querying(e))?;
    Ok(client)
}


/// Cheap round trip used by health checks.
pub async fn ping(client: &tokio_postgres::Client) -> Result<(), DbError> {
    client.simple_query("SELECT 1").await
        .map_err(|e| DbError::Querying(e))?;
    Ok(())
}
