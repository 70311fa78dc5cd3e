pub mod errors;
pub mod parquet_rows;
pub mod pipeline;
pub mod records;
pub mod schema;
pub mod trips;
pub mod zones;
