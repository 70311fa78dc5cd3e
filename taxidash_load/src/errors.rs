use std::error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use taxidash_common::errors::{ConfigError, DbError};


#[derive(Debug)]
pub enum LoadError {
    Config(ConfigError),
    Db(DbError),
    InvalidConnectionString(tokio_postgres::Error),
    NoDatabaseName,
    OpeningFile(PathBuf, io::Error),
    Csv(PathBuf, csv::Error),
    Parquet(PathBuf, parquet::errors::ParquetError),
    Arrow(PathBuf, arrow::error::ArrowError),
}
impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Config(e)
                => write!(f, "configuration error: {}", e),
            LoadError::Db(e)
                => write!(f, "{}", e),
            LoadError::InvalidConnectionString(e)
                => write!(f, "invalid database connection string: {}", e),
            LoadError::NoDatabaseName
                => write!(f, "the database connection string does not name a database"),
            LoadError::OpeningFile(path, e)
                => write!(f, "error opening {}: {}", path.display(), e),
            LoadError::Csv(path, e)
                => write!(f, "error reading CSV from {}: {}", path.display(), e),
            LoadError::Parquet(path, e)
                => write!(f, "error reading Parquet from {}: {}", path.display(), e),
            LoadError::Arrow(path, e)
                => write!(f, "error decoding Parquet data from {}: {}", path.display(), e),
        }
    }
}
impl error::Error for LoadError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            LoadError::Config(e) => Some(e),
            LoadError::Db(e) => Some(e),
            LoadError::InvalidConnectionString(e) => Some(e),
            LoadError::NoDatabaseName => None,
            LoadError::OpeningFile(_, e) => Some(e),
            LoadError::Csv(_, e) => Some(e),
            LoadError::Parquet(_, e) => Some(e),
            LoadError::Arrow(_, e) => Some(e),
        }
    }
}
impl From<ConfigError> for LoadError {
    fn from(value: ConfigError) -> Self { Self::Config(value) }
}
impl From<DbError> for LoadError {
    fn from(value: DbError) -> Self { Self::Db(value) }
}
