use std::error;
use std::fmt;


#[derive(Debug)]
pub enum ConfigError {
    OpeningFile(std::io::Error),
    Parsing(toml::de::Error),
    InvalidSchemaName(String),
    InvalidChunkSize,
}
impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::OpeningFile(e)
                => write!(f, "error opening config file: {}", e),
            ConfigError::Parsing(e)
                => write!(f, "error parsing configuration: {}", e),
            ConfigError::InvalidSchemaName(name)
                => write!(f, "invalid schema name {:?}; only letters, digits and underscores are allowed", name),
            ConfigError::InvalidChunkSize
                => write!(f, "chunk_size must be greater than zero"),
        }
    }
}
impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ConfigError::OpeningFile(e) => Some(e),
            ConfigError::Parsing(e) => Some(e),
            _ => None,
        }
    }
}


#[derive(Debug)]
pub enum DbError {
    Connecting(tokio_postgres::Error),
    Querying(tokio_postgres::Error),
}
impl DbError {
    /// Whether the store could not be reached at all, as opposed to a failing statement.
    pub fn is_unavailable(&self) -> bool {
        match self {
            DbError::Connecting(_) => true,
            DbError::Querying(e) => e.is_closed(),
        }
    }
}
impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Connecting(e)
                => write!(f, "error connecting to database: {}", e),
            DbError::Querying(e)
                => write!(f, "error querying database: {}", e),
        }
    }
}
impl error::Error for DbError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            DbError::Connecting(e) => Some(e),
            DbError::Querying(e) => Some(e),
        }
    }
}


#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum FilterError {
    UnknownVendor(String),
    PaymentOutOfRange(String),
    WeekdayOutOfRange(String),
    HourOutOfRange(String),
    InvalidDate(&'static str, String),
    EndBeforeStart,
    InvalidZoneKind(String),
    InvalidLimit(String),
}
impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::UnknownVendor(v)
                => write!(f, "vendor_id must be one of CMT, VTS; got {:?}", v),
            FilterError::PaymentOutOfRange(v)
                => write!(f, "payment_id must be an integer between 1 and 6; got {:?}", v),
            FilterError::WeekdayOutOfRange(v)
                => write!(f, "weekday must be an integer between 0 (Sunday) and 6 (Saturday); got {:?}", v),
            FilterError::HourOutOfRange(v)
                => write!(f, "hour must be an integer between 0 and 23; got {:?}", v),
            FilterError::InvalidDate(param, v)
                => write!(f, "{} must be a date (YYYY-MM-DD) or timestamp (YYYY-MM-DD HH:MM:SS); got {:?}", param, v),
            FilterError::EndBeforeStart
                => write!(f, "end must not be earlier than start"),
            FilterError::InvalidZoneKind(v)
                => write!(f, "type must be 'pickup' or 'dropoff'; got {:?}", v),
            FilterError::InvalidLimit(v)
                => write!(f, "limit must be an integer; got {:?}", v),
        }
    }
}
impl error::Error for FilterError {
}
