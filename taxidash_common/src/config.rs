use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;


pub const DEFAULT_CONFIG_FILE_NAME: &str = "taxidash.toml";


#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct DashConfig {
    pub db: DbConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub load: LoadConfig,
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct DbConfig {
    pub conn_string: String,
    #[serde(default = "DbConfig::default_schema_name")]
    pub schema_name: String,
}
impl DbConfig {
    fn default_schema_name() -> String { "public".to_owned() }
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct WebConfig {
    #[serde(default = "WebConfig::default_listen")]
    pub listen: SocketAddr,
}
impl WebConfig {
    fn default_listen() -> SocketAddr { SocketAddr::from(([0, 0, 0, 0], 5001)) }
}
impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct LoadConfig {
    #[serde(default)]
    pub zones_csv_path: Option<PathBuf>,
    #[serde(default)]
    pub trip_files: Vec<PathBuf>,
    #[serde(default = "LoadConfig::default_drop_old_trips")]
    pub drop_old_trips: bool,
    #[serde(default = "LoadConfig::default_chunk_size")]
    pub chunk_size: usize,
}
impl LoadConfig {
    fn default_drop_old_trips() -> bool { true }
    fn default_chunk_size() -> usize { 200_000 }
}
impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            zones_csv_path: None,
            trip_files: Vec::new(),
            drop_old_trips: Self::default_drop_old_trips(),
            chunk_size: Self::default_chunk_size(),
        }
    }
}


impl DashConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut file = File::open(path)
            .map_err(|e| ConfigError::OpeningFile(e))?;
        let mut text = String::new();
        file.read_to_string(&mut text)
            .map_err(|e| ConfigError::OpeningFile(e))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: DashConfig = toml::from_str(text)
            .map_err(|e| ConfigError::Parsing(e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !is_plain_identifier(&self.db.schema_name) {
            return Err(ConfigError::InvalidSchemaName(self.db.schema_name.clone()));
        }
        if self.load.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        Ok(())
    }
}


/// Letters, digits and underscores, not starting with a digit.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = DashConfig::from_toml_str(r#"
            [db]
            conn_string = "host=localhost user=postgres dbname=nyc_taxi"
        "#).unwrap();
        assert_eq!(config.db.schema_name, "public");
        assert_eq!(config.web.listen, "0.0.0.0:5001".parse::<SocketAddr>().unwrap());
        assert_eq!(config.load.zones_csv_path, None);
        assert_eq!(config.load.trip_files.len(), 0);
        assert!(config.load.drop_old_trips);
        assert_eq!(config.load.chunk_size, 200_000);
    }

    #[test]
    fn test_full_config() {
        let config = DashConfig::from_toml_str(r#"
            [db]
            conn_string = "host=db user=taxi dbname=nyc_taxi"
            schema_name = "taxi_2025"

            [web]
            listen = "127.0.0.1:8080"

            [load]
            zones_csv_path = "taxi_zone_lookup.csv"
            trip_files = ["data/yellow_tripdata_2025-01.csv", "data/yellow_tripdata_2025-02.csv"]
            drop_old_trips = false
            chunk_size = 5000
        "#).unwrap();
        assert_eq!(config.db.schema_name, "taxi_2025");
        assert_eq!(config.web.listen, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.load.zones_csv_path, Some(PathBuf::from("taxi_zone_lookup.csv")));
        assert_eq!(config.load.trip_files.len(), 2);
        assert!(!config.load.drop_old_trips);
        assert_eq!(config.load.chunk_size, 5000);
    }

    #[test]
    fn test_example_config() {
        let config = DashConfig::from_toml_str(include_str!("../../taxidash.toml.example")).unwrap();
        assert_eq!(config.db.schema_name, "public");
        assert_eq!(config.load.trip_files.len(), 2);
        assert_eq!(config.load.chunk_size, 200_000);
    }

    #[test]
    fn test_rejects_bad_schema_name() {
        let res = DashConfig::from_toml_str(r#"
            [db]
            conn_string = "host=localhost"
            schema_name = "public\"; DROP TABLE trips; --"
        "#);
        assert!(matches!(res, Err(ConfigError::InvalidSchemaName(_))));
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let res = DashConfig::from_toml_str(r#"
            [db]
            conn_string = "host=localhost"

            [load]
            chunk_size = 0
        "#);
        assert!(matches!(res, Err(ConfigError::InvalidChunkSize)));
    }

    #[test]
    fn test_missing_db_section() {
        let res = DashConfig::from_toml_str("[web]\nlisten = \"127.0.0.1:1\"\n");
        assert!(matches!(res, Err(ConfigError::Parsing(_))));
    }

    #[test]
    fn test_plain_identifier() {
        assert!(is_plain_identifier("public"));
        assert!(is_plain_identifier("_taxi2"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("2025"));
        assert!(!is_plain_identifier("nyc-taxi"));
        assert!(!is_plain_identifier("a b"));
    }
}
