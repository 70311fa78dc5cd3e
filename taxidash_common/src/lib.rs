pub mod aggregates;
pub mod config;
pub mod db;
pub mod errors;
pub mod filters;
pub mod indexes;
pub mod model;
pub mod queries;
