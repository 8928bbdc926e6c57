//! evolve-db - Database layer for Evolve
//!
//! This crate provides the `Database` trait consumed by the engine, the
//! metadata store that records applied migrations, the driver registry
//! that opens connections and detects their dialect, and backends for
//! DuckDB and PostgreSQL.

pub mod duckdb;
pub mod error;
mod ident;
pub mod metadata;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod registry;
pub mod traits;

pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use metadata::{MetadataStore, MetadataTable, MetadataType, MigrationMetadata, NewMetadata};
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
pub use registry::{Driver, DriverRegistry};
pub use traits::Database;
