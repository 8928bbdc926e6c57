//! evolve-engine - Migration engine for Evolve
//!
//! This crate provides the `Evolve` orchestrator. Every command runs inside
//! the same envelope: probe the connection, take the application lock,
//! manage schemas, take the metadata table lock, record the start version,
//! run the command body and release both locks.

mod commands;
pub mod error;
mod evolve;
mod executor;
pub mod lock;
pub mod report;
mod session;

pub use error::{ErrorKind, EvolveError, EvolveResult};
pub use evolve::Evolve;
pub use lock::{CancelHandle, LockPolicy};
pub use report::{
    CommandReport, EraseReport, InfoReport, MigrateReport, PendingMigration, RepairReport,
    ValidateReport,
};
