//! Core domain logic for SchoolDesk.
//! This crate is the single source of truth for fee-ledger invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod report;
pub mod repo;
pub mod seed;
pub mod service;

pub use config::CoreConfig;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::fee::{FeeRecord, FeeStatus};
pub use model::money::AmountError;
pub use model::payment::{NewPayment, Payment, PaymentId};
pub use repo::fee_repo::{FeeRepository, LedgerError, LedgerResult, SqliteFeeRepository};
pub use repo::payment_repo::{PaymentReceipt, PaymentRepository, SqlitePaymentRepository};
pub use repo::school_repo::{
    SchoolRepoError, SchoolRepoResult, SchoolRepository, SqliteSchoolRepository,
    SqliteStudentDirectory, StudentDirectory,
};
pub use report::school_reports::{ReportError, ReportResult};
pub use seed::{seed_demo_school, DemoSchool, SeedError};
pub use service::fee_ledger_service::FeeLedgerService;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
