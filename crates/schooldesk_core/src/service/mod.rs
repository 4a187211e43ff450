//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Emit metadata-only diagnostic events for ledger mutations.

pub mod fee_ledger_service;
