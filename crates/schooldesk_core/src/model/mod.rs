//! Domain model for the school store and its fee ledger.
//!
//! # Responsibility
//! - Define canonical data structures used by repositories and services.
//! - Keep pure derivation rules (fee status, amount checks) next to the data.
//!
//! # Invariants
//! - School entities are identified by SQLite integer row ids.
//! - Payments are identified by stable v4 UUIDs.
//! - Money is a fixed-point `Decimal` with at most two fractional digits.

pub mod fee;
pub mod money;
pub mod payment;
pub mod school;
