//! Read-only reporting entry points.
//!
//! # Responsibility
//! - Shape attendance, exam, fee and timetable views inside core.
//! - Never mutate store state.

pub mod school_reports;
