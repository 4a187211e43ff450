//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire config, logging and storage the way an embedding app would.
//! - Seed the demo school into an empty store and print two reports.

use log::info;
use schooldesk_core::report::school_reports::{outstanding_fees, teacher_timetable};
use schooldesk_core::seed::{first_teacher, has_students};
use schooldesk_core::{init_logging, open_db, open_db_in_memory, seed_demo_school, CoreConfig};
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("schooldesk: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env();
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }

    println!("schooldesk_core ping={}", schooldesk_core::ping());
    println!("schooldesk_core version={}", schooldesk_core::core_version());

    let conn = match &config.db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };

    if !has_students(&conn)? {
        let school = seed_demo_school(&conn)?;
        info!(
            "event=cli_seed module=cli status=ok students={}",
            school.student_ids.len()
        );
    }

    println!();
    println!("Outstanding fees");
    for row in outstanding_fees(&conn)? {
        println!(
            "  #{:<4} {:<24} due {:>10} paid {:>10} balance {:>10} {}",
            row.student_id,
            row.student_name,
            row.amount_due,
            row.amount_paid,
            row.balance,
            row.status.as_str()
        );
    }

    let Some(teacher_id) = first_teacher(&conn)? else {
        println!();
        println!("No teachers on record");
        return Ok(());
    };

    println!();
    println!("Timetable for teacher #{teacher_id}");
    for entry in teacher_timetable(&conn, teacher_id)? {
        println!(
            "  {} {}-{} {:<10} {}",
            entry.weekday,
            entry.starts_at.format("%H:%M"),
            entry.ends_at.format("%H:%M"),
            entry.class_name,
            entry.subject_name
        );
    }

    Ok(())
}
