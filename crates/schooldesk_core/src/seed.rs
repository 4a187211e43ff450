//! Demo school dataset.
//!
//! # Responsibility
//! - Populate an empty database with a small, realistic school.
//! - Route fee assignment and payments through the ledger so reconciled
//!   statuses match what a real term would produce.
//!
//! # Invariants
//! - Refuses to run once any student exists.
//! - School rows are written in one transaction; each ledger call then
//!   runs in its own.

use crate::db::DbError;
use crate::model::school::{
    AttendanceEntry, AttendanceStatus, ClassId, ExamId, Mark, NewExam, NewParent, NewStudent,
    NewTeacher, NewTimetableSlot, StudentId, SubjectId, TeacherId,
};
use crate::repo::fee_repo::LedgerError;
use crate::repo::school_repo::{SchoolRepoError, SchoolRepository, SqliteSchoolRepository};
use crate::service::fee_ledger_service::FeeLedgerService;
use chrono::{Days, NaiveDate, NaiveTime, Weekday};
use log::{error, info};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Fee assigned to every demo student.
pub const DEMO_FEE_AMOUNT: i64 = 20_000;

pub type SeedResult<T> = Result<T, SeedError>;

#[derive(Debug)]
pub enum SeedError {
    /// The database already holds students.
    AlreadySeeded,
    School(SchoolRepoError),
    Ledger(LedgerError),
    Db(DbError),
    /// A fixture date or time could not be constructed.
    InvalidFixture(&'static str),
}

impl SeedError {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadySeeded => "already_seeded",
            Self::School(_) => "school_error",
            Self::Ledger(err) => err.code(),
            Self::Db(_) => "db_error",
            Self::InvalidFixture(_) => "invalid_fixture",
        }
    }
}

impl Display for SeedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadySeeded => write!(f, "database already contains students"),
            Self::School(err) => write!(f, "{err}"),
            Self::Ledger(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidFixture(what) => write!(f, "invalid demo fixture: {what}"),
        }
    }
}

impl Error for SeedError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::School(err) => Some(err),
            Self::Ledger(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchoolRepoError> for SeedError {
    fn from(value: SchoolRepoError) -> Self {
        Self::School(value)
    }
}

impl From<LedgerError> for SeedError {
    fn from(value: LedgerError) -> Self {
        Self::Ledger(value)
    }
}

impl From<DbError> for SeedError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SeedError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Ids created by [`seed_demo_school`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoSchool {
    pub class_ids: Vec<ClassId>,
    pub teacher_ids: Vec<TeacherId>,
    pub subject_ids: Vec<SubjectId>,
    /// In enrollment order; the fifth student pays in two installments.
    pub student_ids: Vec<StudentId>,
    pub exam_id: ExamId,
}

/// Seeds the demo school into an empty, migrated database.
///
/// Resulting fee statuses, by enrollment order: paid in full, partially
/// paid, unpaid, partially paid, paid in two installments of 10000.
///
/// The school rows commit before the first ledger call. A ledger failure
/// therefore leaves students without fees, and every later call returns
/// [`SeedError::AlreadySeeded`]; re-seed into a fresh database.
pub fn seed_demo_school(conn: &Connection) -> SeedResult<DemoSchool> {
    let started_at = Instant::now();
    let result = seed_inner(conn);
    match &result {
        Ok(school) => info!(
            "event=seed_demo module=seed status=ok students={} duration_ms={}",
            school.student_ids.len(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=seed_demo module=seed status=error duration_ms={} error_code={} error={}",
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
    }
    result
}

/// Returns whether the database already holds students.
pub fn has_students(conn: &Connection) -> SeedResult<bool> {
    let exists: i64 = conn.query_row("SELECT EXISTS(SELECT 1 FROM students);", [], |row| {
        row.get(0)
    })?;
    Ok(exists == 1)
}

/// Returns the lowest teacher id, `None` when no teacher exists.
pub fn first_teacher(conn: &Connection) -> SeedResult<Option<TeacherId>> {
    let teacher_id = conn
        .query_row("SELECT MIN(id) FROM teachers;", [], |row| {
            row.get::<_, Option<TeacherId>>(0)
        })?;
    Ok(teacher_id)
}

fn seed_inner(conn: &Connection) -> SeedResult<DemoSchool> {
    if has_students(conn)? {
        return Err(SeedError::AlreadySeeded);
    }

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let school = seed_directory(&tx)?;
    tx.commit()?;

    seed_fees(conn, &school.student_ids)?;
    Ok(school)
}

fn seed_directory(conn: &Connection) -> SeedResult<DemoSchool> {
    let repo = SqliteSchoolRepository::try_new(conn)?;
    let term_start = calendar_date(2024, 6, 3)?;

    let grade_five = repo.create_class("Grade 5", Some("A"))?;
    let grade_six = repo.create_class("Grade 6", Some("B"))?;

    let mut teacher_ids = Vec::new();
    for (first_name, last_name, email) in [
        ("Alice", "Moreau", "alice.moreau@school.example"),
        ("Brian", "Okafor", "brian.okafor@school.example"),
        ("Chloe", "Lindqvist", "chloe.lindqvist@school.example"),
    ] {
        let teacher = repo.create_teacher(&NewTeacher {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: Some(email.to_string()),
            phone: None,
        })?;
        teacher_ids.push(teacher.id);
    }

    let mut subject_ids = Vec::new();
    for (name, teacher_id) in [
        ("Mathematics", teacher_ids[0]),
        ("English", teacher_ids[1]),
        ("Science", teacher_ids[2]),
    ] {
        subject_ids.push(repo.create_subject(name, Some(teacher_id))?.id);
    }

    let mut student_ids = Vec::new();
    for (first_name, last_name, class_id, parent_first, relationship) in [
        ("Maya", "Patel", grade_five.id, "Ravi", "father"),
        ("Lucas", "Silva", grade_five.id, "Ana", "mother"),
        ("Emma", "Novak", grade_five.id, "Petra", "mother"),
        ("Noah", "Kim", grade_six.id, "Jin", "father"),
        ("Zara", "Haddad", grade_six.id, "Layla", "guardian"),
    ] {
        let student = repo
            .enroll_student(&NewStudent::new(first_name, last_name, term_start).in_class(class_id))?;
        repo.add_parent(&NewParent {
            student_id: student.id,
            first_name: parent_first.to_string(),
            last_name: last_name.to_string(),
            relationship: relationship.to_string(),
            email: None,
            phone: Some(format!("+1 555 010 {:04}", student.id)),
        })?;
        student_ids.push(student.id);
    }

    let exam = repo.create_exam(&NewExam {
        class_id: grade_five.id,
        name: "Mid-term".to_string(),
        held_on: calendar_date(2024, 6, 14)?,
        max_marks: 100,
    })?;
    let exam_marks: [[i64; 3]; 3] = [[88, 92, 79], [74, 81, 90], [95, 67, 83]];
    for (student_id, marks) in student_ids.iter().zip(exam_marks) {
        for (subject_id, marks_obtained) in subject_ids.iter().zip(marks) {
            repo.record_mark(&Mark {
                exam_id: exam.id,
                student_id: *student_id,
                subject_id: *subject_id,
                marks_obtained,
            })?;
        }
    }

    // One school week, Monday to Friday; rows are students, columns days.
    let week = ["PPPPP", "PLPAP", "PPAAP", "LPPPP", "PPPPL"];
    for (student_id, pattern) in student_ids.iter().zip(week) {
        for (offset, code) in pattern.chars().enumerate() {
            let date = term_start
                .checked_add_days(Days::new(offset as u64))
                .ok_or(SeedError::InvalidFixture("attendance date"))?;
            let status = match code {
                'L' => AttendanceStatus::Late,
                'A' => AttendanceStatus::Absent,
                _ => AttendanceStatus::Present,
            };
            repo.record_attendance(&AttendanceEntry {
                student_id: *student_id,
                date,
                status,
            })?;
        }
    }

    for (class_id, subject_index, weekday, starts, ends) in [
        (grade_five.id, 0, Weekday::Mon, (9, 0), (10, 0)),
        (grade_five.id, 1, Weekday::Mon, (10, 0), (11, 0)),
        (grade_five.id, 2, Weekday::Tue, (9, 0), (10, 0)),
        (grade_six.id, 0, Weekday::Mon, (11, 0), (12, 0)),
        (grade_six.id, 1, Weekday::Wed, (9, 0), (10, 0)),
        (grade_six.id, 0, Weekday::Wed, (10, 0), (11, 0)),
    ] {
        repo.add_timetable_slot(&NewTimetableSlot {
            class_id,
            subject_id: subject_ids[subject_index],
            teacher_id: teacher_ids[subject_index],
            weekday,
            starts_at: clock(starts.0, starts.1)?,
            ends_at: clock(ends.0, ends.1)?,
        })?;
    }

    Ok(DemoSchool {
        class_ids: vec![grade_five.id, grade_six.id],
        teacher_ids,
        subject_ids,
        student_ids,
        exam_id: exam.id,
    })
}

fn seed_fees(conn: &Connection, student_ids: &[StudentId]) -> SeedResult<()> {
    let ledger = FeeLedgerService::sqlite(conn)?;
    let fee = Decimal::new(DEMO_FEE_AMOUNT * 100, 2);
    for student_id in student_ids {
        ledger.assign_fee(*student_id, fee)?;
    }

    // Installments per student, in enrollment order.
    let installments: [&[(i64, u32)]; 5] = [
        &[(20_000, 10)],
        &[(15_000, 12)],
        &[],
        &[(5_000, 17)],
        &[(10_000, 10), (10_000, 24)],
    ];
    for (student_id, payments) in student_ids.iter().zip(installments) {
        for (amount, day) in payments {
            ledger.record_payment(
                *student_id,
                Decimal::from(*amount),
                calendar_date(2024, 6, *day)?,
            )?;
        }
    }
    Ok(())
}

fn calendar_date(year: i32, month: u32, day: u32) -> SeedResult<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(SeedError::InvalidFixture("calendar date"))
}

fn clock(hour: u32, minute: u32) -> SeedResult<NaiveTime> {
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or(SeedError::InvalidFixture("slot time"))
}
