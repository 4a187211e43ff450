//! School reports over the current store state.
//!
//! # Responsibility
//! - Attendance summaries, exam rankings, outstanding fees, payment totals
//!   and teacher timetables.
//!
//! # Invariants
//! - Every report has a total order; ties fall back to ascending ids.
//! - Money and rates are computed with `Decimal`, never floats.

use crate::db::DbError;
use crate::model::fee::FeeStatus;
use crate::model::school::{ClassId, ExamId, SlotId, StudentId, SubjectId, TeacherId};
use crate::repo::columns::{date_to_db, parse_money, parse_time, parse_weekday};
use crate::repo::fee_repo::LedgerError;
use crate::repo::reconcile::sum_payments;
use chrono::{NaiveDate, NaiveTime, Weekday};
use rusqlite::{params, Connection, Row};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const REPORT_SCALE: u32 = 2;

pub type ReportResult<T> = Result<T, ReportError>;

/// Report-layer error for DB interaction and row decoding.
#[derive(Debug)]
pub enum ReportError {
    Db(DbError),
    InvalidData(String),
}

impl Display for ReportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid report row: {message}"),
        }
    }
}

impl Error for ReportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for ReportError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ReportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Attendance counts of one student over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub student_id: StudentId,
    pub student_name: String,
    pub present: u32,
    pub absent: u32,
    pub late: u32,
    /// Percentage of recorded days attended (present or late), 0 when
    /// nothing was recorded.
    pub attendance_rate: Decimal,
}

impl AttendanceSummary {
    pub fn recorded_days(&self) -> u32 {
        self.present + self.absent + self.late
    }
}

/// One student's average over all subjects of an exam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamPerformer {
    pub student_id: StudentId,
    pub student_name: String,
    pub average_marks: Decimal,
    pub subjects_marked: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutstandingFee {
    pub student_id: StudentId,
    pub student_name: String,
    pub amount_due: Decimal,
    pub amount_paid: Decimal,
    pub balance: Decimal,
    pub status: FeeStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimetableEntry {
    pub slot_id: SlotId,
    pub weekday: Weekday,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
    pub class_id: ClassId,
    pub class_name: String,
    pub subject_id: SubjectId,
    pub subject_name: String,
}

/// Summarizes attendance of a class's active students between `from` and
/// `to`, both inclusive, ordered by student id.
///
/// Returns an empty list when `from` is after `to`.
pub fn attendance_summary(
    conn: &Connection,
    class_id: ClassId,
    from: NaiveDate,
    to: NaiveDate,
) -> ReportResult<Vec<AttendanceSummary>> {
    if from > to {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT
            students.id AS student_id,
            students.first_name AS first_name,
            students.last_name AS last_name,
            SUM(CASE WHEN attendance.status = 'present' THEN 1 ELSE 0 END) AS present,
            SUM(CASE WHEN attendance.status = 'absent' THEN 1 ELSE 0 END) AS absent,
            SUM(CASE WHEN attendance.status = 'late' THEN 1 ELSE 0 END) AS late
         FROM students
         LEFT JOIN attendance
           ON attendance.student_id = students.id
          AND attendance.attended_on BETWEEN ?2 AND ?3
         WHERE students.class_id = ?1
           AND students.is_active = 1
         GROUP BY students.id
         ORDER BY students.id ASC;",
    )?;
    let mut rows = stmt.query(params![class_id, date_to_db(from), date_to_db(to)])?;
    let mut summaries = Vec::new();
    while let Some(row) = rows.next()? {
        let present = count_column(row, "present")?;
        let absent = count_column(row, "absent")?;
        let late = count_column(row, "late")?;
        summaries.push(AttendanceSummary {
            student_id: row.get("student_id")?,
            student_name: full_name(row)?,
            present,
            absent,
            late,
            attendance_rate: attendance_rate(present + late, present + absent + late),
        });
    }
    Ok(summaries)
}

/// Ranks students of one exam by average marks across subjects.
///
/// Descending average, ties by ascending student id. `limit == 0` and
/// unknown exams return an empty list.
pub fn top_exam_performers(
    conn: &Connection,
    exam_id: ExamId,
    limit: u32,
) -> ReportResult<Vec<ExamPerformer>> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT
            marks.student_id AS student_id,
            students.first_name AS first_name,
            students.last_name AS last_name,
            marks.marks_obtained AS marks_obtained
         FROM marks
         JOIN students ON students.id = marks.student_id
         WHERE marks.exam_id = ?1
         ORDER BY marks.student_id ASC, marks.subject_id ASC;",
    )?;
    let mut rows = stmt.query([exam_id])?;

    // student_id -> (name, total, count)
    let mut totals: BTreeMap<StudentId, (String, i64, u32)> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let student_id: StudentId = row.get("student_id")?;
        let marks: i64 = row.get("marks_obtained")?;
        let entry = totals
            .entry(student_id)
            .or_insert((full_name(row)?, 0, 0));
        entry.1 += marks;
        entry.2 += 1;
    }

    let mut performers = totals
        .into_iter()
        .map(|(student_id, (student_name, total, count))| ExamPerformer {
            student_id,
            student_name,
            average_marks: round_report(Decimal::from(total) / Decimal::from(count)),
            subjects_marked: count,
        })
        .collect::<Vec<_>>();
    performers.sort_by(|left, right| {
        right
            .average_marks
            .cmp(&left.average_marks)
            .then(left.student_id.cmp(&right.student_id))
    });
    performers.truncate(limit as usize);
    Ok(performers)
}

/// Lists fee records that are not fully paid, largest balance first.
pub fn outstanding_fees(conn: &Connection) -> ReportResult<Vec<OutstandingFee>> {
    let mut stmt = conn.prepare(
        "SELECT
            fees.student_id AS student_id,
            students.first_name AS first_name,
            students.last_name AS last_name,
            fees.amount_due AS amount_due,
            fees.amount_paid AS amount_paid,
            fees.payment_status AS payment_status
         FROM fees
         JOIN students ON students.id = fees.student_id
         WHERE fees.payment_status <> 'paid';",
    )?;
    let mut rows = stmt.query([])?;
    let mut outstanding = Vec::new();
    while let Some(row) = rows.next()? {
        outstanding.push(parse_outstanding_row(row)?);
    }
    outstanding.sort_by(|left, right| {
        right
            .balance
            .cmp(&left.balance)
            .then(left.student_id.cmp(&right.student_id))
    });
    Ok(outstanding)
}

/// Sums a student's payments; zero when there are none.
pub fn total_paid(conn: &Connection, student_id: StudentId) -> ReportResult<Decimal> {
    sum_payments(conn, student_id).map_err(|err| match err {
        LedgerError::Db(err) => ReportError::Db(err),
        other => ReportError::InvalidData(other.to_string()),
    })
}

/// Lists a teacher's slots by weekday (Monday first), start time, slot id.
pub fn teacher_timetable(
    conn: &Connection,
    teacher_id: TeacherId,
) -> ReportResult<Vec<TimetableEntry>> {
    let mut stmt = conn.prepare(
        "SELECT
            timetable_slots.id AS slot_id,
            timetable_slots.weekday AS weekday,
            timetable_slots.starts_at AS starts_at,
            timetable_slots.ends_at AS ends_at,
            classes.id AS class_id,
            classes.name AS class_name,
            subjects.id AS subject_id,
            subjects.name AS subject_name
         FROM timetable_slots
         JOIN classes ON classes.id = timetable_slots.class_id
         JOIN subjects ON subjects.id = timetable_slots.subject_id
         WHERE timetable_slots.teacher_id = ?1
         ORDER BY timetable_slots.weekday ASC,
                  timetable_slots.starts_at ASC,
                  timetable_slots.id ASC;",
    )?;
    let mut rows = stmt.query([teacher_id])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(parse_timetable_row(row)?);
    }
    Ok(entries)
}

fn parse_outstanding_row(row: &Row<'_>) -> ReportResult<OutstandingFee> {
    let due_text: String = row.get("amount_due")?;
    let paid_text: String = row.get("amount_paid")?;
    let status_text: String = row.get("payment_status")?;

    let amount_due = parse_money(&due_text, "fees.amount_due").map_err(ReportError::InvalidData)?;
    let amount_paid =
        parse_money(&paid_text, "fees.amount_paid").map_err(ReportError::InvalidData)?;
    let status = FeeStatus::parse(&status_text).ok_or_else(|| {
        ReportError::InvalidData(format!(
            "invalid payment status `{status_text}` in fees.payment_status"
        ))
    })?;

    Ok(OutstandingFee {
        student_id: row.get("student_id")?,
        student_name: full_name(row)?,
        amount_due,
        amount_paid,
        balance: amount_due - amount_paid,
        status,
    })
}

fn parse_timetable_row(row: &Row<'_>) -> ReportResult<TimetableEntry> {
    let starts_text: String = row.get("starts_at")?;
    let ends_text: String = row.get("ends_at")?;

    Ok(TimetableEntry {
        slot_id: row.get("slot_id")?,
        weekday: parse_weekday(row.get("weekday")?, "timetable_slots.weekday")
            .map_err(ReportError::InvalidData)?,
        starts_at: parse_time(&starts_text, "timetable_slots.starts_at")
            .map_err(ReportError::InvalidData)?,
        ends_at: parse_time(&ends_text, "timetable_slots.ends_at")
            .map_err(ReportError::InvalidData)?,
        class_id: row.get("class_id")?,
        class_name: row.get("class_name")?,
        subject_id: row.get("subject_id")?,
        subject_name: row.get("subject_name")?,
    })
}

fn full_name(row: &Row<'_>) -> ReportResult<String> {
    let first_name: String = row.get("first_name")?;
    let last_name: String = row.get("last_name")?;
    Ok(format!("{first_name} {last_name}"))
}

fn count_column(row: &Row<'_>, column: &'static str) -> ReportResult<u32> {
    let value: i64 = row.get(column)?;
    u32::try_from(value)
        .map_err(|_| ReportError::InvalidData(format!("invalid count `{value}` in {column}")))
}

fn attendance_rate(attended: u32, recorded: u32) -> Decimal {
    if recorded == 0 {
        return round_report(Decimal::ZERO);
    }
    round_report(Decimal::from(attended) * Decimal::ONE_HUNDRED / Decimal::from(recorded))
}

fn round_report(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(REPORT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(REPORT_SCALE);
    rounded
}

#[cfg(test)]
mod tests {
    use super::{attendance_rate, round_report};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn attendance_rate_is_a_two_place_percentage() {
        assert_eq!(attendance_rate(4, 5).to_string(), "80.00");
        assert_eq!(attendance_rate(2, 3).to_string(), "66.67");
        assert_eq!(attendance_rate(0, 0).to_string(), "0.00");
    }

    #[test]
    fn report_rounding_goes_half_away_from_zero() {
        let value = Decimal::from_str("72.125").unwrap();
        assert_eq!(round_report(value).to_string(), "72.13");
    }
}
