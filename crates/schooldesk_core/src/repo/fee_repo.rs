//! Fee record store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Hold exactly one fee record per student.
//! - Own fee assignment; expose read access for reports and services.
//! - Define the error taxonomy shared by the whole fee ledger.
//!
//! # Invariants
//! - `amount_paid`/`payment_status` are never written here; only
//!   `repo::reconcile` updates them.
//! - Fee assignment never overwrites an existing record.

use crate::db::DbError;
use crate::model::fee::{FeeRecord, FeeStatus};
use crate::model::money::{validate_fee_amount, AmountError};
use crate::model::payment::PaymentId;
use crate::model::school::StudentId;
use crate::repo::columns::{money_to_db, parse_money};
use crate::repo::reconcile::reconcile_student;
use crate::repo::school_repo::{SqliteStudentDirectory, StudentDirectory};
use crate::repo::{check_connection_ready, ConnectionNotReady};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub(crate) const LEDGER_TABLES: &[&str] = &["students", "fees", "payments"];

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors raised by fee assignment, payment recording and reconciliation.
#[derive(Debug)]
pub enum LedgerError {
    /// Non-positive payment, negative fee, or too many fractional digits.
    InvalidAmount(AmountError),
    /// Student id does not reference an existing student.
    UnknownStudent(StudentId),
    /// Student exists but is no longer active.
    InactiveStudent(StudentId),
    PaymentNotFound(PaymentId),
    /// Lookup of a fee record that was never assigned.
    FeeRecordNotFound(StudentId),
    /// Reconciliation ran for a student without fee assignment.
    NoFeeRecord(StudentId),
    AlreadyAssigned(StudentId),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    Db(DbError),
    InvalidData(String),
}

impl LedgerError {
    /// Stable machine-readable code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "invalid_amount",
            Self::UnknownStudent(_) => "unknown_student",
            Self::InactiveStudent(_) => "inactive_student",
            Self::PaymentNotFound(_) => "payment_not_found",
            Self::FeeRecordNotFound(_) => "fee_record_not_found",
            Self::NoFeeRecord(_) => "no_fee_record",
            Self::AlreadyAssigned(_) => "already_assigned",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_required_table",
            Self::Db(_) => "db_error",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for LedgerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAmount(err) => write!(f, "invalid amount: {err}"),
            Self::UnknownStudent(id) => write!(f, "unknown student: {id}"),
            Self::InactiveStudent(id) => write!(f, "student is not active: {id}"),
            Self::PaymentNotFound(id) => write!(f, "payment not found: {id}"),
            Self::FeeRecordNotFound(id) => write!(f, "fee record not found for student {id}"),
            Self::NoFeeRecord(id) => {
                write!(f, "cannot reconcile student {id}: no fee has been assigned")
            }
            Self::AlreadyAssigned(id) => write!(f, "fee already assigned for student {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "fee ledger requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "fee ledger requires table `{table}`")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid ledger data: {message}"),
        }
    }
}

impl Error for LedgerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidAmount(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for LedgerError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for the fee record store.
pub trait FeeRepository {
    /// Loads the fee record of one student.
    fn get_fee_record(&self, student_id: StudentId) -> LedgerResult<FeeRecord>;
    /// Creates the fee record of one student with nothing paid.
    fn assign_fee(&self, student_id: StudentId, amount_due: Decimal) -> LedgerResult<FeeRecord>;
    /// Lists every fee record ordered by student id.
    fn list_fee_records(&self) -> LedgerResult<Vec<FeeRecord>>;
    /// Re-runs reconciliation for one student in its own transaction.
    fn reconcile(&self, student_id: StudentId) -> LedgerResult<FeeRecord>;
}

/// SQLite-backed fee record store.
pub struct SqliteFeeRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFeeRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> LedgerResult<Self> {
        check_connection_ready(conn, LEDGER_TABLES).map_err(not_ready)?;
        Ok(Self { conn })
    }
}

impl FeeRepository for SqliteFeeRepository<'_> {
    fn get_fee_record(&self, student_id: StudentId) -> LedgerResult<FeeRecord> {
        load_fee_record(self.conn, student_id)?.ok_or(LedgerError::FeeRecordNotFound(student_id))
    }

    fn assign_fee(&self, student_id: StudentId, amount_due: Decimal) -> LedgerResult<FeeRecord> {
        validate_fee_amount(amount_due).map_err(LedgerError::InvalidAmount)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        require_active_student(&tx, student_id)?;
        if load_fee_record(&tx, student_id)?.is_some() {
            return Err(LedgerError::AlreadyAssigned(student_id));
        }

        let record = FeeRecord::assigned(student_id, amount_due);
        tx.execute(
            "INSERT INTO fees (student_id, amount_due, amount_paid, payment_status)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                student_id,
                money_to_db(record.amount_due),
                money_to_db(record.amount_paid),
                record.status.as_str(),
            ],
        )?;
        tx.commit()?;

        Ok(record)
    }

    fn list_fee_records(&self) -> LedgerResult<Vec<FeeRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, amount_due, amount_paid, payment_status
             FROM fees
             ORDER BY student_id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_fee_row(row)?);
        }
        Ok(records)
    }

    fn reconcile(&self, student_id: StudentId) -> LedgerResult<FeeRecord> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let record = reconcile_student(&tx, student_id)?;
        tx.commit()?;
        Ok(record)
    }
}

/// Loads a fee record, `None` when the student has no fee assigned.
pub(crate) fn load_fee_record(
    conn: &Connection,
    student_id: StudentId,
) -> LedgerResult<Option<FeeRecord>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, amount_due, amount_paid, payment_status
         FROM fees
         WHERE student_id = ?1;",
    )?;
    let mut rows = stmt.query([student_id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_fee_row(row)?));
    }
    Ok(None)
}

/// Fails unless the student exists and is active.
pub(crate) fn require_active_student(conn: &Connection, student_id: StudentId) -> LedgerResult<()> {
    let directory = SqliteStudentDirectory::new(conn);
    if !directory.student_exists(student_id)? {
        return Err(LedgerError::UnknownStudent(student_id));
    }
    if !directory.is_active(student_id)? {
        return Err(LedgerError::InactiveStudent(student_id));
    }
    Ok(())
}

fn parse_fee_row(row: &Row<'_>) -> LedgerResult<FeeRecord> {
    let amount_due_text: String = row.get("amount_due")?;
    let amount_paid_text: String = row.get("amount_paid")?;
    let status_text: String = row.get("payment_status")?;

    let status = FeeStatus::parse(&status_text).ok_or_else(|| {
        LedgerError::InvalidData(format!(
            "invalid payment status `{status_text}` in fees.payment_status"
        ))
    })?;

    Ok(FeeRecord {
        student_id: row.get("student_id")?,
        amount_due: parse_money(&amount_due_text, "fees.amount_due")
            .map_err(LedgerError::InvalidData)?,
        amount_paid: parse_money(&amount_paid_text, "fees.amount_paid")
            .map_err(LedgerError::InvalidData)?,
        status,
    })
}

pub(crate) fn not_ready(err: ConnectionNotReady) -> LedgerError {
    match err {
        ConnectionNotReady::Version { expected, actual } => LedgerError::UninitializedConnection {
            expected_version: expected,
            actual_version: actual,
        },
        ConnectionNotReady::MissingTable(table) => LedgerError::MissingRequiredTable(table),
        ConnectionNotReady::Db(err) => LedgerError::Db(err),
    }
}
