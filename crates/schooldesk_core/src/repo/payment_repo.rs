//! Payment ledger contracts and SQLite implementation.
//!
//! # Responsibility
//! - Append payments and remove them on administrative correction.
//! - Reconcile the owning student's fee record before every mutation
//!   returns.
//!
//! # Invariants
//! - Insert/delete and reconciliation share one `IMMEDIATE` transaction;
//!   any failure rolls the whole operation back.
//! - Stored payments are never updated in place.
//! - Listing order is `payment_date ASC, recorded_at ASC, payment_id ASC`.

use crate::model::fee::FeeRecord;
use crate::model::money::to_canonical;
use crate::model::payment::{NewPayment, Payment, PaymentId};
use crate::model::school::StudentId;
use crate::repo::columns::{date_to_db, money_to_db, parse_date, parse_money, parse_uuid};
use crate::repo::fee_repo::{
    not_ready, require_active_student, LedgerError, LedgerResult, LEDGER_TABLES,
};
use crate::repo::reconcile::reconcile_student;
use crate::repo::check_connection_ready;
use chrono::Utc;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

const PAYMENT_SELECT_SQL: &str = "SELECT
    payment_id,
    student_id,
    amount,
    payment_date,
    recorded_at
FROM payments";

/// Outcome of a ledger mutation: the affected payment and the fee record as
/// reconciled inside the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub fee: FeeRecord,
}

/// Repository interface for the payment ledger.
pub trait PaymentRepository {
    /// Appends one payment and reconciles the student's fee record.
    fn record_payment(&self, payment: &NewPayment) -> LedgerResult<PaymentReceipt>;
    /// Deletes one payment and reconciles the student's fee record.
    fn delete_payment(&self, payment_id: PaymentId) -> LedgerResult<PaymentReceipt>;
    /// Loads one payment by id.
    fn get_payment(&self, payment_id: PaymentId) -> LedgerResult<Option<Payment>>;
    /// Lists one student's payments in ledger order.
    fn list_payments(&self, student_id: StudentId) -> LedgerResult<Vec<Payment>>;
}

/// SQLite-backed payment ledger.
pub struct SqlitePaymentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePaymentRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> LedgerResult<Self> {
        check_connection_ready(conn, LEDGER_TABLES).map_err(not_ready)?;
        Ok(Self { conn })
    }
}

impl PaymentRepository for SqlitePaymentRepository<'_> {
    fn record_payment(&self, payment: &NewPayment) -> LedgerResult<PaymentReceipt> {
        payment.validate().map_err(LedgerError::InvalidAmount)?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        require_active_student(&tx, payment.student_id)?;

        let stored = Payment {
            payment_id: Uuid::new_v4(),
            student_id: payment.student_id,
            amount: to_canonical(payment.amount),
            payment_date: payment.payment_date,
            recorded_at: Utc::now().timestamp_millis(),
        };
        tx.execute(
            "INSERT INTO payments (
                payment_id,
                student_id,
                amount,
                payment_date,
                recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                stored.payment_id.to_string(),
                stored.student_id,
                money_to_db(stored.amount),
                date_to_db(stored.payment_date),
                stored.recorded_at,
            ],
        )?;

        let fee = reconcile_student(&tx, stored.student_id)?;
        tx.commit()?;

        Ok(PaymentReceipt {
            payment: stored,
            fee,
        })
    }

    fn delete_payment(&self, payment_id: PaymentId) -> LedgerResult<PaymentReceipt> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let payment =
            load_payment(&tx, payment_id)?.ok_or(LedgerError::PaymentNotFound(payment_id))?;

        tx.execute(
            "DELETE FROM payments WHERE payment_id = ?1;",
            [payment_id.to_string()],
        )?;

        let fee = reconcile_student(&tx, payment.student_id)?;
        tx.commit()?;

        Ok(PaymentReceipt { payment, fee })
    }

    fn get_payment(&self, payment_id: PaymentId) -> LedgerResult<Option<Payment>> {
        load_payment(self.conn, payment_id)
    }

    fn list_payments(&self, student_id: StudentId) -> LedgerResult<Vec<Payment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PAYMENT_SELECT_SQL}
             WHERE student_id = ?1
             ORDER BY payment_date ASC, recorded_at ASC, payment_id ASC;"
        ))?;
        let mut rows = stmt.query([student_id])?;
        let mut payments = Vec::new();
        while let Some(row) = rows.next()? {
            payments.push(parse_payment_row(row)?);
        }
        Ok(payments)
    }
}

fn load_payment(conn: &Connection, payment_id: PaymentId) -> LedgerResult<Option<Payment>> {
    let mut stmt = conn.prepare(&format!("{PAYMENT_SELECT_SQL} WHERE payment_id = ?1;"))?;
    let mut rows = stmt.query([payment_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_payment_row(row)?));
    }
    Ok(None)
}

fn parse_payment_row(row: &Row<'_>) -> LedgerResult<Payment> {
    let id_text: String = row.get("payment_id")?;
    let amount_text: String = row.get("amount")?;
    let date_text: String = row.get("payment_date")?;

    Ok(Payment {
        payment_id: parse_uuid(&id_text, "payments.payment_id")
            .map_err(LedgerError::InvalidData)?,
        student_id: row.get("student_id")?,
        amount: parse_money(&amount_text, "payments.amount").map_err(LedgerError::InvalidData)?,
        payment_date: parse_date(&date_text, "payments.payment_date")
            .map_err(LedgerError::InvalidData)?,
        recorded_at: row.get("recorded_at")?,
    })
}
