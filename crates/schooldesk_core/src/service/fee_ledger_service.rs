//! Fee ledger use-case service.
//!
//! # Responsibility
//! - Single entry point for fee assignment, payment recording/deletion and
//!   explicit reconciliation.
//! - Log every mutation with duration, outcome and a stable error code.
//!
//! # Invariants
//! - Service APIs never bypass repository transactions.
//! - Log lines carry ids and amounts only, never student names.

use crate::model::fee::FeeRecord;
use crate::model::payment::{NewPayment, Payment, PaymentId};
use crate::model::school::StudentId;
use crate::repo::fee_repo::{FeeRepository, LedgerError, LedgerResult, SqliteFeeRepository};
use crate::repo::payment_repo::{PaymentReceipt, PaymentRepository, SqlitePaymentRepository};
use chrono::NaiveDate;
use log::{error, info, warn};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::time::Instant;

/// Use-case facade over the fee record store and the payment ledger.
pub struct FeeLedgerService<F: FeeRepository, P: PaymentRepository> {
    fees: F,
    payments: P,
}

impl<'conn> FeeLedgerService<SqliteFeeRepository<'conn>, SqlitePaymentRepository<'conn>> {
    /// Builds the service over SQLite repositories sharing one connection.
    pub fn sqlite(conn: &'conn Connection) -> LedgerResult<Self> {
        Ok(Self::new(
            SqliteFeeRepository::try_new(conn)?,
            SqlitePaymentRepository::try_new(conn)?,
        ))
    }
}

impl<F: FeeRepository, P: PaymentRepository> FeeLedgerService<F, P> {
    /// Creates a service using the provided repository implementations.
    pub fn new(fees: F, payments: P) -> Self {
        Self { fees, payments }
    }

    /// Assigns the fee a student owes.
    ///
    /// # Contract
    /// - New record starts with `amount_paid = 0`.
    /// - Fails with `AlreadyAssigned` instead of overwriting.
    pub fn assign_fee(&self, student_id: StudentId, amount_due: Decimal) -> LedgerResult<FeeRecord> {
        let started_at = Instant::now();
        let result = self.fees.assign_fee(student_id, amount_due);
        if let Ok(record) = &result {
            info!(
                "event=fee_assign module=ledger status=ok student_id={} amount_due={} duration_ms={}",
                student_id,
                record.amount_due,
                started_at.elapsed().as_millis()
            );
        }
        log_failure("fee_assign", student_id, started_at, result)
    }

    /// Loads one student's fee record.
    pub fn fee_record(&self, student_id: StudentId) -> LedgerResult<FeeRecord> {
        self.fees.get_fee_record(student_id)
    }

    /// Lists every fee record ordered by student id.
    pub fn fee_records(&self) -> LedgerResult<Vec<FeeRecord>> {
        self.fees.list_fee_records()
    }

    /// Records one payment; the returned receipt carries the reconciled fee.
    ///
    /// # Contract
    /// - `InvalidAmount` for non-positive or over-precise amounts.
    /// - `UnknownStudent` / `InactiveStudent` from the student directory.
    /// - `NoFeeRecord` when no fee was assigned; the payment is not stored.
    pub fn record_payment(
        &self,
        student_id: StudentId,
        amount: Decimal,
        payment_date: NaiveDate,
    ) -> LedgerResult<PaymentReceipt> {
        let started_at = Instant::now();
        let request = NewPayment::new(student_id, amount, payment_date);
        let result = self.payments.record_payment(&request);
        if let Ok(receipt) = &result {
            info!(
                "event=payment_record module=ledger status=ok student_id={} payment_id={} amount={} amount_paid={} fee_status={} duration_ms={}",
                student_id,
                receipt.payment.payment_id,
                receipt.payment.amount,
                receipt.fee.amount_paid,
                receipt.fee.status.as_str(),
                started_at.elapsed().as_millis()
            );
        }
        log_failure("payment_record", student_id, started_at, result)
    }

    /// Deletes one payment as an administrative correction.
    pub fn delete_payment(&self, payment_id: PaymentId) -> LedgerResult<PaymentReceipt> {
        let started_at = Instant::now();
        let result = self.payments.delete_payment(payment_id);
        match &result {
            Ok(receipt) => info!(
                "event=payment_delete module=ledger status=ok student_id={} payment_id={} amount={} amount_paid={} fee_status={} duration_ms={}",
                receipt.payment.student_id,
                payment_id,
                receipt.payment.amount,
                receipt.fee.amount_paid,
                receipt.fee.status.as_str(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=payment_delete module=ledger status=error payment_id={} duration_ms={} error_code={} error={}",
                payment_id,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result
    }

    /// Re-runs reconciliation for one student.
    ///
    /// Idempotent: with no new payments the record is unchanged.
    pub fn reconcile(&self, student_id: StudentId) -> LedgerResult<FeeRecord> {
        let started_at = Instant::now();
        let result = self.fees.reconcile(student_id);
        log_failure("fee_reconcile", student_id, started_at, result)
    }

    /// Loads one payment by id.
    pub fn payment(&self, payment_id: PaymentId) -> LedgerResult<Option<Payment>> {
        self.payments.get_payment(payment_id)
    }

    /// Lists one student's payments in ledger order.
    pub fn payments(&self, student_id: StudentId) -> LedgerResult<Vec<Payment>> {
        self.payments.list_payments(student_id)
    }
}

fn log_failure<T>(
    event: &'static str,
    student_id: StudentId,
    started_at: Instant,
    result: LedgerResult<T>,
) -> LedgerResult<T> {
    if let Err(err) = &result {
        let duration_ms = started_at.elapsed().as_millis();
        if is_rejection(err) {
            warn!(
                "event={} module=ledger status=rejected student_id={} duration_ms={} error_code={}",
                event,
                student_id,
                duration_ms,
                err.code()
            );
        } else {
            error!(
                "event={} module=ledger status=error student_id={} duration_ms={} error_code={} error={}",
                event,
                student_id,
                duration_ms,
                err.code(),
                err
            );
        }
    }
    result
}

/// Deterministic validation failures, as opposed to storage faults.
fn is_rejection(err: &LedgerError) -> bool {
    !matches!(
        err,
        LedgerError::Db(_)
            | LedgerError::InvalidData(_)
            | LedgerError::UninitializedConnection { .. }
            | LedgerError::MissingRequiredTable(_)
    )
}
