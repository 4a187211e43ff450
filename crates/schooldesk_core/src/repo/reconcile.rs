//! Status reconciler for the fee ledger.
//!
//! # Responsibility
//! - Recompute a student's cumulative paid amount from the payment log.
//! - Derive the fee status and write both back to `fees`.
//!
//! # Invariants
//! - Runs on the caller's open transaction; never opens its own.
//! - Never creates a fee record; a missing record is `NoFeeRecord`.
//! - The only code path that writes `fees.amount_paid` and
//!   `fees.payment_status`.

use crate::model::fee::{FeeRecord, FeeStatus};
use crate::model::money::AmountError;
use crate::model::school::StudentId;
use crate::repo::columns::{money_to_db, parse_money};
use crate::repo::fee_repo::{load_fee_record, LedgerError, LedgerResult};
use log::debug;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

/// Reconciles one student's fee record against the payment log.
///
/// `conn` is expected to be an open `IMMEDIATE` transaction so the
/// sum-then-write sequence cannot interleave with another writer.
pub(crate) fn reconcile_student(conn: &Connection, student_id: StudentId) -> LedgerResult<FeeRecord> {
    let current =
        load_fee_record(conn, student_id)?.ok_or(LedgerError::NoFeeRecord(student_id))?;

    let total_paid = sum_payments(conn, student_id)?;
    let status = FeeStatus::derive(total_paid, current.amount_due);
    apply_reconciliation(conn, student_id, total_paid, status)?;

    debug!(
        "event=fee_reconcile module=ledger status=ok student_id={} amount_paid={} fee_status={}",
        student_id,
        total_paid,
        status.as_str()
    );

    Ok(FeeRecord {
        student_id,
        amount_due: current.amount_due,
        amount_paid: total_paid,
        status,
    })
}

/// Sums every stored payment of one student; zero when there are none.
pub(crate) fn sum_payments(conn: &Connection, student_id: StudentId) -> LedgerResult<Decimal> {
    let mut stmt = conn.prepare("SELECT amount FROM payments WHERE student_id = ?1;")?;
    let mut rows = stmt.query([student_id])?;
    let mut total = Decimal::ZERO;
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        let amount = parse_money(&text, "payments.amount").map_err(LedgerError::InvalidData)?;
        total = total
            .checked_add(amount)
            .ok_or(LedgerError::InvalidAmount(AmountError::OutOfRange(amount)))?;
    }
    Ok(total)
}

fn apply_reconciliation(
    conn: &Connection,
    student_id: StudentId,
    total_paid: Decimal,
    status: FeeStatus,
) -> LedgerResult<()> {
    let changed = conn.execute(
        "UPDATE fees
         SET amount_paid = ?2,
             payment_status = ?3
         WHERE student_id = ?1;",
        params![student_id, money_to_db(total_paid), status.as_str()],
    )?;
    if changed == 0 {
        return Err(LedgerError::NoFeeRecord(student_id));
    }
    Ok(())
}
