//! Payment model.
//!
//! # Invariants
//! - `payment_id` is stable and never reused.
//! - `amount` is strictly positive with at most two fractional digits.
//! - Payments are immutable once stored; corrections delete and re-record.

use crate::model::money::{validate_payment_amount, AmountError};
use crate::model::school::StudentId;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one payment transaction.
pub type PaymentId = Uuid;

/// Stored payment transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: PaymentId,
    pub student_id: StudentId,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    /// Epoch milliseconds when the ledger accepted the payment.
    pub recorded_at: i64,
}

/// Input for recording a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub student_id: StudentId,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
}

impl NewPayment {
    pub fn new(student_id: StudentId, amount: Decimal, payment_date: NaiveDate) -> Self {
        Self {
            student_id,
            amount,
            payment_date,
        }
    }

    /// Validates the amount before any SQL runs.
    pub fn validate(&self) -> Result<(), AmountError> {
        validate_payment_amount(self.amount)
    }
}
