//! Fee record model and payment-status derivation.
//!
//! # Invariants
//! - One `FeeRecord` per student.
//! - `amount_paid` equals the sum of the student's payments after every
//!   reconciliation; it is never capped at `amount_due`.
//! - `status` is always `FeeStatus::derive(amount_paid, amount_due)`.

use crate::model::school::StudentId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payment state of one student's fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeStatus {
    /// Nothing paid yet.
    Unpaid,
    /// Something paid, still below the amount due.
    PartiallyPaid,
    /// Paid in full or overpaid.
    Paid,
}

impl FeeStatus {
    /// Derives the status from a cumulative paid total.
    ///
    /// The threshold check runs first, so a zero fee counts as `Paid` and an
    /// overpayment stays `Paid`.
    pub fn derive(total_paid: Decimal, amount_due: Decimal) -> Self {
        if total_paid >= amount_due {
            Self::Paid
        } else if total_paid > Decimal::ZERO {
            Self::PartiallyPaid
        } else {
            Self::Unpaid
        }
    }

    /// Storage label used in `fees.payment_status`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::PartiallyPaid => "partially_paid",
            Self::Paid => "paid",
        }
    }

    /// Parses a storage label.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unpaid" => Some(Self::Unpaid),
            "partially_paid" => Some(Self::PartiallyPaid),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// Outstanding-balance record for one student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRecord {
    pub student_id: StudentId,
    pub amount_due: Decimal,
    /// Derived from the payment log; written only by reconciliation.
    pub amount_paid: Decimal,
    pub status: FeeStatus,
}

impl FeeRecord {
    /// Fresh record for a newly assigned fee with no payments.
    pub fn assigned(student_id: StudentId, amount_due: Decimal) -> Self {
        Self {
            student_id,
            amount_due,
            amount_paid: Decimal::ZERO,
            status: FeeStatus::derive(Decimal::ZERO, amount_due),
        }
    }

    /// `amount_due - amount_paid`; negative when overpaid.
    pub fn balance(&self) -> Decimal {
        self.amount_due - self.amount_paid
    }
}
