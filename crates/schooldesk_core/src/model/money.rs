//! Fixed-point money rules shared by fee assignment and payments.

use rust_decimal::Decimal;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Number of fractional digits kept for every stored amount.
pub const MONEY_SCALE: u32 = 2;

/// Largest whole-unit amount accepted for a single fee or payment.
pub const MAX_AMOUNT_UNITS: i64 = 1_000_000_000_000_000;

/// Reason an amount was rejected before reaching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountError {
    /// Payment amounts must be strictly positive.
    NotPositive(Decimal),
    /// Fee amounts must not be negative.
    Negative(Decimal),
    /// More fractional digits than [`MONEY_SCALE`].
    TooPrecise(Decimal),
    /// Larger than [`MAX_AMOUNT_UNITS`], or a running total that no longer fits.
    OutOfRange(Decimal),
}

impl AmountError {
    /// The offending amount.
    pub fn amount(&self) -> Decimal {
        match self {
            Self::NotPositive(amount)
            | Self::Negative(amount)
            | Self::TooPrecise(amount)
            | Self::OutOfRange(amount) => *amount,
        }
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive(amount) => write!(f, "amount must be positive, got {amount}"),
            Self::Negative(amount) => write!(f, "amount must not be negative, got {amount}"),
            Self::TooPrecise(amount) => write!(
                f,
                "amount {amount} has more than {MONEY_SCALE} fractional digits"
            ),
            Self::OutOfRange(amount) => write!(
                f,
                "amount {amount} exceeds the limit of {MAX_AMOUNT_UNITS}"
            ),
        }
    }
}

impl Error for AmountError {}

/// Checks a payment amount: strictly positive, at most two fractional digits,
/// no more than [`MAX_AMOUNT_UNITS`].
pub fn validate_payment_amount(amount: Decimal) -> Result<(), AmountError> {
    if amount <= Decimal::ZERO {
        return Err(AmountError::NotPositive(amount));
    }
    ensure_range(amount)
}

/// Checks a fee amount: zero or positive, same precision and ceiling.
pub fn validate_fee_amount(amount: Decimal) -> Result<(), AmountError> {
    if amount < Decimal::ZERO {
        return Err(AmountError::Negative(amount));
    }
    ensure_range(amount)
}

/// Rescales an amount to [`MONEY_SCALE`] digits for canonical storage.
///
/// Callers must validate first; rescaling never rounds a valid amount.
pub fn to_canonical(amount: Decimal) -> Decimal {
    let mut canonical = amount;
    canonical.rescale(MONEY_SCALE);
    canonical
}

fn ensure_range(amount: Decimal) -> Result<(), AmountError> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(AmountError::TooPrecise(amount));
    }
    if amount > Decimal::from(MAX_AMOUNT_UNITS) || to_canonical(amount).scale() != MONEY_SCALE {
        return Err(AmountError::OutOfRange(amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{
        to_canonical, validate_fee_amount, validate_payment_amount, AmountError, MAX_AMOUNT_UNITS,
    };
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn d(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn payment_amount_must_be_positive() {
        assert_eq!(
            validate_payment_amount(d("-50")),
            Err(AmountError::NotPositive(d("-50")))
        );
        assert_eq!(
            validate_payment_amount(Decimal::ZERO),
            Err(AmountError::NotPositive(Decimal::ZERO))
        );
        assert!(validate_payment_amount(d("0.01")).is_ok());
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        assert!(validate_payment_amount(d("12.5000")).is_ok());
        assert_eq!(
            validate_payment_amount(d("12.505")),
            Err(AmountError::TooPrecise(d("12.505")))
        );
    }

    #[test]
    fn fee_amount_allows_zero() {
        assert!(validate_fee_amount(Decimal::ZERO).is_ok());
        assert!(matches!(
            validate_fee_amount(d("-1")),
            Err(AmountError::Negative(_))
        ));
    }

    #[test]
    fn amounts_above_the_limit_are_out_of_range() {
        let limit = Decimal::from(MAX_AMOUNT_UNITS);
        assert!(validate_payment_amount(limit).is_ok());
        assert_eq!(to_canonical(limit).scale(), 2);

        let err = validate_fee_amount(limit + d("0.01")).unwrap_err();
        assert_eq!(err, AmountError::OutOfRange(limit + d("0.01")));
        assert_eq!(err.amount(), limit + d("0.01"));
        assert!(matches!(
            validate_payment_amount(Decimal::MAX),
            Err(AmountError::OutOfRange(_))
        ));
    }

    #[test]
    fn canonical_form_has_two_digits() {
        assert_eq!(to_canonical(d("15000")).to_string(), "15000.00");
        assert_eq!(to_canonical(d("7.5")).to_string(), "7.50");
    }
}
