//! Installment schedules with compound monthly interest.
//!
//! Up to `free_installments` the buyer pays the base price. Beyond that the
//! total grows as `base × (1 + rate)^(count − free)`. The total is split
//! into equal half-up rounded shares and the last installment absorbs the
//! rounding remainder, so the installments always sum to the total exactly.

use lumen_core::error::DomainError;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::money::Money;
use crate::settings::PricingSettings;

/// A priced installment plan for one checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallmentSchedule {
    /// Number of installments.
    pub count: u32,
    /// Price before interest.
    pub base_price: Money,
    /// Price including interest; equals the sum of `installments`.
    pub total: Money,
    /// `total − base_price`.
    pub interest: Money,
    /// Whether this count falls inside the interest-free range.
    pub interest_free: bool,
    /// Per-installment amounts, in payment order.
    pub installments: Vec<Money>,
}

/// Computes the schedule for paying `base_price` in `count` installments.
///
/// # Errors
///
/// Returns `DomainError::InvalidInstallmentCount` if `count` is outside
/// `[1, settings.max_installments]`, and `DomainError::Validation` for a
/// negative base price, invalid settings, or arithmetic overflow.
pub fn schedule(
    base_price: Money,
    count: u32,
    settings: &PricingSettings,
) -> Result<InstallmentSchedule, DomainError> {
    settings.validate()?;
    if count == 0 || count > settings.max_installments {
        return Err(DomainError::InvalidInstallmentCount {
            count,
            max: settings.max_installments,
        });
    }
    if base_price.is_negative() {
        return Err(DomainError::Validation(
            "base price must not be negative".to_owned(),
        ));
    }

    let interest_free = count <= settings.free_installments;
    let total = if interest_free {
        base_price
    } else {
        compound(
            base_price,
            settings.monthly_interest_rate,
            count - settings.free_installments,
        )?
    };

    Ok(InstallmentSchedule {
        count,
        base_price,
        total,
        interest: total - base_price,
        interest_free,
        installments: split(total, count),
    })
}

/// Schedules for every count in `[1, settings.max_installments]`, in
/// ascending order, for the checkout installment picker.
///
/// # Errors
///
/// Same as [`schedule`].
pub fn installment_options(
    base_price: Money,
    settings: &PricingSettings,
) -> Result<Vec<InstallmentSchedule>, DomainError> {
    (1..=settings.max_installments)
        .map(|count| schedule(base_price, count, settings))
        .collect()
}

fn compound(base_price: Money, monthly_rate: Decimal, periods: u32) -> Result<Money, DomainError> {
    let overflow = || DomainError::Validation("installment interest overflow".to_owned());
    let growth = Decimal::ONE.checked_add(monthly_rate).ok_or_else(overflow)?;
    let mut factor = Decimal::ONE;
    for _ in 0..periods {
        factor = factor.checked_mul(growth).ok_or_else(overflow)?;
    }
    let amount = base_price
        .to_decimal()
        .checked_mul(factor)
        .ok_or_else(overflow)?;
    Money::from_decimal(amount)
}

/// Splits `total` into `count` shares; the last share takes the remainder.
fn split(total: Money, count: u32) -> Vec<Money> {
    let minor = i128::from(total.minor_units());
    let n = i128::from(count);

    // Half-up share; fall back to the floor when rounding up would leave a
    // negative remainder for the last installment.
    let mut share = (2 * minor + n) / (2 * n);
    if share * (n - 1) > minor {
        share = minor / n;
    }
    let last = minor - share * (n - 1);

    // Both values are bounded by `total`, which is an i64.
    let share = Money::from_minor(i64::try_from(share).unwrap_or(i64::MAX));
    let last = Money::from_minor(i64::try_from(last).unwrap_or(i64::MAX));

    let mut installments = vec![share; (count - 1) as usize];
    installments.push(last);
    installments
}
