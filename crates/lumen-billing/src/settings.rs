//! Pricing settings supplied by the admin configuration.

use lumen_core::error::DomainError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Commercial parameters for overage purchases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Price of one additional GB.
    pub price_per_gb: Decimal,
    /// Largest installment count offered at checkout.
    pub max_installments: u32,
    /// Installment counts up to this value carry no interest.
    pub free_installments: u32,
    /// Compound monthly interest applied beyond the free installments
    /// (fraction, e.g. `0.025`).
    pub monthly_interest_rate: Decimal,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            price_per_gb: Decimal::new(250, 2),
            max_installments: 12,
            free_installments: 3,
            monthly_interest_rate: Decimal::new(25, 3),
        }
    }
}

impl PricingSettings {
    /// Checks the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for a negative price or rate, a zero
    /// installment ceiling, or more free installments than the ceiling.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.price_per_gb.is_sign_negative() {
            return Err(DomainError::Validation(
                "price per GB must not be negative".to_owned(),
            ));
        }
        if self.monthly_interest_rate.is_sign_negative() {
            return Err(DomainError::Validation(
                "monthly interest rate must not be negative".to_owned(),
            ));
        }
        if self.max_installments == 0 {
            return Err(DomainError::Validation(
                "max installments must be at least 1".to_owned(),
            ));
        }
        if self.free_installments > self.max_installments {
            return Err(DomainError::Validation(format!(
                "free installments ({}) exceed max installments ({})",
                self.free_installments, self.max_installments
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(PricingSettings::default().validate().is_ok());
    }

    #[test]
    fn test_negative_rate_is_rejected() {
        let settings = PricingSettings {
            monthly_interest_rate: Decimal::new(-1, 2),
            ..PricingSettings::default()
        };
        assert!(matches!(settings.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_free_installments_above_max_is_rejected() {
        let settings = PricingSettings {
            max_installments: 2,
            free_installments: 3,
            ..PricingSettings::default()
        };
        match settings.validate().unwrap_err() {
            DomainError::Validation(msg) => assert!(msg.contains("free installments")),
            other => panic!("expected Validation, got {other:?}"),
        }
    }
}
