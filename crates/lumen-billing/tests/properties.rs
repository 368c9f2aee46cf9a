//! Property-based tests for pricing and installment schedules.
//!
//! - quoting is linear up to one cent of rounding
//! - installments always sum to the schedule total
//! - the total never decreases as the installment count grows, and grows
//!   strictly past the free installments once interest reaches a cent

use lumen_billing::{Money, PricingSettings, installment_options, quote, schedule};
use proptest::prelude::*;
use rust_decimal::Decimal;

// =============================================================================
// Strategies
// =============================================================================

/// Requested storage in hundredths of a GB, up to 10 000 GB.
fn arb_requested_gb() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

/// Price per GB with up to three fractional digits, up to 50.000.
fn arb_price_per_gb() -> impl Strategy<Value = Decimal> {
    (0i64..=50_000).prop_map(|thousandths| Decimal::new(thousandths, 3))
}

fn arb_settings() -> impl Strategy<Value = PricingSettings> {
    (1u32..=24, 0u32..=24, 0i64..=100).prop_map(|(max, free, rate_per_mille)| PricingSettings {
        price_per_gb: Decimal::new(250, 2),
        max_installments: max,
        free_installments: free.min(max),
        monthly_interest_rate: Decimal::new(rate_per_mille, 3),
    })
}

fn arb_base_price() -> impl Strategy<Value = Money> {
    (0i64..=10_000_000).prop_map(Money::from_minor)
}

/// Settings with a positive rate, paired with a base price of at least
/// 1 000.00 so one period of interest is worth at least a cent.
fn arb_interest_bearing() -> impl Strategy<Value = (Money, PricingSettings)> {
    (100_000i64..=10_000_000, 1u32..=24, 0u32..=24, 1i64..=100).prop_map(
        |(base, max, free, rate_per_mille)| {
            let settings = PricingSettings {
                price_per_gb: Decimal::new(250, 2),
                max_installments: max,
                free_installments: free.min(max),
                monthly_interest_rate: Decimal::new(rate_per_mille, 3),
            };
            (Money::from_minor(base), settings)
        },
    )
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn quote_is_linear_within_one_cent(g in arb_requested_gb(), p in arb_price_per_gb()) {
        let single = quote(g, p).unwrap().minor_units();
        let double = quote(g * Decimal::from(2), p).unwrap().minor_units();

        prop_assert!((double - 2 * single).abs() <= 1, "single={single} double={double}");
    }

    #[test]
    fn installments_sum_to_total(base in arb_base_price(), settings in arb_settings(), pick in 0u32..24) {
        let count = pick % settings.max_installments + 1;

        let plan = schedule(base, count, &settings).unwrap();

        let sum: Money = plan.installments.iter().copied().sum();
        prop_assert_eq!(sum, plan.total);
        prop_assert_eq!(plan.installments.len(), count as usize);
        prop_assert!(plan.installments.iter().all(|amount| !amount.is_negative()));
    }

    #[test]
    fn total_never_decreases_with_count(base in arb_base_price(), settings in arb_settings()) {
        let options = installment_options(base, &settings).unwrap();

        for pair in options.windows(2) {
            prop_assert!(pair[0].total <= pair[1].total);
        }
        for option in options.iter().filter(|o| o.interest_free) {
            prop_assert_eq!(option.total, base);
        }
    }

    #[test]
    fn total_grows_with_every_interest_bearing_count((base, settings) in arb_interest_bearing()) {
        let options = installment_options(base, &settings).unwrap();

        for pair in options.windows(2).filter(|pair| pair[1].count > settings.free_installments) {
            prop_assert!(
                pair[0].total < pair[1].total,
                "{} installments cost {}, {} cost {}",
                pair[0].count, pair[0].total, pair[1].count, pair[1].total
            );
            prop_assert!(!pair[1].interest_free);
        }
    }

    #[test]
    fn interest_free_counts_split_the_base_price(base in arb_base_price(), count in 1u32..=3) {
        let settings = PricingSettings {
            max_installments: 12,
            free_installments: 3,
            ..PricingSettings::default()
        };

        let plan = schedule(base, count, &settings).unwrap();

        prop_assert_eq!(plan.total, base);
        prop_assert_eq!(plan.interest, Money::ZERO);
    }
}
