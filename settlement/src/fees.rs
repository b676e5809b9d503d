//! Fee/tax decomposition of a booking charge.
//
//  Deliberately pure: no async, no IO. All arithmetic is integer cents
//  with half-up rounding.

/// Percentage split applied to every booking charge.
#[derive(Debug, Clone, Copy)]
pub struct FeePolicy {
    pub platform_fee_pct: u32,
    pub tax_pct: u32,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            platform_fee_pct: 15,
            tax_pct: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub platform_fee_cents: i64,
    pub tax_cents: i64,
    /// Gateway processing cost (2.9% + 30¢). Informational: the platform
    /// absorbs it, it is never deducted from the provider share.
    pub gateway_fee_cents: i64,
    pub provider_amount_cents: i64,
}

impl FeePolicy {
    /// Split `amount_cents` so that
    /// `platform_fee + tax + provider_amount == amount` always holds:
    /// the provider share is the remainder, not a rounded percentage.
    pub fn decompose(&self, amount_cents: i64) -> FeeBreakdown {
        let platform_fee_cents = round_pct(amount_cents, self.platform_fee_pct);
        let tax_cents = round_pct(amount_cents, self.tax_pct);

        FeeBreakdown {
            platform_fee_cents,
            tax_cents,
            gateway_fee_cents: gateway_fee(amount_cents),
            provider_amount_cents: amount_cents - platform_fee_cents - tax_cents,
        }
    }
}

/// `round(amount * pct / 100)` with half-up rounding, non-negative input.
pub fn round_pct(amount_cents: i64, pct: u32) -> i64 {
    debug_assert!(amount_cents >= 0, "round_pct expects a non-negative amount");
    (amount_cents * pct as i64 + 50) / 100
}

/// `round(amount * ratio)` where the ratio is `part / whole`, used for
/// proportional refund splits. `whole` must be positive.
pub fn round_ratio(amount_cents: i64, part: i64, whole: i64) -> i64 {
    debug_assert!(whole > 0, "round_ratio expects a positive denominator");
    (amount_cents * part + whole / 2) / whole
}

fn gateway_fee(amount_cents: i64) -> i64 {
    (amount_cents * 29 + 500) / 1000 + 30
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fifty_dollar_charge_splits_per_default_policy() {
        let b = FeePolicy::default().decompose(5_000);

        assert_eq!(b.platform_fee_cents, 750); // 15%
        assert_eq!(b.tax_cents, 350); // 7%
        assert_eq!(b.provider_amount_cents, 3_900);
    }

    #[test]
    fn rounding_is_half_up() {
        // 3% of 1050 = 31.5 -> 32
        assert_eq!(round_pct(1_050, 3), 32);
        // 3% of 1049 = 31.47 -> 31
        assert_eq!(round_pct(1_049, 3), 31);
    }

    #[test]
    fn ratio_rounding_matches_pct_for_whole_percentages() {
        // 90% expressed as 4500/5000
        assert_eq!(round_ratio(750, 4_500, 5_000), round_pct(750, 90));
    }

    #[test]
    fn gateway_fee_is_informational_and_not_deducted() {
        let b = FeePolicy::default().decompose(5_000);

        assert_eq!(b.gateway_fee_cents, 175); // 2.9% + 30¢
        assert_eq!(
            b.platform_fee_cents + b.tax_cents + b.provider_amount_cents,
            5_000
        );
    }

    proptest! {
        /// Decomposition invariant: the three shares always reassemble
        /// the original amount, for any policy and amount.
        #[test]
        fn decomposition_reassembles_amount(
            amount in 0i64..10_000_000,
            platform_fee_pct in 0u32..=50,
            tax_pct in 0u32..=30,
        ) {
            let policy = FeePolicy { platform_fee_pct, tax_pct };
            let b = policy.decompose(amount);

            prop_assert_eq!(
                b.platform_fee_cents + b.tax_cents + b.provider_amount_cents,
                amount
            );
        }
    }
}
