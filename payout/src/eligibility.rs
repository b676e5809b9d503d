//! Pure payout-eligibility decision for one provider's batch.

use settlement::model::ProviderProfile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutEligibility {
    Eligible {
        total_cents: i64,
        destination_account: String,
    },
    /// No profile, no connected account, or payouts disabled on the
    /// account. Funds stay Released until the provider finishes
    /// onboarding.
    SkippedNoAccount,
    /// Provider opted out of scheduled payouts; only an on-demand
    /// request moves their funds.
    SkippedManual,
    NothingReleased,
}

/// Decide whether a batch totalling `total_cents` can be paid out.
/// `scheduled` distinguishes the recurring cycle from an on-demand
/// request, which ignores the manual-payouts opt-out.
pub fn assess(
    profile: Option<&ProviderProfile>,
    total_cents: i64,
    scheduled: bool,
) -> PayoutEligibility {
    if total_cents <= 0 {
        return PayoutEligibility::NothingReleased;
    }

    let Some(profile) = profile else {
        return PayoutEligibility::SkippedNoAccount;
    };
    let Some(account) = profile.connected_account_id.as_deref() else {
        return PayoutEligibility::SkippedNoAccount;
    };
    if !profile.payouts_enabled {
        return PayoutEligibility::SkippedNoAccount;
    }

    if scheduled && profile.manual_payouts {
        return PayoutEligibility::SkippedManual;
    }

    PayoutEligibility::Eligible {
        total_cents,
        destination_account: account.to_string(),
    }
}
