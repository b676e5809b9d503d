//! Provider payout batching.
//!
//! Released provider shares are grouped per provider and sent as one
//! transfer each, either by the recurring scheduled cycle or on demand
//! for a single provider. Eligibility is a pure decision over the
//! provider's payout profile and the batch total.

pub mod eligibility;
pub mod engine;
