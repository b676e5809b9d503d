//! Payment-intent lifecycle, fee/tax decomposition, refund policy and
//! the provider wallet.
//!
//! The ledger owns every PaymentRecord transition
//! (`Pending -> Completed -> {Refunded | PartiallyRefunded}`,
//! `Pending -> Failed`) and is the only writer of wallet entries on the
//! booking path. Webhook-driven transitions are idempotent: a redelivered
//! or out-of-order gateway event never re-credits a wallet or re-books a
//! segment.

pub mod events;
pub mod fees;
pub mod ledger;
pub mod model;
pub mod refund;
pub mod store;
pub mod wallet;
