//! Segment-level availability and the reservation state machine.
//!
//! A provider declares a [`model::Slot`] (a coarse availability window);
//! the registry carves it into atomic [`model::Segment`]s sized to the
//! service duration. The coordinator owns every segment transition:
//! `Available -> Reserved -> Booked`, with `Reserved -> Available` when a
//! payment fails or times out. Segment state is the single source of
//! truth; slot-level flags are always derived from it on read.

pub mod coordinator;
pub mod model;
pub mod registry;
pub mod store;
