//! Adaptive timing model for DPA exchanges.
//!
//! A request to a remote node travels through the mesh in timeslots whose
//! length depends on the RF mode, the transceiver revision and the amount of
//! data carried. This crate turns the routing parameters reported in a
//! confirmation, together with facts learned from earlier traffic, into the
//! time the host should wait at each stage of an exchange.

mod facts;
mod mode;
mod model;

pub use facts::*;
pub use mode::*;
pub use model::*;
