//! Small conversion helpers
//!
//! Scaling between decimal display amounts and the fixed-point integers the
//! protocol contracts exchange.

pub mod amount;

pub use amount::{from_base_units, to_base_units};
