//! Type definitions shared across the wallet session
//!
//! Error types, the target network descriptor and the snapshot models the
//! session publishes to its consumers.

pub mod error;
pub mod models;
pub mod network;

pub use error::{Error, Result};
pub use models::{Asset, BalanceSnapshot, BorrowConditions, PriceSnapshot};
pub use network::Network;
