//! Session services
//!
//! Sign-in credential handling, market data reads and balance reads. Each
//! service is stateless with respect to the connection and receives the
//! provider, handles and account it should work with.

pub mod auth;
pub mod balances;
pub mod market;

pub use auth::{recover_personal_sign, AuthManager, SignInClaims};
pub use balances::BalanceFetcher;
pub use market::{fallback_price_snapshot, MarketDataFetcher};
