//! Wallet connection and borrowing session for the rook front-end
//!
//! [`WalletSession`] connects a user's wallet, signs the user in with a
//! personal-sign challenge and drives the supply → eligibility → borrow flow
//! against a Compound-style lending market. Wallets, RPC endpoints and
//! credential storage sit behind traits in [`core`]; [`core::rpc`] provides
//! the alloy-backed implementation.

pub mod constants;
pub mod core;
pub mod services;
pub mod session;
pub mod types;
pub mod utils;

pub use core::{
	init_logging, Config, ContractAddresses, ContractHandle, ContractHandles, ContractKind,
	FileStore, KeyValueStore, LocalWalletConnector, MemoryStore, ProviderEvent, TxReceipt,
	WalletConnector, WalletProvider, WalletSigner,
};
pub use session::{Connection, ContextSnapshot, SessionState, WalletSession};
pub use types::{Asset, BalanceSnapshot, BorrowConditions, Error, Network, PriceSnapshot, Result};
