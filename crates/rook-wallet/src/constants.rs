//! Constants used throughout the wallet session
//!
//! Fixed-point scales of the protocol contracts, fallback oracle prices,
//! the sign-in challenge and the storage key the bearer token lives under.

/// Storage key of the persisted bearer token
pub const BEARER_TOKEN_KEY: &str = "bearerToken";

/// Key the bearer token is signed with
///
/// The token is a local login proxy, not a server-verified credential, so the
/// key ships with the application.
pub const BEARER_TOKEN_SECRET: &str = "rook";

/// Sign-in challenge presented to the wallet
pub fn sign_in_message(address: &str) -> String {
	format!("I am signing into rook as {address}")
}

/// Confirmations awaited after `enterMarkets` and `borrow`
pub const REQUIRED_CONFIRMATIONS: u64 = 1;

/// Fixed-point scales of the values read from and written to the protocol
pub mod scales {
	/// Oracle prices carry 6 decimals
	pub const PRICE_DECIMALS: u8 = 6;
	/// Collateral factor and liquidity mantissas carry 18 decimals
	pub const MANTISSA_DECIMALS: u8 = 18;
	/// Native ether
	pub const ETH_DECIMALS: u8 = 18;
	/// cETH balances carry 8 decimals
	pub const CETH_DECIMALS: u8 = 8;
	/// cDAI balances, as displayed by the front-end
	pub const CDAI_DECIMALS: u8 = 18;
	/// DAI
	pub const DAI_DECIMALS: u8 = 18;
}

/// Oracle prices used when the price feed cannot be read
///
/// Raw 6-decimal values observed on mainnet on 2022-04-21.
pub mod fallback_prices {
	pub const DAI: u64 = 1_000_379;
	pub const ETH: u64 = 3_387_324_249;
}

/// Canonical ENS registry, deployed at the same address on every network
pub const ENS_REGISTRY_ADDRESS: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

/// Environment variable names
pub mod env_vars {
	pub const NETWORK_ID: &str = "ROOK_NETWORK_ID";
	pub const RPC_URL: &str = "ROOK_RPC_URL";
	pub const ALCHEMY_KEY: &str = "ROOK_ALCHEMY_KEY";
	pub const CETH_ADDRESS: &str = "ROOK_CETH_ADDRESS";
	pub const CDAI_ADDRESS: &str = "ROOK_CDAI_ADDRESS";
	pub const DAI_ADDRESS: &str = "ROOK_DAI_ADDRESS";
	pub const COMPTROLLER_ADDRESS: &str = "ROOK_COMPTROLLER_ADDRESS";
	pub const PRICE_FEED_ADDRESS: &str = "ROOK_PRICE_FEED_ADDRESS";
	pub const FIXED_COLLATERAL_FACTOR_PERCENTAGE: &str = "ROOK_FIXED_COLLATERAL_FACTOR_PERCENTAGE";
	pub const STORAGE_DIR: &str = "ROOK_STORAGE_DIR";
}
