//! Target network descriptor and RPC endpoint helpers
//!
//! The session targets exactly one EVM network, fixed at process start. This
//! module maps numeric chain ids to the network names wallets and RPC vendors
//! use, and builds the Alchemy endpoint URLs for that name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain id of the network the front-end was built against (Rinkeby)
pub const DEFAULT_NETWORK_ID: u64 = 4;

/// Resolved description of the target network
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Network {
	pub id: u64,
	pub hex_id: String,
	pub name: String,
}

impl Network {
	/// Build the descriptor for a numeric chain id
	///
	/// `homestead` is reported as `mainnet` so it can be used as an RPC
	/// subdomain.
	pub fn from_id(id: u64) -> Self {
		let name = match network_name(id) {
			"homestead" => "mainnet",
			other => other,
		};

		Self {
			id,
			hex_id: format!("0x{id:x}"),
			name: name.to_string(),
		}
	}

	/// Alchemy HTTP endpoint for this network
	pub fn http_rpc_url(&self, api_key: &str) -> String {
		format!("https://eth-{}.alchemyapi.io/v2/{}", self.name, api_key)
	}

	/// Alchemy websocket endpoint for this network
	pub fn ws_rpc_url(&self, api_key: &str) -> String {
		format!("ws://eth-{}.alchemyapi.io/v2/{}", self.name, api_key)
	}

	/// Message shown when the wallet sits on a different chain
	pub fn switch_prompt(&self) -> String {
		format!("Please switch to {}", network_name(self.id))
	}

	/// Check a wallet-reported chain id against this network
	///
	/// # Returns
	/// `None` when the ids match, otherwise the human-readable prompt
	pub fn mismatch(&self, chain_id: u64) -> Option<String> {
		(chain_id != self.id).then(|| self.switch_prompt())
	}
}

impl Default for Network {
	fn default() -> Self {
		Self::from_id(DEFAULT_NETWORK_ID)
	}
}

impl fmt::Display for Network {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.id, self.name)
	}
}

/// Canonical network name as reported by ethers-style providers
pub fn network_name(id: u64) -> &'static str {
	match id {
		1 => "homestead",
		3 => "ropsten",
		4 => "rinkeby",
		5 => "goerli",
		10 => "optimism",
		42 => "kovan",
		137 => "matic",
		42161 => "arbitrum",
		11155111 => "sepolia",
		_ => "unknown",
	}
}
