//! Configuration for the wallet session
//!
//! Everything here is fixed at process start: the target network, the RPC
//! endpoint, the five protocol contract addresses and the collateral factor
//! used for the maximum-borrow estimate. Configuration comes either from a
//! TOML file (with `${VAR}` / `${VAR:-default}` substitution) or directly from
//! `ROOK_*` environment variables. A `.env` file in the working directory is
//! loaded first in both cases.

use crate::{
	constants::env_vars,
	types::{
		error::{Error, Result},
		network::{Network, DEFAULT_NETWORK_ID},
	},
};
use alloy_primitives::Address;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Addresses of the protocol contracts the session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
	/// cETH market, receives ether collateral
	pub ceth: Address,
	/// cDAI market, lends DAI
	pub cdai: Address,
	/// DAI token
	pub dai: Address,
	/// Comptroller, manages market membership and liquidity
	pub comptroller: Address,
	/// Price feed used by the comptroller
	pub price_feed: Address,
}

/// Static session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
	/// Chain id the wallet is expected to be on
	#[serde(default = "default_network_id")]
	pub network_id: u64,
	/// Explicit RPC endpoint; takes precedence over `alchemy_key`
	#[serde(default)]
	pub rpc_url: Option<String>,
	/// Alchemy API key used to derive the RPC endpoint
	#[serde(default)]
	pub alchemy_key: Option<String>,
	/// Protocol contract addresses
	pub contracts: ContractAddresses,
	/// Collateral factor (percent) applied in the maximum-borrow estimate
	pub fixed_collateral_factor_percentage: f64,
	/// Directory for the persisted bearer token; in-memory when unset
	#[serde(default)]
	pub storage_dir: Option<PathBuf>,
}

fn default_network_id() -> u64 {
	DEFAULT_NETWORK_ID
}

impl Config {
	/// Load configuration from a TOML file
	///
	/// # Errors
	/// Returns Error if the file is missing, a referenced environment variable
	/// is unset without a default, or the content fails validation
	pub async fn from_file(path: &Path) -> Result<Self> {
		let _ = dotenvy::dotenv();

		if !path.exists() {
			return Err(Error::ConfigNotFound(path.to_path_buf()));
		}

		let content = tokio::fs::read_to_string(path).await?;
		content.parse()
	}

	/// Build configuration from `ROOK_*` environment variables
	///
	/// # Errors
	/// Returns Error if a required variable is missing or malformed
	pub fn from_env() -> Result<Self> {
		let _ = dotenvy::dotenv();

		let network_id = match std::env::var(env_vars::NETWORK_ID) {
			Ok(value) => value.parse().map_err(|_| {
				Error::InvalidConfig(format!("{} must be a chain id", env_vars::NETWORK_ID))
			})?,
			Err(_) => DEFAULT_NETWORK_ID,
		};

		let fixed_collateral_factor_percentage = required_env(
			env_vars::FIXED_COLLATERAL_FACTOR_PERCENTAGE,
		)?
		.parse()
		.map_err(|_| {
			Error::InvalidConfig(format!(
				"{} must be a number",
				env_vars::FIXED_COLLATERAL_FACTOR_PERCENTAGE
			))
		})?;

		let config = Self {
			network_id,
			rpc_url: std::env::var(env_vars::RPC_URL).ok(),
			alchemy_key: std::env::var(env_vars::ALCHEMY_KEY).ok(),
			contracts: ContractAddresses {
				ceth: address_env(env_vars::CETH_ADDRESS)?,
				cdai: address_env(env_vars::CDAI_ADDRESS)?,
				dai: address_env(env_vars::DAI_ADDRESS)?,
				comptroller: address_env(env_vars::COMPTROLLER_ADDRESS)?,
				price_feed: address_env(env_vars::PRICE_FEED_ADDRESS)?,
			},
			fixed_collateral_factor_percentage,
			storage_dir: std::env::var(env_vars::STORAGE_DIR).ok().map(PathBuf::from),
		};

		config.validate()?;
		Ok(config)
	}

	/// Descriptor of the target network
	pub fn network(&self) -> Network {
		Network::from_id(self.network_id)
	}

	/// RPC endpoint for the target network, if one can be determined
	pub fn rpc_url(&self) -> Option<String> {
		self.rpc_url.clone().or_else(|| {
			self.alchemy_key
				.as_deref()
				.map(|key| self.network().http_rpc_url(key))
		})
	}

	fn validate(&self) -> Result<()> {
		let pct = self.fixed_collateral_factor_percentage;
		if !(pct > 0.0 && pct <= 100.0) {
			return Err(Error::InvalidConfig(format!(
				"fixed_collateral_factor_percentage must be in (0, 100], got {pct}"
			)));
		}

		if self.network_id == 0 {
			return Err(Error::InvalidConfig("network_id cannot be 0".to_string()));
		}

		Ok(())
	}
}

impl FromStr for Config {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

fn required_env(name: &str) -> Result<String> {
	std::env::var(name)
		.map_err(|_| Error::InvalidConfig(format!("Environment variable '{name}' not found")))
}

const MAX_CONFIG_SIZE: usize = 1024 * 1024;

fn address_env(name: &str) -> Result<Address> {
	let value = required_env(name)?;
	value
		.trim()
		.parse()
		.map_err(|_| Error::InvalidAddress(format!("{name}={value}")))
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input is limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String> {
	if input.len() > MAX_CONFIG_SIZE {
		return Err(Error::InvalidConfig(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_CONFIG_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| Error::InvalidConfig(format!("Regex error: {e}")))?;

	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(Error::InvalidConfig(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	let mut result = input.to_string();
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}
