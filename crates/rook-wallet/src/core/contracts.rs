//! Protocol contract handles and ABI management
//!
//! A [`ContractHandle`] binds a contract address and its JSON ABI to the
//! provider and account of the current session. [`ContractHandles`] holds one
//! handle per [`ContractKind`] and is rebuilt wholesale whenever the signer
//! changes, so a handle never outlives the account it was created for.
//!
//! Return values are decoded as raw 32-byte words; every read used here
//! returns either a single `uint256` or a tuple of static words.

use super::{config::ContractAddresses, wallet::WalletProvider};
use crate::types::error::{Error, Result};
use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rpc_types::TransactionRequest;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Protocol contracts the session interacts with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ContractKind {
	/// cETH collateral market
	CEth,
	/// cDAI borrowable market
	CDai,
	/// DAI underlying token
	Dai,
	/// Market controller
	Comptroller,
	/// Price oracle
	PriceFeed,
}

impl ContractKind {
	pub const ALL: [ContractKind; 5] = [
		ContractKind::CEth,
		ContractKind::CDai,
		ContractKind::Dai,
		ContractKind::Comptroller,
		ContractKind::PriceFeed,
	];

	pub fn name(&self) -> &'static str {
		match self {
			ContractKind::CEth => "cETH",
			ContractKind::CDai => "cDAI",
			ContractKind::Dai => "DAI",
			ContractKind::Comptroller => "Comptroller",
			ContractKind::PriceFeed => "PriceFeed",
		}
	}

	fn address_in(&self, addresses: &ContractAddresses) -> Address {
		match self {
			ContractKind::CEth => addresses.ceth,
			ContractKind::CDai => addresses.cdai,
			ContractKind::Dai => addresses.dai,
			ContractKind::Comptroller => addresses.comptroller,
			ContractKind::PriceFeed => addresses.price_feed,
		}
	}

	fn abi_json(&self) -> &'static str {
		match self {
			ContractKind::CEth => abi::CETH,
			ContractKind::CDai => abi::CDAI,
			ContractKind::Dai => abi::ERC20,
			ContractKind::Comptroller => abi::COMPTROLLER,
			ContractKind::PriceFeed => abi::PRICE_FEED,
		}
	}

	/// Parsed ABI for this contract
	///
	/// # Errors
	/// Returns Error if the embedded ABI does not parse
	pub fn abi(&self) -> Result<JsonAbi> {
		serde_json::from_str(self.abi_json())
			.map_err(|e| Error::InvalidAbi(format!("{} ABI: {}", self.name(), e)))
	}
}

impl fmt::Display for ContractKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Contract bound to the session's provider and account
#[derive(Clone)]
pub struct ContractHandle {
	kind: ContractKind,
	address: Address,
	account: Address,
	abi: Arc<JsonAbi>,
	provider: Arc<dyn WalletProvider>,
}

impl fmt::Debug for ContractHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ContractHandle")
			.field("kind", &self.kind)
			.field("address", &self.address)
			.field("account", &self.account)
			.finish()
	}
}

impl ContractHandle {
	pub fn new(
		kind: ContractKind,
		address: Address,
		account: Address,
		provider: Arc<dyn WalletProvider>,
	) -> Result<Self> {
		Ok(Self {
			kind,
			address,
			account,
			abi: Arc::new(kind.abi()?),
			provider,
		})
	}

	pub fn kind(&self) -> ContractKind {
		self.kind
	}

	pub fn address(&self) -> Address {
		self.address
	}

	/// Account transactions are sent from
	pub fn account(&self) -> Address {
		self.account
	}

	/// Encode a call to `method` with `args`
	///
	/// # Errors
	/// Returns Error if the method is not part of this contract's ABI or the
	/// arguments do not match its inputs
	pub fn encode(&self, method: &str, args: &[DynSolValue]) -> Result<Bytes> {
		let functions = self.abi.function(method).ok_or_else(|| {
			Error::InvalidAbi(format!("Function {} not found on {}", method, self.kind))
		})?;

		let function = functions.first().ok_or_else(|| {
			Error::InvalidAbi(format!("No implementation for function {}", method))
		})?;

		let data = function.abi_encode_input(args).map_err(|e| {
			Error::ContractCallFailed(format!("Failed to encode {}: {}", method, e))
		})?;

		Ok(data.into())
	}

	/// Execute a read-only call and return the raw result
	pub async fn read(&self, method: &str, args: &[DynSolValue]) -> Result<Bytes> {
		let data = self.encode(method, args)?;
		let call = TransactionRequest::default()
			.from(self.account)
			.to(self.address)
			.input(data.into());

		self.provider.call(call).await.map_err(|e| {
			Error::ContractCallFailed(format!("Call to {}.{} failed: {}", self.kind, method, e))
		})
	}

	/// Submit a state-changing call, optionally carrying ether
	pub async fn send(
		&self,
		method: &str,
		args: &[DynSolValue],
		value: Option<U256>,
	) -> Result<B256> {
		let data = self.encode(method, args)?;
		let mut tx = TransactionRequest::default()
			.from(self.account)
			.to(self.address)
			.input(data.into());
		if let Some(value) = value {
			tx = tx.value(value);
		}

		let hash = self.provider.send_transaction(tx).await?;
		debug!(contract = %self.kind, method, tx_hash = %hash, "Transaction submitted");
		Ok(hash)
	}

	/// `mint()` payable, supplies `value` wei as collateral
	#[instrument(skip(self), fields(contract = %self.kind))]
	pub async fn mint(&self, value: U256) -> Result<B256> {
		self.send("mint", &[], Some(value)).await
	}

	/// `enterMarkets(address[])`
	#[instrument(skip(self), fields(contract = %self.kind))]
	pub async fn enter_markets(&self, markets: &[Address]) -> Result<B256> {
		let markets = markets.iter().copied().map(DynSolValue::Address).collect();
		self.send("enterMarkets", &[DynSolValue::Array(markets)], None)
			.await
	}

	/// `borrow(uint256)`
	#[instrument(skip(self), fields(contract = %self.kind))]
	pub async fn borrow(&self, amount: U256) -> Result<B256> {
		self.send("borrow", &[DynSolValue::Uint(amount, 256)], None)
			.await
	}

	/// Collateral factor mantissa from `markets(address)`
	pub async fn markets(&self, market: Address) -> Result<U256> {
		let result = self
			.read("markets", &[DynSolValue::Address(market)])
			.await?;
		word(&result, 1, "markets")
	}

	/// Liquidity from `getAccountLiquidity(address)`
	pub async fn get_account_liquidity(&self, account: Address) -> Result<U256> {
		let result = self
			.read("getAccountLiquidity", &[DynSolValue::Address(account)])
			.await?;
		word(&result, 1, "getAccountLiquidity")
	}

	/// Oracle price of `symbol`
	pub async fn price(&self, symbol: &str) -> Result<U256> {
		let result = self
			.read("price", &[DynSolValue::String(symbol.to_string())])
			.await?;
		word(&result, 0, "price")
	}

	/// `balanceOf(address)`
	pub async fn balance_of(&self, owner: Address) -> Result<U256> {
		let result = self
			.read("balanceOf", &[DynSolValue::Address(owner)])
			.await?;
		word(&result, 0, "balanceOf")
	}
}

/// Extract the `index`-th 32-byte word of an ABI-encoded return value
fn word(result: &[u8], index: usize, method: &str) -> Result<U256> {
	let start = index * 32;
	let end = start + 32;
	if result.len() < end {
		return Err(Error::ContractCallFailed(format!(
			"Invalid {} response length: {}",
			method,
			result.len()
		)));
	}
	Ok(U256::from_be_slice(&result[start..end]))
}

/// One handle per protocol contract, all bound to the same account
#[derive(Debug, Clone, Default)]
pub struct ContractHandles {
	handles: BTreeMap<ContractKind, ContractHandle>,
}

impl ContractHandles {
	/// Build every handle for `account`
	///
	/// # Errors
	/// Returns Error if an embedded ABI fails to parse
	pub fn build(
		addresses: &ContractAddresses,
		account: Address,
		provider: Arc<dyn WalletProvider>,
	) -> Result<Self> {
		let handles = ContractKind::ALL
			.into_iter()
			.map(|kind| {
				let handle = ContractHandle::new(
					kind,
					kind.address_in(addresses),
					account,
					provider.clone(),
				)?;
				Ok((kind, handle))
			})
			.collect::<Result<BTreeMap<_, _>>>()?;

		Ok(Self { handles })
	}

	pub fn get(&self, kind: ContractKind) -> Option<&ContractHandle> {
		self.handles.get(&kind)
	}

	/// Handle for `kind`, or [`Error::ContractMissing`]
	pub fn require(&self, kind: ContractKind) -> Result<&ContractHandle> {
		self.get(kind)
			.ok_or_else(|| Error::ContractMissing(kind.name().to_string()))
	}

	pub fn len(&self) -> usize {
		self.handles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.handles.is_empty()
	}

	pub fn kinds(&self) -> impl Iterator<Item = ContractKind> + '_ {
		self.handles.keys().copied()
	}

	/// Contract name → address, used for logging and snapshots
	pub fn addresses(&self) -> BTreeMap<String, Address> {
		self.handles
			.iter()
			.map(|(kind, handle)| (kind.name().to_string(), handle.address))
			.collect()
	}
}

mod abi {
	pub(super) const CETH: &str = r#"[
		{
			"type": "function",
			"name": "mint",
			"inputs": [],
			"outputs": [],
			"stateMutability": "payable"
		},
		{
			"type": "function",
			"name": "balanceOf",
			"inputs": [{"name": "owner", "type": "address"}],
			"outputs": [{"name": "", "type": "uint256"}],
			"stateMutability": "view"
		}
	]"#;

	pub(super) const CDAI: &str = r#"[
		{
			"type": "function",
			"name": "borrow",
			"inputs": [{"name": "borrowAmount", "type": "uint256"}],
			"outputs": [{"name": "", "type": "uint256"}],
			"stateMutability": "nonpayable"
		},
		{
			"type": "function",
			"name": "balanceOf",
			"inputs": [{"name": "owner", "type": "address"}],
			"outputs": [{"name": "", "type": "uint256"}],
			"stateMutability": "view"
		}
	]"#;

	pub(super) const ERC20: &str = r#"[
		{
			"type": "function",
			"name": "balanceOf",
			"inputs": [{"name": "owner", "type": "address"}],
			"outputs": [{"name": "", "type": "uint256"}],
			"stateMutability": "view"
		}
	]"#;

	pub(super) const COMPTROLLER: &str = r#"[
		{
			"type": "function",
			"name": "enterMarkets",
			"inputs": [{"name": "cTokens", "type": "address[]"}],
			"outputs": [{"name": "", "type": "uint256[]"}],
			"stateMutability": "nonpayable"
		},
		{
			"type": "function",
			"name": "markets",
			"inputs": [{"name": "", "type": "address"}],
			"outputs": [
				{"name": "isListed", "type": "bool"},
				{"name": "collateralFactorMantissa", "type": "uint256"},
				{"name": "isComped", "type": "bool"}
			],
			"stateMutability": "view"
		},
		{
			"type": "function",
			"name": "getAccountLiquidity",
			"inputs": [{"name": "account", "type": "address"}],
			"outputs": [
				{"name": "", "type": "uint256"},
				{"name": "", "type": "uint256"},
				{"name": "", "type": "uint256"}
			],
			"stateMutability": "view"
		}
	]"#;

	pub(super) const PRICE_FEED: &str = r#"[
		{
			"type": "function",
			"name": "price",
			"inputs": [{"name": "symbol", "type": "string"}],
			"outputs": [{"name": "", "type": "uint256"}],
			"stateMutability": "view"
		}
	]"#;
}
