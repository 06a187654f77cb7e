//! Wallet and protocol balances

use crate::{
	constants::scales,
	core::{
		contracts::{ContractHandles, ContractKind},
		wallet::WalletProvider,
	},
	types::{
		error::Result,
		models::{Asset, BalanceSnapshot},
	},
	utils::from_base_units,
};
use alloy_primitives::Address;
use tracing::instrument;

/// Reads the four balances shown alongside the borrowing flow
#[derive(Debug, Clone, Copy, Default)]
pub struct BalanceFetcher;

impl BalanceFetcher {
	pub fn new() -> Self {
		Self
	}

	/// Native ETH, cETH, cDAI and DAI balances of `account`
	///
	/// # Errors
	/// Returns Error if a handle is missing or any read fails
	#[instrument(skip(self, provider, contracts))]
	pub async fn fetch_balances(
		&self,
		provider: &dyn WalletProvider,
		contracts: &ContractHandles,
		account: Address,
	) -> Result<BalanceSnapshot> {
		let eth = provider.balance(account).await?;
		let ceth = contracts
			.require(ContractKind::CEth)?
			.balance_of(account)
			.await?;
		let cdai = contracts
			.require(ContractKind::CDai)?
			.balance_of(account)
			.await?;
		let dai = contracts
			.require(ContractKind::Dai)?
			.balance_of(account)
			.await?;

		Ok([
			(Asset::Eth, from_base_units(eth, scales::ETH_DECIMALS)),
			(Asset::CEth, from_base_units(ceth, scales::CETH_DECIMALS)),
			(Asset::CDai, from_base_units(cdai, scales::CDAI_DECIMALS)),
			(Asset::Dai, from_base_units(dai, scales::DAI_DECIMALS)),
		]
		.into_iter()
		.collect())
	}
}
