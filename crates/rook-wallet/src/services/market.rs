//! Oracle prices and borrowing capacity
//!
//! Prices come from the protocol's price feed, scaled by 1e6. When the feed
//! cannot be read the fetcher substitutes a fixed snapshot and logs the
//! failure; callers never see a price error.
//!
//! Collateral factors are read once and cached until [`MarketDataFetcher::reset`].
//! Account liquidity is re-read on every request.

use crate::{
	constants::{fallback_prices, scales},
	core::contracts::{ContractHandles, ContractKind},
	types::{
		error::{Error, Result},
		models::{Asset, BorrowConditions, PriceSnapshot},
	},
	utils::from_base_units,
};
use alloy_primitives::{Address, U256};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, error, instrument};

/// Snapshot used when the price feed is unavailable
pub fn fallback_price_snapshot() -> PriceSnapshot {
	[
		(
			Asset::Dai,
			from_base_units(U256::from(fallback_prices::DAI), scales::PRICE_DECIMALS),
		),
		(
			Asset::Eth,
			from_base_units(U256::from(fallback_prices::ETH), scales::PRICE_DECIMALS),
		),
	]
	.into_iter()
	.collect()
}

/// Convert an 18-decimal mantissa into a percentage
fn mantissa_to_percentage(mantissa: U256) -> f64 {
	from_base_units(mantissa, scales::MANTISSA_DECIMALS) * 100.0
}

/// Reads prices and borrow conditions from the protocol
pub struct MarketDataFetcher {
	fixed_collateral_factor_percentage: f64,
	collateral_factors: RwLock<BTreeMap<Asset, f64>>,
}

impl MarketDataFetcher {
	pub fn new(fixed_collateral_factor_percentage: f64) -> Self {
		Self {
			fixed_collateral_factor_percentage,
			collateral_factors: RwLock::new(BTreeMap::new()),
		}
	}

	/// Drop cached collateral factors
	pub fn reset(&self) {
		self.collateral_factors
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.clear();
		self.collateral_factors.clear_poison();
	}

	/// Read DAI and ETH prices, falling back to fixed values on any failure
	#[instrument(skip_all)]
	pub async fn fetch_prices(&self, contracts: &ContractHandles) -> PriceSnapshot {
		match self.read_prices(contracts).await {
			Ok(prices) => prices,
			Err(e) => {
				error!(error = %e, "Price feed unavailable, using fallback prices");
				fallback_price_snapshot()
			},
		}
	}

	async fn read_prices(&self, contracts: &ContractHandles) -> Result<PriceSnapshot> {
		let feed = contracts.require(ContractKind::PriceFeed)?;

		let dai = feed.price(Asset::Dai.symbol()).await?;
		let eth = feed.price(Asset::Eth.symbol()).await?;

		Ok([
			(Asset::Dai, from_base_units(dai, scales::PRICE_DECIMALS)),
			(Asset::Eth, from_base_units(eth, scales::PRICE_DECIMALS)),
		]
		.into_iter()
		.collect())
	}

	/// Read collateral factors (cached) and liquidity, then derive the
	/// maximum DAI amount `account` may borrow
	///
	/// # Errors
	/// Returns Error if the comptroller handle is missing or a read fails
	#[instrument(skip(self, contracts, prices))]
	pub async fn fetch_borrow_conditions(
		&self,
		contracts: &ContractHandles,
		account: Address,
		prices: &PriceSnapshot,
	) -> Result<BorrowConditions> {
		let comptroller = contracts.require(ContractKind::Comptroller)?;

		let collateral_factors = match self.cached_factors()? {
			Some(factors) => factors,
			None => {
				let ceth = contracts.require(ContractKind::CEth)?.address();
				let cdai = contracts.require(ContractKind::CDai)?.address();

				let factors: BTreeMap<Asset, f64> = [
					(Asset::CEth, mantissa_to_percentage(comptroller.markets(ceth).await?)),
					(Asset::CDai, mantissa_to_percentage(comptroller.markets(cdai).await?)),
				]
				.into_iter()
				.collect();

				debug!(?factors, "Collateral factors fetched");
				self.cache_factors(&factors)?;
				factors
			},
		};

		let liquidity = comptroller.get_account_liquidity(account).await?;
		let liquidity_usd = from_base_units(liquidity, scales::MANTISSA_DECIMALS);

		let max_borrowable_dai = prices
			.get(Asset::Dai)
			.filter(|price| *price > 0.0)
			.map(|price| liquidity_usd / price * (self.fixed_collateral_factor_percentage / 100.0));

		let conditions = BorrowConditions {
			collateral_factors,
			liquidity_usd: Some(liquidity_usd),
			max_borrowable_dai,
			fixed_collateral_factor_percentage: Some(self.fixed_collateral_factor_percentage),
		};

		if let Some(divergence) = conditions.configured_factor_divergence() {
			if divergence != 0.0 {
				debug!(
					fixed = self.fixed_collateral_factor_percentage,
					divergence,
					"Configured collateral factor differs from the cETH market factor"
				);
			}
		}

		Ok(conditions)
	}

	fn cached_factors(&self) -> Result<Option<BTreeMap<Asset, f64>>> {
		let factors = self
			.collateral_factors
			.read()
			.map_err(|e| Error::Other(anyhow::anyhow!("Failed to acquire read lock: {e}")))?;
		Ok((!factors.is_empty()).then(|| factors.clone()))
	}

	fn cache_factors(&self, factors: &BTreeMap<Asset, f64>) -> Result<()> {
		let mut cached = self
			.collateral_factors
			.write()
			.map_err(|e| Error::Other(anyhow::anyhow!("Failed to acquire write lock: {e}")))?;
		*cached = factors.clone();
		Ok(())
	}
}
