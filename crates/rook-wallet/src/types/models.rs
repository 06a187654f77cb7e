//! Snapshot types published by the session
//!
//! Prices, balances and borrow conditions are owned and written by the
//! session only. Consumers receive clones and never mutate them in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Assets tracked by the borrowing flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
	/// Native ether held in the wallet
	Eth,
	/// Underlying stablecoin that gets borrowed
	Dai,
	/// Protocol receipt token for supplied ether
	CEth,
	/// Protocol market token for DAI
	CDai,
}

impl Asset {
	pub fn symbol(&self) -> &'static str {
		match self {
			Asset::Eth => "ETH",
			Asset::Dai => "DAI",
			Asset::CEth => "CETH",
			Asset::CDai => "CDAI",
		}
	}
}

impl fmt::Display for Asset {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.symbol())
	}
}

/// USD prices keyed by asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot(BTreeMap<Asset, f64>);

impl PriceSnapshot {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, asset: Asset, price: f64) {
		self.0.insert(asset, price);
	}

	pub fn get(&self, asset: Asset) -> Option<f64> {
		self.0.get(&asset).copied()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Asset, &f64)> {
		self.0.iter()
	}
}

impl FromIterator<(Asset, f64)> for PriceSnapshot {
	fn from_iter<I: IntoIterator<Item = (Asset, f64)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// Wallet and protocol balances keyed by asset
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceSnapshot(BTreeMap<Asset, f64>);

impl BalanceSnapshot {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, asset: Asset, balance: f64) {
		self.0.insert(asset, balance);
	}

	pub fn get(&self, asset: Asset) -> Option<f64> {
		self.0.get(&asset).copied()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&Asset, &f64)> {
		self.0.iter()
	}
}

impl FromIterator<(Asset, f64)> for BalanceSnapshot {
	fn from_iter<I: IntoIterator<Item = (Asset, f64)>>(iter: I) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// Borrowing capacity reported by the lending protocol
///
/// `collateral_factors` are read once per session and cached. Liquidity and
/// the derived maximum are refreshed on every request. The maximum is derived
/// from the configured fixed collateral factor, not from the fetched factors;
/// [`BorrowConditions::configured_factor_divergence`] exposes the gap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BorrowConditions {
	/// Collateral factor per market, in percent
	pub collateral_factors: BTreeMap<Asset, f64>,
	/// Account liquidity in USD
	pub liquidity_usd: Option<f64>,
	/// Largest DAI amount the account may borrow
	pub max_borrowable_dai: Option<f64>,
	/// Fixed collateral factor percentage the maximum was computed with
	pub fixed_collateral_factor_percentage: Option<f64>,
}

impl BorrowConditions {
	/// Difference between the configured factor and the fetched cETH factor
	///
	/// Positive when the configured percentage is more permissive than what
	/// the protocol reports for the collateral market.
	pub fn configured_factor_divergence(&self) -> Option<f64> {
		let fixed = self.fixed_collateral_factor_percentage?;
		let fetched = self.collateral_factors.get(&Asset::CEth)?;
		Some(fixed - fetched)
	}
}
