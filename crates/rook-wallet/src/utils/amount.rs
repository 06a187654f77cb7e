use crate::types::{Error, Result};
use alloy_primitives::U256;

/// Scale a decimal amount up to integer base units
///
/// `to_base_units(1.5, 18)` is `1_500_000_000_000_000_000`. The amount goes
/// through its shortest decimal representation so `0.1` scales to exactly
/// `10^17` instead of the nearest binary value.
pub fn to_base_units(amount: f64, decimals: u8) -> Result<U256> {
	if !amount.is_finite() {
		return Err(Error::InvalidAmount(format!("{amount} is not finite")));
	}
	if amount < 0.0 {
		return Err(Error::InvalidAmount("Amount must be positive".to_string()));
	}

	let repr = format!("{amount}");
	let (whole, fraction) = repr.split_once('.').unwrap_or((repr.as_str(), ""));

	if fraction.len() > decimals as usize {
		return Err(Error::InvalidAmount(format!(
			"{amount} has more than {decimals} decimal places"
		)));
	}

	let digits = format!("{whole}{fraction:0<width$}", width = decimals as usize);
	U256::from_str_radix(&digits, 10)
		.map_err(|e| Error::InvalidAmount(format!("{amount}: {e}")))
}

/// Scale an integer amount down to a decimal value
///
/// Precision beyond what an `f64` holds is dropped, matching how the values
/// are displayed.
pub fn from_base_units(amount: U256, decimals: u8) -> f64 {
	if amount.is_zero() {
		return 0.0;
	}

	let divisor = U256::from(10u64).pow(U256::from(decimals));
	let whole = amount / divisor;
	let fractional = amount % divisor;

	let repr = if decimals == 0 {
		whole.to_string()
	} else {
		format!(
			"{}.{:0>width$}",
			whole,
			fractional,
			width = decimals as usize
		)
	};

	repr.parse().unwrap_or(f64::MAX)
}
