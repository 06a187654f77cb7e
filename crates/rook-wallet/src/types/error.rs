//! Error types and result handling for the wallet session
//!
//! Every fallible operation in the crate returns [`Result`]. Variants are
//! grouped by the subsystem that raises them so callers can tell a rejected
//! wallet prompt from a reverted transaction or a call made from the wrong
//! session state.

use alloy_primitives::B256;
use std::path::PathBuf;

/// Convenience Result type alias using the local Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the wallet session and its collaborators
#[derive(thiserror::Error, Debug)]
pub enum Error {
	// Wallet / connection errors
	#[error("Wallet connection rejected: {0}")]
	ConnectionRejected(String),

	#[error("RPC request failed: {0}")]
	Rpc(String),

	#[error("Transaction {0:?} was not confirmed: {1}")]
	TxNotConfirmed(B256, String),

	#[error("Transaction {0:?} reverted")]
	TxReverted(B256),

	// Session state errors
	#[error("{operation} is not allowed while the session is {state}")]
	InvalidState {
		operation: &'static str,
		state: &'static str,
	},

	#[error("Contract handle missing: {0}")]
	ContractMissing(String),

	// Contract errors
	#[error("Invalid ABI: {0}")]
	InvalidAbi(String),

	#[error("Contract call failed: {0}")]
	ContractCallFailed(String),

	// Signing / credential errors
	#[error("Signing failed: {0}")]
	SigningFailed(String),

	#[error("Token error: {0}")]
	Token(String),

	// Storage errors
	#[error("Storage error: {0}")]
	StorageError(String),

	#[error("Failed to create directory: {0}")]
	DirectoryCreationFailed(PathBuf),

	// Config errors
	#[error("Configuration file not found: {0}")]
	ConfigNotFound(PathBuf),

	#[error("Invalid configuration: {0}")]
	InvalidConfig(String),

	// Validation errors
	#[error("Invalid address: {0}")]
	InvalidAddress(String),

	#[error("Invalid amount: {0}")]
	InvalidAmount(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error(transparent)]
	Other(#[from] anyhow::Error),
}

impl From<String> for Error {
	fn from(msg: String) -> Self {
		Error::Other(anyhow::anyhow!("{msg}"))
	}
}

impl From<&'static str> for Error {
	fn from(msg: &'static str) -> Self {
		Error::Other(anyhow::anyhow!("{msg}"))
	}
}

impl From<jsonwebtoken::errors::Error> for Error {
	fn from(err: jsonwebtoken::errors::Error) -> Self {
		Error::Token(err.to_string())
	}
}
