//! Wallet connection seams
//!
//! The session never talks to a wallet or an RPC node directly. It asks a
//! [`WalletConnector`] for a [`WalletProvider`], reads the [`WalletSigner`]
//! off that provider, and listens to the provider's [`ProviderEvent`]s.
//! [`crate::core::rpc`] provides the alloy-backed implementations; tests plug
//! in fakes.

use crate::types::Result;
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rpc_types::TransactionRequest;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Notifications pushed by a connected provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
	/// The wallet switched to another chain
	ChainChanged(u64),
	/// The set of exposed accounts changed; the first entry is the active one
	AccountsChanged(Vec<Address>),
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
	pub hash: B256,
	pub block_number: Option<u64>,
	pub success: bool,
}

/// Account able to sign on behalf of the user
#[async_trait]
pub trait WalletSigner: Send + Sync {
	/// Address of the active account
	async fn address(&self) -> Result<Address>;

	/// EIP-191 personal-sign `message`
	///
	/// # Returns
	/// The 65-byte `r || s || v` signature with `v` in `{27, 28}`
	async fn sign_message(&self, message: &[u8]) -> Result<Bytes>;
}

/// Connected wallet provider
///
/// Everything the session needs from the chain goes through this trait:
/// reads, transaction submission, confirmation waits and reverse name
/// lookups.
#[async_trait]
pub trait WalletProvider: Send + Sync {
	/// Signer for the currently active account
	///
	/// Called again after an [`ProviderEvent::AccountsChanged`] so the
	/// returned handle always reflects the newest account.
	fn signer(&self) -> Arc<dyn WalletSigner>;

	async fn chain_id(&self) -> Result<u64>;

	/// Native balance in wei
	async fn balance(&self, address: Address) -> Result<U256>;

	/// Reverse name (ENS) of `address`, if one is registered
	async fn lookup_address(&self, address: Address) -> Result<Option<String>>;

	/// Read-only contract call
	async fn call(&self, tx: TransactionRequest) -> Result<Bytes>;

	/// Sign and submit a transaction from the active account
	async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256>;

	/// Wait until `hash` has `confirmations` confirmations
	async fn wait_for_confirmations(&self, hash: B256, confirmations: u64) -> Result<TxReceipt>;

	/// Subscribe to chain and account changes
	fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// Entry point that produces a provider, usually after a user prompt
#[async_trait]
pub trait WalletConnector: Send + Sync {
	/// Ask the user to connect a wallet
	///
	/// # Errors
	/// Returns [`crate::types::Error::ConnectionRejected`] when the user
	/// dismisses the prompt; the session treats that as a silent no-op
	async fn connect(&self) -> Result<Arc<dyn WalletProvider>>;

	/// Forget the remembered provider so the next connect prompts again
	async fn clear_cached_provider(&self) -> Result<()>;
}
