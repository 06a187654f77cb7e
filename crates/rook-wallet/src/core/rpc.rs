//! Alloy-backed wallet implementation
//!
//! [`LocalWalletConnector`] stands in for a browser wallet: it holds a local
//! private key and an RPC endpoint and hands out an [`RpcWallet`] on connect,
//! remembering it until [`WalletConnector::clear_cached_provider`] is called.
//!
//! HTTP endpoints do not push network changes, so [`RpcWallet`] polls the
//! chain id in the background and emits [`ProviderEvent::ChainChanged`] when it
//! moves.

use super::wallet::{ProviderEvent, TxReceipt, WalletConnector, WalletProvider, WalletSigner};
use crate::{
	constants::ENS_REGISTRY_ADDRESS,
	types::error::{Error, Result},
};
use alloy_network::{EthereumWallet, ReceiptResponse};
use alloy_primitives::{hex, keccak256, Address, Bytes, B256, U256};
use alloy_provider::{DynProvider, PendingTransactionConfig, Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default interval between chain id polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Convert a recoverable signature into the 65-byte `r || s || v` form
pub fn signature_bytes(signature: &alloy_primitives::Signature) -> Bytes {
	let mut bytes = Vec::with_capacity(65);
	bytes.extend_from_slice(&signature.r().to_be_bytes::<32>());
	bytes.extend_from_slice(&signature.s().to_be_bytes::<32>());
	bytes.push(if signature.v() { 28 } else { 27 });
	bytes.into()
}

/// Signer backed by a local private key
#[derive(Debug, Clone)]
pub struct LocalSigner {
	signer: PrivateKeySigner,
}

impl LocalSigner {
	pub fn new(signer: PrivateKeySigner) -> Self {
		Self { signer }
	}

	/// Parse a hex private key, with or without `0x`
	pub fn from_private_key(key: &str) -> Result<Self> {
		let signer = key
			.trim_start_matches("0x")
			.parse::<PrivateKeySigner>()
			.map_err(|e| Error::SigningFailed(format!("Invalid private key: {}", e)))?;
		Ok(Self::new(signer))
	}

	pub fn inner(&self) -> &PrivateKeySigner {
		&self.signer
	}
}

#[async_trait]
impl WalletSigner for LocalSigner {
	async fn address(&self) -> Result<Address> {
		Ok(self.signer.address())
	}

	async fn sign_message(&self, message: &[u8]) -> Result<Bytes> {
		let signature = self
			.signer
			.sign_message(message)
			.await
			.map_err(|e| Error::SigningFailed(format!("Failed to sign message: {}", e)))?;
		Ok(signature_bytes(&signature))
	}
}

/// Provider connected to an HTTP RPC endpoint with a local signer
pub struct RpcWallet {
	provider: DynProvider,
	signer: Arc<LocalSigner>,
	events: broadcast::Sender<ProviderEvent>,
	watcher: CancellationToken,
}

impl std::fmt::Debug for RpcWallet {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RpcWallet")
			.field("signer", &self.signer.inner().address())
			.field("provider", &"<DynProvider>")
			.finish()
	}
}

impl RpcWallet {
	/// Connect to `rpc_url` and start the network watcher
	///
	/// # Errors
	/// Returns Error if the URL is invalid or the endpoint does not answer a
	/// chain id request
	pub async fn connect(
		rpc_url: &str,
		signer: PrivateKeySigner,
		poll_interval: Duration,
	) -> Result<Self> {
		let url = rpc_url
			.parse()
			.map_err(|e| Error::Rpc(format!("Invalid RPC URL: {}", e)))?;

		let wallet = EthereumWallet::from(signer.clone());
		let provider = ProviderBuilder::new()
			.wallet(wallet)
			.connect_http(url)
			.erased();

		let chain_id = provider
			.get_chain_id()
			.await
			.map_err(|e| Error::Rpc(format!("Failed to connect to {}: {}", rpc_url, e)))?;

		let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
		let watcher = CancellationToken::new();

		spawn_network_watcher(
			provider.clone(),
			chain_id,
			events.clone(),
			poll_interval,
			watcher.clone(),
		);

		info!(chain_id, account = %signer.address(), "Wallet provider connected");

		Ok(Self {
			provider,
			signer: Arc::new(LocalSigner::new(signer)),
			events,
			watcher,
		})
	}

	async fn eth_call(&self, to: Address, data: Vec<u8>) -> Result<Bytes> {
		self.provider
			.call(TransactionRequest::default().to(to).input(data.into()))
			.await
			.map_err(|e| Error::Rpc(format!("Failed to execute eth_call: {}", e)))
	}
}

impl Drop for RpcWallet {
	fn drop(&mut self) {
		self.watcher.cancel();
	}
}

fn spawn_network_watcher(
	provider: DynProvider,
	initial_chain_id: u64,
	events: broadcast::Sender<ProviderEvent>,
	poll_interval: Duration,
	token: CancellationToken,
) {
	tokio::spawn(async move {
		let mut current = initial_chain_id;
		let mut ticker = tokio::time::interval(poll_interval);
		ticker.tick().await;

		loop {
			tokio::select! {
				_ = token.cancelled() => break,
				_ = ticker.tick() => {
					match provider.get_chain_id().await {
						Ok(chain_id) if chain_id != current => {
							info!(from = current, to = chain_id, "Network changed");
							current = chain_id;
							// No receivers is fine, nobody is listening yet
							let _ = events.send(ProviderEvent::ChainChanged(chain_id));
						},
						Ok(_) => {},
						Err(e) => warn!(error = %e, "Failed to poll chain id"),
					}
				},
			}
		}

		debug!("Network watcher stopped");
	});
}

/// ENS namehash of a dotted name
fn namehash(name: &str) -> B256 {
	let mut node = B256::ZERO;
	for label in name.rsplit('.').filter(|label| !label.is_empty()) {
		let mut buf = [0u8; 64];
		buf[..32].copy_from_slice(node.as_slice());
		buf[32..].copy_from_slice(keccak256(label.as_bytes()).as_slice());
		node = keccak256(buf);
	}
	node
}

/// Reverse-resolution node of `address`, `<hex>.addr.reverse`
fn reverse_node(address: Address) -> B256 {
	namehash(&format!("{}.addr.reverse", hex::encode(address.as_slice())))
}

fn selector(signature: &str) -> [u8; 4] {
	let hash = keccak256(signature.as_bytes());
	[hash[0], hash[1], hash[2], hash[3]]
}

fn node_call(signature: &str, node: B256) -> Vec<u8> {
	let mut data = Vec::with_capacity(36);
	data.extend_from_slice(&selector(signature));
	data.extend_from_slice(node.as_slice());
	data
}

/// Decode a single ABI-encoded `string` return value
fn decode_string(result: &[u8]) -> Result<String> {
	if result.len() < 64 {
		return Err(Error::ContractCallFailed(
			"Invalid string response length".to_string(),
		));
	}

	let length = U256::from_be_slice(&result[32..64]).saturating_to::<usize>();
	if result.len() < 64 + length {
		return Err(Error::ContractCallFailed(
			"String response too short".to_string(),
		));
	}

	String::from_utf8(result[64..64 + length].to_vec())
		.map_err(|e| Error::ContractCallFailed(format!("Invalid UTF-8 in string: {}", e)))
}

#[async_trait]
impl WalletProvider for RpcWallet {
	fn signer(&self) -> Arc<dyn WalletSigner> {
		self.signer.clone()
	}

	async fn chain_id(&self) -> Result<u64> {
		self.provider
			.get_chain_id()
			.await
			.map_err(|e| Error::Rpc(format!("Failed to get chain id: {}", e)))
	}

	async fn balance(&self, address: Address) -> Result<U256> {
		self.provider
			.get_balance(address)
			.await
			.map_err(|e| Error::Rpc(format!("Failed to get balance: {}", e)))
	}

	async fn lookup_address(&self, address: Address) -> Result<Option<String>> {
		let registry: Address = ENS_REGISTRY_ADDRESS
			.parse()
			.map_err(|_| Error::InvalidAddress(ENS_REGISTRY_ADDRESS.to_string()))?;
		let node = reverse_node(address);

		let result = self
			.eth_call(registry, node_call("resolver(bytes32)", node))
			.await?;
		if result.len() < 32 {
			return Ok(None);
		}
		let resolver = Address::from_slice(&result[12..32]);
		if resolver.is_zero() {
			return Ok(None);
		}

		let result = self.eth_call(resolver, node_call("name(bytes32)", node)).await?;
		let name = decode_string(&result)?;
		Ok((!name.is_empty()).then_some(name))
	}

	async fn call(&self, tx: TransactionRequest) -> Result<Bytes> {
		self.provider
			.call(tx)
			.await
			.map_err(|e| Error::Rpc(format!("Failed to execute eth_call: {}", e)))
	}

	async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256> {
		let pending = self
			.provider
			.send_transaction(tx)
			.await
			.map_err(|e| Error::Rpc(format!("Failed to send transaction: {}", e)))?;
		Ok(*pending.tx_hash())
	}

	async fn wait_for_confirmations(&self, hash: B256, confirmations: u64) -> Result<TxReceipt> {
		debug!(tx_hash = %hash, confirmations, "Waiting for confirmations");

		let config = PendingTransactionConfig::new(hash).with_required_confirmations(confirmations);

		let pending = self
			.provider
			.watch_pending_transaction(config)
			.await
			.map_err(|e| Error::TxNotConfirmed(hash, e.to_string()))?;

		let confirmed = pending
			.await
			.map_err(|e| Error::TxNotConfirmed(hash, e.to_string()))?;

		let receipt = self
			.provider
			.get_transaction_receipt(confirmed)
			.await
			.map_err(|e| Error::Rpc(format!("Failed to get receipt: {}", e)))?
			.ok_or_else(|| Error::TxNotConfirmed(hash, "receipt not found".to_string()))?;

		Ok(TxReceipt {
			hash: confirmed,
			block_number: receipt.block_number,
			success: receipt.status(),
		})
	}

	fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
		self.events.subscribe()
	}
}

/// Connector for a locally held key, remembering the provider between calls
pub struct LocalWalletConnector {
	rpc_url: String,
	signer: PrivateKeySigner,
	poll_interval: Duration,
	cached: Mutex<Option<Arc<RpcWallet>>>,
}

impl LocalWalletConnector {
	pub fn new(rpc_url: impl Into<String>, signer: PrivateKeySigner) -> Self {
		Self {
			rpc_url: rpc_url.into(),
			signer,
			poll_interval: DEFAULT_POLL_INTERVAL,
			cached: Mutex::new(None),
		}
	}

	pub fn from_private_key(rpc_url: impl Into<String>, key: &str) -> Result<Self> {
		let signer = LocalSigner::from_private_key(key)?;
		Ok(Self::new(rpc_url, signer.inner().clone()))
	}

	pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
		self.poll_interval = poll_interval;
		self
	}
}

#[async_trait]
impl WalletConnector for LocalWalletConnector {
	async fn connect(&self) -> Result<Arc<dyn WalletProvider>> {
		let mut cached = self.cached.lock().await;
		if let Some(wallet) = cached.as_ref() {
			debug!("Reusing cached wallet provider");
			return Ok(wallet.clone());
		}

		let wallet = Arc::new(
			RpcWallet::connect(&self.rpc_url, self.signer.clone(), self.poll_interval).await?,
		);
		*cached = Some(wallet.clone());
		Ok(wallet)
	}

	async fn clear_cached_provider(&self) -> Result<()> {
		self.cached.lock().await.take();
		Ok(())
	}
}
