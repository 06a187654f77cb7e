//! In-memory wallet used by the integration tests
//!
//! [`FakeWallet`] signs with real secp256k1 keys and answers the protocol
//! calls by function selector against a small mutable ledger.

#![allow(dead_code)]

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use alloy_rpc_types::TransactionRequest;
use async_trait::async_trait;
use rook_wallet::{
	core::rpc::LocalSigner, Config, ContractAddresses, Error, ProviderEvent, Result, TxReceipt,
	WalletConnector, WalletProvider, WalletSigner,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, Semaphore};

pub const KEY_A: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const KEY_B: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub const ETHER: u128 = 1_000_000_000_000_000_000;

pub fn addresses() -> ContractAddresses {
	ContractAddresses {
		ceth: Address::repeat_byte(0x01),
		cdai: Address::repeat_byte(0x02),
		dai: Address::repeat_byte(0x03),
		comptroller: Address::repeat_byte(0x04),
		price_feed: Address::repeat_byte(0x05),
	}
}

pub fn config() -> Config {
	Config {
		network_id: 4,
		rpc_url: None,
		alchemy_key: None,
		contracts: addresses(),
		fixed_collateral_factor_percentage: 75.0,
		storage_dir: None,
	}
}

pub fn address_of(key: &str) -> Address {
	LocalSigner::from_private_key(key).unwrap().inner().address()
}

fn selector(signature: &str) -> [u8; 4] {
	let hash = keccak256(signature.as_bytes());
	[hash[0], hash[1], hash[2], hash[3]]
}

fn words(values: &[U256]) -> Bytes {
	values
		.iter()
		.flat_map(|value| value.to_be_bytes::<32>())
		.collect::<Vec<u8>>()
		.into()
}

fn address_arg(data: &[u8]) -> Address {
	Address::from_slice(&data[16..36])
}

fn string_arg(data: &[u8]) -> String {
	let length = U256::from_be_slice(&data[36..68]).to::<usize>();
	String::from_utf8(data[68..68 + length].to_vec()).unwrap()
}

/// Transaction submitted through the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentTx {
	pub to: Address,
	pub selector: [u8; 4],
	pub value: U256,
	pub data: Bytes,
}

impl SentTx {
	pub fn is_call_to(&self, signature: &str) -> bool {
		self.selector == selector(signature)
	}
}

/// Mutable chain state behind the fake
#[derive(Debug, Clone)]
pub struct Ledger {
	pub chain_id: u64,
	pub eth: HashMap<Address, U256>,
	pub ceth: HashMap<Address, U256>,
	pub cdai: HashMap<Address, U256>,
	pub dai: HashMap<Address, U256>,
	/// Raw 6-decimal DAI and ETH prices; `None` makes the oracle revert
	pub prices: Option<(U256, U256)>,
	pub ceth_factor: U256,
	pub cdai_factor: U256,
	pub liquidity: U256,
	pub revert_transactions: bool,
	pub ens: HashMap<Address, String>,
	pub sent: Vec<SentTx>,
	pub market_reads: usize,
	pub liquidity_reads: usize,
}

impl Default for Ledger {
	fn default() -> Self {
		Self {
			chain_id: 4,
			eth: HashMap::new(),
			ceth: HashMap::new(),
			cdai: HashMap::new(),
			dai: HashMap::new(),
			prices: Some((U256::from(1_000_000u64), U256::from(3_000_000_000u64))),
			ceth_factor: U256::from(750_000_000_000_000_000u128),
			cdai_factor: U256::from(800_000_000_000_000_000u128),
			liquidity: U256::from(1_500u64) * U256::from(ETHER),
			revert_transactions: false,
			ens: HashMap::new(),
			sent: Vec::new(),
			market_reads: 0,
			liquidity_reads: 0,
		}
	}
}

/// Signer that counts the signatures it produces
pub struct CountingSigner {
	inner: LocalSigner,
	signatures: Arc<AtomicUsize>,
	reject: Arc<AtomicBool>,
}

#[async_trait]
impl WalletSigner for CountingSigner {
	async fn address(&self) -> Result<Address> {
		self.inner.address().await
	}

	async fn sign_message(&self, message: &[u8]) -> Result<Bytes> {
		if self.reject.load(Ordering::SeqCst) {
			return Err(Error::SigningFailed("User denied message signature".to_string()));
		}
		self.signatures.fetch_add(1, Ordering::SeqCst);
		self.inner.sign_message(message).await
	}
}

pub struct FakeWallet {
	pub ledger: Mutex<Ledger>,
	key: Mutex<String>,
	signatures: Arc<AtomicUsize>,
	reject_signatures: Arc<AtomicBool>,
	events: broadcast::Sender<ProviderEvent>,
	nonce: AtomicUsize,
	lookup_gate: Mutex<Option<Arc<Semaphore>>>,
	lookups_started: AtomicUsize,
}

impl FakeWallet {
	pub fn new(key: &str) -> Arc<Self> {
		let (events, _) = broadcast::channel(16);
		let wallet = Self {
			ledger: Mutex::new(Ledger::default()),
			key: Mutex::new(key.to_string()),
			signatures: Arc::new(AtomicUsize::new(0)),
			reject_signatures: Arc::new(AtomicBool::new(false)),
			events,
			nonce: AtomicUsize::new(0),
			lookup_gate: Mutex::new(None),
			lookups_started: AtomicUsize::new(0),
		};
		wallet.fund(address_of(key));
		Arc::new(wallet)
	}

	pub fn fund(&self, account: Address) {
		self.ledger
			.lock()
			.unwrap()
			.eth
			.insert(account, U256::from(10 * ETHER));
	}

	pub fn update(&self, apply: impl FnOnce(&mut Ledger)) {
		apply(&mut *self.ledger.lock().unwrap());
	}

	pub fn ledger(&self) -> Ledger {
		self.ledger.lock().unwrap().clone()
	}

	pub fn signatures(&self) -> usize {
		self.signatures.load(Ordering::SeqCst)
	}

	pub fn reject_signatures(&self, reject: bool) {
		self.reject_signatures.store(reject, Ordering::SeqCst);
	}

	/// Switch the active account without announcing it
	pub fn switch_account(&self, key: &str) -> Address {
		*self.key.lock().unwrap() = key.to_string();
		let address = address_of(key);
		self.fund(address);
		address
	}

	/// Block reverse name lookups until [`FakeWallet::release_lookups`]
	pub fn hold_lookups(&self) {
		*self.lookup_gate.lock().unwrap() = Some(Arc::new(Semaphore::new(0)));
	}

	pub fn release_lookups(&self) {
		if let Some(gate) = self.lookup_gate.lock().unwrap().take() {
			gate.close();
		}
	}

	pub fn lookups_started(&self) -> usize {
		self.lookups_started.load(Ordering::SeqCst)
	}

	pub fn emit(&self, event: ProviderEvent) {
		let _ = self.events.send(event);
	}

	fn active_signer(&self) -> CountingSigner {
		let key = self.key.lock().unwrap().clone();
		CountingSigner {
			inner: LocalSigner::from_private_key(&key).unwrap(),
			signatures: self.signatures.clone(),
			reject: self.reject_signatures.clone(),
		}
	}

	fn next_hash(&self) -> B256 {
		let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
		keccak256(nonce.to_be_bytes())
	}

	fn answer(&self, to: Address, data: &[u8]) -> Result<Bytes> {
		let addresses = addresses();
		let mut ledger = self.ledger.lock().unwrap();
		let sel: [u8; 4] = data[..4].try_into().unwrap();

		if sel == selector("balanceOf(address)") {
			let owner = address_arg(data);
			let book = match to {
				t if t == addresses.ceth => &ledger.ceth,
				t if t == addresses.cdai => &ledger.cdai,
				t if t == addresses.dai => &ledger.dai,
				_ => return Err(Error::Rpc("execution reverted".to_string())),
			};
			return Ok(words(&[book.get(&owner).copied().unwrap_or_default()]));
		}

		if sel == selector("markets(address)") {
			ledger.market_reads += 1;
			let factor = if address_arg(data) == addresses.ceth {
				ledger.ceth_factor
			} else {
				ledger.cdai_factor
			};
			return Ok(words(&[U256::from(1), factor, U256::ZERO]));
		}

		if sel == selector("getAccountLiquidity(address)") {
			ledger.liquidity_reads += 1;
			return Ok(words(&[U256::ZERO, ledger.liquidity, U256::ZERO]));
		}

		if sel == selector("price(string)") {
			let (dai, eth) = ledger
				.prices
				.ok_or_else(|| Error::Rpc("execution reverted".to_string()))?;
			return match string_arg(data).as_str() {
				"DAI" => Ok(words(&[dai])),
				"ETH" => Ok(words(&[eth])),
				_ => Ok(words(&[U256::ZERO])),
			};
		}

		Err(Error::Rpc(format!("unknown selector {:?}", sel)))
	}

	fn apply(&self, from: Address, tx: &SentTx) {
		let mut ledger = self.ledger.lock().unwrap();

		if tx.is_call_to("mint()") {
			let eth = ledger.eth.entry(from).or_default();
			*eth = eth.saturating_sub(tx.value);
			// 1 ETH mints 50 cETH (8 decimals)
			let minted = tx.value * U256::from(50) / U256::from(10_000_000_000u64);
			*ledger.ceth.entry(from).or_default() += minted;
		} else if tx.is_call_to("borrow(uint256)") {
			let amount = U256::from_be_slice(&tx.data[4..36]);
			*ledger.dai.entry(from).or_default() += amount;
		}
	}
}

#[async_trait]
impl WalletProvider for FakeWallet {
	fn signer(&self) -> Arc<dyn WalletSigner> {
		Arc::new(self.active_signer())
	}

	async fn chain_id(&self) -> Result<u64> {
		Ok(self.ledger.lock().unwrap().chain_id)
	}

	async fn balance(&self, address: Address) -> Result<U256> {
		Ok(self
			.ledger
			.lock()
			.unwrap()
			.eth
			.get(&address)
			.copied()
			.unwrap_or_default())
	}

	async fn lookup_address(&self, address: Address) -> Result<Option<String>> {
		self.lookups_started.fetch_add(1, Ordering::SeqCst);
		let gate = self.lookup_gate.lock().unwrap().clone();
		if let Some(gate) = gate {
			// A closed gate fails the acquire, which is the release signal
			let _ = gate.acquire().await;
		}
		Ok(self.ledger.lock().unwrap().ens.get(&address).cloned())
	}

	async fn call(&self, tx: TransactionRequest) -> Result<Bytes> {
		let to = tx.to.and_then(|kind| kind.to().copied()).unwrap_or_default();
		let data = tx.input.input().cloned().unwrap_or_default();
		self.answer(to, &data)
	}

	async fn send_transaction(&self, tx: TransactionRequest) -> Result<B256> {
		let to = tx.to.and_then(|kind| kind.to().copied()).unwrap_or_default();
		let data = tx.input.input().cloned().unwrap_or_default();
		let from = tx.from.unwrap_or_default();

		let sent = SentTx {
			to,
			selector: data[..4].try_into().unwrap(),
			value: tx.value.unwrap_or_default(),
			data,
		};

		if !self.ledger.lock().unwrap().revert_transactions {
			self.apply(from, &sent);
		}
		self.ledger.lock().unwrap().sent.push(sent);
		Ok(self.next_hash())
	}

	async fn wait_for_confirmations(&self, hash: B256, _confirmations: u64) -> Result<TxReceipt> {
		let ledger = self.ledger.lock().unwrap();
		Ok(TxReceipt {
			hash,
			block_number: Some(ledger.sent.len() as u64),
			success: !ledger.revert_transactions,
		})
	}

	fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
		self.events.subscribe()
	}
}

/// Connector handing out a shared [`FakeWallet`]
pub struct FakeConnector {
	pub wallet: Arc<FakeWallet>,
	reject: AtomicBool,
	pub connects: AtomicUsize,
	pub clears: AtomicUsize,
}

impl FakeConnector {
	pub fn new(wallet: Arc<FakeWallet>) -> Arc<Self> {
		Arc::new(Self {
			wallet,
			reject: AtomicBool::new(false),
			connects: AtomicUsize::new(0),
			clears: AtomicUsize::new(0),
		})
	}

	/// Make the next prompts behave as if the user closed the modal
	pub fn reject(&self, reject: bool) {
		self.reject.store(reject, Ordering::SeqCst);
	}
}

#[async_trait]
impl WalletConnector for FakeConnector {
	async fn connect(&self) -> Result<Arc<dyn WalletProvider>> {
		if self.reject.load(Ordering::SeqCst) {
			return Err(Error::ConnectionRejected("Modal closed by user".to_string()));
		}
		self.connects.fetch_add(1, Ordering::SeqCst);
		Ok(self.wallet.clone())
	}

	async fn clear_cached_provider(&self) -> Result<()> {
		self.clears.fetch_add(1, Ordering::SeqCst);
		Ok(())
	}
}
