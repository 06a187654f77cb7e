//! Wallet session state machine
//!
//! [`WalletSession`] is the single owner and writer of the connection state,
//! the bearer credential and the published snapshots. UI code holds an
//! `Arc<WalletSession>`, calls its actions and reads cloned snapshots through
//! the accessors.
//!
//! The session moves through [`SessionState`]:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Authenticated
//!       ^                           |              |
//!       +---------------------------+--------------+  (disconnect)
//! ```
//!
//! `Connected` means a wallet and contract handles are available but the
//! sign-in signature has not been produced yet. Side-effecting actions are
//! only accepted in `Authenticated` and are rejected with
//! [`Error::InvalidState`] otherwise.

use crate::{
	constants::{scales, REQUIRED_CONFIRMATIONS},
	core::{
		config::Config,
		contracts::{ContractHandles, ContractKind},
		logging,
		storage::{FileStore, KeyValueStore, MemoryStore},
		wallet::{ProviderEvent, TxReceipt, WalletConnector, WalletProvider, WalletSigner},
	},
	services::{AuthManager, BalanceFetcher, MarketDataFetcher},
	types::{
		error::{Error, Result},
		models::{BalanceSnapshot, BorrowConditions, PriceSnapshot},
		network::Network,
	},
	utils::to_base_units,
};
use alloy_primitives::{Address, B256};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A live wallet connection
#[derive(Clone)]
pub struct Connection {
	pub address: Address,
	pub chain_id: u64,
	pub signer: Arc<dyn WalletSigner>,
	pub provider: Arc<dyn WalletProvider>,
	pub contracts: ContractHandles,
}

impl fmt::Debug for Connection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Connection")
			.field("address", &self.address)
			.field("chain_id", &self.chain_id)
			.field("contracts", &self.contracts.len())
			.finish()
	}
}

/// Lifecycle state of the session
#[derive(Debug, Clone, Default)]
pub enum SessionState {
	#[default]
	Disconnected,
	/// A connect prompt is in flight
	Connecting,
	/// Wallet connected, sign-in pending or rejected
	Connected(Connection),
	/// Wallet connected and signed in
	Authenticated(Connection),
}

impl SessionState {
	pub fn name(&self) -> &'static str {
		match self {
			SessionState::Disconnected => "disconnected",
			SessionState::Connecting => "connecting",
			SessionState::Connected(_) => "connected",
			SessionState::Authenticated(_) => "authenticated",
		}
	}

	pub fn connection(&self) -> Option<&Connection> {
		match self {
			SessionState::Connected(connection) | SessionState::Authenticated(connection) => {
				Some(connection)
			},
			SessionState::Disconnected | SessionState::Connecting => None,
		}
	}

	fn connection_mut(&mut self) -> Option<&mut Connection> {
		match self {
			SessionState::Connected(connection) | SessionState::Authenticated(connection) => {
				Some(connection)
			},
			SessionState::Disconnected | SessionState::Connecting => None,
		}
	}
}

/// Serializable view of everything the session publishes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextSnapshot {
	pub state: &'static str,
	pub address: Option<Address>,
	pub chain_id: Option<u64>,
	pub is_logged_in: bool,
	pub is_loading: bool,
	pub connection_error: Option<String>,
	pub ens: Option<String>,
	pub bearer_token: Option<String>,
	pub contracts: BTreeMap<String, Address>,
	pub balances: BalanceSnapshot,
	pub prices: PriceSnapshot,
	pub borrow_conditions: BorrowConditions,
}

#[derive(Debug, Default)]
struct SessionData {
	state: SessionState,
	connection_error: Option<String>,
	ens: Option<String>,
	balances: BalanceSnapshot,
	prices: PriceSnapshot,
	borrow_conditions: BorrowConditions,
}

struct LoadingGuard<'a>(&'a AtomicUsize);

impl Drop for LoadingGuard<'_> {
	fn drop(&mut self) {
		self.0.fetch_sub(1, Ordering::SeqCst);
	}
}

/// Wallet connection and borrowing flow for one user
pub struct WalletSession {
	config: Config,
	network: Network,
	connector: Arc<dyn WalletConnector>,
	auth: AuthManager,
	market: MarketDataFetcher,
	balance_fetcher: BalanceFetcher,
	data: RwLock<SessionData>,
	loading: AtomicUsize,
	identity: Mutex<CancellationToken>,
	listener: Mutex<Option<CancellationToken>>,
}

impl WalletSession {
	/// Create a session, persisting the credential under `config.storage_dir`
	/// or in memory when none is configured
	///
	/// # Errors
	/// Returns Error if the storage directory cannot be created
	pub fn new(config: Config, connector: Arc<dyn WalletConnector>) -> Result<Arc<Self>> {
		let store: Arc<dyn KeyValueStore> = match &config.storage_dir {
			Some(dir) => Arc::new(FileStore::new(dir)?),
			None => Arc::new(MemoryStore::new()),
		};
		Ok(Self::with_store(config, connector, store))
	}

	/// Create a session with an explicit credential store
	///
	/// A credential found in `store` is restored immediately but does not
	/// make the session logged in; it is checked against the address of the
	/// next connected wallet.
	pub fn with_store(
		config: Config,
		connector: Arc<dyn WalletConnector>,
		store: Arc<dyn KeyValueStore>,
	) -> Arc<Self> {
		let network = config.network();
		let market = MarketDataFetcher::new(config.fixed_collateral_factor_percentage);

		Arc::new(Self {
			network,
			connector,
			auth: AuthManager::new(store),
			market,
			balance_fetcher: BalanceFetcher::new(),
			data: RwLock::new(SessionData::default()),
			loading: AtomicUsize::new(0),
			identity: Mutex::new(CancellationToken::new()),
			listener: Mutex::new(None),
			config,
		})
	}

	// Actions

	/// Connect a wallet and sign in
	///
	/// A dismissed wallet prompt leaves the session disconnected and returns
	/// `Ok`. A rejected sign-in signature leaves the session `Connected` and
	/// returns the signing error; calling `connect` again on that connection
	/// prompts for the signature again. Connecting a signed-in session is a
	/// no-op.
	pub async fn connect(self: &Arc<Self>) -> Result<()> {
		let unsigned = {
			let mut data = self.write_data();
			let previous = std::mem::take(&mut data.state);
			match previous {
				SessionState::Disconnected => {
					data.state = SessionState::Connecting;
					None
				},
				state @ SessionState::Connecting => {
					data.state = state;
					return Err(Error::InvalidState {
						operation: "connect",
						state: data.state.name(),
					});
				},
				SessionState::Connected(connection) => {
					data.state = SessionState::Connected(connection.clone());
					Some(connection)
				},
				state @ SessionState::Authenticated(_) => {
					data.state = state;
					debug!("Wallet already connected");
					return Ok(());
				},
			}
		};

		let _loading = self.begin_loading();

		if let Some(connection) = unsigned {
			let address = connection.address;
			logging::operation_start("connect", &format!("sign-in for {address}"));
			self.complete_sign_in(connection, "connect").await?;
			logging::operation_success("connect", &format!("{address} signed in"));
			return Ok(());
		}

		logging::operation_start("connect", &self.network.to_string());

		let connection = match self.open_connection().await {
			Ok(Some(connection)) => connection,
			Ok(None) => {
				self.write_data().state = SessionState::Disconnected;
				info!("Wallet connection cancelled");
				return Ok(());
			},
			Err(e) => {
				self.write_data().state = SessionState::Disconnected;
				logging::operation_error("connect", &e);
				return Err(e);
			},
		};

		let address = connection.address;
		let chain_id = connection.chain_id;
		let provider = connection.provider.clone();
		let mismatch = self.network.mismatch(chain_id);

		self.market.reset();
		{
			let mut data = self.write_data();
			data.connection_error = mismatch.clone();
			data.state = SessionState::Connected(connection.clone());
		}
		if let Some(message) = mismatch {
			warn!(chain_id, expected = self.network.id, "{message}");
		}

		self.spawn_event_listener(&provider);
		self.complete_sign_in(connection, "connect").await?;

		logging::operation_success("connect", &format!("{address} on chain {chain_id}"));
		Ok(())
	}

	/// Tear the session down and forget the credential
	pub async fn disconnect(&self) -> Result<()> {
		logging::operation_start("disconnect", self.state_name());

		if let Err(e) = self.connector.clear_cached_provider().await {
			warn!(error = %e, "Failed to clear cached provider");
		}

		self.stop_event_listener();
		self.lock_identity().cancel();
		*self.write_data() = SessionData::default();
		self.market.reset();

		if let Err(e) = self.auth.invalidate() {
			logging::operation_error("disconnect", &e);
			return Err(e);
		}

		logging::operation_success("disconnect", "session cleared");
		Ok(())
	}

	/// Supply `amount` ETH as collateral and enter the cETH market
	///
	/// Waits for the `enterMarkets` confirmation, then refreshes balances.
	///
	/// # Errors
	/// Returns [`Error::InvalidState`] unless signed in, and propagates any
	/// transaction or RPC failure
	pub async fn supply_eth_collateral(&self, amount: f64) -> Result<TxReceipt> {
		let connection = self.require_authenticated("supply_eth_collateral")?;
		logging::operation_start("supply_eth_collateral", &format!("{amount} ETH"));

		let result = self.supply(&connection, amount).await;
		match &result {
			Ok(receipt) => logging::operation_success(
				"supply_eth_collateral",
				&format!("entered cETH market in {}", receipt.hash),
			),
			Err(e) => logging::operation_error("supply_eth_collateral", e),
		}
		result
	}

	async fn supply(&self, connection: &Connection, amount: f64) -> Result<TxReceipt> {
		let ceth = connection.contracts.require(ContractKind::CEth)?;
		let comptroller = connection.contracts.require(ContractKind::Comptroller)?;
		let value = positive_base_units(amount, scales::ETH_DECIMALS)?;

		let mint = ceth.mint(value).await?;
		logging::debug_operation("supply_eth_collateral", &format!("mint submitted: {mint}"));

		let enter = comptroller.enter_markets(&[ceth.address()]).await?;
		let receipt = self.confirm(connection, enter).await?;

		self.fetch_balances().await?;
		Ok(receipt)
	}

	/// Whether `amount` DAI is strictly below the current borrowing capacity
	///
	/// Returns `false` whenever the session is not signed in or the capacity
	/// is unknown; it never errors, so "not eligible" and "not connected" look
	/// the same to the caller.
	pub fn can_borrow_dai(&self, amount: f64) -> bool {
		let data = self.read_data();
		match &data.state {
			SessionState::Authenticated(_) => data
				.borrow_conditions
				.max_borrowable_dai
				.filter(|max| *max > 0.0)
				.is_some_and(|max| amount < max),
			SessionState::Disconnected | SessionState::Connecting | SessionState::Connected(_) => {
				false
			},
		}
	}

	/// Borrow `amount` DAI from the cDAI market
	///
	/// Waits for one confirmation, then refreshes balances, prices and borrow
	/// conditions together.
	///
	/// # Errors
	/// Returns [`Error::InvalidState`] unless signed in, and propagates any
	/// transaction or RPC failure
	pub async fn borrow_dai(&self, amount: f64) -> Result<TxReceipt> {
		let connection = self.require_authenticated("borrow_dai")?;
		logging::operation_start("borrow_dai", &format!("{amount} DAI"));

		let result = self.borrow(&connection, amount).await;
		match &result {
			Ok(receipt) => {
				logging::operation_success("borrow_dai", &format!("borrowed in {}", receipt.hash))
			},
			Err(e) => logging::operation_error("borrow_dai", e),
		}
		result
	}

	async fn borrow(&self, connection: &Connection, amount: f64) -> Result<TxReceipt> {
		let cdai = connection.contracts.require(ContractKind::CDai)?;
		let scaled = positive_base_units(amount, scales::DAI_DECIMALS)?;

		let hash = cdai.borrow(scaled).await?;
		let receipt = self.confirm(connection, hash).await?;
		info!(tx_hash = %receipt.hash, block = ?receipt.block_number, "Borrow transaction confirmed");

		self.fetch_data().await?;
		Ok(receipt)
	}

	async fn confirm(&self, connection: &Connection, hash: B256) -> Result<TxReceipt> {
		let receipt = connection
			.provider
			.wait_for_confirmations(hash, REQUIRED_CONFIRMATIONS)
			.await?;
		if !receipt.success {
			return Err(Error::TxReverted(hash));
		}
		Ok(receipt)
	}

	// Data refresh

	/// Refresh balances, prices and borrow conditions, in that order
	///
	/// Does nothing while no contract handles exist.
	pub async fn fetch_data(&self) -> Result<()> {
		let has_contracts = self
			.read_data()
			.state
			.connection()
			.is_some_and(|connection| !connection.contracts.is_empty());
		if !has_contracts {
			return Ok(());
		}

		let _loading = self.begin_loading();

		let balances = self.fetch_balances().await?;
		let prices = self.fetch_prices().await;
		let borrow_conditions = self.fetch_borrow_conditions(&prices).await?;

		info!(
			balances = ?balances,
			prices = ?prices,
			borrow_conditions = ?borrow_conditions,
			"Session data refreshed"
		);
		Ok(())
	}

	/// Read and publish wallet and protocol balances
	///
	/// Yields an empty snapshot when no wallet is connected.
	pub async fn fetch_balances(&self) -> Result<BalanceSnapshot> {
		let Some(connection) = self.connection() else {
			self.write_data().balances = BalanceSnapshot::default();
			return Ok(BalanceSnapshot::default());
		};

		let balances = self
			.balance_fetcher
			.fetch_balances(
				connection.provider.as_ref(),
				&connection.contracts,
				connection.address,
			)
			.await?;

		self.commit(connection.address, |data| data.balances = balances.clone());
		Ok(balances)
	}

	/// Read and publish oracle prices
	///
	/// Yields an empty snapshot when no wallet is connected and the fixed
	/// fallback prices when the oracle cannot be read.
	pub async fn fetch_prices(&self) -> PriceSnapshot {
		let Some(connection) = self.connection() else {
			self.write_data().prices = PriceSnapshot::default();
			return PriceSnapshot::default();
		};

		let prices = self.market.fetch_prices(&connection.contracts).await;
		self.commit(connection.address, |data| data.prices = prices.clone());
		prices
	}

	/// Read and publish borrow conditions using `prices`
	pub async fn fetch_borrow_conditions(&self, prices: &PriceSnapshot) -> Result<BorrowConditions> {
		let Some(connection) = self.connection() else {
			self.write_data().borrow_conditions = BorrowConditions::default();
			return Ok(BorrowConditions::default());
		};

		let conditions = self
			.market
			.fetch_borrow_conditions(&connection.contracts, connection.address, prices)
			.await?;

		self.commit(connection.address, |data| {
			data.borrow_conditions = conditions.clone()
		});
		Ok(conditions)
	}

	// Provider events

	/// Apply a provider notification
	///
	/// Events arriving while no wallet is connected are ignored.
	pub async fn handle_event(&self, event: ProviderEvent) -> Result<()> {
		match event {
			ProviderEvent::ChainChanged(chain_id) => self.on_chain_changed(chain_id).await,
			ProviderEvent::AccountsChanged(accounts) => self.on_accounts_changed(accounts).await,
		}
	}

	async fn on_chain_changed(&self, chain_id: u64) -> Result<()> {
		let mismatch = self.network.mismatch(chain_id);
		let (provider, address) = {
			let mut data = self.write_data();
			let Some(connection) = data.state.connection_mut() else {
				return Ok(());
			};
			connection.chain_id = chain_id;
			let target = (connection.provider.clone(), connection.address);
			data.connection_error = mismatch;
			target
		};

		info!(chain_id, "Wallet network changed");

		let token = self.rotate_identity();
		self.refresh_ens(&token, provider.as_ref(), address).await;
		Ok(())
	}

	async fn on_accounts_changed(&self, accounts: Vec<Address>) -> Result<()> {
		let Some(current) = self.connection() else {
			return Ok(());
		};

		if accounts.is_empty() {
			info!("Wallet exposes no accounts, disconnecting");
			return self.disconnect().await;
		}

		logging::operation_start("account_change", &format!("{:?}", accounts));
		self.auth.invalidate()?;

		// Re-read the signer so the new account is used, not the one captured at connect
		let provider = current.provider.clone();
		let signer = provider.signer();
		let address = signer.address().await?;
		if accounts.first() != Some(&address) {
			debug!(%address, reported = ?accounts.first(), "Signer address differs from reported account");
		}

		let contracts = ContractHandles::build(&self.config.contracts, address, provider.clone())?;
		let connection = Connection {
			address,
			chain_id: current.chain_id,
			signer,
			provider: provider.clone(),
			contracts,
		};

		self.market.reset();
		{
			let mut data = self.write_data();
			if data.state.connection().is_none() {
				return Ok(());
			}
			data.state = SessionState::Connected(connection.clone());
			data.ens = None;
			data.balances = BalanceSnapshot::default();
			data.borrow_conditions = BorrowConditions::default();
		}

		let token = self.rotate_identity();
		self.sign_in(connection).await?;
		self.refresh_ens(&token, provider.as_ref(), address).await;

		if let Err(e) = self.fetch_data().await {
			warn!(error = %e, "Data refresh after account change failed");
		}

		logging::operation_success("account_change", &address.to_string());
		Ok(())
	}

	// Accessors

	pub fn state_name(&self) -> &'static str {
		self.read_data().state.name()
	}

	/// Clone of the current state
	pub fn state(&self) -> SessionState {
		self.read_data().state.clone()
	}

	pub fn network(&self) -> &Network {
		&self.network
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn balances(&self) -> BalanceSnapshot {
		self.read_data().balances.clone()
	}

	pub fn prices(&self) -> PriceSnapshot {
		self.read_data().prices.clone()
	}

	pub fn borrow_conditions(&self) -> BorrowConditions {
		self.read_data().borrow_conditions.clone()
	}

	pub fn address(&self) -> Option<Address> {
		self.connection().map(|connection| connection.address)
	}

	pub fn chain_id(&self) -> Option<u64> {
		self.connection().map(|connection| connection.chain_id)
	}

	/// True once the connected wallet has produced a valid sign-in signature
	pub fn is_logged_in(&self) -> bool {
		matches!(self.read_data().state, SessionState::Authenticated(_))
	}

	/// Network mismatch message, if the wallet is on the wrong chain
	pub fn connection_error(&self) -> Option<String> {
		self.read_data().connection_error.clone()
	}

	/// Current bearer token, including one restored from storage
	pub fn bearer_token(&self) -> Option<String> {
		self.auth.token()
	}

	/// Reverse name of the connected address
	pub fn ens(&self) -> Option<String> {
		self.read_data().ens.clone()
	}

	/// True while a connect or data refresh is in flight
	pub fn is_loading(&self) -> bool {
		self.loading.load(Ordering::SeqCst) > 0
	}

	/// Contract handles of the current connection; empty without a signer
	pub fn contracts(&self) -> ContractHandles {
		self.connection()
			.map(|connection| connection.contracts)
			.unwrap_or_default()
	}

	pub fn snapshot(&self) -> ContextSnapshot {
		let bearer_token = self.auth.token();
		let is_loading = self.is_loading();
		let data = self.read_data();
		let connection = data.state.connection();

		ContextSnapshot {
			state: data.state.name(),
			address: connection.map(|c| c.address),
			chain_id: connection.map(|c| c.chain_id),
			is_logged_in: matches!(data.state, SessionState::Authenticated(_)),
			is_loading,
			connection_error: data.connection_error.clone(),
			ens: data.ens.clone(),
			bearer_token,
			contracts: connection
				.map(|c| c.contracts.addresses())
				.unwrap_or_default(),
			balances: data.balances.clone(),
			prices: data.prices.clone(),
			borrow_conditions: data.borrow_conditions.clone(),
		}
	}

	// Internals

	async fn open_connection(&self) -> Result<Option<Connection>> {
		let provider = match self.connector.connect().await {
			Ok(provider) => provider,
			Err(Error::ConnectionRejected(reason)) => {
				debug!(%reason, "Wallet prompt dismissed");
				return Ok(None);
			},
			Err(e) => return Err(e),
		};

		let signer = provider.signer();
		let address = signer.address().await?;
		let chain_id = provider.chain_id().await?;
		let contracts = ContractHandles::build(&self.config.contracts, address, provider.clone())?;

		Ok(Some(Connection {
			address,
			chain_id,
			signer,
			provider,
			contracts,
		}))
	}

	/// Reuse a credential issued to this address, otherwise prompt for a new
	/// one, then promote the connection to `Authenticated`
	async fn sign_in(&self, connection: Connection) -> Result<()> {
		if self.auth.validate_for(connection.address) {
			debug!(address = %connection.address, "Reusing stored bearer token");
		} else {
			if self.auth.has_token() {
				self.auth.invalidate()?;
			}
			self.auth
				.authenticate(connection.signer.as_ref(), connection.address)
				.await?;
		}

		let address = connection.address;
		let promoted = self.commit(address, |data| {
			data.state = SessionState::Authenticated(connection)
		});
		if promoted {
			info!(%address, "Signed in");
		}
		Ok(())
	}

	/// Sign in on `connection`, then refresh the reverse name and session data
	async fn complete_sign_in(&self, connection: Connection, operation: &str) -> Result<()> {
		let address = connection.address;
		let provider = connection.provider.clone();

		if let Err(e) = self.sign_in(connection).await {
			logging::operation_error(operation, &e);
			return Err(e);
		}

		let token = self.rotate_identity();
		self.refresh_ens(&token, provider.as_ref(), address).await;

		if let Err(e) = self.fetch_data().await {
			warn!(error = %e, operation, "Data refresh after sign-in failed");
		}
		Ok(())
	}

	async fn refresh_ens(
		&self,
		token: &CancellationToken,
		provider: &dyn WalletProvider,
		address: Address,
	) {
		let result = tokio::select! {
			_ = token.cancelled() => {
				debug!(%address, "Reverse name lookup cancelled");
				return;
			},
			result = provider.lookup_address(address) => result,
		};

		let ens = result.unwrap_or_else(|e| {
			debug!(%address, error = %e, "Reverse name lookup failed");
			None
		});

		if token.is_cancelled() {
			debug!(%address, "Discarding stale reverse name lookup");
			return;
		}

		self.commit(address, |data| data.ens = ens);
	}

	fn spawn_event_listener(self: &Arc<Self>, provider: &Arc<dyn WalletProvider>) {
		let token = CancellationToken::new();
		if let Some(previous) = self.lock_listener().replace(token.clone()) {
			previous.cancel();
		}

		let mut events = provider.subscribe();
		let session = Arc::downgrade(self);

		tokio::spawn(async move {
			loop {
				let event = tokio::select! {
					_ = token.cancelled() => break,
					event = events.recv() => event,
				};

				match event {
					Ok(event) => {
						let Some(session) = session.upgrade() else {
							break;
						};
						if let Err(e) = session.handle_event(event).await {
							warn!(error = %e, "Failed to handle provider event");
						}
					},
					Err(broadcast::error::RecvError::Lagged(skipped)) => {
						warn!(skipped, "Provider events lagged");
					},
					Err(broadcast::error::RecvError::Closed) => break,
				}
			}

			debug!("Provider event listener stopped");
		});
	}

	fn stop_event_listener(&self) {
		if let Some(token) = self.lock_listener().take() {
			token.cancel();
		}
	}

	/// Cancel lookups bound to the previous identity and start a new one
	fn rotate_identity(&self) -> CancellationToken {
		let mut identity = self.lock_identity();
		identity.cancel();
		*identity = CancellationToken::new();
		identity.clone()
	}

	fn require_authenticated(&self, operation: &'static str) -> Result<Connection> {
		match &self.read_data().state {
			SessionState::Authenticated(connection) => Ok(connection.clone()),
			state @ (SessionState::Disconnected
			| SessionState::Connecting
			| SessionState::Connected(_)) => Err(Error::InvalidState {
				operation,
				state: state.name(),
			}),
		}
	}

	fn connection(&self) -> Option<Connection> {
		self.read_data().state.connection().cloned()
	}

	/// Apply `update` only if `address` is still the connected account
	fn commit(&self, address: Address, update: impl FnOnce(&mut SessionData)) -> bool {
		let mut data = self.write_data();
		let current = data.state.connection().map(|connection| connection.address);
		if current != Some(address) {
			debug!(%address, "Discarding result for a previous account");
			return false;
		}
		update(&mut *data);
		true
	}

	fn begin_loading(&self) -> LoadingGuard<'_> {
		self.loading.fetch_add(1, Ordering::SeqCst);
		LoadingGuard(&self.loading)
	}

	fn read_data(&self) -> RwLockReadGuard<'_, SessionData> {
		self.data.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write_data(&self) -> RwLockWriteGuard<'_, SessionData> {
		self.data.write().unwrap_or_else(PoisonError::into_inner)
	}

	fn lock_identity(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
		self.identity.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn lock_listener(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
		self.listener.lock().unwrap_or_else(PoisonError::into_inner)
	}
}

impl Drop for WalletSession {
	fn drop(&mut self) {
		self.stop_event_listener();
		self.lock_identity().cancel();
	}
}

fn positive_base_units(amount: f64, decimals: u8) -> Result<alloy_primitives::U256> {
	if amount.is_nan() || amount <= 0.0 {
		return Err(Error::InvalidAmount(format!(
			"{amount} must be greater than zero"
		)));
	}
	to_base_units(amount, decimals)
}
