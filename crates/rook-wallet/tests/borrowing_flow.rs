mod common;

use alloy_primitives::U256;
use common::{address_of, addresses, config, FakeConnector, FakeWallet, ETHER, KEY_A};
use rook_wallet::{Asset, Error, MemoryStore, WalletSession};
use std::sync::Arc;

async fn connected() -> (Arc<FakeWallet>, Arc<WalletSession>) {
	let wallet = FakeWallet::new(KEY_A);
	let session = disconnected(wallet.clone());
	session.connect().await.unwrap();
	(wallet, session)
}

fn disconnected(wallet: Arc<FakeWallet>) -> Arc<WalletSession> {
	let connector = FakeConnector::new(wallet);
	WalletSession::with_store(config(), connector, Arc::new(MemoryStore::new()))
}

#[tokio::test]
async fn test_actions_rejected_when_disconnected() {
	let session = disconnected(FakeWallet::new(KEY_A));

	let supply = session.supply_eth_collateral(1.0).await;
	assert!(matches!(
		supply,
		Err(Error::InvalidState {
			operation: "supply_eth_collateral",
			state: "disconnected"
		})
	));

	let borrow = session.borrow_dai(10.0).await;
	assert!(matches!(
		borrow,
		Err(Error::InvalidState {
			operation: "borrow_dai",
			state: "disconnected"
		})
	));
}

#[tokio::test]
async fn test_actions_rejected_before_sign_in() {
	let wallet = FakeWallet::new(KEY_A);
	wallet.reject_signatures(true);
	let session = disconnected(wallet.clone());
	assert!(session.connect().await.is_err());

	let result = session.borrow_dai(10.0).await;
	assert!(matches!(
		result,
		Err(Error::InvalidState {
			state: "connected",
			..
		})
	));
	assert!(wallet.ledger().sent.is_empty());
}

#[tokio::test]
async fn test_supply_eth_collateral() {
	let (wallet, session) = connected().await;
	let contracts = addresses();

	let receipt = session.supply_eth_collateral(1.0).await.unwrap();
	assert!(receipt.success);

	let sent = wallet.ledger().sent;
	assert_eq!(sent.len(), 2);

	assert!(sent[0].is_call_to("mint()"));
	assert_eq!(sent[0].to, contracts.ceth);
	assert_eq!(sent[0].value, U256::from(ETHER));

	assert!(sent[1].is_call_to("enterMarkets(address[])"));
	assert_eq!(sent[1].to, contracts.comptroller);
	assert_eq!(sent[1].value, U256::ZERO);
	// offset, length, then the single cETH address
	assert_eq!(sent[1].data.len(), 4 + 3 * 32);
	assert_eq!(&sent[1].data[sent[1].data.len() - 20..], contracts.ceth.as_slice());

	let balances = session.balances();
	assert_eq!(balances.get(Asset::CEth), Some(50.0));
	assert_eq!(balances.get(Asset::Eth), Some(9.0));
}

#[tokio::test]
async fn test_can_borrow_is_strict() {
	let (_, session) = connected().await;
	let max = session.borrow_conditions().max_borrowable_dai.unwrap();
	assert_eq!(max, 1125.0);

	assert!(session.can_borrow_dai(0.0));
	assert!(session.can_borrow_dai(1124.99));
	assert!(!session.can_borrow_dai(max));
	assert!(!session.can_borrow_dai(2000.0));
}

#[tokio::test]
async fn test_can_borrow_false_when_not_logged_in() {
	let (_, session) = connected().await;
	assert!(session.can_borrow_dai(1.0));

	session.disconnect().await.unwrap();
	assert!(!session.can_borrow_dai(1.0));
	assert!(!session.can_borrow_dai(0.0));
	assert!(!session.can_borrow_dai(-5.0));
}

#[tokio::test]
async fn test_can_borrow_false_without_capacity() {
	let wallet = FakeWallet::new(KEY_A);
	wallet.update(|ledger| ledger.liquidity = U256::ZERO);
	let session = disconnected(wallet);
	session.connect().await.unwrap();

	assert_eq!(session.borrow_conditions().max_borrowable_dai, Some(0.0));
	assert!(!session.can_borrow_dai(0.0));
	assert!(!session.can_borrow_dai(-1.0));
}

#[tokio::test]
async fn test_borrow_dai_refreshes_everything() {
	let (wallet, session) = connected().await;
	let before = wallet.ledger();
	assert_eq!(before.market_reads, 2);
	assert_eq!(before.liquidity_reads, 1);

	wallet.update(|ledger| ledger.liquidity = U256::from(900u64) * U256::from(ETHER));
	let receipt = session.borrow_dai(100.0).await.unwrap();
	assert!(receipt.success);

	let after = wallet.ledger();
	let sent = after.sent.last().unwrap();
	assert!(sent.is_call_to("borrow(uint256)"));
	assert_eq!(sent.to, addresses().cdai);
	assert_eq!(
		U256::from_be_slice(&sent.data[4..36]),
		U256::from(100u64) * U256::from(ETHER)
	);

	// Collateral factors stay cached, liquidity is re-read
	assert_eq!(after.market_reads, 2);
	assert_eq!(after.liquidity_reads, 2);

	assert_eq!(
		after.dai.get(&address_of(KEY_A)).copied(),
		Some(U256::from(100u64) * U256::from(ETHER))
	);
	assert_eq!(session.balances().get(Asset::Dai), Some(100.0));
	assert_eq!(session.borrow_conditions().liquidity_usd, Some(900.0));
	assert_eq!(session.borrow_conditions().max_borrowable_dai, Some(675.0));
}

#[tokio::test]
async fn test_reverted_transactions_propagate() {
	let (wallet, session) = connected().await;
	wallet.update(|ledger| ledger.revert_transactions = true);

	let borrow = session.borrow_dai(10.0).await;
	assert!(matches!(borrow, Err(Error::TxReverted(_))));

	let supply = session.supply_eth_collateral(1.0).await;
	assert!(matches!(supply, Err(Error::TxReverted(_))));

	assert_eq!(session.balances().get(Asset::Dai), Some(0.0));
}

#[tokio::test]
async fn test_non_positive_amounts_rejected() {
	let (wallet, session) = connected().await;

	assert!(matches!(
		session.borrow_dai(0.0).await,
		Err(Error::InvalidAmount(_))
	));
	assert!(matches!(
		session.supply_eth_collateral(-1.0).await,
		Err(Error::InvalidAmount(_))
	));
	assert!(wallet.ledger().sent.is_empty());
}

#[tokio::test]
async fn test_price_fallback_when_oracle_fails() {
	let wallet = FakeWallet::new(KEY_A);
	wallet.update(|ledger| ledger.prices = None);
	let session = disconnected(wallet);
	session.connect().await.unwrap();

	let prices = session.fetch_prices().await;
	assert_eq!(prices.get(Asset::Dai), Some(1.000379));
	assert_eq!(prices.get(Asset::Eth), Some(3387.324249));
	assert_eq!(prices.iter().count(), 2);
	assert_eq!(session.prices(), prices);

	assert_eq!(
		session.borrow_conditions().max_borrowable_dai,
		Some(1500.0 / 1.000379 * (75.0 / 100.0))
	);
}

#[tokio::test]
async fn test_fetch_balances_is_idempotent() {
	let (_, session) = connected().await;

	let first = session.fetch_balances().await.unwrap();
	let second = session.fetch_balances().await.unwrap();

	assert_eq!(first, second);
	assert_eq!(first.iter().count(), 4);
}

#[tokio::test]
async fn test_collateral_factors_are_exposed() {
	let (_, session) = connected().await;
	let conditions = session.borrow_conditions();

	assert_eq!(conditions.collateral_factors.get(&Asset::CEth), Some(&75.0));
	assert_eq!(conditions.collateral_factors.get(&Asset::CDai), Some(&80.0));
	assert_eq!(conditions.fixed_collateral_factor_percentage, Some(75.0));
	assert_eq!(conditions.configured_factor_divergence(), Some(0.0));
}
