//! Core building blocks of the wallet session
//!
//! Configuration, durable storage, logging setup, the wallet/provider seams
//! with their alloy implementation, and the protocol contract handles.

pub mod config;
pub mod contracts;
pub mod logging;
pub mod rpc;
pub mod storage;
pub mod wallet;

pub use config::{Config, ContractAddresses};
pub use contracts::{ContractHandle, ContractHandles, ContractKind};
pub use logging::init_logging;
pub use rpc::{LocalSigner, LocalWalletConnector, RpcWallet};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use wallet::{ProviderEvent, TxReceipt, WalletConnector, WalletProvider, WalletSigner};
