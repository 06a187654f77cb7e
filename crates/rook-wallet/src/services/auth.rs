//! Sign-in credential management
//!
//! A user signs in by personal-signing a fixed challenge that embeds their
//! address. The signature and address are wrapped into an HS256 token, kept
//! in memory and persisted through a [`KeyValueStore`] so the credential
//! survives a restart.
//!
//! A restored token is only trusted after [`AuthManager::validate_for`] has
//! checked it against a freshly connected address: the `address` claim must
//! match and the signature must recover to that same address.

use crate::{
	constants::{sign_in_message, BEARER_TOKEN_KEY, BEARER_TOKEN_SECRET},
	core::{logging, storage::KeyValueStore, wallet::WalletSigner},
	types::error::{Error, Result},
};
use alloy_primitives::{hex, keccak256, Address, Signature, B256};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, instrument, warn};

/// Claims carried by the bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInClaims {
	/// Hex-encoded 65-byte signature over the sign-in challenge
	pub sig: String,
	/// Checksummed address the challenge was issued to
	pub address: String,
	/// Issued-at, seconds since the epoch
	pub iat: i64,
}

/// Recover the signer of an EIP-191 personal-sign signature
///
/// # Errors
/// Returns Error if the signature is not 65 bytes or recovery fails
pub fn recover_personal_sign(message: &[u8], signature: &[u8]) -> Result<Address> {
	if signature.len() != 65 {
		return Err(Error::SigningFailed(format!(
			"Signature must be 65 bytes, got {}",
			signature.len()
		)));
	}

	let prefixed = format!("\x19Ethereum Signed Message:\n{}", message.len());
	let mut prefixed_message = prefixed.into_bytes();
	prefixed_message.extend_from_slice(message);
	let hash: B256 = keccak256(&prefixed_message);

	let sig = Signature::try_from(signature)
		.map_err(|e| Error::SigningFailed(format!("Invalid signature: {}", e)))?;

	sig.recover_address_from_prehash(&hash)
		.map_err(|e| Error::SigningFailed(format!("Recovery failed: {}", e)))
}

/// Owns the bearer token and its persisted copy
pub struct AuthManager {
	store: Arc<dyn KeyValueStore>,
	token: RwLock<Option<String>>,
	encoding_key: EncodingKey,
	decoding_key: DecodingKey,
	validation: Validation,
}

impl AuthManager {
	/// Create a manager and restore any persisted token
	///
	/// A storage read failure is logged and treated as "no token".
	pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
		let mut validation = Validation::new(Algorithm::HS256);
		// Sign-in tokens carry no expiry
		validation.required_spec_claims.clear();
		validation.validate_exp = false;

		let manager = Self {
			store,
			token: RwLock::new(None),
			encoding_key: EncodingKey::from_secret(BEARER_TOKEN_SECRET.as_bytes()),
			decoding_key: DecodingKey::from_secret(BEARER_TOKEN_SECRET.as_bytes()),
			validation,
		};

		if let Err(e) = manager.restore() {
			warn!(error = %e, "Failed to restore bearer token");
		}

		manager
	}

	/// Reload the token from storage into memory
	pub fn restore(&self) -> Result<Option<String>> {
		let stored = self.store.get(BEARER_TOKEN_KEY)?;
		if stored.is_some() {
			debug!("Restored bearer token from storage");
		}
		self.set_memory(stored.clone())?;
		Ok(stored)
	}

	/// Current token, if any
	pub fn token(&self) -> Option<String> {
		self.token.read().ok().and_then(|token| token.clone())
	}

	pub fn has_token(&self) -> bool {
		self.token().is_some()
	}

	/// Prompt `signer` for the sign-in signature and store the resulting token
	#[instrument(skip(self, signer))]
	pub async fn authenticate(&self, signer: &dyn WalletSigner, address: Address) -> Result<String> {
		logging::operation_start("authenticate", &address.to_string());

		let checksummed = address.to_checksum(None);
		let message = sign_in_message(&checksummed);

		let signature = match signer.sign_message(message.as_bytes()).await {
			Ok(signature) => signature,
			Err(e) => {
				logging::operation_error("authenticate", &e);
				return Err(e);
			},
		};

		let claims = SignInClaims {
			sig: hex::encode_prefixed(&signature),
			address: checksummed,
			iat: Utc::now().timestamp(),
		};
		let token = encode(&Header::default(), &claims, &self.encoding_key)?;

		self.store.set(BEARER_TOKEN_KEY, &token)?;
		self.set_memory(Some(token.clone()))?;

		logging::operation_success("authenticate", "bearer token stored");
		Ok(token)
	}

	/// Decode a token issued by this manager
	pub fn decode(&self, token: &str) -> Result<SignInClaims> {
		Ok(decode::<SignInClaims>(token, &self.decoding_key, &self.validation)?.claims)
	}

	/// Whether the held token was issued to `address` and carries its signature
	pub fn validate_for(&self, address: Address) -> bool {
		let Some(token) = self.token() else {
			return false;
		};

		match self.verify(&token, address) {
			Ok(()) => true,
			Err(e) => {
				info!(%address, error = %e, "Stored bearer token rejected");
				false
			},
		}
	}

	fn verify(&self, token: &str, address: Address) -> Result<()> {
		let claims = self.decode(token)?;

		let claimed: Address = claims
			.address
			.parse()
			.map_err(|_| Error::InvalidAddress(claims.address.clone()))?;
		if claimed != address {
			return Err(Error::Token(format!(
				"token issued to {claimed}, connected as {address}"
			)));
		}

		let signature = hex::decode(&claims.sig)
			.map_err(|e| Error::Token(format!("Invalid signature encoding: {e}")))?;
		let message = sign_in_message(&claims.address);
		let recovered = recover_personal_sign(message.as_bytes(), &signature)?;
		if recovered != address {
			return Err(Error::Token(format!(
				"signature recovers to {recovered}, expected {address}"
			)));
		}

		Ok(())
	}

	/// Drop the token from memory and storage
	pub fn invalidate(&self) -> Result<()> {
		self.set_memory(None)?;
		self.store.remove(BEARER_TOKEN_KEY)?;
		debug!("Bearer token invalidated");
		Ok(())
	}

	fn set_memory(&self, token: Option<String>) -> Result<()> {
		let mut guard = self
			.token
			.write()
			.map_err(|e| Error::StorageError(format!("Failed to acquire write lock: {e}")))?;
		*guard = token;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::core::{rpc::LocalSigner, storage::MemoryStore, storage::MockKeyValueStore};
	use mockall::predicate::eq;

	const TEST_PRIVATE_KEY: &str =
		"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
	const OTHER_PRIVATE_KEY: &str =
		"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

	async fn signer(key: &str) -> (LocalSigner, Address) {
		let signer = LocalSigner::from_private_key(key).unwrap();
		let address = signer.address().await.unwrap();
		(signer, address)
	}

	#[tokio::test]
	async fn test_authenticate_persists_token() {
		let store = Arc::new(MemoryStore::new());
		let auth = AuthManager::new(store.clone());
		let (signer, address) = signer(TEST_PRIVATE_KEY).await;

		let token = auth.authenticate(&signer, address).await.unwrap();
		assert_eq!(auth.token().as_deref(), Some(token.as_str()));
		assert_eq!(store.get(BEARER_TOKEN_KEY).unwrap(), Some(token.clone()));

		let claims = auth.decode(&token).unwrap();
		assert_eq!(claims.address, address.to_checksum(None));
		assert!(claims.sig.starts_with("0x"));
	}

	#[tokio::test]
	async fn test_token_survives_restart() {
		let store = Arc::new(MemoryStore::new());
		let (signer, address) = signer(TEST_PRIVATE_KEY).await;
		let token = AuthManager::new(store.clone())
			.authenticate(&signer, address)
			.await
			.unwrap();

		let restored = AuthManager::new(store);
		assert_eq!(restored.token(), Some(token));
		assert!(restored.validate_for(address));
	}

	#[tokio::test]
	async fn test_validate_for_rejects_other_address() {
		let auth = AuthManager::new(Arc::new(MemoryStore::new()));
		let (signer, address) = signer(TEST_PRIVATE_KEY).await;
		let (_, other) = signer_other().await;

		auth.authenticate(&signer, address).await.unwrap();
		assert!(auth.validate_for(address));
		assert!(!auth.validate_for(other));
	}

	async fn signer_other() -> (LocalSigner, Address) {
		signer(OTHER_PRIVATE_KEY).await
	}

	#[tokio::test]
	async fn test_validate_for_rejects_forged_signature() {
		let store = Arc::new(MemoryStore::new());
		let auth = AuthManager::new(store.clone());
		let (_, address) = signer(TEST_PRIVATE_KEY).await;
		let (other_signer, _) = signer_other().await;

		// Claim the address but sign with a different key
		let message = sign_in_message(&address.to_checksum(None));
		let signature = other_signer.sign_message(message.as_bytes()).await.unwrap();
		let forged = encode(
			&Header::default(),
			&SignInClaims {
				sig: hex::encode_prefixed(&signature),
				address: address.to_checksum(None),
				iat: 0,
			},
			&EncodingKey::from_secret(BEARER_TOKEN_SECRET.as_bytes()),
		)
		.unwrap();
		store.set(BEARER_TOKEN_KEY, &forged).unwrap();
		auth.restore().unwrap();

		assert!(auth.has_token());
		assert!(!auth.validate_for(address));
	}

	#[test]
	fn test_validate_for_rejects_garbage() {
		let store = Arc::new(MemoryStore::new());
		store.set(BEARER_TOKEN_KEY, "not-a-token").unwrap();
		let auth = AuthManager::new(store);
		assert!(!auth.validate_for(Address::ZERO));
	}

	#[test]
	fn test_invalidate_clears_storage() {
		let mut store = MockKeyValueStore::new();
		store
			.expect_get()
			.with(eq(BEARER_TOKEN_KEY))
			.times(1)
			.returning(|_| Ok(Some("stored".to_string())));
		store
			.expect_remove()
			.with(eq(BEARER_TOKEN_KEY))
			.times(1)
			.returning(|_| Ok(()));

		let auth = AuthManager::new(Arc::new(store));
		assert_eq!(auth.token().as_deref(), Some("stored"));

		auth.invalidate().unwrap();
		assert_eq!(auth.token(), None);
	}

	#[test]
	fn test_restore_failure_starts_empty() {
		let mut store = MockKeyValueStore::new();
		store
			.expect_get()
			.returning(|_| Err(Error::StorageError("disk gone".to_string())));

		let auth = AuthManager::new(Arc::new(store));
		assert!(!auth.has_token());
	}

	#[test]
	fn test_recover_personal_sign_rejects_short_signature() {
		assert!(recover_personal_sign(b"hello", &[0u8; 64]).is_err());
	}
}
