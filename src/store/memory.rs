//! Thread-safe in-memory [`CredentialStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	store::{CredentialKey, CredentialStore, StoreFuture},
};

type SecretMap = Arc<RwLock<HashMap<CredentialKey, TokenSecret>>>;

/// Keeps secrets in-process; clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SecretMap);
impl MemoryStore {
	/// Inserts a secret synchronously, returning the store for chaining.
	pub fn seed(self, key: CredentialKey, value: impl Into<TokenSecret>) -> Self {
		self.0.write().insert(key, value.into());

		self
	}

	/// Reads a secret synchronously.
	pub fn peek(&self, key: &CredentialKey) -> Option<TokenSecret> {
		self.0.read().get(key).cloned()
	}

	/// Number of stored secrets.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Whether the store holds no secrets.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl CredentialStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, Option<TokenSecret>> {
		let found = self.0.read().get(key).filter(|secret| !secret.is_empty()).cloned();

		Box::pin(async move { Ok(found) })
	}

	fn set<'a>(&'a self, key: &'a CredentialKey, value: TokenSecret) -> StoreFuture<'a, ()> {
		let map = self.0.clone();

		Box::pin(async move {
			map.write().insert(key.clone(), value);

			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn set_overwrites_and_get_reads_back() {
		let store = MemoryStore::default();
		let key = CredentialKey::new("svc.remote", "access_token");

		assert_eq!(store.get(&key).await, Ok(None));

		store.set(&key, TokenSecret::new("first")).await.expect("First write should succeed.");
		store.set(&key, TokenSecret::new("second")).await.expect("Second write should succeed.");

		let fetched = store.get(&key).await.expect("Read should succeed.");

		assert_eq!(fetched.as_ref().map(TokenSecret::expose), Some("second"));
		assert_eq!(store.len(), 1);
	}

	#[tokio::test]
	async fn empty_entries_read_as_absent() {
		let key = CredentialKey::new("svc.remote", "refresh_token");
		let store = MemoryStore::default().seed(key.clone(), "");

		assert_eq!(store.get(&key).await, Ok(None));
		assert!(!store.is_empty());
	}

	#[test]
	fn clones_share_state() {
		let key = CredentialKey::new("svc.remote", "jane");
		let store = MemoryStore::default();
		let alias = store.clone().seed(key.clone(), "hunter2");

		assert_eq!(alias.len(), 1);
		assert_eq!(store.peek(&key).as_ref().map(TokenSecret::expose), Some("hunter2"));
	}
}
