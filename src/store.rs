//! Credential store contract and the built-in in-memory backend.
//!
//! Entries are addressed by a `(namespace, account)` pair, mirroring OS keychains: the namespace
//! is the service namespace joined with the case-folded connection identifier, and the account
//! names the secret (`access_token`, `refresh_token`, or the case-folded username for the
//! password entry).

pub mod memory;

pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{ConnectionId, TokenSecret, Username},
};

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Secret storage consulted and updated by the dispatcher.
///
/// A missing entry is `Ok(None)`, never an error.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Reads the secret stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, Option<TokenSecret>>;

	/// Creates or overwrites the secret stored under `key`.
	fn set<'a>(&'a self, key: &'a CredentialKey, value: TokenSecret) -> StoreFuture<'a, ()>;
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Stored value could not be encoded or decoded.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure (locked keychain, unreachable service, ...).
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Address of a single stored secret.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialKey {
	/// Service namespace scoped to one connection.
	pub namespace: String,
	/// Entry name inside the namespace.
	pub account: String,
}
impl CredentialKey {
	/// Account under which the access token is stored.
	pub const ACCESS_TOKEN: &str = "access_token";
	/// Account under which the refresh token is stored.
	pub const REFRESH_TOKEN: &str = "refresh_token";

	/// Builds a key from raw parts.
	pub fn new(namespace: impl Into<String>, account: impl Into<String>) -> Self {
		Self { namespace: namespace.into(), account: account.into() }
	}

	/// Key of the cached access token for `connection`.
	pub fn access_token(service: &str, connection: &ConnectionId) -> Self {
		Self::new(Self::namespace(service, connection), Self::ACCESS_TOKEN)
	}

	/// Key of the cached refresh token for `connection`.
	pub fn refresh_token(service: &str, connection: &ConnectionId) -> Self {
		Self::new(Self::namespace(service, connection), Self::REFRESH_TOKEN)
	}

	/// Key of the cached password of `username` on `connection`.
	pub fn password(service: &str, connection: &ConnectionId, username: &Username) -> Self {
		Self::new(Self::namespace(service, connection), username.account_key())
	}

	/// Namespace shared by every entry of `connection`.
	pub fn namespace(service: &str, connection: &ConnectionId) -> String {
		format!("{service}.{}", connection.account_key())
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}/{}", self.namespace, self.account)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn keys_fold_connection_and_username_case() {
		let connection = ConnectionId::new("Remote-ABC").expect("Connection should be valid.");
		let username = Username::new("Jane").expect("Username should be valid.");

		assert_eq!(
			CredentialKey::access_token("org.example.cli", &connection),
			CredentialKey::new("org.example.cli.remote-abc", "access_token"),
		);
		assert_eq!(
			CredentialKey::refresh_token("org.example.cli", &connection).account,
			"refresh_token"
		);
		assert_eq!(
			CredentialKey::password("org.example.cli", &connection, &username),
			CredentialKey::new("org.example.cli.remote-abc", "jane"),
		);
	}

	#[test]
	fn store_error_converts_into_no_password_source() {
		let store_error = StoreError::Backend { message: "keychain locked".into() };
		let err = Error::NoPassword {
			connection: "remote".into(),
			username: "jane".into(),
			source: Some(store_error.clone()),
		};
		let source = StdError::source(&err).expect("Store error should be exposed as the source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
