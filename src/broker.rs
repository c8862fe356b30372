//! Identity broker contract used to mint new tokens.
//!
//! The dispatcher only needs two grants: exchanging a refresh token, and a full
//! username/password authentication. Both are network calls whose timeout and retry policy
//! belong to the implementation; the dispatcher only distinguishes success from failure.

#[cfg(feature = "reqwest")] mod keycloak;

#[cfg(feature = "reqwest")] pub use keycloak::KeycloakBroker;

// self
use crate::{
	_prelude::*,
	auth::{ConnectionId, TokenPair, TokenSecret, Username},
	error::{ConfigError, TransientError, TransportError},
	target::{ConnectionTarget, TargetError},
};

/// Boxed future returned by [`IdentityBroker`] operations.
pub type BrokerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BrokerError>> + 'a + Send>>;

/// Client for the identity broker guarding remote connections.
pub trait IdentityBroker
where
	Self: Send + Sync,
{
	/// Exchanges a refresh token for new tokens.
	fn refresh<'a>(&'a self, request: &'a RefreshRequest) -> BrokerFuture<'a, TokenPair>;

	/// Authenticates with username and password.
	fn authenticate<'a>(&'a self, request: &'a PasswordRequest) -> BrokerFuture<'a, TokenPair>;
}

/// Parameters of a refresh grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshRequest {
	/// Identity broker base URL.
	pub host: Url,
	/// Realm the tokens belong to.
	pub realm: String,
	/// OAuth client identifier.
	pub client_id: String,
	/// Refresh token to exchange.
	pub refresh_token: TokenSecret,
}
impl RefreshRequest {
	/// Collects the refresh parameters for `target`.
	pub fn for_target(
		target: &ConnectionTarget,
		refresh_token: TokenSecret,
	) -> Result<Self, TargetError> {
		Ok(Self {
			host: target.auth_url.clone().ok_or(TargetError::MissingAuthUrl)?,
			realm: target.realm.clone(),
			client_id: target.client_id.clone(),
			refresh_token,
		})
	}
}

/// Parameters of a username/password grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordRequest {
	/// Identity broker base URL.
	pub host: Url,
	/// Realm the user belongs to.
	pub realm: String,
	/// Account name.
	pub username: Username,
	/// Account password.
	pub password: TokenSecret,
	/// OAuth client identifier.
	pub client_id: String,
	/// Connection the credentials belong to.
	pub connection_id: ConnectionId,
}
impl PasswordRequest {
	/// Collects the password grant parameters for `target`.
	pub fn for_target(target: &ConnectionTarget, password: TokenSecret) -> Result<Self, TargetError> {
		Ok(Self {
			host: target.auth_url.clone().ok_or(TargetError::MissingAuthUrl)?,
			realm: target.realm.clone(),
			username: target.username.clone().ok_or(TargetError::MissingUsername)?,
			password,
			client_id: target.client_id.clone(),
			connection_id: target.id.clone(),
		})
	}
}

/// Failures reported by an [`IdentityBroker`].
#[derive(Debug, ThisError)]
pub enum BrokerError {
	/// The broker refused the grant (bad password, expired refresh token, unknown client, ...).
	#[error("{description}")]
	Rejected {
		/// OAuth error code.
		error: String,
		/// Broker-supplied description, or the error code when none was given.
		description: String,
	},
	/// Temporary broker failure.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Broker could not be reached.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Request could not be built.
	#[error(transparent)]
	Config(#[from] ConfigError),
}
impl BrokerError {
	/// Human-readable description; for rejections this is the broker's own text.
	pub fn description(&self) -> String {
		match self {
			Self::Rejected { description, .. } => description.clone(),
			other => other.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn target() -> ConnectionTarget {
		ConnectionTarget::builder(ConnectionId::new("remote").expect("Id should be valid."))
			.auth_url(Url::parse("https://auth.example.com").expect("URL should parse."))
			.realm("codewind")
			.client_id("codewind-cli")
			.username(Username::new("dev").expect("Username should be valid."))
			.build()
			.expect("Target fixture should build.")
	}

	#[test]
	fn password_request_carries_target_details() {
		let request = PasswordRequest::for_target(&target(), TokenSecret::new("pw"))
			.expect("Complete targets should produce a password request.");

		assert_eq!(request.host.as_str(), "https://auth.example.com/");
		assert_eq!(request.realm, "codewind");
		assert_eq!(request.client_id, "codewind-cli");
		assert_eq!(request.username.as_ref(), "dev");
		assert_eq!(request.connection_id.as_ref(), "remote");
		assert!(!format!("{request:?}").contains("\"pw\""));
	}

	#[test]
	fn refresh_request_requires_auth_url() {
		let mut target = target();

		target.auth_url = None;

		assert_eq!(
			RefreshRequest::for_target(&target, TokenSecret::new("rt")),
			Err(TargetError::MissingAuthUrl)
		);
	}

	#[test]
	fn description_prefers_broker_text() {
		let rejected = BrokerError::Rejected {
			error: "invalid_grant".into(),
			description: "Invalid user credentials".into(),
		};
		let transient = BrokerError::from(TransientError::TokenEndpoint {
			message: "bad gateway".into(),
			status: Some(502),
		});

		assert_eq!(rejected.description(), "Invalid user credentials");
		assert!(transient.description().contains("bad gateway"));
	}
}
