//! Connection targets describing which endpoint a request goes to and how it authenticates.

mod builder;

pub use builder::*;

// self
use crate::{
	_prelude::*,
	auth::{ConnectionId, Username},
};

/// Immutable description of a remote authenticated endpoint, or of the local exception.
///
/// Targets are owned by the caller and borrowed for the duration of a dispatch. Use
/// [`ConnectionTarget::builder`] for remote endpoints and [`ConnectionTarget::local`] for the
/// unauthenticated local one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
	/// Opaque connection identifier; also keys the credential store.
	pub id: ConnectionId,
	/// Local endpoints are contacted without credentials.
	pub local: bool,
	/// Base URL of the identity broker.
	pub auth_url: Option<Url>,
	/// Broker realm the user belongs to.
	pub realm: String,
	/// OAuth client identifier registered with the broker.
	pub client_id: String,
	/// Account used for password re-authentication.
	pub username: Option<Username>,
	/// Human-readable label.
	pub label: String,
}
impl ConnectionTarget {
	/// Starts building a target for the provided connection identifier.
	pub fn builder(id: ConnectionId) -> ConnectionTargetBuilder {
		ConnectionTargetBuilder::new(id)
	}

	/// Target for the unauthenticated local endpoint.
	pub fn local() -> Self {
		Self {
			id: ConnectionId::local(),
			local: true,
			auth_url: None,
			realm: String::new(),
			client_id: String::new(),
			username: None,
			label: "Local".into(),
		}
	}

	/// Whether the fast path applies (explicit flag or the reserved `local` identifier).
	pub fn is_local(&self) -> bool {
		self.local || self.id.is_local()
	}

	/// Checks that a remote target carries everything the authentication cascade needs.
	///
	/// Local targets are always valid.
	pub fn validate(&self) -> Result<(), TargetError> {
		if self.is_local() {
			return Ok(());
		}

		let auth_url = self.auth_url.as_ref().ok_or(TargetError::MissingAuthUrl)?;

		if !matches!(auth_url.scheme(), "http" | "https") {
			return Err(TargetError::UnsupportedAuthScheme { url: auth_url.to_string() });
		}
		if self.realm.trim().is_empty() {
			return Err(TargetError::Blank { field: "realm" });
		}
		if self.client_id.trim().is_empty() {
			return Err(TargetError::Blank { field: "client_id" });
		}
		if self.username.is_none() {
			return Err(TargetError::MissingUsername);
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn remote() -> ConnectionTargetBuilder {
		ConnectionTarget::builder(ConnectionId::new("remote-1").expect("Id should be valid."))
			.auth_url(Url::parse("https://auth.example.com").expect("Auth URL should parse."))
			.realm("codewind")
			.client_id("codewind-cli")
			.username(Username::new("developer").expect("Username should be valid."))
	}

	#[test]
	fn local_targets_skip_validation() {
		let target = ConnectionTarget::local();

		assert!(target.is_local());
		assert_eq!(target.validate(), Ok(()));
	}

	#[test]
	fn reserved_local_id_implies_local_flag() {
		let target = ConnectionTarget::builder(
			ConnectionId::new("Local").expect("Local id should be valid."),
		)
		.build()
		.expect("Local targets need no auth details.");

		assert!(target.is_local());
	}

	#[test]
	fn remote_targets_require_auth_details() {
		let target = remote().build().expect("Complete remote target should build.");

		assert!(!target.is_local());
		assert_eq!(target.label, "remote-1");

		let mut missing_url = target.clone();

		missing_url.auth_url = None;

		assert_eq!(missing_url.validate(), Err(TargetError::MissingAuthUrl));

		let mut blank_realm = target.clone();

		blank_realm.realm = "  ".into();

		assert_eq!(blank_realm.validate(), Err(TargetError::Blank { field: "realm" }));

		let mut no_user = target;

		no_user.username = None;

		assert_eq!(no_user.validate(), Err(TargetError::MissingUsername));
	}

	#[test]
	fn non_http_auth_urls_are_rejected() {
		let err = remote()
			.auth_url(Url::parse("ftp://auth.example.com").expect("URL should parse."))
			.build()
			.expect_err("Non-HTTP auth servers should be rejected.");

		assert!(matches!(err, TargetError::UnsupportedAuthScheme { .. }));

		let err = remote()
			.auth_url(Url::parse("mailto:admin@example.com").expect("URL should parse."))
			.build()
			.expect_err("Opaque auth server URLs should be rejected.");

		assert_eq!(
			err,
			TargetError::UnsupportedAuthScheme { url: "mailto:admin@example.com".into() }
		);
	}
}
