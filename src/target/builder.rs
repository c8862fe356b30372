// self
use crate::{
	_prelude::*,
	auth::{ConnectionId, Username},
	target::ConnectionTarget,
};

/// Reasons a connection target cannot be dispatched against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum TargetError {
	/// Remote targets need an identity broker URL.
	#[error("Remote connection has no auth server URL.")]
	MissingAuthUrl,
	/// The identity broker URL is not an absolute http(s) URL.
	#[error("Auth server URL must be an absolute http(s) URL: {url}.")]
	UnsupportedAuthScheme {
		/// Offending URL.
		url: String,
	},
	/// A required field is blank.
	#[error("Remote connection has a blank {field}.")]
	Blank {
		/// Field name.
		field: &'static str,
	},
	/// Remote targets need a username for re-authentication.
	#[error("Remote connection has no username.")]
	MissingUsername,
}

/// Builder for [`ConnectionTarget`] values.
#[derive(Debug)]
pub struct ConnectionTargetBuilder {
	id: ConnectionId,
	local: bool,
	auth_url: Option<Url>,
	realm: String,
	client_id: String,
	username: Option<Username>,
	label: Option<String>,
}
impl ConnectionTargetBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ConnectionId) -> Self {
		Self {
			id,
			local: false,
			auth_url: None,
			realm: String::new(),
			client_id: String::new(),
			username: None,
			label: None,
		}
	}

	/// Marks the target as the unauthenticated local endpoint.
	pub fn local(mut self, local: bool) -> Self {
		self.local = local;

		self
	}

	/// Sets the identity broker base URL.
	pub fn auth_url(mut self, url: Url) -> Self {
		self.auth_url = Some(url);

		self
	}

	/// Sets the broker realm.
	pub fn realm(mut self, realm: impl Into<String>) -> Self {
		self.realm = realm.into();

		self
	}

	/// Sets the OAuth client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = client_id.into();

		self
	}

	/// Sets the account used for password re-authentication.
	pub fn username(mut self, username: Username) -> Self {
		self.username = Some(username);

		self
	}

	/// Sets a human-readable label (defaults to the identifier).
	pub fn label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());

		self
	}

	/// Validates and returns the target.
	pub fn build(self) -> Result<ConnectionTarget, TargetError> {
		let local = self.local || self.id.is_local();
		let label = self.label.unwrap_or_else(|| self.id.to_string());
		let target = ConnectionTarget {
			id: self.id,
			local,
			auth_url: self.auth_url,
			realm: self.realm,
			client_id: self.client_id,
			username: self.username,
			label,
		};

		target.validate()?;

		Ok(target)
	}
}
