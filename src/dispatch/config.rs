// self
use crate::{_prelude::*, error::ConfigError, http::StatusCode};

/// Tunables for a [`Dispatcher`](crate::dispatch::Dispatcher).
///
/// Deserializable so hosts can load it from their own configuration files; missing fields fall
/// back to [`DispatchConfig::default`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
	/// Prefix of every credential store namespace (`<service_namespace>.<connection>`).
	pub service_namespace: String,
	/// Status the protected endpoint answers with when it rejects a token.
	///
	/// Keycloak-fronted endpoints redirect to an HTML login page (`302 Found`) instead of
	/// answering `401 Unauthorized`.
	pub login_redirect_status: u16,
	/// Serializes dispatches that target the same connection.
	pub serialize_per_connection: bool,
}
impl DispatchConfig {
	/// Namespace used when none is configured.
	pub const DEFAULT_SERVICE_NAMESPACE: &str = "oauth2-dispatch";
	/// Status treated as "token rejected" when none is configured.
	pub const DEFAULT_LOGIN_REDIRECT_STATUS: u16 = 302;

	/// Creates a config for the provided credential namespace.
	pub fn new(service_namespace: impl Into<String>) -> Self {
		Self { service_namespace: service_namespace.into(), ..Default::default() }
	}

	/// Overrides the status treated as a login redirect.
	pub fn with_login_redirect_status(mut self, status: u16) -> Self {
		self.login_redirect_status = status;

		self
	}

	/// Enables or disables per-connection serialization.
	pub fn with_connection_serialization(mut self, enabled: bool) -> Self {
		self.serialize_per_connection = enabled;

		self
	}

	/// Validates the config, returning the parsed login redirect status.
	pub fn validate(&self) -> Result<StatusCode, ConfigError> {
		if self.service_namespace.trim().is_empty() {
			return Err(ConfigError::EmptyNamespace);
		}

		StatusCode::from_u16(self.login_redirect_status)
			.map_err(|_| ConfigError::InvalidLoginStatus { status: self.login_redirect_status })
	}
}
impl Default for DispatchConfig {
	fn default() -> Self {
		Self {
			service_namespace: Self::DEFAULT_SERVICE_NAMESPACE.into(),
			login_redirect_status: Self::DEFAULT_LOGIN_REDIRECT_STATUS,
			serialize_per_connection: false,
		}
	}
}
