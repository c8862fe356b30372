//! Dispatch-level failure taxonomy plus the transport/config errors shared across layers.

// self
use crate::{
	_prelude::*,
	broker::BrokerError,
	http::StatusCode,
	store::StoreError,
	target::TargetError,
};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classified dispatch failure returned by [`Dispatcher::dispatch`](crate::dispatch::Dispatcher).
///
/// Rendering (exit codes, log lines) is left to the caller; [`Error::op`] gives a stable tag to
/// branch on.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Connection target failed validation before any store or network call.
	#[error("Connection target is invalid.")]
	BadTarget(#[from] TargetError),
	/// Transport failure with no retry path left (local fast path or the final attempt).
	#[error("Unable to contact the server: {source}")]
	NoConnection {
		/// Underlying transport failure.
		#[source]
		source: TransportError,
	},
	/// Full re-authentication needs a cached password and none is available.
	#[error("No cached password is available for user `{username}` on connection `{connection}`.")]
	NoPassword {
		/// Connection identifier.
		connection: String,
		/// Username whose password entry was looked up.
		username: String,
		/// Store failure, when the lookup errored instead of coming back empty.
		#[source]
		source: Option<StoreError>,
	},
	/// Identity broker rejected the cached credentials.
	#[error("{description}")]
	AuthFailed {
		/// Broker-supplied description, preserved verbatim.
		description: String,
		/// Underlying broker failure.
		#[source]
		source: BrokerError,
	},
	/// Every authentication method was attempted and none produced a usable response.
	#[error("No other authentication methods are left to try.")]
	AllMethodsFailed {
		/// Why the last attempted stage fell through, if any stage was attempted.
		#[source]
		last: Option<AttemptFailure>,
	},
}
impl Error {
	/// Returns the operation tag of the failure.
	pub fn op(&self) -> FailureOp {
		match self {
			Self::BadTarget(_) => FailureOp::BadTarget,
			Self::NoConnection { .. } => FailureOp::NoConnection,
			Self::NoPassword { .. } => FailureOp::NoPassword,
			Self::AuthFailed { .. } => FailureOp::AuthFailed,
			Self::AllMethodsFailed { .. } => FailureOp::AllMethodsFailed,
		}
	}
}

/// Stable operation tags attached to every [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOp {
	/// Malformed connection target.
	BadTarget,
	/// Remote endpoint could not be reached.
	NoConnection,
	/// Password entry missing from the credential store.
	NoPassword,
	/// Broker refused the credentials.
	AuthFailed,
	/// Cascade exhausted.
	AllMethodsFailed,
}
impl FailureOp {
	/// Returns a stable label suitable for log fields or exit-code tables.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::BadTarget => "bad_target",
			Self::NoConnection => "no_connection",
			Self::NoPassword => "no_password",
			Self::AuthFailed => "auth_failed",
			Self::AllMethodsFailed => "all_methods_failed",
		}
	}
}
impl Display for FailureOp {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Reason a cascade stage gave up and handed over to the next one.
#[derive(Debug, ThisError)]
pub enum AttemptFailure {
	/// The request never produced a response.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// The endpoint answered with the broker's login redirect instead of the resource.
	#[error("Endpoint redirected to the login page (HTTP {status}).")]
	LoginRedirect {
		/// Status code observed.
		status: StatusCode,
	},
	/// The identity broker could not mint a token.
	#[error(transparent)]
	Broker(#[from] BrokerError),
	/// The cached token cannot be carried in an HTTP header.
	#[error("Cached token contains characters that are not valid in an HTTP header.")]
	UnusableToken,
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Token endpoint URL could not be derived from the connection's auth server.
	#[error("Cannot derive a token endpoint from auth server URL {url}.")]
	InvalidTokenEndpoint {
		/// Auth server URL the endpoint was derived from.
		url: String,
	},
	/// Credential namespace must not be blank.
	#[error("Credential service namespace cannot be empty.")]
	EmptyNamespace,
	/// Login redirect status must be a valid HTTP status code.
	#[error("Login redirect status {status} is not a valid HTTP status code.")]
	InvalidLoginStatus {
		/// Rejected status code.
		status: u16,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error: {source}")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn failure_ops_have_stable_labels() {
		let err = Error::AllMethodsFailed { last: None };

		assert_eq!(err.op(), FailureOp::AllMethodsFailed);
		assert_eq!(err.op().to_string(), "all_methods_failed");
		assert_eq!(
			serde_json::to_string(&FailureOp::NoPassword)
				.expect("FailureOp should serialize to JSON."),
			"\"no_password\""
		);
	}

	#[test]
	fn auth_failed_displays_broker_description_verbatim() {
		let err = Error::AuthFailed {
			description: "Invalid user credentials".into(),
			source: BrokerError::Rejected {
				error: "invalid_grant".into(),
				description: "Invalid user credentials".into(),
			},
		};

		assert_eq!(err.to_string(), "Invalid user credentials");
		assert!(StdError::source(&err).is_some());
	}

	#[test]
	fn bad_target_reports_its_cause_once() {
		let err = Error::from(TargetError::MissingUsername);
		let source = StdError::source(&err).expect("Target error should be the source.");

		assert_eq!(err.op(), FailureOp::BadTarget);
		assert_eq!(err.to_string(), "Connection target is invalid.");
		assert_eq!(source.to_string(), TargetError::MissingUsername.to_string());
		assert!(!err.to_string().contains(&source.to_string()));
	}

	#[test]
	fn all_methods_failed_exposes_last_attempt() {
		let err = Error::AllMethodsFailed {
			last: Some(AttemptFailure::LoginRedirect { status: StatusCode::FOUND }),
		};
		let source = StdError::source(&err).expect("Last attempt failure should be the source.");

		assert!(source.to_string().contains("302"));
	}
}
