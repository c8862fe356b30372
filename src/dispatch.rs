//! Authenticated request dispatch.
//!
//! [`Dispatcher::dispatch`] sends a caller-prepared request to a [`ConnectionTarget`]. Local
//! targets get a single unauthenticated send. Remote targets walk the [`Stage`] cascade: the
//! cached access token first, then a refresh grant, then a full password re-authentication,
//! stopping at the first response that is not the broker's login redirect. The only credential
//! mutation is overwriting the cached tokens after a successful broker call.

mod config;
mod metrics;
mod stage;

pub use config::DispatchConfig;
pub use metrics::DispatchMetrics;
pub use stage::Stage;

// self
use crate::{
	_prelude::*,
	broker::IdentityBroker,
	error::ConfigError,
	http::{HttpRequest, HttpResponse, RequestTransport, StatusCode},
	obs::DispatchSpan,
	store::CredentialStore,
	target::ConnectionTarget,
};
#[cfg(feature = "reqwest")]
use crate::{broker::KeycloakBroker, http::ReqwestHttpClient};

/// Sends requests on behalf of a caller, attaching and renewing bearer credentials as needed.
///
/// The dispatcher holds no per-request state and can be shared across tasks. Concurrent
/// dispatches against the same connection may race on the credential store (both detecting an
/// expired token and both re-authenticating) unless
/// [`DispatchConfig::serialize_per_connection`] is enabled.
#[derive(Clone)]
pub struct Dispatcher {
	/// Transport used for every attempt.
	pub transport: Arc<dyn RequestTransport>,
	/// Credential store consulted for tokens and passwords.
	pub store: Arc<dyn CredentialStore>,
	/// Identity broker used to refresh or re-authenticate.
	pub broker: Arc<dyn IdentityBroker>,
	/// Counters for dispatches and broker calls.
	pub metrics: Arc<DispatchMetrics>,
	config: DispatchConfig,
	login_redirect: StatusCode,
	connection_guards: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}
impl Dispatcher {
	/// Creates a dispatcher from its three collaborators.
	pub fn new(
		transport: Arc<dyn RequestTransport>,
		store: Arc<dyn CredentialStore>,
		broker: Arc<dyn IdentityBroker>,
		config: DispatchConfig,
	) -> Result<Self, ConfigError> {
		let login_redirect = config.validate()?;

		Ok(Self {
			transport,
			store,
			broker,
			metrics: Default::default(),
			config,
			login_redirect,
			connection_guards: Default::default(),
		})
	}

	/// Returns the active configuration.
	pub fn config(&self) -> &DispatchConfig {
		&self.config
	}

	/// Sends `request` to `target`, escalating through the authentication cascade as needed.
	///
	/// `request` must already carry its method, URL, and body; only the `Authorization` and
	/// `Cache-Control` headers of each attempt are rewritten. The caller's request is never
	/// mutated.
	pub async fn dispatch(
		&self,
		request: &HttpRequest,
		target: &ConnectionTarget,
	) -> Result<HttpResponse> {
		let span = DispatchSpan::new(target);

		self.metrics.record_attempt();

		let result: Result<HttpResponse> = span
			.instrument(async {
				target.validate()?;

				tracing::trace!(
					method = %request.method(),
					uri = %request.uri(),
					"Dispatching request."
				);

				let guard = (self.config.serialize_per_connection && !target.is_local())
					.then(|| self.connection_guard(target));
				let _serialized = match &guard {
					Some(guard) => Some(guard.lock().await),
					None => None,
				};

				stage::Cascade::new(self, request, target, &span).run().await
			})
			.await;

		match &result {
			Ok(_) => self.metrics.record_success(),
			Err(_) => self.metrics.record_failure(),
		}

		result
	}

	fn connection_guard(&self, target: &ConnectionTarget) -> Arc<AsyncMutex<()>> {
		let mut guards = self.connection_guards.lock();

		guards.entry(target.id.account_key()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
#[cfg(feature = "reqwest")]
impl Dispatcher {
	/// Creates a dispatcher that talks HTTP through reqwest and authenticates against a
	/// Keycloak-style broker, sharing one redirect-free client between both.
	pub fn with_reqwest(
		store: Arc<dyn CredentialStore>,
		config: DispatchConfig,
	) -> Result<Self, ConfigError> {
		let http_client = ReqwestHttpClient::new()?;
		let broker = KeycloakBroker::with_http_client(http_client.clone());

		Self::new(Arc::new(http_client), store, Arc::new(broker), config)
	}
}
impl Debug for Dispatcher {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("config", &self.config)
			.field("login_redirect", &self.login_redirect)
			.finish()
	}
}
