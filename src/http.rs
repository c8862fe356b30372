//! Transport primitives for dispatched requests and broker token exchanges.
//!
//! [`RequestTransport`] is the dispatcher's only dependency on an HTTP stack. Requests and
//! responses use the `http` crate types re-exported by `oauth2`, so callers can build them without
//! committing to a particular client. With the `reqwest` feature, [`ReqwestHttpClient`] implements
//! the trait and also backs the `oauth2` token calls made by
//! [`KeycloakBroker`](crate::broker::KeycloakBroker).

pub use oauth2::{
	HttpRequest, HttpResponse,
	http::{HeaderValue, Method, StatusCode, header},
};

// crates.io
#[cfg(feature = "reqwest")] use oauth2::{AsyncHttpClient, HttpClientError};
use oauth2::http::header::{AUTHORIZATION, CACHE_CONTROL};
#[cfg(feature = "reqwest")] use reqwest::redirect::Policy;
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{AttemptFailure, TransportError},
};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Boxed future returned by [`RequestTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Sends exactly one prepared request.
///
/// Implementations must not follow redirects: the broker's login redirect is how the dispatcher
/// learns that a token was rejected. Timeouts belong to the implementation.
pub trait RequestTransport
where
	Self: Send + Sync,
{
	/// Sends `request` and resolves to the response or a transport-level failure.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_>;
}

/// Captures metadata from the most recent token endpoint response for error mapping.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code returned by the token endpoint, if available.
	pub status: Option<u16>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and error layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Copies method, URI, version, headers, and body of `request`.
pub(crate) fn clone_request(request: &HttpRequest) -> HttpRequest {
	let mut copy = HttpRequest::new(request.body().clone());

	*copy.method_mut() = request.method().clone();
	*copy.uri_mut() = request.uri().clone();
	*copy.version_mut() = request.version();
	*copy.headers_mut() = request.headers().clone();

	copy
}

/// Builds one attempt from the caller's request.
///
/// Any `Authorization`/`Cache-Control` headers are dropped first so nothing from an earlier
/// attempt (or the caller) survives; when `token` is present a bearer header and a single
/// `cache-control: no-cache` header are added.
pub(crate) fn prepare_attempt(
	request: &HttpRequest,
	token: Option<&TokenSecret>,
) -> Result<HttpRequest, AttemptFailure> {
	let mut attempt = clone_request(request);
	let headers = attempt.headers_mut();

	headers.remove(AUTHORIZATION);
	headers.remove(CACHE_CONTROL);

	if let Some(token) = token {
		let mut bearer = HeaderValue::try_from(format!("bearer {}", token.expose()))
			.map_err(|_| AttemptFailure::UnusableToken)?;

		bearer.set_sensitive(true);
		headers.insert(AUTHORIZATION, bearer);
		headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
	}

	Ok(attempt)
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The wrapped client must not follow redirects; [`ReqwestHttpClient::new`] configures that.
/// Callers handing in their own client via [`ReqwestHttpClient::with_client`] must do the same.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client that surfaces redirects instead of following them.
	pub fn new() -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds an instrumented `oauth2` HTTP handle that captures response metadata.
	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle(Arc::new(InstrumentedHttpClient { client: self.0.clone(), slot }))
	}

	async fn execute(
		client: &ReqwestClient,
		request: HttpRequest,
	) -> Result<HttpResponse, ReqwestError> {
		let response = client.execute(request.try_into()?).await?;
		let status = response.status();
		let version = response.version();
		let headers = response.headers().to_owned();
		let mut converted = HttpResponse::new(response.bytes().await?.to_vec());

		*converted.status_mut() = status;
		*converted.version_mut() = version;
		*converted.headers_mut() = headers;

		Ok(converted)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl RequestTransport for ReqwestHttpClient {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move { Self::execute(&self.0, request).await.map_err(TransportError::from) })
	}
}

#[cfg(feature = "reqwest")]
pub(crate) struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// `oauth2` HTTP handle that records the token endpoint's status before handing back the body.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let inner = Arc::clone(&self.0);

		Box::pin(async move {
			inner.slot.take();

			let response = inner
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();

			inner.slot.store(ResponseMetadata { status: Some(status.as_u16()) });

			let mut converted =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*converted.status_mut() = status;
			*converted.headers_mut() = headers;

			Ok(converted)
		})
	}
}
