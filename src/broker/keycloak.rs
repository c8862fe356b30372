//! Keycloak-style OIDC broker client built on the `oauth2` crate.

// crates.io
use oauth2::{
	AuthType, ClientId, EndpointNotSet, EndpointSet, HttpClientError, RefreshToken,
	RequestTokenError, ResourceOwnerPassword, ResourceOwnerUsername, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicRequestTokenError, BasicTokenResponse},
};
// self
use crate::{
	_prelude::*,
	auth::TokenPair,
	broker::{BrokerError, BrokerFuture, IdentityBroker, PasswordRequest, RefreshRequest},
	error::{ConfigError, TransientError, TransportError},
	http::{ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type TokenClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth error codes that signal a broker-side hiccup rather than a refusal.
const TRANSIENT_OAUTH_ERRORS: [&str; 2] = ["server_error", "temporarily_unavailable"];

/// Identity broker speaking the OIDC token endpoint of a Keycloak realm.
///
/// Both grants post to `<host>/realms/<realm>/protocol/openid-connect/token` as a public client
/// (the client id travels in the form body).
#[derive(Clone, Debug)]
pub struct KeycloakBroker {
	http_client: ReqwestHttpClient,
}
impl KeycloakBroker {
	/// Creates a broker client with its own redirect-free reqwest client.
	pub fn new() -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(ReqwestHttpClient::new()?))
	}

	/// Creates a broker client that reuses the provided HTTP client.
	pub fn with_http_client(http_client: ReqwestHttpClient) -> Self {
		Self { http_client }
	}

	/// Derives the realm's token endpoint from the broker base URL.
	pub fn token_endpoint(host: &Url, realm: &str) -> Result<Url, ConfigError> {
		let mut url = host.clone();

		url.path_segments_mut()
			.map_err(|_| ConfigError::InvalidTokenEndpoint { url: host.to_string() })?
			.pop_if_empty()
			.extend(["realms", realm, "protocol", "openid-connect", "token"]);

		Ok(url)
	}

	fn client(host: &Url, realm: &str, client_id: &str) -> Result<TokenClient, ConfigError> {
		let token_url = TokenUrl::from_url(Self::token_endpoint(host, realm)?);

		Ok(BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(token_url))
	}
}
impl IdentityBroker for KeycloakBroker {
	fn refresh<'a>(&'a self, request: &'a RefreshRequest) -> BrokerFuture<'a, TokenPair> {
		Box::pin(async move {
			let client = Self::client(&request.host, &request.realm, &request.client_id)?;
			let slot = ResponseMetadataSlot::default();
			let handle = self.http_client.instrumented(slot.clone());
			let refresh_token = RefreshToken::new(request.refresh_token.expose().to_owned());

			tracing::trace!(
				realm = %request.realm,
				client_id = %request.client_id,
				"Requesting refresh grant."
			);

			let response = client
				.exchange_refresh_token(&refresh_token)
				.request_async(&handle)
				.await
				.map_err(|err| map_request_error(slot.take(), err))?;

			Ok(token_pair(&response))
		})
	}

	fn authenticate<'a>(&'a self, request: &'a PasswordRequest) -> BrokerFuture<'a, TokenPair> {
		Box::pin(async move {
			let client = Self::client(&request.host, &request.realm, &request.client_id)?;
			let slot = ResponseMetadataSlot::default();
			let handle = self.http_client.instrumented(slot.clone());
			let username = ResourceOwnerUsername::new(request.username.to_string());
			let password = ResourceOwnerPassword::new(request.password.expose().to_owned());

			tracing::trace!(
				realm = %request.realm,
				client_id = %request.client_id,
				username = %request.username,
				"Requesting password grant."
			);

			let response = client
				.exchange_password(&username, &password)
				.request_async(&handle)
				.await
				.map_err(|err| map_request_error(slot.take(), err))?;

			Ok(token_pair(&response))
		})
	}
}

fn token_pair(response: &BasicTokenResponse) -> TokenPair {
	let pair = TokenPair::new(response.access_token().secret().to_owned());

	match response.refresh_token() {
		Some(refresh) => pair.with_refresh_token(refresh.secret().to_owned()),
		None => pair,
	}
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> BrokerError {
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => {
			let error = response.error().as_ref().to_owned();
			let description =
				response.error_description().cloned().unwrap_or_else(|| error.clone());

			if TRANSIENT_OAUTH_ERRORS.contains(&error.as_str()) {
				TransientError::TokenEndpoint { message: description, status }.into()
			} else {
				BrokerError::Rejected { error, description }
			}
		},
		RequestTokenError::Request(error) => map_transport_error(status, error),
		RequestTokenError::Parse(source, _body) =>
			TransientError::TokenResponseParse { source, status }.into(),
		RequestTokenError::Other(message) =>
			TransientError::TokenEndpoint { message, status }.into(),
	}
}

fn map_transport_error(status: Option<u16>, err: HttpClientError<ReqwestError>) -> BrokerError {
	match err {
		HttpClientError::Reqwest(inner) if inner.is_timeout() => TransientError::TokenEndpoint {
			message: "request timed out".into(),
			status: status.or_else(|| inner.status().map(|code| code.as_u16())),
		}
		.into(),
		HttpClientError::Reqwest(inner) if inner.is_builder() => ConfigError::from(*inner).into(),
		HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Other(message) => TransientError::TokenEndpoint { message, status }.into(),
		_ => TransientError::TokenEndpoint { message: "HTTP client error".into(), status }.into(),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_endpoint_appends_realm_path() {
		let host = Url::parse("https://auth.example.com/auth/").expect("Host should parse.");
		let endpoint = KeycloakBroker::token_endpoint(&host, "codewind")
			.expect("HTTP hosts should yield a token endpoint.");

		assert_eq!(
			endpoint.as_str(),
			"https://auth.example.com/auth/realms/codewind/protocol/openid-connect/token"
		);

		let bare = Url::parse("https://auth.example.com").expect("Host should parse.");
		let endpoint = KeycloakBroker::token_endpoint(&bare, "my realm")
			.expect("Bare hosts should yield a token endpoint.");

		assert_eq!(
			endpoint.as_str(),
			"https://auth.example.com/realms/my%20realm/protocol/openid-connect/token"
		);
	}

	#[test]
	fn token_endpoint_rejects_opaque_urls() {
		let host = Url::parse("mailto:admin@example.com").expect("URL should parse.");

		assert!(matches!(
			KeycloakBroker::token_endpoint(&host, "codewind"),
			Err(ConfigError::InvalidTokenEndpoint { .. })
		));
	}
}
