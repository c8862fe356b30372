#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use oauth2_dispatch::{
	auth::{ConnectionId, TokenSecret, Username},
	broker::{BrokerError, IdentityBroker, KeycloakBroker, PasswordRequest, RefreshRequest},
	target::ConnectionTarget,
	url::Url,
};

const TOKEN_PATH: &str = "/realms/codewind/protocol/openid-connect/token";

fn target(server: &MockServer) -> ConnectionTarget {
	ConnectionTarget::builder(ConnectionId::new("remote-1").expect("Connection id should be valid."))
		.auth_url(Url::parse(&server.base_url()).expect("Mock server URL should parse."))
		.realm("codewind")
		.client_id("codewind-cli")
		.username(Username::new("developer").expect("Username should be valid."))
		.build()
		.expect("Target fixture should build.")
}

fn broker() -> KeycloakBroker {
	KeycloakBroker::new().expect("Broker HTTP client should build.")
}

#[tokio::test]
async fn refresh_grant_returns_rotated_tokens() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header("content-type", "application/x-www-form-urlencoded");
			then.status(200)
				.header("content-type", "application/json")
				.body(
					"{\"access_token\":\"access-new\",\"refresh_token\":\"refresh-new\",\"token_type\":\"bearer\",\"expires_in\":300}",
				);
		})
		.await;
	let request = RefreshRequest::for_target(&target(&server), TokenSecret::new("refresh-old"))
		.expect("Refresh request should build.");
	let tokens = broker().refresh(&request).await.expect("Refresh grant should succeed.");

	mock.assert_async().await;

	assert_eq!(tokens.access_token.expose(), "access-new");
	assert_eq!(tokens.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-new"));
}

#[tokio::test]
async fn password_grant_tolerates_missing_refresh_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"access-only\",\"token_type\":\"bearer\"}");
		})
		.await;
	let request = PasswordRequest::for_target(&target(&server), TokenSecret::new("hunter2"))
		.expect("Password request should build.");
	let tokens = broker().authenticate(&request).await.expect("Password grant should succeed.");

	mock.assert_async().await;

	assert_eq!(tokens.access_token.expose(), "access-only");
	assert!(tokens.refresh_token.is_none());
}

#[tokio::test]
async fn rejected_password_grant_keeps_broker_description() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(401).header("content-type", "application/json").body(
				"{\"error\":\"invalid_grant\",\"error_description\":\"Invalid user credentials\"}",
			);
		})
		.await;

	let request = PasswordRequest::for_target(&target(&server), TokenSecret::new("wrong"))
		.expect("Password request should build.");
	let err = broker()
		.authenticate(&request)
		.await
		.expect_err("Invalid credentials should be rejected.");

	assert!(matches!(err, BrokerError::Rejected { ref error, .. } if error == "invalid_grant"));
	assert_eq!(err.description(), "Invalid user credentials");
}

#[tokio::test]
async fn server_errors_are_transient() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(503)
				.header("content-type", "application/json")
				.body("{\"error\":\"temporarily_unavailable\"}");
		})
		.await;

	let request = RefreshRequest::for_target(&target(&server), TokenSecret::new("refresh"))
		.expect("Refresh request should build.");
	let err = broker().refresh(&request).await.expect_err("Unavailable broker should fail.");

	assert!(matches!(err, BrokerError::Transient(_)));
}
