//! Bearer-authenticated request dispatch for endpoints guarded by an OIDC identity broker.
//!
//! [`Dispatcher`](dispatch::Dispatcher) sends a caller-prepared request and walks a fixed cascade
//! of credential strategies (cached access token, refresh grant, full password re-authentication)
//! until one of them yields a usable response. Local endpoints bypass the cascade entirely.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod broker;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod obs;
pub mod store;
pub mod target;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and scripted collaborators for tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		auth::{TokenPair, TokenSecret},
		broker::{BrokerError, BrokerFuture, IdentityBroker, PasswordRequest, RefreshRequest},
		error::TransportError,
		http::{HttpRequest, HttpResponse, RequestTransport, StatusCode, TransportFuture},
		store::{CredentialKey, CredentialStore, MemoryStore, StoreError, StoreFuture},
	};

	/// Scripted reply handed out by [`ScriptedTransport`].
	#[derive(Debug)]
	pub enum TransportReply {
		/// Respond with the provided status and an empty body.
		Status(u16),
		/// Fail at the transport layer with the provided message.
		Refused(&'static str),
	}

	/// Transport that replays queued replies and records every request it receives.
	#[derive(Debug, Default)]
	pub struct ScriptedTransport {
		replies: Mutex<VecDeque<TransportReply>>,
		requests: Mutex<Vec<HttpRequest>>,
	}
	impl ScriptedTransport {
		/// Builds a transport that answers with `replies` in order.
		pub fn new(replies: impl IntoIterator<Item = TransportReply>) -> Self {
			Self { replies: Mutex::new(replies.into_iter().collect()), requests: Default::default() }
		}

		/// Number of requests sent so far.
		pub fn calls(&self) -> usize {
			self.requests.lock().len()
		}

		/// `Authorization` header values observed per request, in order.
		pub fn authorizations(&self) -> Vec<Option<String>> {
			self.requests
				.lock()
				.iter()
				.map(|request| {
					request
						.headers()
						.get(crate::http::header::AUTHORIZATION)
						.and_then(|value| value.to_str().ok())
						.map(str::to_owned)
				})
				.collect()
		}

		/// Snapshot of the recorded requests.
		pub fn requests(&self) -> Vec<HttpRequest> {
			self.requests.lock().iter().map(crate::http::clone_request).collect()
		}
	}
	impl RequestTransport for ScriptedTransport {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_> {
			self.requests.lock().push(request);

			let reply = self.replies.lock().pop_front().unwrap_or(TransportReply::Status(200));

			Box::pin(async move {
				match reply {
					TransportReply::Status(code) => {
						let mut response = HttpResponse::new(Vec::new());

						*response.status_mut() = StatusCode::from_u16(code)
							.expect("Scripted status codes must be valid HTTP statuses.");

						Ok(response)
					},
					TransportReply::Refused(message) => Err(TransportError::network(
						std::io::Error::new(std::io::ErrorKind::ConnectionRefused, message),
					)),
				}
			})
		}
	}

	/// Identity broker that replays queued outcomes for each grant.
	#[derive(Debug, Default)]
	pub struct ScriptedBroker {
		refreshes: Mutex<VecDeque<Result<TokenPair, BrokerError>>>,
		logins: Mutex<VecDeque<Result<TokenPair, BrokerError>>>,
		refresh_calls: Mutex<Vec<RefreshRequest>>,
		login_calls: Mutex<Vec<PasswordRequest>>,
	}
	impl ScriptedBroker {
		/// Queues the outcome of the next refresh grant.
		pub fn on_refresh(self, outcome: Result<TokenPair, BrokerError>) -> Self {
			self.refreshes.lock().push_back(outcome);

			self
		}

		/// Queues the outcome of the next password grant.
		pub fn on_authenticate(self, outcome: Result<TokenPair, BrokerError>) -> Self {
			self.logins.lock().push_back(outcome);

			self
		}

		/// Number of refresh grants requested.
		pub fn refresh_calls(&self) -> usize {
			self.refresh_calls.lock().len()
		}

		/// Number of password grants requested.
		pub fn authenticate_calls(&self) -> usize {
			self.login_calls.lock().len()
		}

		/// Password grant parameters observed so far.
		pub fn password_requests(&self) -> Vec<PasswordRequest> {
			self.login_calls.lock().clone()
		}
	}
	impl IdentityBroker for ScriptedBroker {
		fn refresh<'a>(&'a self, request: &'a RefreshRequest) -> BrokerFuture<'a, TokenPair> {
			self.refresh_calls.lock().push(request.clone());

			let outcome = self.refreshes.lock().pop_front().unwrap_or_else(|| {
				Err(BrokerError::Rejected {
					error: "invalid_grant".into(),
					description: "No scripted refresh outcome.".into(),
				})
			});

			Box::pin(async move { outcome })
		}

		fn authenticate<'a>(&'a self, request: &'a PasswordRequest) -> BrokerFuture<'a, TokenPair> {
			self.login_calls.lock().push(request.clone());

			let outcome = self.logins.lock().pop_front().unwrap_or_else(|| {
				Err(BrokerError::Rejected {
					error: "invalid_grant".into(),
					description: "No scripted authentication outcome.".into(),
				})
			});

			Box::pin(async move { outcome })
		}
	}

	/// [`MemoryStore`] wrapper that counts reads and writes and can be told to fail.
	#[derive(Debug, Default)]
	pub struct RecordingStore {
		/// Backing store.
		pub inner: MemoryStore,
		writes: Mutex<Vec<CredentialKey>>,
		reads: Mutex<usize>,
		fail_writes: bool,
	}
	impl RecordingStore {
		/// Wraps an existing memory store.
		pub fn new(inner: MemoryStore) -> Self {
			Self { inner, ..Default::default() }
		}

		/// Makes every subsequent write fail with a backend error.
		pub fn failing_writes(mut self) -> Self {
			self.fail_writes = true;

			self
		}

		/// Keys written so far, in order.
		pub fn writes(&self) -> Vec<CredentialKey> {
			self.writes.lock().clone()
		}

		/// Number of lookups performed.
		pub fn reads(&self) -> usize {
			*self.reads.lock()
		}
	}
	impl CredentialStore for RecordingStore {
		fn get<'a>(&'a self, key: &'a CredentialKey) -> StoreFuture<'a, Option<TokenSecret>> {
			*self.reads.lock() += 1;

			self.inner.get(key)
		}

		fn set<'a>(&'a self, key: &'a CredentialKey, value: TokenSecret) -> StoreFuture<'a, ()> {
			self.writes.lock().push(key.clone());

			if self.fail_writes {
				return Box::pin(async {
					Err(StoreError::Backend { message: "keychain is locked".into() })
				});
			}

			self.inner.set(key, value)
		}
	}

	/// Convenience constructor for a token pair with a refresh token.
	pub fn token_pair(access: &str, refresh: &str) -> TokenPair {
		TokenPair::new(access).with_refresh_token(refresh)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
