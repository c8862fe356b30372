//! Authentication cascade driven one stage at a time.
//!
//! | Stage           | Entered when                 | Falls through on                      |
//! |-----------------|------------------------------|---------------------------------------|
//! | `LocalFastPath` | target is local              | never (transport error is terminal)   |
//! | `CachedAccess`  | target is remote             | no token, transport error, login page |
//! | `RefreshFlow`   | previous stage fell through  | no token, broker error, send failure  |
//! | `FullReauth`    | previous stage fell through  | login page on the final send          |
//! | `Exhausted`     | previous stage fell through  | terminal                              |

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	broker::{PasswordRequest, RefreshRequest},
	dispatch::Dispatcher,
	error::AttemptFailure,
	http::{self, HttpRequest, HttpResponse},
	obs::{self, DispatchSpan, StageOutcome},
	store::{CredentialKey, StoreError},
	target::{ConnectionTarget, TargetError},
};

/// States of the authentication cascade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Unauthenticated send to a local endpoint.
	LocalFastPath,
	/// Send with the cached access token.
	CachedAccess,
	/// Exchange the cached refresh token, then send.
	RefreshFlow,
	/// Authenticate with the cached password, then send.
	FullReauth,
	/// Nothing left to try.
	Exhausted,
}
impl Stage {
	/// First stage for `target`.
	pub fn entry(target: &ConnectionTarget) -> Self {
		if target.is_local() { Self::LocalFastPath } else { Self::CachedAccess }
	}

	/// Stage that takes over when this one falls through.
	pub const fn next(self) -> Self {
		match self {
			Self::CachedAccess => Self::RefreshFlow,
			Self::RefreshFlow => Self::FullReauth,
			Self::LocalFastPath | Self::FullReauth | Self::Exhausted => Self::Exhausted,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::LocalFastPath => "local_fast_path",
			Self::CachedAccess => "cached_access",
			Self::RefreshFlow => "refresh_flow",
			Self::FullReauth => "full_reauth",
			Self::Exhausted => "exhausted",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

enum Step {
	Respond(HttpResponse),
	Advance,
	Fail(Error),
}

/// Per-dispatch state: borrowed inputs plus the failure that made the last stage fall through.
pub(crate) struct Cascade<'a> {
	dispatcher: &'a Dispatcher,
	request: &'a HttpRequest,
	target: &'a ConnectionTarget,
	span: &'a DispatchSpan,
	last: Option<AttemptFailure>,
}
impl<'a> Cascade<'a> {
	pub(crate) fn new(
		dispatcher: &'a Dispatcher,
		request: &'a HttpRequest,
		target: &'a ConnectionTarget,
		span: &'a DispatchSpan,
	) -> Self {
		Self { dispatcher, request, target, span, last: None }
	}

	pub(crate) async fn run(mut self) -> Result<HttpResponse> {
		let mut stage = Stage::entry(self.target);

		loop {
			self.span.record_stage(stage);
			obs::record_stage_outcome(stage, StageOutcome::Attempt);

			let step = match stage {
				Stage::LocalFastPath => self.local_fast_path().await,
				Stage::CachedAccess => self.cached_access().await,
				Stage::RefreshFlow => self.refresh_flow().await,
				Stage::FullReauth => self.full_reauth().await,
				Stage::Exhausted => Step::Fail(Error::AllMethodsFailed { last: self.last.take() }),
			};

			match step {
				Step::Respond(response) => {
					obs::record_stage_outcome(stage, StageOutcome::Success);
					tracing::trace!(%stage, status = %response.status(), "Dispatch succeeded.");

					return Ok(response);
				},
				Step::Advance => {
					obs::record_stage_outcome(stage, StageOutcome::Fallthrough);
					tracing::trace!(from = %stage, to = %stage.next(), "Falling through.");

					stage = stage.next();
				},
				Step::Fail(err) => {
					obs::record_stage_outcome(stage, StageOutcome::Failure);
					tracing::trace!(%stage, op = %err.op(), error = %err, "Dispatch failed.");

					return Err(err);
				},
			}
		}
	}

	async fn local_fast_path(&mut self) -> Step {
		match self.send(None).await {
			Ok(response) => Step::Respond(response),
			Err(AttemptFailure::Transport(source)) => Step::Fail(Error::NoConnection { source }),
			Err(other) => Step::Fail(Error::AllMethodsFailed { last: Some(other) }),
		}
	}

	async fn cached_access(&mut self) -> Step {
		let key = CredentialKey::access_token(self.namespace(), &self.target.id);
		let Some(token) = self.lookup(&key).await else {
			tracing::trace!("Access token not found in the credential store.");

			return Step::Advance;
		};

		self.send_authorized(&token).await
	}

	async fn refresh_flow(&mut self) -> Step {
		let key = CredentialKey::refresh_token(self.namespace(), &self.target.id);
		let Some(refresh_token) = self.lookup(&key).await else {
			tracing::trace!("Refresh token not found in the credential store.");

			return Step::Advance;
		};
		let request = match RefreshRequest::for_target(self.target, refresh_token) {
			Ok(request) => request,
			Err(err) => return Step::Fail(err.into()),
		};

		self.dispatcher.metrics.record_refresh();

		let tokens = match self.dispatcher.broker.refresh(&request).await {
			Ok(tokens) => tokens,
			Err(err) => {
				tracing::debug!(error = %err, "Refreshing the access token failed.");

				self.last = Some(err.into());

				return Step::Advance;
			},
		};

		tracing::trace!("New access token received.");

		let access_key = CredentialKey::access_token(self.namespace(), &self.target.id);

		self.persist(access_key, &tokens.access_token).await;

		self.send_authorized(&tokens.access_token).await
	}

	async fn full_reauth(&mut self) -> Step {
		let target = self.target;
		let Some(username) = target.username.as_ref() else {
			return Step::Fail(TargetError::MissingUsername.into());
		};
		let key = CredentialKey::password(self.namespace(), &target.id, username);
		let password = match self.dispatcher.store.get(&key).await {
			Ok(Some(password)) if !password.is_empty() => password,
			Ok(_) => return Step::Fail(self.no_password(None)),
			Err(err) => {
				tracing::warn!(key = %key, error = %err, "Password lookup failed.");

				return Step::Fail(self.no_password(Some(err)));
			},
		};
		let request = match PasswordRequest::for_target(target, password) {
			Ok(request) => request,
			Err(err) => return Step::Fail(err.into()),
		};

		self.dispatcher.metrics.record_reauthentication();

		let tokens = match self.dispatcher.broker.authenticate(&request).await {
			Ok(tokens) => tokens,
			Err(err) => {
				tracing::trace!(error = %err, "Broker refused the cached credentials.");

				return Step::Fail(Error::AuthFailed {
					description: err.description(),
					source: err,
				});
			},
		};

		self.persist(CredentialKey::access_token(self.namespace(), &target.id), &tokens.access_token)
			.await;

		if let Some(refresh_token) = &tokens.refresh_token {
			self.persist(CredentialKey::refresh_token(self.namespace(), &target.id), refresh_token)
				.await;
		}

		match self.send(Some(&tokens.access_token)).await {
			Ok(response) => match self.accept(response) {
				Ok(response) => Step::Respond(response),
				Err(failure) => self.fall_through(failure),
			},
			Err(AttemptFailure::Transport(source)) => Step::Fail(Error::NoConnection { source }),
			Err(failure) => self.fall_through(failure),
		}
	}

	async fn send_authorized(&mut self, token: &TokenSecret) -> Step {
		match self.send(Some(token)).await.and_then(|response| self.accept(response)) {
			Ok(response) => Step::Respond(response),
			Err(failure) => self.fall_through(failure),
		}
	}

	async fn send(&self, token: Option<&TokenSecret>) -> Result<HttpResponse, AttemptFailure> {
		let attempt = http::prepare_attempt(self.request, token)?;
		let response = self.dispatcher.transport.send(attempt).await.inspect_err(|err| {
			tracing::trace!(error = %err, "Request failed at the transport layer.");
		})?;

		tracing::trace!(status = %response.status(), "Received response.");

		Ok(response)
	}

	fn accept(&self, response: HttpResponse) -> Result<HttpResponse, AttemptFailure> {
		if response.status() == self.dispatcher.login_redirect {
			return Err(AttemptFailure::LoginRedirect { status: response.status() });
		}

		Ok(response)
	}

	fn fall_through(&mut self, failure: AttemptFailure) -> Step {
		tracing::trace!(error = %failure, "Attempt was not accepted.");

		self.last = Some(failure);

		Step::Advance
	}

	async fn lookup(&self, key: &CredentialKey) -> Option<TokenSecret> {
		match self.dispatcher.store.get(key).await {
			Ok(secret) => secret.filter(|secret| !secret.is_empty()),
			Err(err) => {
				tracing::warn!(key = %key, error = %err, "Credential lookup failed, treating as absent.");

				None
			},
		}
	}

	async fn persist(&self, key: CredentialKey, value: &TokenSecret) {
		if let Err(err) = self.dispatcher.store.set(&key, value.clone()).await {
			tracing::warn!(key = %key, error = %err, "Failed to store the new token.");
		}
	}

	fn no_password(&self, source: Option<StoreError>) -> Error {
		Error::NoPassword {
			connection: self.target.id.to_string(),
			username: self.target.username.as_ref().map(ToString::to_string).unwrap_or_default(),
			source,
		}
	}

	fn namespace(&self) -> &str {
		&self.dispatcher.config.service_namespace
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::auth::ConnectionId;

	#[test]
	fn stages_advance_in_cascade_order() {
		assert_eq!(Stage::CachedAccess.next(), Stage::RefreshFlow);
		assert_eq!(Stage::RefreshFlow.next(), Stage::FullReauth);
		assert_eq!(Stage::FullReauth.next(), Stage::Exhausted);
		assert_eq!(Stage::Exhausted.next(), Stage::Exhausted);
		assert_eq!(Stage::LocalFastPath.next(), Stage::Exhausted);
	}

	#[test]
	fn entry_stage_depends_on_locality() {
		let local = ConnectionTarget::local();
		let mut remote = local.clone();

		remote.id = ConnectionId::new("remote").expect("Id should be valid.");
		remote.local = false;

		assert_eq!(Stage::entry(&local), Stage::LocalFastPath);
		assert_eq!(Stage::entry(&remote), Stage::CachedAccess);
		assert_eq!(Stage::FullReauth.to_string(), "full_reauth");
	}
}
