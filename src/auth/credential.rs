//! Access/refresh token pair minted by the identity broker.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Tokens returned by a successful refresh or password grant.
///
/// Both values are opaque; nothing in the crate parses or validates them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
	/// Short-lived bearer credential.
	pub access_token: TokenSecret,
	/// Longer-lived credential used to mint new access tokens, when the broker issued one.
	pub refresh_token: Option<TokenSecret>,
}
impl TokenPair {
	/// Creates a pair carrying only an access token.
	pub fn new(access_token: impl Into<TokenSecret>) -> Self {
		Self { access_token: access_token.into(), refresh_token: None }
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(refresh_token.into());

		self
	}
}
