//! Validated identifiers for connections and the users that own them.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, view)?;

				Ok(Self(view.to_owned()))
			}

			/// Case-folded form used when keying credential store entries.
			pub fn account_key(&self) -> String {
				self.0.trim().to_lowercase()
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const IDENTIFIER_MAX_LEN: usize = 128;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (connection, username).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (connection, username).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (connection, username).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
}

def_id! { ConnectionId, "Identifier of a remote (or the local) connection.", "Connection" }
def_id! { Username, "Account name used for password re-authentication.", "Username" }

impl ConnectionId {
	/// Reserved identifier of the unauthenticated local endpoint.
	pub const LOCAL: &str = "local";

	/// Identifier of the local endpoint.
	pub fn local() -> Self {
		Self(Self::LOCAL.to_owned())
	}

	/// Whether this identifier names the local endpoint.
	pub fn is_local(&self) -> bool {
		self.0.eq_ignore_ascii_case(Self::LOCAL)
	}
}

fn validate_view(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.chars().count() > IDENTIFIER_MAX_LEN {
		return Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN });
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn identifiers_reject_whitespace_and_empty_values() {
		assert!(ConnectionId::new(" conn-1").is_err(), "Leading whitespace must be rejected.");
		assert!(ConnectionId::new("conn-1 ").is_err(), "Trailing whitespace must be rejected.");
		assert!(Username::new("").is_err());
		assert!(Username::new("jane doe").is_err());

		let conn = ConnectionId::new("conn-1").expect("Connection fixture should be valid.");

		assert_eq!(conn.as_ref(), "conn-1");
	}

	#[test]
	fn account_keys_are_lower_cased() {
		let conn = ConnectionId::new("K8S-Remote").expect("Connection fixture should be valid.");
		let user = Username::new("Developer").expect("Username fixture should be valid.");

		assert_eq!(conn.account_key(), "k8s-remote");
		assert_eq!(user.account_key(), "developer");
	}

	#[test]
	fn local_alias_is_case_insensitive() {
		assert!(ConnectionId::new("LOCAL").expect("Local id should be valid.").is_local());
		assert!(!ConnectionId::new("localhost").expect("Id should be valid.").is_local());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let conn: ConnectionId =
			serde_json::from_str("\"remote-42\"").expect("Connection should deserialize.");

		assert_eq!(conn.as_ref(), "remote-42");
		assert!(serde_json::from_str::<ConnectionId>("\"with space\"").is_err());

		let too_long = "a".repeat(IDENTIFIER_MAX_LEN + 1);

		assert!(Username::new(&too_long).is_err());
	}
}
