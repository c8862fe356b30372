//! Connection identifiers, redacted secrets, and the cached token pair.

pub mod credential;
pub mod id;
pub mod secret;

pub use credential::*;
pub use id::*;
pub use secret::*;
