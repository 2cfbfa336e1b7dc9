//! User identities, session credentials, and redacted secrets.

pub mod account;
pub mod credential;
pub mod id;
pub mod secret;

pub use account::*;
pub use credential::*;
pub use id::*;
pub use secret::*;
