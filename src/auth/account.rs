//! Authenticated user accounts and the context that names the current one.

// self
use crate::{_prelude::*, auth::id::UserKey, session::CredentialProvider};

/// Resolves the currently authenticated user, if any.
///
/// Implemented by whatever owns the login state; the registry consults it to answer
/// "the client for whoever is logged in right now".
pub trait UserContext
where
	Self: Send + Sync,
{
	/// Returns the current account, or `None` when nobody is authenticated.
	fn current_user(&self) -> Option<UserAccount>;
}

/// An authenticated user together with the provider that owns their session credential.
#[derive(Clone)]
pub struct UserAccount {
	/// Stable identity of the user.
	pub key: UserKey,
	/// Source of the user's session credential.
	pub credentials: Arc<dyn CredentialProvider>,
}
impl UserAccount {
	/// Creates an account for `key` backed by `credentials`.
	pub fn new(key: UserKey, credentials: Arc<dyn CredentialProvider>) -> Self {
		Self { key, credentials }
	}
}
impl Debug for UserAccount {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UserAccount").field("key", &self.key).finish_non_exhaustive()
	}
}

/// In-memory holder for the current account.
#[derive(Debug, Default)]
pub struct AccountSlot(RwLock<Option<UserAccount>>);
impl AccountSlot {
	/// Creates a slot that already holds `account`.
	pub fn with_account(account: UserAccount) -> Self {
		Self(RwLock::new(Some(account)))
	}

	/// Records `account` as the current user and returns the previous one.
	pub fn sign_in(&self, account: UserAccount) -> Option<UserAccount> {
		self.0.write().replace(account)
	}

	/// Clears the current user and returns it.
	pub fn sign_out(&self) -> Option<UserAccount> {
		self.0.write().take()
	}
}
impl UserContext for AccountSlot {
	fn current_user(&self) -> Option<UserAccount> {
		self.0.read().clone()
	}
}
