//! Session credential sources and the single-flight refresh that renews them.
//!
//! A [`CredentialProvider`] owns a user's session credential: the dispatch engine asks it for a
//! snapshot before every attempt, tells it which snapshot the server rejected, and asks it to
//! renew. Renewal always goes through a [`RefreshCoordinator`] so concurrent requests that
//! fault on the same stale session share one refresh call.

pub mod oauth;
pub mod refresh;

pub use oauth::*;
pub use refresh::*;

// self
use crate::{_prelude::*, auth::SessionCredential, error::CredentialError};

/// Boxed future returned by [`CredentialProvider::refresh`].
pub type CredentialFuture<'a> =
	Pin<Box<dyn Future<Output = Result<SessionCredential, CredentialError>> + 'a + Send>>;

/// Source of a user's session credential.
///
/// Implementations must be `Send + Sync` because one provider is shared by every request of
/// its user, and the refresh future must be `Send` because it runs on dispatch tasks.
pub trait CredentialProvider
where
	Self: Send + Sync,
{
	/// Returns a snapshot of the current credential, if one is available.
	fn current_credential(&self) -> Option<SessionCredential>;

	/// Renews the session and returns the new credential.
	///
	/// The coordinator guarantees that at most one call is in flight per provider.
	fn refresh(&self) -> CredentialFuture<'_>;

	/// Signals that the server rejected `stale`.
	///
	/// Providers that cache credentials should stop handing out `stale`; the default does
	/// nothing.
	fn invalidate(&self, stale: &SessionCredential) {
		let _ = stale;
	}
}
