//! Single-flight session refresh shared by every request of one user.
//!
//! Each request remembers the refresh epoch it observed when it stamped its credential. When
//! the server rejects that credential the request asks the coordinator to refresh from that
//! epoch: if another request already refreshed since then, the stored outcome of that refresh
//! (success or failure) is returned instead of calling the provider again.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::SessionCredential,
	error::CredentialError,
	obs::{self, ExchangeKind, ExchangeOutcome, ExchangeSpan},
	session::CredentialProvider,
};

#[derive(Clone, Debug)]
struct SharedRefresh {
	epoch: u64,
	result: Result<SessionCredential, CredentialError>,
}

/// Serializes refresh calls for one user and shares their outcome.
#[derive(Debug, Default)]
pub struct RefreshCoordinator {
	singleflight: AsyncMutex<()>,
	last: Mutex<Option<SharedRefresh>>,
	epoch: AtomicU64,
}
impl RefreshCoordinator {
	/// Returns the number of refreshes performed so far; requests record it before sending.
	pub fn epoch(&self) -> u64 {
		self.epoch.load(Ordering::Acquire)
	}

	/// Returns a fresh credential for a request that observed `observed_epoch`.
	///
	/// Calls [`CredentialProvider::refresh`] only when no refresh completed after
	/// `observed_epoch`; otherwise the stored outcome is cloned.
	pub async fn refresh(
		&self,
		provider: &dyn CredentialProvider,
		observed_epoch: u64,
	) -> Result<SessionCredential, CredentialError> {
		let _singleflight = self.singleflight.lock().await;

		if let Some(shared) = self.shared_since(observed_epoch) {
			return shared;
		}

		const KIND: ExchangeKind = ExchangeKind::Refresh;

		let span = ExchangeSpan::new(KIND, "refresh", "session");

		obs::record_exchange_outcome(KIND, ExchangeOutcome::Attempt);

		let result = span.instrument(provider.refresh()).await;

		match &result {
			Ok(_) => obs::record_exchange_outcome(KIND, ExchangeOutcome::Success),
			Err(_) => obs::record_exchange_outcome(KIND, ExchangeOutcome::Failure),
		}

		let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;

		*self.last.lock() = Some(SharedRefresh { epoch, result: result.clone() });

		result
	}

	/// Forgets the stored outcome so the next faulting request refreshes again.
	pub fn reset(&self) {
		self.last.lock().take();
	}

	fn shared_since(
		&self,
		observed_epoch: u64,
	) -> Option<Result<SessionCredential, CredentialError>> {
		self.last
			.lock()
			.as_ref()
			.filter(|shared| shared.epoch > observed_epoch)
			.map(|shared| shared.result.clone())
	}
}
