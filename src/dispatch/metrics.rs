//! Per-client dispatch counters.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::dispatch::RestOutcome;

/// Thread-safe counters for one client's dispatches.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
	sends: AtomicU64,
	refreshes: AtomicU64,
	retries: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	cancellations: AtomicU64,
	timeouts: AtomicU64,
}
impl DispatchMetrics {
	/// Returns the number of accepted submissions.
	pub fn sends(&self) -> u64 {
		self.sends.load(Ordering::Relaxed)
	}

	/// Returns how often a request asked for a session refresh (shared refreshes included).
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of resubmissions after a successful refresh.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that ended in success.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Returns the number of requests that ended in failure.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Returns the number of cancelled requests.
	pub fn cancellations(&self) -> u64 {
		self.cancellations.load(Ordering::Relaxed)
	}

	/// Returns the number of timed-out requests.
	pub fn timeouts(&self) -> u64 {
		self.timeouts.load(Ordering::Relaxed)
	}

	pub(crate) fn record_send(&self) {
		self.sends.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_outcome(&self, outcome: &RestOutcome) {
		let counter = match outcome {
			RestOutcome::Success { .. } => &self.successes,
			RestOutcome::Failure { .. } => &self.failures,
			RestOutcome::Cancelled => &self.cancellations,
			RestOutcome::TimedOut => &self.timeouts,
		};

		counter.fetch_add(1, Ordering::Relaxed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn outcomes_land_in_their_counter() {
		let metrics = DispatchMetrics::default();

		metrics.record_send();
		metrics.record_send();
		metrics.record_outcome(&RestOutcome::Cancelled);
		metrics.record_outcome(&RestOutcome::TimedOut);

		assert_eq!(metrics.sends(), 2);
		assert_eq!(metrics.cancellations(), 1);
		assert_eq!(metrics.timeouts(), 1);
		assert_eq!(metrics.successes() + metrics.failures(), 0);
	}
}
