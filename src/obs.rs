//! Optional observability helpers for REST exchanges.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `sforce_rest.exchange` with the `kind`
//!   (dispatch or refresh) and `stage` (call site) fields.
//! - Enable `metrics` to increment the `sforce_rest_exchange_total` counter for every
//!   attempt and terminal outcome, labeled by `kind` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Exchange kinds observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
	/// A REST request driven by the dispatch engine.
	Dispatch,
	/// A session refresh against the token endpoint.
	Refresh,
}
impl ExchangeKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExchangeKind::Dispatch => "dispatch",
			ExchangeKind::Refresh => "refresh",
		}
	}
}
impl Display for ExchangeKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExchangeOutcome {
	/// Exchange started.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
	/// Cancelled before completion.
	Cancelled,
	/// Abandoned after the deadline elapsed.
	TimedOut,
}
impl ExchangeOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ExchangeOutcome::Attempt => "attempt",
			ExchangeOutcome::Success => "success",
			ExchangeOutcome::Failure => "failure",
			ExchangeOutcome::Cancelled => "cancelled",
			ExchangeOutcome::TimedOut => "timed_out",
		}
	}
}
impl Display for ExchangeOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
