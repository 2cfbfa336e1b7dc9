//! Per-request attempt state: at most one refresh-and-resend cycle.

/// Where a request stands in its refresh-and-resend cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AttemptState {
	/// First transmission, no refresh requested yet.
	#[default]
	Pending,
	/// The session was rejected and a refresh is in progress.
	AwaitingRefresh,
	/// The request was resubmitted with a renewed credential.
	Resent,
	/// A terminal outcome was produced.
	Terminal,
}

/// What to do after the server rejected the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpiryAction {
	/// Refresh the credential and resend.
	Refresh,
	/// The single retry is spent; report the rejection.
	GiveUp,
}

/// Attempt bookkeeping for one request; `retry_count` never exceeds one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Attempt {
	state: AttemptState,
	retry_count: u8,
}
impl Attempt {
	/// Current state.
	pub fn state(&self) -> AttemptState {
		self.state
	}

	/// Number of resubmissions performed (0 or 1).
	pub fn retry_count(&self) -> u8 {
		self.retry_count
	}

	/// Records a session rejection and decides whether a refresh is still allowed.
	pub fn on_session_expired(&mut self) -> ExpiryAction {
		if self.retry_count == 0 && self.state == AttemptState::Pending {
			self.state = AttemptState::AwaitingRefresh;

			ExpiryAction::Refresh
		} else {
			self.state = AttemptState::Terminal;

			ExpiryAction::GiveUp
		}
	}

	/// Records a successful refresh; the request is resent exactly once.
	pub fn on_refreshed(&mut self) {
		if self.state == AttemptState::AwaitingRefresh {
			self.retry_count = 1;
			self.state = AttemptState::Resent;
		}
	}

	/// Marks the attempt finished.
	pub fn finish(&mut self) {
		self.state = AttemptState::Terminal;
	}
}
