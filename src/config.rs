//! Client configuration and the process-wide test-run switch.

// std
use std::{
	sync::atomic::{AtomicBool, Ordering},
	time::Duration as StdDuration,
};
// self
use crate::{_prelude::*, user_agent::UserAgent};

/// Default REST API version applied to new clients.
pub const DEFAULT_API_VERSION: &str = "v42.0";
/// Default endpoint prefix of the standard REST API.
pub const DEFAULT_ENDPOINT: &str = "/services/data";
/// Header carrying the conditional-update timestamp.
pub const IF_UNMODIFIED_SINCE: &str = "If-Unmodified-Since";

static TEST_RUN: AtomicBool = AtomicBool::new(false);

/// Enables or disables test-run mode for the whole process.
///
/// While enabled, production-only side effects are skipped; most notably the reqwest transport
/// refuses to touch the network.
pub fn set_test_run(enabled: bool) {
	TEST_RUN.store(enabled, Ordering::SeqCst);
}

/// Returns whether test-run mode is enabled (off unless explicitly set).
pub fn is_test_run() -> bool {
	TEST_RUN.load(Ordering::SeqCst)
}

/// Settings applied to every client a registry creates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// API version used by request factories (defaults to [`DEFAULT_API_VERSION`]).
	pub api_version: String,
	/// Endpoint prefix used by request factories (defaults to [`DEFAULT_ENDPOINT`]).
	pub endpoint: String,
	/// Upper bound for a whole exchange, refresh included; `None` leaves it to the transport.
	pub request_timeout: Option<StdDuration>,
	/// `User-Agent` components stamped on every request.
	pub user_agent: UserAgent,
	/// Optional qualifier appended to the app-type token of the `User-Agent`.
	pub user_agent_qualifier: Option<String>,
}
impl ClientConfig {
	/// Overrides the API version.
	pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
		self.api_version = version.into();

		self
	}

	/// Overrides the endpoint prefix.
	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.endpoint = endpoint.into();

		self
	}

	/// Bounds every exchange by `timeout`.
	pub fn with_request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Overrides the `User-Agent` components.
	pub fn with_user_agent(mut self, user_agent: UserAgent) -> Self {
		self.user_agent = user_agent;

		self
	}

	/// Sets the `User-Agent` qualifier.
	pub fn with_user_agent_qualifier(mut self, qualifier: impl Into<String>) -> Self {
		self.user_agent_qualifier = Some(qualifier.into());

		self
	}

	/// Renders the `User-Agent` header value.
	pub fn user_agent_header(&self) -> String {
		self.user_agent.render_with_qualifier(self.user_agent_qualifier.as_deref())
	}
}
impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			api_version: DEFAULT_API_VERSION.into(),
			endpoint: DEFAULT_ENDPOINT.into(),
			request_timeout: None,
			user_agent: UserAgent::default(),
			user_agent_qualifier: None,
		}
	}
}
