//! Client-level error types shared across request builders, sessions, and dispatch.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error domain a failure is reported under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorDomain {
	/// Request validation and REST API failures.
	Rest,
	/// Session credential (refresh token exchange) failures.
	OAuth,
	/// Network-level failures raised by the transport.
	Transport,
}
impl ErrorDomain {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorDomain::Rest => "rest",
			ErrorDomain::OAuth => "oauth",
			ErrorDomain::Transport => "transport",
		}
	}
}
impl Display for ErrorDomain {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Request parameters were rejected before any network activity.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Session credential could not be renewed.
	#[error(transparent)]
	Credential(#[from] CredentialError),
	/// Server answered with a non-success status.
	#[error(transparent)]
	Rest(#[from] RestError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The client was cleaned up and no longer accepts requests.
	#[error("REST client has been cleaned up.")]
	Closed,
	/// The task driving the exchange panicked before reporting an outcome.
	#[error("REST exchange task panicked.")]
	Panicked,
}
impl Error {
	/// Returns the domain this error is reported under.
	pub fn domain(&self) -> ErrorDomain {
		match self {
			Self::Credential(_) => ErrorDomain::OAuth,
			Self::Transport(_) => ErrorDomain::Transport,
			Self::Validation(_)
			| Self::Rest(_)
			| Self::Config(_)
			| Self::Closed
			| Self::Panicked => ErrorDomain::Rest,
		}
	}

	/// HTTP status carried by the error, if the server produced one.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rest(err) => Some(err.status),
			Self::Credential(CredentialError::SessionRejected { status, .. }) => Some(*status),
			_ => None,
		}
	}
}

/// Invalid request parameters detected while building a request.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// A required parameter was empty or blank.
	#[error("Parameter `{parameter}` must not be empty.")]
	EmptyParameter {
		/// Parameter name.
		parameter: &'static str,
	},
	/// Companion lists do not line up.
	#[error("Expected {expected} `{parameter}` entries but received {actual}.")]
	LengthMismatch {
		/// Parameter name of the companion list.
		parameter: &'static str,
		/// Length required by the primary list.
		expected: usize,
		/// Length actually supplied.
		actual: usize,
	},
	/// The parameter value or combination is contradictory.
	#[error("Parameter `{parameter}` is invalid: {reason}.")]
	InvalidParameter {
		/// Parameter name.
		parameter: &'static str,
		/// Human-readable reason.
		reason: String,
	},
}

/// Session credential failures.
///
/// Values are cloneable so a single refresh outcome can be shared with every request waiting on
/// it.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialError {
	/// No credential is stored for the user.
	#[error("No session credential is available.")]
	MissingCredential,
	/// Stored credential cannot be renewed because it carries no refresh token.
	#[error("Session credential is missing a refresh token.")]
	MissingRefreshToken,
	/// Token endpoint rejected the refresh token.
	#[error("Token endpoint rejected the refresh token: {reason}.")]
	RefreshRejected {
		/// Provider-supplied reason string.
		reason: String,
	},
	/// Refresh exchange failed before the provider produced an answer.
	#[error("Refresh token exchange failed: {message}.")]
	Exchange {
		/// Failure summary.
		message: String,
	},
	/// The server kept rejecting the session after it was renewed.
	#[error("Session was rejected again after renewal (HTTP {status}).")]
	SessionRejected {
		/// HTTP status of the last rejection.
		status: u16,
		/// Response body of the last rejection.
		body: String,
	},
}

/// Non-success HTTP answer from the REST API.
#[derive(Clone, Debug, ThisError)]
#[error("REST API answered with HTTP {status}.")]
pub struct RestError {
	/// HTTP status code.
	pub status: u16,
	/// Raw response body, lossily decoded as UTF-8.
	pub body: String,
	/// Structured error entries parsed from the body, if any.
	pub errors: Vec<ApiErrorEntry>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}
impl RestError {
	/// Builds an error from a status and raw body, parsing the platform error payload.
	pub fn new(status: u16, body: &[u8]) -> Self {
		Self {
			status,
			body: String::from_utf8_lossy(body).into_owned(),
			errors: ApiErrorEntry::parse_all(body),
			retry_after: None,
		}
	}

	/// Attaches a Retry-After hint.
	pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
		self.retry_after = retry_after;

		self
	}

	/// Returns `true` if any error entry carries the provided code.
	pub fn has_error_code(&self, code: &str) -> bool {
		self.errors.iter().any(|entry| entry.error_code == code)
	}
}

/// Single error entry from the platform's JSON error payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorEntry {
	/// Platform error code (for example `INVALID_SESSION_ID`).
	pub error_code: String,
	/// Human-readable message.
	#[serde(default)]
	pub message: String,
	/// Fields the error refers to.
	#[serde(default)]
	pub fields: Vec<String>,
}
impl ApiErrorEntry {
	/// Parses the platform error payload, accepting either an array or a single object.
	pub fn parse_all(body: &[u8]) -> Vec<Self> {
		#[derive(Deserialize)]
		#[serde(untagged)]
		enum Payload {
			Many(Vec<ApiErrorEntry>),
			One(ApiErrorEntry),
		}

		match serde_json::from_slice::<Payload>(body) {
			Ok(Payload::Many(entries)) => entries,
			Ok(Payload::One(entry)) => vec![entry],
			Err(_) => Vec::new(),
		}
	}
}

/// Configuration and local failures raised by the client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Requests must be submitted from within a Tokio runtime.
	#[error("No Tokio runtime is available to drive the request.")]
	MissingRuntime,
	/// Request URL could not be resolved against the instance URL.
	#[error("Request URL `{url}` is invalid.")]
	InvalidUrl {
		/// URL that failed to parse.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A header value could not be rendered.
	#[error("Header `{name}` could not be rendered.")]
	InvalidHeader {
		/// Header name.
		name: &'static str,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	BodySerialization(#[from] serde_json::Error),
	/// Response body could not be decoded into the requested type.
	#[error("Response body could not be decoded.")]
	BodyDecode(#[from] serde_path_to_error::Error<serde_json::Error>),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the REST API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Transport gave up waiting for the server.
	#[error("Request to the REST API timed out.")]
	Timeout,
	/// Network access is disabled for test runs.
	#[error("Network access is disabled during test runs.")]
	Disabled,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the REST API.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn domains_follow_the_error_taxonomy() {
		let validation: Error = ValidationError::EmptyParameter { parameter: "soql" }.into();
		let credential: Error = CredentialError::MissingRefreshToken.into();
		let rest: Error = RestError::new(500, b"boom").into();
		let transport: Error = TransportError::Timeout.into();

		assert_eq!(validation.domain(), ErrorDomain::Rest);
		assert_eq!(credential.domain(), ErrorDomain::OAuth);
		assert_eq!(rest.domain(), ErrorDomain::Rest);
		assert_eq!(transport.domain(), ErrorDomain::Transport);
		assert_eq!(rest.status(), Some(500));
		assert_eq!(validation.status(), None);
	}

	#[test]
	fn rest_error_parses_platform_payloads() {
		let err = RestError::new(
			400,
			br#"[{"errorCode":"MALFORMED_QUERY","message":"unexpected token","fields":[]}]"#,
		);

		assert_eq!(err.errors.len(), 1);
		assert!(err.has_error_code("MALFORMED_QUERY"));

		let single = RestError::new(401, br#"{"errorCode":"INVALID_SESSION_ID","message":"x"}"#);

		assert!(single.has_error_code("INVALID_SESSION_ID"));

		let plain = RestError::new(502, b"<html>bad gateway</html>");

		assert!(plain.errors.is_empty());
		assert_eq!(plain.body, "<html>bad gateway</html>");
	}

	#[test]
	fn credential_errors_are_shareable() {
		let err = CredentialError::RefreshRejected { reason: "invalid_grant".into() };
		let shared = err.clone();

		assert_eq!(err, shared);
		assert!(Error::from(shared).to_string().contains("invalid_grant"));
	}
}
