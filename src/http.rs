//! Transport primitives for REST exchanges.
//!
//! The module exposes [`RestTransport`] alongside the transport-level request and response
//! values so downstream crates can plug in custom HTTP stacks. The dispatch engine only ever
//! talks to a transport through this trait; cancellation is achieved by dropping the future
//! returned from [`RestTransport::execute`].

// std
#[cfg(feature = "reqwest")] use std::{ops::Deref, time::Duration as StdDuration};
// crates.io
#[cfg(feature = "reqwest")] use reqwest::Method as ReqwestMethod;
use time::format_description::well_known::Rfc2822;
// self
#[cfg(feature = "reqwest")] use crate::error::ConfigError;
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`RestTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing REST exchanges.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// per-user client. Returned futures must be `Send` because the dispatch engine drives them on
/// spawned tasks, and they must tolerate being dropped mid-flight: that is how requests are
/// cancelled.
pub trait RestTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes one HTTP exchange and returns the raw response, whatever its status.
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_>;
}

/// HTTP verbs supported by the REST API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
	/// `GET`
	Get,
	/// `POST`
	Post,
	/// `PUT`
	Put,
	/// `PATCH`
	Patch,
	/// `DELETE`
	Delete,
	/// `HEAD`
	Head,
}
impl HttpMethod {
	/// Returns the canonical upper-case verb.
	pub const fn as_str(self) -> &'static str {
		match self {
			HttpMethod::Get => "GET",
			HttpMethod::Post => "POST",
			HttpMethod::Put => "PUT",
			HttpMethod::Patch => "PATCH",
			HttpMethod::Delete => "DELETE",
			HttpMethod::Head => "HEAD",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for HttpMethod {
	type Err = UnsupportedMethod;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_uppercase().as_str() {
			"GET" => Ok(Self::Get),
			"POST" => Ok(Self::Post),
			"PUT" => Ok(Self::Put),
			"PATCH" => Ok(Self::Patch),
			"DELETE" => Ok(Self::Delete),
			"HEAD" => Ok(Self::Head),
			_ => Err(UnsupportedMethod(s.to_owned())),
		}
	}
}

/// Error returned when parsing an HTTP verb the REST API does not use.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("HTTP method `{0}` is not supported.")]
pub struct UnsupportedMethod(pub String);

/// Fully resolved request handed to a [`RestTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportRequest {
	/// HTTP verb.
	pub method: HttpMethod,
	/// Absolute URL including the query string.
	pub url: Url,
	/// Request headers.
	pub headers: BTreeMap<String, String>,
	/// Encoded request body.
	pub body: Option<Vec<u8>>,
}
impl TransportRequest {
	/// Returns a header value using a case-insensitive name lookup.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}
}

/// Raw response produced by a [`RestTransport`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers keyed by lower-case name.
	pub headers: BTreeMap<String, String>,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl TransportResponse {
	/// Creates a response with the provided status and body.
	pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: BTreeMap::new(), body: body.into() }
	}

	/// Adds a header; names are stored lower-case.
	pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
		self.headers.insert(name.to_ascii_lowercase(), value.into());

		self
	}

	/// Returns a header value using a case-insensitive name lookup.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns `true` when the response advertises a JSON body.
	pub fn is_json(&self) -> bool {
		self.header("content-type").is_some_and(|value| value.contains("json"))
	}

	/// Parses the Retry-After header into a relative duration.
	pub fn retry_after(&self) -> Option<Duration> {
		let raw = self.header("retry-after")?.trim();

		if let Ok(secs) = raw.parse::<u64>() {
			return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
		}
		if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
			let delta = moment - OffsetDateTime::now_utc();

			if delta.is_positive() {
				return Some(delta);
			}
		}

		None
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// The transport refuses to touch the network while the process-wide test-run flag is set
/// (see [`crate::config::set_test_run`]).
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client whose requests time out after `timeout`.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().timeout(timeout).build()?;

		Ok(Self(client))
	}

	fn method(method: HttpMethod) -> ReqwestMethod {
		match method {
			HttpMethod::Get => ReqwestMethod::GET,
			HttpMethod::Post => ReqwestMethod::POST,
			HttpMethod::Put => ReqwestMethod::PUT,
			HttpMethod::Patch => ReqwestMethod::PATCH,
			HttpMethod::Delete => ReqwestMethod::DELETE,
			HttpMethod::Head => ReqwestMethod::HEAD,
		}
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl RestTransport for ReqwestTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			if crate::config::is_test_run() {
				return Err(TransportError::Disabled);
			}

			let mut builder = client.request(Self::method(request.method), request.url);

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
				})
				.collect();
			let body = response.bytes().await?.to_vec();

			Ok(TransportResponse { status, headers, body })
		})
	}
}
