//! REST request descriptors and the factories that build them.
//!
//! A [`RestRequest`] is an immutable description of one HTTP call. It carries no credential:
//! the dispatch engine stamps the `Authorization`, `User-Agent` and `If-Unmodified-Since`
//! headers and resolves the path against the endpoint prefix and the instance URL only when the
//! request is sent, so a descriptor can be re-sent verbatim after a session refresh.

pub mod factory;
pub mod tree;

pub use factory::*;
pub use tree::*;

// crates.io
use time::{UtcOffset, format_description::BorrowedFormatItem, macros::format_description};
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	auth::SessionCredential,
	config::{DEFAULT_API_VERSION, DEFAULT_ENDPOINT, IF_UNMODIFIED_SINCE},
	error::ConfigError,
	http::{HttpMethod, TransportRequest},
};

const HTTP_DATE: &[BorrowedFormatItem<'static>] = format_description!(
	"[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
);

/// Payload attached to a request.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
	/// JSON document.
	Json(serde_json::Value),
	/// Pre-encoded payload with an explicit content type.
	Raw {
		/// MIME type sent as `Content-Type`.
		content_type: String,
		/// Encoded bytes.
		bytes: Vec<u8>,
	},
}
impl RequestBody {
	/// Returns the `Content-Type` for the payload.
	pub fn content_type(&self) -> &str {
		match self {
			Self::Json(_) => "application/json",
			Self::Raw { content_type, .. } => content_type,
		}
	}

	/// Encodes the payload into bytes.
	pub fn encode(&self) -> Result<Vec<u8>, ConfigError> {
		match self {
			Self::Json(value) => Ok(serde_json::to_vec(value)?),
			Self::Raw { bytes, .. } => Ok(bytes.clone()),
		}
	}
}

/// Immutable description of one REST call.
#[derive(Clone, Debug, PartialEq)]
pub struct RestRequest {
	/// HTTP verb.
	pub method: HttpMethod,
	/// Endpoint prefix identifying the API family (for example `/services/data`).
	pub endpoint: String,
	/// Resource path, with or without the endpoint prefix.
	pub path: String,
	/// Query parameters in insertion order.
	pub query: Vec<(String, String)>,
	/// Optional payload.
	pub body: Option<RequestBody>,
	/// Caller-supplied headers.
	pub headers: BTreeMap<String, String>,
	/// API version the path was built for.
	pub api_version: String,
	/// Conditional-update timestamp sent as `If-Unmodified-Since`.
	pub if_unmodified_since: Option<OffsetDateTime>,
	/// Whether a successful body should be parsed as JSON.
	pub expects_json: bool,
}
impl RestRequest {
	/// Creates a request against the default endpoint prefix.
	pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
		Self {
			method,
			endpoint: DEFAULT_ENDPOINT.into(),
			path: path.into(),
			query: Vec::new(),
			body: None,
			headers: BTreeMap::new(),
			api_version: DEFAULT_API_VERSION.into(),
			if_unmodified_since: None,
			expects_json: true,
		}
	}

	/// Overrides the endpoint prefix.
	pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.set_endpoint(endpoint);

		self
	}

	/// Replaces the endpoint prefix in place.
	pub fn set_endpoint(&mut self, endpoint: impl Into<String>) {
		self.endpoint = endpoint.into();
	}

	/// Records the API version the path targets.
	pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
		self.api_version = version.into();

		self
	}

	/// Appends a query parameter.
	pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.push((key.into(), value.into()));

		self
	}

	/// Attaches a JSON body.
	pub fn with_json(mut self, body: serde_json::Value) -> Self {
		self.body = Some(RequestBody::Json(body));

		self
	}

	/// Attaches an arbitrary body.
	pub fn with_body(mut self, body: RequestBody) -> Self {
		self.body = Some(body);

		self
	}

	/// Adds a custom header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Sets the conditional-update timestamp.
	pub fn with_if_unmodified_since(mut self, instant: OffsetDateTime) -> Self {
		self.if_unmodified_since = Some(instant);

		self
	}

	/// Controls whether a successful body is parsed as JSON.
	pub fn expecting_json(mut self, expects_json: bool) -> Self {
		self.expects_json = expects_json;

		self
	}

	/// Returns the path with the endpoint prefix applied exactly once.
	pub fn resolved_path(&self) -> String {
		let endpoint = self.endpoint.trim_end_matches('/');

		if endpoint.is_empty() || has_prefix(&self.path, endpoint) {
			return ensure_leading_slash(&self.path);
		}

		format!("{endpoint}{}", ensure_leading_slash(&self.path))
	}

	/// Returns the form-encoded query string, if any parameter is set.
	pub fn query_string(&self) -> Option<String> {
		if self.query.is_empty() {
			return None;
		}

		let mut serializer = form_urlencoded::Serializer::new(String::new());

		for (key, value) in &self.query {
			serializer.append_pair(key, value);
		}

		Some(serializer.finish())
	}

	/// Returns the resolved path followed by the query string.
	///
	/// Parameters from [`RestRequest::query`] are appended after any query already written
	/// into the path.
	pub fn relative_url(&self) -> String {
		let path = self.resolved_path();

		match self.query_string() {
			Some(query) if path.contains('?') => format!("{path}&{query}"),
			Some(query) => format!("{path}?{query}"),
			None => path,
		}
	}

	/// Resolves the absolute URL against an instance URL.
	///
	/// The resolved path is appended to the instance URL's own path, so instances served under
	/// a path (community sites) keep it.
	pub fn url(&self, instance_url: &Url) -> Result<Url, ConfigError> {
		if instance_url.cannot_be_a_base() {
			return Err(ConfigError::InvalidUrl {
				url: instance_url.to_string(),
				source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
			});
		}

		let resolved = self.resolved_path();
		let (path, inline_query) = match resolved.split_once('?') {
			Some((path, query)) => (path, Some(query)),
			None => (resolved.as_str(), None),
		};
		let mut url = instance_url.clone();

		url.set_path(&format!("{}{path}", instance_url.path().trim_end_matches('/')));
		url.set_query(inline_query.filter(|query| !query.is_empty()));
		url.set_fragment(None);

		if !self.query.is_empty() {
			let mut pairs = url.query_pairs_mut();

			for (key, value) in &self.query {
				pairs.append_pair(key, value);
			}
		}

		Ok(url)
	}

	/// Builds the transport request stamped with `credential`.
	///
	/// `Authorization` and `User-Agent` always overwrite caller headers, as does
	/// `If-Unmodified-Since` when a conditional-update timestamp is set.
	pub fn to_transport(
		&self,
		credential: &SessionCredential,
		user_agent: &str,
	) -> Result<TransportRequest, ConfigError> {
		let url = self.url(&credential.instance_url)?;
		let mut headers = self.headers.clone();

		set_header(&mut headers, "Authorization", credential.access_token.bearer());
		set_header(&mut headers, "User-Agent", user_agent.to_owned());

		if let Some(instant) = self.if_unmodified_since {
			set_header(&mut headers, IF_UNMODIFIED_SINCE, http_date(instant)?);
		}
		if self.expects_json && !contains_header(&headers, "Accept") {
			headers.insert("Accept".into(), "application/json".into());
		}

		let body = match &self.body {
			Some(body) => {
				if !contains_header(&headers, "Content-Type") {
					headers.insert("Content-Type".into(), body.content_type().to_owned());
				}

				Some(body.encode()?)
			},
			None => None,
		};

		Ok(TransportRequest { method: self.method, url, headers, body })
	}

	/// Short label used by logs and spans.
	pub fn label(&self) -> String {
		format!("{} {}", self.method, self.resolved_path())
	}
}

/// Formats an instant as an RFC 7231 HTTP-date (`Tue, 15 Nov 1994 08:12:31 GMT`).
pub fn http_date(instant: OffsetDateTime) -> Result<String, ConfigError> {
	instant
		.to_offset(UtcOffset::UTC)
		.format(HTTP_DATE)
		.map_err(|_| ConfigError::InvalidHeader { name: IF_UNMODIFIED_SINCE })
}

/// Returns `true` for 2xx statuses.
pub fn is_status_code_success(status: u16) -> bool {
	(200..300).contains(&status)
}

/// Returns `true` for 404.
pub fn is_status_code_not_found(status: u16) -> bool {
	status == 404
}

fn has_prefix(path: &str, endpoint: &str) -> bool {
	ensure_leading_slash(path).starts_with(&ensure_leading_slash(endpoint))
}

fn ensure_leading_slash(path: &str) -> String {
	if path.starts_with('/') { path.to_owned() } else { format!("/{path}") }
}

fn contains_header(headers: &BTreeMap<String, String>, name: &str) -> bool {
	headers.keys().any(|key| key.eq_ignore_ascii_case(name))
}

fn set_header(headers: &mut BTreeMap<String, String>, name: &str, value: String) {
	headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
	headers.insert(name.to_owned(), value);
}
