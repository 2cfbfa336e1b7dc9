//! Terminal outcomes of a dispatched request and the ways to receive them.

// std
use std::task::{Context, Poll};
// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	dispatch::RequestId,
	error::ConfigError,
	http::TransportResponse,
	obs::ExchangeOutcome,
};

/// Body of a successful response.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ResponseBody {
	/// The server sent no content (for example `204 No Content`).
	#[default]
	Empty,
	/// Parsed JSON document.
	Json(Value),
	/// Raw bytes, for requests that do not expect JSON.
	Bytes(Vec<u8>),
}
impl ResponseBody {
	/// Interprets a successful body; JSON parse errors carry the failing path.
	pub fn parse(expects_json: bool, body: Vec<u8>) -> Result<Self, ConfigError> {
		if body.iter().all(u8::is_ascii_whitespace) {
			return Ok(Self::Empty);
		}
		if !expects_json {
			return Ok(Self::Bytes(body));
		}

		let mut de = serde_json::Deserializer::from_slice(&body);

		Ok(Self::Json(serde_path_to_error::deserialize(&mut de)?))
	}

	/// Returns the JSON document, if any.
	pub fn as_json(&self) -> Option<&Value> {
		match self {
			Self::Json(value) => Some(value),
			_ => None,
		}
	}

	/// Decodes the JSON document into `T`.
	pub fn decode<T>(&self) -> Result<T, ConfigError>
	where
		T: DeserializeOwned,
	{
		let value = self.as_json().cloned().unwrap_or(Value::Null);

		Ok(serde_path_to_error::deserialize(value)?)
	}
}

/// Status line and headers of the response a terminal outcome was derived from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response headers keyed by lower-case name.
	pub headers: BTreeMap<String, String>,
}
impl RawResponse {
	/// Returns a header value using a case-insensitive name lookup.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}
}
impl From<&TransportResponse> for RawResponse {
	fn from(response: &TransportResponse) -> Self {
		Self { status: response.status, headers: response.headers.clone() }
	}
}

/// The single terminal outcome of a dispatched request.
#[derive(Debug)]
pub enum RestOutcome {
	/// 2xx answer.
	Success {
		/// Parsed body.
		body: ResponseBody,
		/// Status and headers.
		raw: RawResponse,
	},
	/// The request failed; see [`Error::domain`] for where.
	Failure {
		/// Failure cause.
		error: Error,
		/// Status and headers when the server answered.
		raw: Option<RawResponse>,
	},
	/// The request was cancelled before it completed.
	Cancelled,
	/// The request did not complete in time.
	TimedOut,
}
impl RestOutcome {
	/// Returns `true` for [`RestOutcome::Success`].
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Success { .. })
	}

	/// Returns the body of a successful outcome.
	pub fn body(&self) -> Option<&ResponseBody> {
		match self {
			Self::Success { body, .. } => Some(body),
			_ => None,
		}
	}

	/// Returns the error of a failed outcome.
	pub fn error(&self) -> Option<&Error> {
		match self {
			Self::Failure { error, .. } => Some(error),
			_ => None,
		}
	}

	/// Label used by spans and metrics.
	pub fn label(&self) -> ExchangeOutcome {
		match self {
			Self::Success { .. } => ExchangeOutcome::Success,
			Self::Failure { .. } => ExchangeOutcome::Failure,
			Self::Cancelled => ExchangeOutcome::Cancelled,
			Self::TimedOut => ExchangeOutcome::TimedOut,
		}
	}

	/// Routes the outcome to the matching delegate callback.
	pub fn deliver(self, id: RequestId, delegate: &dyn RestDelegate) {
		match self {
			Self::Success { body, raw } => delegate.on_success(id, body, raw),
			Self::Failure { error, raw } => delegate.on_failure(id, error, raw),
			Self::Cancelled => delegate.on_cancel(id),
			Self::TimedOut => delegate.on_timeout(id),
		}
	}
}

/// Callback receiver for
/// [`RestClient::send_with_delegate`](crate::dispatch::RestClient::send_with_delegate).
///
/// Exactly one method fires per request, always on a task spawned on the client's runtime.
pub trait RestDelegate
where
	Self: Send + Sync,
{
	/// The request succeeded.
	fn on_success(&self, id: RequestId, body: ResponseBody, raw: RawResponse);

	/// The request failed.
	fn on_failure(&self, id: RequestId, error: Error, raw: Option<RawResponse>);

	/// The request was cancelled.
	fn on_cancel(&self, id: RequestId);

	/// The request timed out.
	fn on_timeout(&self, id: RequestId);
}

/// Future resolving to the outcome of a submitted request.
///
/// Dropping it does not cancel the request; use
/// [`RestClient::cancel`](crate::dispatch::RestClient::cancel).
#[derive(Debug)]
pub struct PendingRequest {
	id: RequestId,
	receiver: oneshot::Receiver<RestOutcome>,
}
impl PendingRequest {
	pub(crate) fn new(id: RequestId, receiver: oneshot::Receiver<RestOutcome>) -> Self {
		Self { id, receiver }
	}

	/// Identifier of the request.
	pub fn id(&self) -> RequestId {
		self.id
	}
}
impl Future for PendingRequest {
	type Output = RestOutcome;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		match Pin::new(&mut self.receiver).poll(cx) {
			Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
			// The exchange task went away without reporting.
			Poll::Ready(Err(_)) => Poll::Ready(RestOutcome::Cancelled),
			Poll::Pending => Poll::Pending,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Debug, Deserialize, PartialEq)]
	#[serde(rename_all = "PascalCase")]
	struct Account {
		name: String,
		industry: Option<String>,
	}

	#[test]
	fn bodies_are_classified() {
		assert_eq!(ResponseBody::parse(true, Vec::new()).ok(), Some(ResponseBody::Empty));
		assert_eq!(
			ResponseBody::parse(false, b"%PDF".to_vec()).ok(),
			Some(ResponseBody::Bytes(b"%PDF".to_vec()))
		);

		let json = ResponseBody::parse(true, br#"{"Name":"Acme","Industry":null}"#.to_vec())
			.expect("JSON should parse.");

		assert_eq!(
			json.decode::<Account>().ok(),
			Some(Account { name: "Acme".into(), industry: None })
		);
		assert!(ResponseBody::parse(true, b"<html>".to_vec()).is_err());
	}

	#[test]
	fn decode_errors_carry_the_field_path() {
		let body = ResponseBody::Json(serde_json::json!({ "Name": 42 }));
		let Err(ConfigError::BodyDecode(err)) = body.decode::<Account>() else {
			panic!("Decoding should fail with a path.");
		};

		assert_eq!(err.path().to_string(), "Name");
	}

	#[tokio::test]
	async fn dropped_sender_resolves_as_cancelled() {
		let (sender, receiver) = oneshot::channel();
		let pending = PendingRequest::new(RequestId::new(7), receiver);

		drop(sender);

		assert!(matches!(pending.await, RestOutcome::Cancelled));
	}
}
