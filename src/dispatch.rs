//! Per-user dispatch engine.
//!
//! [`RestClient`] owns the in-flight requests of one user. Every submission is registered in
//! the in-flight map and driven by its own Tokio task:
//!
//! 1. snapshot the session credential and the refresh epoch;
//! 2. stamp the descriptor and hand it to the [`RestTransport`];
//! 3. classify the answer. A session rejection (`401` or `INVALID_SESSION_ID`) is repaired by
//!    one single-flight refresh followed by one resend; everything else is terminal.
//!
//! Whoever removes a request from the in-flight map delivers its outcome, so completion,
//! cancellation and cleanup can race freely and each request still reports exactly once.

pub mod attempt;
pub mod metrics;
pub mod outcome;

pub use attempt::*;
pub use metrics::*;
pub use outcome::*;

// std
use std::{
	sync::atomic::{AtomicBool, AtomicU64, Ordering},
	time::Duration as StdDuration,
};
// crates.io
use tokio::{
	runtime::Handle,
	sync::oneshot,
	task::{AbortHandle, JoinHandle},
};
// self
use crate::{
	_prelude::*,
	auth::{SessionCredential, UserAccount, UserKey},
	config::ClientConfig,
	error::{ConfigError, CredentialError, RestError, TransportError},
	http::{RestTransport, TransportResponse},
	obs::{self, ExchangeKind, ExchangeOutcome, ExchangeSpan},
	request::{RequestFactory, RestRequest},
	session::{CredentialProvider, RefreshCoordinator},
};

/// Platform error code reported when the session id is no longer valid.
pub const INVALID_SESSION_ID: &str = "INVALID_SESSION_ID";

/// Identifier of a submitted request, unique per client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);
impl RequestId {
	/// Wraps a raw identifier.
	pub const fn new(value: u64) -> Self {
		Self(value)
	}

	/// Returns the raw identifier.
	pub const fn get(self) -> u64 {
		self.0
	}
}
impl Display for RequestId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "req-{}", self.0)
	}
}

/// REST client bound to one authenticated user.
///
/// Obtain it from [`ClientRegistry`](crate::registry::ClientRegistry) so each user has exactly
/// one live client.
pub struct RestClient {
	user: UserKey,
	api_version: RwLock<String>,
	endpoint: String,
	next_id: AtomicU64,
	closed: AtomicBool,
	engine: Arc<Engine>,
}
impl RestClient {
	/// Creates a client for `account` sending through `transport`.
	pub fn new(
		account: &UserAccount,
		transport: Arc<dyn RestTransport>,
		config: &ClientConfig,
	) -> Self {
		Self {
			user: account.key.clone(),
			api_version: RwLock::new(config.api_version.clone()),
			endpoint: config.endpoint.clone(),
			next_id: AtomicU64::new(0),
			closed: AtomicBool::new(false),
			engine: Arc::new(Engine {
				transport,
				credentials: account.credentials.clone(),
				refresh: RefreshCoordinator::default(),
				metrics: DispatchMetrics::default(),
				in_flight: Mutex::new(HashMap::new()),
				user_agent: config.user_agent_header(),
				request_timeout: config.request_timeout,
			}),
		}
	}

	/// User this client acts for.
	pub fn user(&self) -> &UserKey {
		&self.user
	}

	/// API version used by [`RestClient::factory`].
	pub fn api_version(&self) -> String {
		self.api_version.read().clone()
	}

	/// Switches the API version for requests built afterwards.
	pub fn set_api_version(&self, version: impl Into<String>) {
		*self.api_version.write() = version.into();
	}

	/// Request factory for the current API version and endpoint.
	pub fn factory(&self) -> RequestFactory {
		RequestFactory::new(self.api_version()).with_endpoint(self.endpoint.clone())
	}

	/// Dispatch counters of this client.
	pub fn metrics(&self) -> &DispatchMetrics {
		&self.engine.metrics
	}

	/// Number of requests still waiting for their outcome.
	pub fn in_flight(&self) -> usize {
		self.engine.in_flight.lock().len()
	}

	/// Returns `true` once [`RestClient::cleanup`] ran.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::Acquire)
	}

	/// Submits `request`; the returned future resolves to its single outcome.
	///
	/// Must be called from within a Tokio runtime. Fails without registering anything when the
	/// client is closed or no runtime is available.
	pub fn send(&self, request: RestRequest) -> Result<PendingRequest> {
		let (id, receiver, _) = self.submit(request)?;

		Ok(PendingRequest::new(id, receiver))
	}

	/// Submits `request` and reports its outcome to `delegate`.
	pub fn send_with_delegate(
		&self,
		request: RestRequest,
		delegate: Arc<dyn RestDelegate>,
	) -> Result<RequestId> {
		let (id, receiver, runtime) = self.submit(request)?;
		let pending = PendingRequest::new(id, receiver);

		runtime.spawn(async move {
			pending.await.deliver(id, delegate.as_ref());
		});

		Ok(id)
	}

	/// Cancels one request; returns `false` if it already completed.
	pub fn cancel(&self, id: RequestId) -> bool {
		let entry = self.engine.in_flight.lock().remove(&id);

		match entry {
			Some(entry) => {
				self.engine.cancel(entry);

				true
			},
			None => false,
		}
	}

	/// Cancels every in-flight request and returns how many were cancelled.
	///
	/// Each cancelled request reports [`RestOutcome::Cancelled`]; a response arriving later is
	/// discarded.
	pub fn cancel_all(&self) -> usize {
		let drained: Vec<InFlight> =
			self.engine.in_flight.lock().drain().map(|(_, entry)| entry).collect();
		let count = drained.len();

		for entry in drained {
			self.engine.cancel(entry);
		}

		count
	}

	/// Closes the client: cancels everything in flight, rejects later submissions and forgets
	/// the shared refresh state.
	pub fn cleanup(&self) {
		self.closed.store(true, Ordering::Release);
		self.cancel_all();
		self.engine.refresh.reset();
	}

	fn submit(
		&self,
		request: RestRequest,
	) -> Result<(RequestId, oneshot::Receiver<RestOutcome>, Handle)> {
		if self.is_closed() {
			return Err(Error::Closed);
		}

		let runtime = Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?;
		let (sender, receiver) = oneshot::channel();
		let cancelled = Arc::new(AtomicBool::new(false));
		let request = Arc::new(request);
		let mut in_flight = self.engine.in_flight.lock();

		// Checked again under the lock so a concurrent cleanup either sees this entry or
		// rejects it.
		if self.is_closed() {
			return Err(Error::Closed);
		}

		let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
		let task = runtime.spawn(Engine::run(
			self.engine.clone(),
			id,
			request.clone(),
			cancelled.clone(),
		));

		let abort = task.abort_handle();

		runtime.spawn(Engine::supervise(self.engine.clone(), id, task));
		in_flight.insert(id, InFlight { request, completion: sender, cancelled, abort });
		self.engine.metrics.record_send();

		Ok((id, receiver, runtime))
	}
}
impl Debug for RestClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RestClient")
			.field("user", &self.user)
			.field("api_version", &*self.api_version.read())
			.field("endpoint", &self.endpoint)
			.field("in_flight", &self.in_flight())
			.field("closed", &self.is_closed())
			.finish()
	}
}

struct InFlight {
	request: Arc<RestRequest>,
	completion: oneshot::Sender<RestOutcome>,
	cancelled: Arc<AtomicBool>,
	abort: AbortHandle,
}

/// State shared between a client and its exchange tasks.
struct Engine {
	transport: Arc<dyn RestTransport>,
	credentials: Arc<dyn CredentialProvider>,
	refresh: RefreshCoordinator,
	metrics: DispatchMetrics,
	in_flight: Mutex<HashMap<RequestId, InFlight>>,
	user_agent: String,
	request_timeout: Option<StdDuration>,
}
impl Engine {
	async fn run(
		engine: Arc<Engine>,
		id: RequestId,
		request: Arc<RestRequest>,
		cancelled: Arc<AtomicBool>,
	) {
		const KIND: ExchangeKind = ExchangeKind::Dispatch;

		let span = ExchangeSpan::new(KIND, "send", &request.label());

		obs::record_exchange_outcome(KIND, ExchangeOutcome::Attempt);

		let exchange = span.instrument(engine.exchange(&request, &cancelled));
		let outcome = match engine.request_timeout {
			Some(limit) =>
				tokio::time::timeout(limit, exchange).await.unwrap_or(RestOutcome::TimedOut),
			None => exchange.await,
		};

		engine.complete(id, outcome);
	}

	/// Reports a failure for an exchange task that panicked; aborted tasks were already
	/// reported by the cancel path.
	async fn supervise(engine: Arc<Engine>, id: RequestId, task: JoinHandle<()>) {
		match task.await {
			Err(err) if err.is_panic() =>
				engine.complete(id, RestOutcome::Failure { error: Error::Panicked, raw: None }),
			_ => {},
		}
	}

	/// Drives one request through at most one refresh-and-resend cycle.
	async fn exchange(&self, request: &RestRequest, cancelled: &AtomicBool) -> RestOutcome {
		let mut attempt = Attempt::default();
		let mut renewed: Option<SessionCredential> = None;

		loop {
			if cancelled.load(Ordering::Acquire) {
				attempt.finish();

				return RestOutcome::Cancelled;
			}

			let epoch = self.refresh.epoch();
			let credential = renewed
				.take()
				.or_else(|| self.credentials.current_credential())
				.filter(|credential| !credential.is_expired());
			let verdict = match credential {
				Some(credential) => self.transmit(request, credential).await,
				None => Verdict::SessionExpired { stale: None, rejection: None },
			};
			let (stale, rejection) = match verdict {
				Verdict::Done(outcome) => {
					attempt.finish();

					return outcome;
				},
				Verdict::SessionExpired { stale, rejection } => (stale, rejection),
			};

			match attempt.on_session_expired() {
				ExpiryAction::GiveUp => return Self::rejected(rejection),
				ExpiryAction::Refresh => {
					if let Some(stale) = &stale {
						self.credentials.invalidate(stale);
					}

					self.metrics.record_refresh();

					match self.refresh.refresh(self.credentials.as_ref(), epoch).await {
						Ok(credential) => {
							attempt.on_refreshed();
							self.metrics.record_retry();

							renewed = Some(credential);
						},
						Err(err) => {
							attempt.finish();

							return RestOutcome::Failure {
								error: err.into(),
								raw: rejection.map(|rejection| rejection.raw),
							};
						},
					}
				},
			}
		}
	}

	async fn transmit(&self, request: &RestRequest, credential: SessionCredential) -> Verdict {
		let outgoing = match request.to_transport(&credential, &self.user_agent) {
			Ok(outgoing) => outgoing,
			Err(err) => return Verdict::Done(RestOutcome::Failure { error: err.into(), raw: None }),
		};

		match self.transport.execute(outgoing).await {
			Ok(response) => Self::classify(request, credential, response),
			Err(TransportError::Timeout) => Verdict::Done(RestOutcome::TimedOut),
			Err(err) => Verdict::Done(RestOutcome::Failure { error: err.into(), raw: None }),
		}
	}

	fn classify(
		request: &RestRequest,
		credential: SessionCredential,
		response: TransportResponse,
	) -> Verdict {
		let raw = RawResponse::from(&response);

		if response.is_success() {
			let outcome = match ResponseBody::parse(request.expects_json, response.body) {
				Ok(body) => RestOutcome::Success { body, raw },
				Err(err) => RestOutcome::Failure { error: err.into(), raw: Some(raw) },
			};

			return Verdict::Done(outcome);
		}

		let error = RestError::new(response.status, &response.body)
			.with_retry_after(response.retry_after());

		if response.status == 401 || error.has_error_code(INVALID_SESSION_ID) {
			return Verdict::SessionExpired {
				stale: Some(credential),
				rejection: Some(Rejection { status: error.status, body: error.body, raw }),
			};
		}

		Verdict::Done(RestOutcome::Failure { error: error.into(), raw: Some(raw) })
	}

	fn rejected(rejection: Option<Rejection>) -> RestOutcome {
		match rejection {
			Some(Rejection { status, body, raw }) => RestOutcome::Failure {
				error: CredentialError::SessionRejected { status, body }.into(),
				raw: Some(raw),
			},
			None =>
				RestOutcome::Failure { error: CredentialError::MissingCredential.into(), raw: None },
		}
	}

	fn complete(&self, id: RequestId, outcome: RestOutcome) {
		// Absent when the request was cancelled meanwhile; that path already reported.
		let Some(entry) = self.in_flight.lock().remove(&id) else {
			return;
		};

		self.deliver(entry, outcome);
	}

	fn cancel(&self, entry: InFlight) {
		entry.cancelled.store(true, Ordering::Release);
		entry.abort.abort();

		self.deliver(entry, RestOutcome::Cancelled);
	}

	fn deliver(&self, entry: InFlight, outcome: RestOutcome) {
		let _span = ExchangeSpan::new(ExchangeKind::Dispatch, "deliver", &entry.request.label())
			.entered();

		self.metrics.record_outcome(&outcome);
		obs::record_exchange_outcome(ExchangeKind::Dispatch, outcome.label());

		let _ = entry.completion.send(outcome);
	}
}

enum Verdict {
	Done(RestOutcome),
	SessionExpired { stale: Option<SessionCredential>, rejection: Option<Rejection> },
}

struct Rejection {
	status: u16,
	body: String,
	raw: RawResponse,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		http::{HttpMethod, TransportFuture, TransportRequest},
		session::CredentialFuture,
	};

	struct FixedCredentials;
	impl CredentialProvider for FixedCredentials {
		fn current_credential(&self) -> Option<SessionCredential> {
			SessionCredential::builder()
				.access_token("token")
				.instance_url(Url::parse("https://na1.example.com").expect("URL should parse."))
				.build()
				.ok()
		}

		fn refresh(&self) -> CredentialFuture<'_> {
			Box::pin(async { Err(CredentialError::MissingRefreshToken) })
		}
	}

	struct StatusTransport(u16, &'static str);
	impl RestTransport for StatusTransport {
		fn execute(&self, _: TransportRequest) -> TransportFuture<'_> {
			let response = TransportResponse::new(self.0, self.1)
				.with_header("content-type", "application/json");

			Box::pin(async move { Ok(response) })
		}
	}

	fn client(transport: impl RestTransport) -> RestClient {
		let account = UserAccount::new(
			UserKey::parse("00Dxx0000001gPL", "005xx0000012345").expect("Key should parse."),
			Arc::new(FixedCredentials),
		);

		RestClient::new(&account, Arc::new(transport), &ClientConfig::default())
	}

	#[test]
	fn send_outside_a_runtime_registers_nothing() {
		let client = client(StatusTransport(200, "{}"));
		let err = client
			.send(RestRequest::new(HttpMethod::Get, "/"))
			.expect_err("Send without a runtime must fail.");

		assert!(matches!(err, Error::Config(ConfigError::MissingRuntime)));
		assert_eq!(client.in_flight(), 0);
		assert_eq!(client.metrics().sends(), 0);
	}

	#[tokio::test]
	async fn non_session_errors_are_terminal() {
		let client = client(StatusTransport(
			400,
			r#"[{"errorCode":"MALFORMED_QUERY","message":"unexpected token"}]"#,
		));
		let request = client.factory().query("SELECT").expect("Query should build.");
		let outcome = client.send(request).expect("Send should register.").await;
		let Some(Error::Rest(err)) = outcome.error() else {
			panic!("Expected a REST failure, got {outcome:?}.");
		};

		assert_eq!(err.status, 400);
		assert!(err.has_error_code("MALFORMED_QUERY"));
		assert_eq!(client.metrics().refreshes(), 0);
		assert_eq!(client.in_flight(), 0);
	}

	#[tokio::test]
	async fn refresh_failure_is_reported_in_the_oauth_domain() {
		let client = client(StatusTransport(
			401,
			r#"[{"errorCode":"INVALID_SESSION_ID","message":"Session expired or invalid"}]"#,
		));
		let outcome =
			client.send(client.factory().describe_global()).expect("Send should register.").await;

		assert!(matches!(
			outcome.error(),
			Some(Error::Credential(CredentialError::MissingRefreshToken))
		));
		assert_eq!(outcome.error().map(Error::domain), Some(crate::error::ErrorDomain::OAuth));
		assert_eq!(client.metrics().refreshes(), 1);
		assert_eq!(client.metrics().retries(), 0);
	}

	#[tokio::test]
	async fn closed_clients_reject_submissions() {
		let client = client(StatusTransport(204, ""));
		let outcome = client.send(client.factory().versions()).expect("Send should register.").await;

		assert!(matches!(outcome.body(), Some(ResponseBody::Empty)));

		client.cleanup();

		assert!(client.is_closed());
		assert!(matches!(client.send(client.factory().versions()), Err(Error::Closed)));
	}

	#[test]
	fn factory_follows_the_api_version() {
		let client = client(StatusTransport(200, "{}"));

		assert_eq!(client.api_version(), "v42.0");

		client.set_api_version("v60.0");

		assert_eq!(client.factory().resources().path, "/v60.0/");
		assert_eq!(RequestId::new(3).to_string(), "req-3");
	}
}
