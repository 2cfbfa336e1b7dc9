//! Scripted transports and credential providers shared by the integration tests.

#![allow(dead_code)]

pub use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};

pub use parking_lot::Mutex;
pub use sforce_rest::{
	auth::{SessionCredential, UserAccount, UserKey},
	config::ClientConfig,
	dispatch::{RestClient, RestOutcome},
	error::{CredentialError, Error, TransportError},
	http::{RestTransport, TransportFuture, TransportRequest, TransportResponse},
	session::{CredentialFuture, CredentialProvider},
	url::Url,
};
pub use time::{Duration, OffsetDateTime};

pub const INSTANCE: &str = "https://na1.example.com";
pub const INVALID_SESSION: &str =
	r#"[{"errorCode":"INVALID_SESSION_ID","message":"Session expired or invalid"}]"#;

/// One scripted transport reaction.
pub enum Step {
	Respond(TransportResponse),
	Delayed(StdDuration, TransportResponse),
	Timeout,
	Network,
}

/// Transport that replays scripted steps in order and answers `200 {}` once they run out.
#[derive(Default)]
pub struct ScriptedTransport {
	steps: Mutex<VecDeque<Step>>,
	seen: Mutex<Vec<TransportRequest>>,
}
impl ScriptedTransport {
	pub fn new(steps: impl IntoIterator<Item = Step>) -> Arc<Self> {
		Arc::new(Self { steps: Mutex::new(steps.into_iter().collect()), seen: Mutex::default() })
	}

	pub fn hits(&self) -> usize {
		self.seen.lock().len()
	}

	pub fn requests(&self) -> Vec<TransportRequest> {
		self.seen.lock().clone()
	}
}
impl RestTransport for ScriptedTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		self.seen.lock().push(request);

		let step = self.steps.lock().pop_front();

		Box::pin(async move {
			match step {
				Some(Step::Respond(response)) => Ok(response),
				Some(Step::Delayed(delay, response)) => {
					tokio::time::sleep(delay).await;

					Ok(response)
				},
				Some(Step::Timeout) => Err(TransportError::Timeout),
				Some(Step::Network) => Err(TransportError::Io(std::io::Error::other("reset"))),
				None => Ok(json(200, "{}")),
			}
		})
	}
}

/// Transport that accepts exactly one bearer token and rejects everything else with 401.
pub struct SessionAwareTransport {
	valid_token: String,
	body: String,
	delay: StdDuration,
	hits: AtomicUsize,
}
impl SessionAwareTransport {
	pub fn new(valid_token: &str, body: &str, delay: StdDuration) -> Arc<Self> {
		Arc::new(Self {
			valid_token: valid_token.into(),
			body: body.into(),
			delay,
			hits: AtomicUsize::new(0),
		})
	}

	pub fn hits(&self) -> usize {
		self.hits.load(Ordering::SeqCst)
	}
}
impl RestTransport for SessionAwareTransport {
	fn execute(&self, request: TransportRequest) -> TransportFuture<'_> {
		self.hits.fetch_add(1, Ordering::SeqCst);

		let expected = format!("Bearer {}", self.valid_token);
		let response = if request.header("Authorization") == Some(expected.as_str()) {
			json(200, &self.body)
		} else {
			json(401, INVALID_SESSION)
		};
		let delay = self.delay;

		Box::pin(async move {
			tokio::time::sleep(delay).await;

			Ok(response)
		})
	}
}

/// Credential provider that counts refreshes and renews to `fresh-<n>` (or fails).
pub struct CountingProvider {
	credential: Mutex<Option<SessionCredential>>,
	refresh_delay: StdDuration,
	failure: Option<CredentialError>,
	refreshes: AtomicUsize,
	invalidations: AtomicUsize,
}
impl CountingProvider {
	pub fn new(credential: Option<SessionCredential>) -> Self {
		Self {
			credential: Mutex::new(credential),
			refresh_delay: StdDuration::ZERO,
			failure: None,
			refreshes: AtomicUsize::new(0),
			invalidations: AtomicUsize::new(0),
		}
	}

	pub fn with_refresh_delay(mut self, delay: StdDuration) -> Self {
		self.refresh_delay = delay;

		self
	}

	pub fn failing(mut self, failure: CredentialError) -> Self {
		self.failure = Some(failure);

		self
	}

	pub fn refreshes(&self) -> usize {
		self.refreshes.load(Ordering::SeqCst)
	}

	pub fn invalidations(&self) -> usize {
		self.invalidations.load(Ordering::SeqCst)
	}
}
impl CredentialProvider for CountingProvider {
	fn current_credential(&self) -> Option<SessionCredential> {
		self.credential.lock().clone()
	}

	fn refresh(&self) -> CredentialFuture<'_> {
		Box::pin(async move {
			let call = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;

			tokio::time::sleep(self.refresh_delay).await;

			if let Some(failure) = &self.failure {
				return Err(failure.clone());
			}

			let renewed = credential(&format!("fresh-{call}"));

			*self.credential.lock() = Some(renewed.clone());

			Ok(renewed)
		})
	}

	fn invalidate(&self, _: &SessionCredential) {
		self.invalidations.fetch_add(1, Ordering::SeqCst);
	}
}

pub fn json(status: u16, body: &str) -> TransportResponse {
	TransportResponse::new(status, body).with_header("Content-Type", "application/json")
}

pub fn credential(token: &str) -> SessionCredential {
	credential_at(token, INSTANCE)
}

pub fn credential_at(token: &str, instance: &str) -> SessionCredential {
	SessionCredential::builder()
		.access_token(token)
		.refresh_token("refresh-token")
		.instance_url(Url::parse(instance).expect("Instance URL fixture should parse."))
		.build()
		.expect("Credential fixture should build.")
}

pub fn expired_credential(token: &str) -> SessionCredential {
	let mut credential = credential(token);

	credential.expire(OffsetDateTime::now_utc() - Duration::minutes(1));

	credential
}

pub fn account(user: &str, provider: Arc<dyn CredentialProvider>) -> UserAccount {
	UserAccount::new(
		UserKey::parse("00Dxx0000001gPL", user).expect("User key fixture should parse."),
		provider,
	)
}

pub fn client(
	transport: Arc<dyn RestTransport>,
	provider: Arc<dyn CredentialProvider>,
	config: ClientConfig,
) -> RestClient {
	RestClient::new(&account("005xx0000012345", provider), transport, &config)
}
