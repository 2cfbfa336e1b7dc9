//! Session credential snapshots handed out by credential providers.

// self
use crate::{_prelude::*, auth::secret::TokenSecret};

/// Errors produced by [`SessionCredentialBuilder`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum SessionCredentialBuilderError {
	/// Issued when no access token value was provided.
	#[error("Access token is required.")]
	MissingAccessToken,
	/// Issued when no instance URL was provided.
	#[error("Instance URL is required.")]
	MissingInstanceUrl,
}

/// Access token plus the material needed to renew it.
///
/// The expiry is optional because the platform usually does not advertise session lifetimes;
/// an unknown expiry means the credential is used until the server rejects it.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionCredential {
	/// Access token (session id); callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Refresh token used to renew the session, if one was issued.
	pub refresh_token: Option<TokenSecret>,
	/// Instance URL requests are resolved against.
	pub instance_url: Url,
	/// Issued-at instant.
	pub issued_at: OffsetDateTime,
	/// Expiry instant, when known.
	pub expires_at: Option<OffsetDateTime>,
}
impl SessionCredential {
	/// Returns a builder for the credential.
	pub fn builder() -> SessionCredentialBuilder {
		SessionCredentialBuilder::default()
	}

	/// Returns `true` if the expiry is known and has passed at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}

	/// Returns `true` if the credential is known to be expired now.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Marks the credential as expired at the provided instant.
	pub fn expire(&mut self, instant: OffsetDateTime) {
		self.expires_at = Some(instant);
	}
}
impl Debug for SessionCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionCredential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.field("instance_url", &self.instance_url.as_str())
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Builder for [`SessionCredential`].
#[derive(Clone, Debug, Default)]
pub struct SessionCredentialBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	instance_url: Option<Url>,
	issued_at: Option<OffsetDateTime>,
	expires_at: Option<OffsetDateTime>,
	expires_in: Option<Duration>,
}
impl SessionCredentialBuilder {
	/// Provides the access token value.
	pub fn access_token(mut self, token: impl Into<String>) -> Self {
		self.access_token = Some(TokenSecret::new(token));

		self
	}

	/// Provides the refresh token value.
	pub fn refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Keeps an existing refresh secret, if any.
	pub fn maybe_refresh_token(mut self, token: Option<TokenSecret>) -> Self {
		self.refresh_token = token;

		self
	}

	/// Sets the instance URL.
	pub fn instance_url(mut self, url: Url) -> Self {
		self.instance_url = Some(url);

		self
	}

	/// Sets the issued-at instant.
	pub fn issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Sets a relative expiry duration from the issued instant.
	pub fn expires_in(mut self, duration: Duration) -> Self {
		self.expires_in = Some(duration);

		self
	}

	/// Consumes the builder and produces a [`SessionCredential`].
	pub fn build(self) -> Result<SessionCredential, SessionCredentialBuilderError> {
		let access_token =
			self.access_token.ok_or(SessionCredentialBuilderError::MissingAccessToken)?;
		let instance_url =
			self.instance_url.ok_or(SessionCredentialBuilderError::MissingInstanceUrl)?;
		let issued_at = self.issued_at.unwrap_or_else(OffsetDateTime::now_utc);
		let expires_at = self.expires_at.or_else(|| self.expires_in.map(|delta| issued_at + delta));

		Ok(SessionCredential {
			access_token,
			refresh_token: self.refresh_token,
			instance_url,
			issued_at,
			expires_at,
		})
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn instance() -> Url {
		Url::parse("https://na1.example.com").expect("Instance fixture should parse.")
	}

	#[test]
	fn unknown_expiry_never_expires_locally() {
		let credential = SessionCredential::builder()
			.access_token("access")
			.instance_url(instance())
			.build()
			.expect("Credential builder should succeed.");

		assert!(!credential.is_expired_at(macros::datetime!(2999-01-01 00:00 UTC)));
	}

	#[test]
	fn relative_expiry_is_resolved_from_issued_at() {
		let mut credential = SessionCredential::builder()
			.access_token("access")
			.refresh_token("refresh")
			.instance_url(instance())
			.issued_at(macros::datetime!(2025-01-01 00:00 UTC))
			.expires_in(Duration::hours(2))
			.build()
			.expect("Credential builder should succeed.");

		assert_eq!(credential.expires_at, Some(macros::datetime!(2025-01-01 02:00 UTC)));
		assert!(!credential.is_expired_at(macros::datetime!(2025-01-01 01:59 UTC)));
		assert!(credential.is_expired_at(macros::datetime!(2025-01-01 02:00 UTC)));

		credential.expire(macros::datetime!(2025-01-01 00:30 UTC));

		assert!(credential.is_expired_at(macros::datetime!(2025-01-01 00:31 UTC)));
	}

	#[test]
	fn builder_requires_token_and_instance() {
		assert_eq!(
			SessionCredential::builder().instance_url(instance()).build().unwrap_err(),
			SessionCredentialBuilderError::MissingAccessToken
		);
		assert_eq!(
			SessionCredential::builder().access_token("a").build().unwrap_err(),
			SessionCredentialBuilderError::MissingInstanceUrl
		);
	}

	#[test]
	fn debug_redacts_secrets() {
		let credential = SessionCredential::builder()
			.access_token("super-secret")
			.refresh_token("refresh-secret")
			.instance_url(instance())
			.build()
			.expect("Credential builder should succeed.");
		let rendered = format!("{credential:?}");

		assert!(!rendered.contains("super-secret"));
		assert!(!rendered.contains("refresh-secret"));
	}
}
