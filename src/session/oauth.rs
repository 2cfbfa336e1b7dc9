//! Refresh-token grant backed by the `oauth2` crate.
//!
//! [`OAuthCredentialProvider`] keeps the user's current credential in memory and renews it with
//! `grant_type=refresh_token`. The token request travels over the same [`RestTransport`] the
//! dispatch engine uses, so one HTTP stack (and one test double) serves both.

// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, HttpRequest, HttpResponse, RefreshToken, RequestTokenError,
	StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
	http::{HeaderName, HeaderValue, StatusCode},
};
// self
use crate::{
	_prelude::*,
	auth::{SessionCredential, TokenSecret},
	error::{ConfigError, CredentialError, TransportError},
	http::{HttpMethod, RestTransport, TransportRequest},
	session::{CredentialFuture, CredentialProvider},
};

type SessionTokenResponse = StandardTokenResponse<InstanceFields, BasicTokenType>;
type ConfiguredClient = Client<
	BasicErrorResponse,
	SessionTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Extra fields the platform's token endpoint returns next to the access token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceFields {
	/// Instance URL the session is bound to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub instance_url: Option<String>,
	/// Identity URL of the user.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
}
impl ExtraTokenFields for InstanceFields {}

/// Credential provider that renews sessions through the OAuth 2.0 refresh-token grant.
pub struct OAuthCredentialProvider {
	client: ConfiguredClient,
	transport: Arc<dyn RestTransport>,
	credential: RwLock<Option<SessionCredential>>,
}
impl OAuthCredentialProvider {
	/// Creates a provider for a public client (`client_id` only, sent in the request body).
	pub fn new(
		token_url: &Url,
		client_id: impl Into<String>,
		transport: Arc<dyn RestTransport>,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(token_url.to_string()).map_err(|source| {
			ConfigError::InvalidUrl { url: token_url.to_string(), source }
		})?;
		let client = Client::new(ClientId::new(client_id.into()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self { client, transport, credential: RwLock::new(None) })
	}

	/// Attaches a client secret for confidential clients.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client = self.client.set_client_secret(ClientSecret::new(secret.into()));

		self
	}

	/// Seeds the provider with the credential obtained at login.
	pub fn with_credential(self, credential: SessionCredential) -> Self {
		self.store(credential);

		self
	}

	/// Replaces the stored credential.
	pub fn store(&self, credential: SessionCredential) {
		*self.credential.write() = Some(credential);
	}

	/// Drops the stored credential (logout).
	pub fn clear(&self) -> Option<SessionCredential> {
		self.credential.write().take()
	}
}
impl Debug for OAuthCredentialProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OAuthCredentialProvider")
			.field("credential", &*self.credential.read())
			.finish_non_exhaustive()
	}
}
impl CredentialProvider for OAuthCredentialProvider {
	fn current_credential(&self) -> Option<SessionCredential> {
		self.credential.read().clone()
	}

	fn refresh(&self) -> CredentialFuture<'_> {
		Box::pin(async move {
			let current = self.current_credential().ok_or(CredentialError::MissingCredential)?;
			let refresh_token =
				current.refresh_token.clone().ok_or(CredentialError::MissingRefreshToken)?;
			let handle = TransportHandle(self.transport.clone());
			let secret = RefreshToken::new(refresh_token.expose().to_owned());
			let response = self
				.client
				.exchange_refresh_token(&secret)
				.request_async(&handle)
				.await
				.map_err(map_request_error)?;
			let renewed = renewed_credential(&current, &response)?;

			self.store(renewed.clone());

			Ok(renewed)
		})
	}

	fn invalidate(&self, stale: &SessionCredential) {
		let mut guard = self.credential.write();

		if let Some(current) = guard.as_mut()
			&& current.access_token == stale.access_token
		{
			current.expire(OffsetDateTime::now_utc());
		}
	}
}

/// [`AsyncHttpClient`] adapter that sends token requests over a [`RestTransport`].
struct TransportHandle(Arc<dyn RestTransport>);
impl<'c> AsyncHttpClient<'c> for TransportHandle {
	type Error = HttpClientError<TransportError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			let request = to_transport_request(request)?;
			let response = self
				.0
				.execute(request)
				.await
				.map_err(|err| HttpClientError::Reqwest(Box::new(err)))?;
			let mut converted = HttpResponse::new(response.body);

			*converted.status_mut() = StatusCode::from_u16(response.status)
				.map_err(|err| HttpClientError::Other(err.to_string()))?;

			for (name, value) in &response.headers {
				if let (Ok(name), Ok(value)) =
					(HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value))
				{
					converted.headers_mut().insert(name, value);
				}
			}

			Ok(converted)
		})
	}
}

fn to_transport_request(
	request: HttpRequest,
) -> Result<TransportRequest, HttpClientError<TransportError>> {
	let (parts, body) = request.into_parts();
	let method = parts
		.method
		.as_str()
		.parse::<HttpMethod>()
		.map_err(|err| HttpClientError::Other(err.to_string()))?;
	let url = Url::parse(&parts.uri.to_string())
		.map_err(|err| HttpClientError::Other(format!("Token URL is invalid: {err}.")))?;
	let headers = parts
		.headers
		.iter()
		.filter_map(|(name, value)| {
			value.to_str().ok().map(|value| (name.as_str().to_owned(), value.to_owned()))
		})
		.collect();

	Ok(TransportRequest { method, url, headers, body: Some(body) })
}

fn renewed_credential(
	current: &SessionCredential,
	response: &SessionTokenResponse,
) -> Result<SessionCredential, CredentialError> {
	let instance_url = match response.extra_fields().instance_url.as_deref() {
		Some(raw) => Url::parse(raw).map_err(|err| CredentialError::Exchange {
			message: format!("token endpoint returned an invalid instance URL: {err}"),
		})?,
		None => current.instance_url.clone(),
	};
	// The platform keeps the refresh token unless it rotates it explicitly.
	let refresh_token = response
		.refresh_token()
		.map(|token| TokenSecret::new(token.secret().to_owned()))
		.or_else(|| current.refresh_token.clone());
	let mut builder = SessionCredential::builder()
		.access_token(response.access_token().secret().to_owned())
		.maybe_refresh_token(refresh_token)
		.instance_url(instance_url)
		.issued_at(OffsetDateTime::now_utc());

	if let Some(expires_in) = response.expires_in().and_then(|value| Duration::try_from(value).ok())
	{
		builder = builder.expires_in(expires_in);
	}

	builder.build().map_err(|err| CredentialError::Exchange { message: err.to_string() })
}

fn map_request_error(
	err: BasicRequestTokenError<HttpClientError<TransportError>>,
) -> CredentialError {
	match err {
		RequestTokenError::ServerResponse(response) => CredentialError::RefreshRejected {
			reason: response
				.error_description()
				.cloned()
				.unwrap_or_else(|| response.error().as_ref().to_owned()),
		},
		RequestTokenError::Request(err) => CredentialError::Exchange { message: err.to_string() },
		RequestTokenError::Parse(err, _body) => CredentialError::Exchange {
			message: format!("token response could not be parsed: {err}"),
		},
		RequestTokenError::Other(message) => CredentialError::Exchange { message },
	}
}
