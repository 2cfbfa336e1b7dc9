//! Explicit per-user client registry.
//!
//! The application owns one [`ClientRegistry`] and asks it for the client of a user. At most
//! one live [`RestClient`] exists per [`UserKey`]; removing a user cancels everything that user
//! still has in flight.

// self
use crate::{
	_prelude::*,
	auth::{UserAccount, UserContext, UserKey},
	config::ClientConfig,
	dispatch::RestClient,
	http::RestTransport,
};

/// Lazily creates and tracks one [`RestClient`] per user.
pub struct ClientRegistry {
	transport: Arc<dyn RestTransport>,
	config: ClientConfig,
	clients: Mutex<HashMap<UserKey, Arc<RestClient>>>,
}
impl ClientRegistry {
	/// Creates a registry whose clients share `transport` and start from `config`.
	pub fn new(transport: Arc<dyn RestTransport>, config: ClientConfig) -> Self {
		Self { transport, config, clients: Default::default() }
	}

	/// Creates a registry backed by a default reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn with_reqwest(config: ClientConfig) -> Result<Self> {
		let transport = match config.request_timeout {
			Some(timeout) => crate::http::ReqwestTransport::with_timeout(timeout)?,
			None => crate::http::ReqwestTransport::default(),
		};

		Ok(Self::new(Arc::new(transport), config))
	}

	/// Default configuration applied to new clients.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Returns the client of `account`, creating it on first use.
	pub fn client_for(&self, account: &UserAccount) -> Arc<RestClient> {
		self.clients
			.lock()
			.entry(account.key.clone())
			.or_insert_with(|| {
				Arc::new(RestClient::new(account, self.transport.clone(), &self.config))
			})
			.clone()
	}

	/// Returns the client of whoever `context` reports as signed in.
	pub fn current_client(&self, context: &dyn UserContext) -> Option<Arc<RestClient>> {
		context.current_user().map(|account| self.client_for(&account))
	}

	/// Returns the existing client of `user` without creating one.
	pub fn get(&self, user: &UserKey) -> Option<Arc<RestClient>> {
		self.clients.lock().get(user).cloned()
	}

	/// Removes the client of `user` and cleans it up; returns `false` if none existed.
	///
	/// Call on logout or when the user's instance host changes.
	pub fn cleanup(&self, user: &UserKey) -> bool {
		let removed = self.clients.lock().remove(user);

		match removed {
			Some(client) => {
				client.cleanup();

				true
			},
			None => false,
		}
	}

	/// Removes and cleans up every client.
	pub fn cleanup_all(&self) {
		let drained: Vec<Arc<RestClient>> =
			self.clients.lock().drain().map(|(_, client)| client).collect();

		for client in drained {
			client.cleanup();
		}
	}

	/// Number of live clients.
	pub fn len(&self) -> usize {
		self.clients.lock().len()
	}

	/// Returns `true` when no client is live.
	pub fn is_empty(&self) -> bool {
		self.clients.lock().is_empty()
	}
}
impl Debug for ClientRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientRegistry")
			.field("config", &self.config)
			.field("clients", &self.len())
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		auth::{AccountSlot, SessionCredential},
		error::CredentialError,
		http::{TransportFuture, TransportRequest, TransportResponse},
		session::{CredentialFuture, CredentialProvider},
	};

	struct NoContent;
	impl RestTransport for NoContent {
		fn execute(&self, _: TransportRequest) -> TransportFuture<'_> {
			Box::pin(async { Ok(TransportResponse::new(204, "")) })
		}
	}

	struct NoCredentials;
	impl CredentialProvider for NoCredentials {
		fn current_credential(&self) -> Option<SessionCredential> {
			None
		}

		fn refresh(&self) -> CredentialFuture<'_> {
			Box::pin(async { Err(CredentialError::MissingCredential) })
		}
	}

	fn account(user: &str) -> UserAccount {
		UserAccount::new(
			UserKey::parse("00Dxx0000001gPL", user).expect("Key fixture should parse."),
			Arc::new(NoCredentials),
		)
	}

	#[test]
	fn clients_are_unique_per_user() {
		let registry = ClientRegistry::new(Arc::new(NoContent), ClientConfig::default());
		let alice = account("005xx000001AAAA");
		let first = registry.client_for(&alice);
		let second = registry.client_for(&alice);
		let other = registry.client_for(&account("005xx000001BBBB"));

		assert!(Arc::ptr_eq(&first, &second));
		assert!(!Arc::ptr_eq(&first, &other));
		assert_eq!(registry.len(), 2);
		assert!(registry.cleanup(&alice.key));
		assert!(first.is_closed());
		assert!(!registry.cleanup(&alice.key));
		assert!(!Arc::ptr_eq(&first, &registry.client_for(&alice)));
	}

	#[test]
	fn current_client_follows_the_context() {
		let registry = ClientRegistry::new(
			Arc::new(NoContent),
			ClientConfig::default().with_api_version("v58.0"),
		);
		let slot = AccountSlot::default();

		assert!(registry.current_client(&slot).is_none());
		assert!(registry.is_empty());

		slot.sign_in(account("005xx000001AAAA"));

		let client = registry.current_client(&slot).expect("Signed-in user should get a client.");

		assert_eq!(client.api_version(), "v58.0");
		assert!(registry.get(client.user()).is_some());

		registry.cleanup_all();

		assert!(registry.is_empty());
		assert!(client.is_closed());
	}
}
