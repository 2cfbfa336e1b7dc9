#![cfg(feature = "reqwest")]

mod common;

// self
use common::*;
use sforce_rest::{
	config::{is_test_run, set_test_run},
	http::ReqwestTransport,
};

#[tokio::test]
async fn test_runs_keep_the_reqwest_transport_offline() {
	assert!(!is_test_run());

	set_test_run(true);

	let provider =
		Arc::new(CountingProvider::new(Some(credential_at("live", "http://127.0.0.1:9"))));
	let client =
		client(Arc::new(ReqwestTransport::default()), provider.clone(), ClientConfig::default());
	let outcome = client.send(client.factory().versions()).expect("Send should register.").await;

	assert!(
		matches!(outcome.error(), Some(Error::Transport(TransportError::Disabled))),
		"Unexpected outcome: {outcome:?}."
	);
	assert_eq!(provider.refreshes(), 0);

	set_test_run(false);

	assert!(!is_test_run());
}
