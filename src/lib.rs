//! Per-user REST client for multi-tenant cloud platforms.
//!
//! The crate bundles typed request builders, single-flight session refresh and cancellable
//! dispatch.
//!
//! Build a [`request::RestRequest`] through a [`request::RequestFactory`], hand it to the
//! [`dispatch::RestClient`] owned by the authenticated user (see [`registry::ClientRegistry`]),
//! and await the single [`dispatch::RestOutcome`] it resolves to. Expired sessions are repaired
//! transparently with at most one refresh-and-resend per request.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod obs;
pub mod registry;
pub mod request;
pub mod session;
pub mod user_agent;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use serde_json;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
