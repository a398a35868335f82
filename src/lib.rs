//! Mint federated Google Cloud identity tokens through the IAM Credentials API and present them
//! to a protected endpoint, together with the mock identity provider and request-dump servers
//! used to exercise workload identity federation end to end.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod iam;
pub mod invoke;
pub mod oauth;
pub mod obs;
pub mod server;
pub mod upstream;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{AccessTokenProvider, ServiceAccountEmail, TokenFuture, TokenSecret},
		config::ClientConfig,
		http::ReqwestHttpClient,
	};

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Access token provider that hands out a fixed token and counts how often it was asked.
	#[derive(Debug, Default)]
	pub struct StaticAccessToken {
		token: String,
		quota_project: Option<String>,
		calls: Mutex<usize>,
	}
	impl StaticAccessToken {
		/// Creates a provider returning `token` on every call.
		pub fn new(token: impl Into<String>) -> Self {
			Self { token: token.into(), quota_project: None, calls: Mutex::new(0) }
		}

		/// Bills calls authorized by this provider to `project`.
		pub fn with_quota_project(mut self, project: impl Into<String>) -> Self {
			self.quota_project = Some(project.into());

			self
		}

		/// Number of times [`AccessTokenProvider::access_token`] has been invoked.
		pub fn calls(&self) -> usize {
			*self.calls.lock()
		}
	}
	impl AccessTokenProvider for StaticAccessToken {
		fn access_token(&self) -> TokenFuture<'_> {
			*self.calls.lock() += 1;

			let token = TokenSecret::new(self.token.clone());

			Box::pin(async move { Ok(token) })
		}

		fn quota_project_id(&self) -> Option<&str> {
			self.quota_project.as_deref()
		}
	}

	/// Client configuration pointing the IAM endpoint and target URL at mock servers.
	pub fn test_client_config(iam_endpoint: &str, target_url: &str) -> ClientConfig {
		ClientConfig {
			target_url: Url::parse(target_url).expect("Mock target URL should parse."),
			audience: crate::auth::Audience::new("https://mock-run.example.com")
				.expect("Mock audience should be valid."),
			service_account: ServiceAccountEmail::new("federated@mock-project.iam.gserviceaccount.com")
				.expect("Mock service account should be valid."),
			include_email: true,
			iam_endpoint: Url::parse(iam_endpoint).expect("Mock IAM endpoint should parse."),
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		path::{Path, PathBuf},
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError, StatusCode};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
// Used by the binaries only.
use color_eyre as _;
#[cfg(test)] use {httpmock as _, tower as _};
