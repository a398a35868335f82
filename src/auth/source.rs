//! Access-token providers backing Application Default Credentials.
//!
//! Each credential type found by [`discover`](crate::auth::discover) becomes an
//! [`AccessTokenProvider`] that mints a fresh cloud-platform access token per call. Tokens
//! are never cached: the program makes exactly one authorized call per run.

mod external;
mod metadata;
mod service_account;
mod user;

pub use external::*;
pub use metadata::*;
pub use service_account::*;
pub use user::*;

// self
use crate::{_prelude::*, auth::TokenSecret};

/// OAuth scope granting access to Google Cloud APIs, including IAM Credentials.
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Boxed future returned by [`AccessTokenProvider::access_token`].
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = Result<TokenSecret>> + 'a + Send>>;

/// Source of OAuth access tokens used to authorize calls to Google APIs.
///
/// Implementations must be `Send + Sync` so a single provider can be shared behind an
/// `Arc` between the IAM client and any impersonation hop.
pub trait AccessTokenProvider: Send + Sync {
	/// Mints a new access token.
	fn access_token(&self) -> TokenFuture<'_>;

	/// Project billed for quota on calls authorized by this provider.
	///
	/// Sent as `x-goog-user-project` alongside the access token.
	fn quota_project_id(&self) -> Option<&str> {
		None
	}
}
