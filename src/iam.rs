//! IAM Service Account Credentials API client.
//!
//! [`IamCredentialsClient::generate_id_token`] mints an OIDC identity token for a service
//! account by calling
//! `POST {endpoint}/v1/projects/-/serviceAccounts/{email}:generateIdToken` with the caller's
//! access token. The caller needs `roles/iam.serviceAccountTokenCreator` (or
//! `iam.serviceAccounts.getOpenIdToken`) on the target account.

// self
use crate::{
	_prelude::*,
	auth::{AccessTokenProvider, Audience, ServiceAccountEmail, TokenSecret},
	error::{ConfigError, TransientError},
	http::{self, ReqwestHttpClient},
	oauth,
	obs::{self, Stage},
	upstream::Upstream,
};

/// Production IAM Credentials endpoint.
pub const DEFAULT_IAM_ENDPOINT: &str = "https://iamcredentials.googleapis.com";
/// Header naming the project billed for quota.
pub const QUOTA_PROJECT_HEADER: &str = "x-goog-user-project";

/// Parameters of a `generateIdToken` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerateIdTokenRequest {
	/// Account whose identity is asserted by the token.
	pub service_account: ServiceAccountEmail,
	/// Value of the token's `aud` claim.
	pub audience: Audience,
	/// Whether the token carries `email` and `email_verified` claims.
	pub include_email: bool,
	/// Delegation chain, each entry an account email or resource name.
	pub delegates: Vec<String>,
}
impl GenerateIdTokenRequest {
	/// Creates a request without email claims or delegates.
	pub fn new(service_account: ServiceAccountEmail, audience: Audience) -> Self {
		Self { service_account, audience, include_email: false, delegates: Vec::new() }
	}

	/// Sets whether email claims are included.
	pub fn include_email(mut self, include_email: bool) -> Self {
		self.include_email = include_email;

		self
	}

	/// Sets the delegation chain.
	pub fn delegates<I, S>(mut self, delegates: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.delegates = delegates.into_iter().map(Into::into).collect();

		self
	}

	fn body(&self) -> GenerateIdTokenBody<'_> {
		GenerateIdTokenBody {
			audience: &self.audience,
			include_email: self.include_email,
			delegates: &self.delegates,
		}
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateIdTokenBody<'a> {
	audience: &'a str,
	include_email: bool,
	#[serde(skip_serializing_if = "no_delegates")]
	delegates: &'a [String],
}

fn no_delegates(delegates: &&[String]) -> bool {
	delegates.is_empty()
}

#[derive(Deserialize)]
struct GenerateIdTokenResponse {
	token: TokenSecret,
}

/// Parameters of a `generateAccessToken` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GenerateAccessTokenRequest {
	/// OAuth scopes requested for the impersonated token.
	pub scope: Vec<String>,
	/// Requested lifetime as a protobuf duration, e.g. `3600s`.
	pub lifetime: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateAccessTokenResponse {
	access_token: TokenSecret,
	#[serde(default, with = "time::serde::rfc3339::option")]
	expire_time: Option<OffsetDateTime>,
}

/// Client for the IAM Credentials API authorized by an [`AccessTokenProvider`].
#[derive(Clone)]
pub struct IamCredentialsClient {
	http: ReqwestHttpClient,
	endpoint: Url,
	credentials: Arc<dyn AccessTokenProvider>,
}
impl IamCredentialsClient {
	/// Creates a client targeting `endpoint`, normally [`DEFAULT_IAM_ENDPOINT`].
	pub fn with_endpoint(
		http: ReqwestHttpClient,
		endpoint: Url,
		credentials: Arc<dyn AccessTokenProvider>,
	) -> Self {
		Self { http, endpoint, credentials }
	}

	/// Mints an identity token for `request.service_account`.
	///
	/// The access token is obtained first; its failure is returned before any IAM call.
	/// Error statuses are classified by [`UpstreamErrorContext`](crate::upstream::UpstreamErrorContext),
	/// so a missing `getOpenIdToken` permission surfaces as [`Error::PermissionDenied`].
	pub async fn generate_id_token(&self, request: &GenerateIdTokenRequest) -> Result<TokenSecret> {
		let access_token = self.credentials.access_token().await?;

		obs::observe(Stage::IdToken, "generate_id_token", async {
			let url = self.method_url(&request.service_account, "generateIdToken")?;
			let mut builder = self
				.http
				.post(url)
				.header(reqwest::header::AUTHORIZATION, access_token.bearer())
				.json(&request.body());

			if let Some(project) = self.credentials.quota_project_id() {
				builder = builder.header(QUOTA_PROJECT_HEADER, project);
			}

			let response = builder
				.send()
				.await
				.map_err(|err| oauth::map_reqwest_error(Upstream::IamCredentials, None, err))?;
			let body: GenerateIdTokenResponse =
				http::read_json(Upstream::IamCredentials, response).await?;

			#[cfg(feature = "tracing")]
			tracing::debug!(service_account = %request.service_account, "identity token minted");

			Ok(body.token)
		})
		.await
	}

	/// Calls a `generateAccessToken` URL with `source` as the bearer credential.
	///
	/// Used by federated credentials that impersonate a service account after the STS exchange.
	pub async fn generate_access_token(
		http: &ReqwestHttpClient,
		url: &Url,
		source: &TokenSecret,
		request: &GenerateAccessTokenRequest,
	) -> Result<TokenSecret> {
		let response = http
			.post(url.clone())
			.header(reqwest::header::AUTHORIZATION, source.bearer())
			.json(request)
			.send()
			.await
			.map_err(|err| oauth::map_reqwest_error(Upstream::IamCredentials, None, err))?;
		let body: GenerateAccessTokenResponse =
			http::read_json(Upstream::IamCredentials, response).await?;

		if body.expire_time.is_some_and(|expiry| expiry <= OffsetDateTime::now_utc()) {
			return Err(TransientError::Upstream {
				upstream: Upstream::IamCredentials,
				message: "generateAccessToken returned an expireTime in the past".into(),
				status: None,
				retry_after: None,
			}
			.into());
		}

		Ok(body.access_token)
	}

	fn method_url(&self, service_account: &ServiceAccountEmail, method: &str) -> Result<Url> {
		let raw = format!(
			"{}/v1/{}:{method}",
			self.endpoint.as_str().trim_end_matches('/'),
			service_account.resource_name()
		);

		Url::parse(&raw).map_err(|source| ConfigError::invalid_url("IAM method", source).into())
	}
}
impl Debug for IamCredentialsClient {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IamCredentialsClient")
			.field("endpoint", &self.endpoint.as_str())
			.finish_non_exhaustive()
	}
}
