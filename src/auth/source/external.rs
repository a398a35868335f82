// self
use crate::{
	_prelude::*,
	auth::{
		AccessTokenProvider, CLOUD_PLATFORM_SCOPE, CredentialSource, ExternalAccountConfig,
		SubjectTokenFormat, TokenFuture, TokenSecret,
	},
	error::CredentialsError,
	http::{self, ReqwestHttpClient},
	iam::{GenerateAccessTokenRequest, IamCredentialsClient},
	oauth,
	obs::{self, Stage},
	upstream::Upstream,
};

const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";
const IMPERSONATION_LIFETIME: &str = "3600s";

/// Workload or workforce identity federation credentials.
///
/// A subject token read from a file or URL is exchanged at the Security Token Service
/// (RFC 8693). When the configuration names a service account to impersonate, the federated
/// token is then traded for that account's access token through IAM `generateAccessToken`.
#[derive(Debug)]
pub struct ExternalAccountCredentials {
	config: ExternalAccountConfig,
	http: ReqwestHttpClient,
}
impl ExternalAccountCredentials {
	/// Validates the credential source and builds the provider.
	pub fn new(config: ExternalAccountConfig, http: ReqwestHttpClient) -> Result<Self> {
		validate_source(&config.credential_source)?;

		Ok(Self { config, http })
	}

	async fn subject_token(&self) -> Result<String> {
		let source = &self.config.credential_source;
		let raw = match (&source.file, &source.url) {
			(Some(path), _) => tokio::fs::read_to_string(path)
				.await
				.map_err(|e| subject_token_error(format!("reading {}: {e}", path.display())))?,
			(None, Some(url)) => {
				let mut request = self.http.get(url.clone());

				for (name, value) in &source.headers {
					request = request.header(name, value);
				}

				let response = request
					.send()
					.await
					.map_err(|err| oauth::map_reqwest_error(Upstream::SubjectTokenUrl, None, err))?;

				http::read_text(Upstream::SubjectTokenUrl, response).await?
			},
			(None, None) => return Err(no_source().into()),
		};

		extract_subject_token(&source.format, &raw)
	}

	fn scopes(&self) -> Vec<String> {
		if self.config.scopes.is_empty() {
			vec![CLOUD_PLATFORM_SCOPE.to_owned()]
		} else {
			self.config.scopes.clone()
		}
	}

	async fn exchange(&self, subject_token: String) -> Result<TokenSecret> {
		let mut form = BTreeMap::from([
			("grant_type", TOKEN_EXCHANGE_GRANT.to_owned()),
			("requested_token_type", ACCESS_TOKEN_TYPE.to_owned()),
			("audience", self.config.audience.clone()),
			("scope", self.scopes().join(" ")),
			("subject_token", subject_token),
			("subject_token_type", self.config.subject_token_type.clone()),
		]);

		// Workforce pools bill the user project unless a service account is impersonated.
		if let Some(project) = &self.config.workforce_pool_user_project
			&& self.config.service_account_impersonation_url.is_none()
		{
			form.insert("options", serde_json::json!({ "userProject": project }).to_string());
		}

		oauth::post_token_form(
			&self.http,
			Upstream::SecurityTokenService,
			&self.config.token_url,
			&form,
		)
		.await?
		.into_token()
	}

	async fn fetch(&self) -> Result<TokenSecret> {
		let subject_token = self.subject_token().await?;
		let federated = self.exchange(subject_token).await?;
		let Some(url) = &self.config.service_account_impersonation_url else {
			return Ok(federated);
		};
		let request = GenerateAccessTokenRequest {
			scope: self.scopes(),
			lifetime: IMPERSONATION_LIFETIME.into(),
		};

		IamCredentialsClient::generate_access_token(&self.http, url, &federated, &request).await
	}
}
impl AccessTokenProvider for ExternalAccountCredentials {
	fn access_token(&self) -> TokenFuture<'_> {
		Box::pin(obs::observe(Stage::AccessToken, "external_account", self.fetch()))
	}

	fn quota_project_id(&self) -> Option<&str> {
		self.config.quota_project_id.as_deref()
	}
}

fn validate_source(source: &CredentialSource) -> Result<(), CredentialsError> {
	if source.executable.is_some() {
		return Err(CredentialsError::InvalidCredentialSource {
			reason: "executable-sourced credentials are not supported".into(),
		});
	}
	if source.environment_id.is_some() {
		return Err(CredentialsError::InvalidCredentialSource {
			reason: "AWS environment credentials are not supported".into(),
		});
	}

	match (&source.file, &source.url) {
		(Some(_), Some(_)) => Err(CredentialsError::InvalidCredentialSource {
			reason: "only one of `file` or `url` may be set".into(),
		}),
		(None, None) => Err(no_source()),
		_ => Ok(()),
	}
}

fn no_source() -> CredentialsError {
	CredentialsError::InvalidCredentialSource { reason: "one of `file` or `url` must be set".into() }
}

fn subject_token_error(reason: String) -> CredentialsError {
	CredentialsError::SubjectToken { reason }
}

fn extract_subject_token(format: &SubjectTokenFormat, raw: &str) -> Result<String> {
	let token = match format {
		SubjectTokenFormat::Text => raw.trim().to_owned(),
		SubjectTokenFormat::Json { subject_token_field_name } => {
			let document: serde_json::Value = serde_json::from_str(raw)
				.map_err(|e| subject_token_error(format!("payload is not JSON: {e}")))?;

			document
				.get(subject_token_field_name)
				.and_then(serde_json::Value::as_str)
				.map(|value| value.trim().to_owned())
				.ok_or_else(|| {
					subject_token_error(format!(
						"field `{subject_token_field_name}` is missing or not a string"
					))
				})?
		},
	};

	if token.is_empty() {
		return Err(subject_token_error("token is empty".into()).into());
	}

	Ok(token)
}
