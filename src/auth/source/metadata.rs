// self
use crate::{
	_prelude::*,
	auth::{AccessTokenProvider, TokenFuture, TokenSecret},
	error::{ConfigError, CredentialsError},
	http::{self, ReqwestHttpClient},
	oauth::{self, AccessTokenResponse},
	obs::{self, Stage},
	upstream::Upstream,
};

/// Environment variable overriding the metadata server host (`host[:port]`).
pub const GCE_METADATA_HOST: &str = "GCE_METADATA_HOST";
/// Metadata server host used when [`GCE_METADATA_HOST`] is unset.
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";

const TOKEN_PATH: &str = "computeMetadata/v1/instance/service-accounts/default/token";
const METADATA_FLAVOR: &str = "Metadata-Flavor";

/// Fetches the default service account's access token from the GCE metadata server.
#[derive(Debug)]
pub struct MetadataServerCredentials {
	token_url: Url,
	http: ReqwestHttpClient,
}
impl MetadataServerCredentials {
	/// Targets the host named by [`GCE_METADATA_HOST`], or [`DEFAULT_METADATA_HOST`].
	pub fn new(http: ReqwestHttpClient) -> Result<Self> {
		let host = std::env::var(GCE_METADATA_HOST)
			.ok()
			.filter(|host| !host.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_METADATA_HOST.to_owned());
		let base = Url::parse(&format!("http://{host}/"))
			.map_err(|source| ConfigError::invalid_url("metadata server", source))?;

		Self::with_base_url(&base, http)
	}

	/// Targets an explicit metadata server base URL.
	pub fn with_base_url(base: &Url, http: ReqwestHttpClient) -> Result<Self> {
		let token_url = base
			.join(TOKEN_PATH)
			.map_err(|source| ConfigError::invalid_url("metadata server", source))?;

		Ok(Self { token_url, http })
	}

	async fn fetch(&self) -> Result<TokenSecret> {
		let response = self
			.http
			.get(self.token_url.clone())
			.header(METADATA_FLAVOR, "Google")
			.send()
			.await
			.map_err(|err| {
				if err.is_connect() || err.is_timeout() {
					CredentialsError::NotFound {
						reason: format!(
							"no credential file was found and the metadata server at {} is unreachable",
							self.token_url.host_str().unwrap_or(DEFAULT_METADATA_HOST)
						),
					}
					.into()
				} else {
					oauth::map_reqwest_error(Upstream::MetadataServer, None, err)
				}
			})?;

		http::read_json::<AccessTokenResponse>(Upstream::MetadataServer, response).await?.into_token()
	}
}
impl AccessTokenProvider for MetadataServerCredentials {
	fn access_token(&self) -> TokenFuture<'_> {
		Box::pin(obs::observe(Stage::AccessToken, "metadata_server", self.fetch()))
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use figment::Jail;
	// self
	use super::*;

	#[test]
	fn host_override_is_honored() {
		Jail::expect_with(|jail| {
			jail.set_env(GCE_METADATA_HOST, "127.0.0.1:8954");

			let credentials = MetadataServerCredentials::new(ReqwestHttpClient::default())
				.map_err(|e| e.to_string())?;

			assert_eq!(
				credentials.token_url.as_str(),
				"http://127.0.0.1:8954/computeMetadata/v1/instance/service-accounts/default/token"
			);

			Ok(())
		});
	}
}
