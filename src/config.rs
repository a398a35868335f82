//! Layered configuration for the client and the mock servers.
//!
//! Defaults are merged with environment variables through `figment`:
//!
//! | Variable | Field |
//! | --- | --- |
//! | `FEDERATED_AUTH_TARGET_URL` | [`ClientConfig::target_url`] |
//! | `FEDERATED_AUTH_AUDIENCE` | [`ClientConfig::audience`] |
//! | `FEDERATED_AUTH_SERVICE_ACCOUNT` | [`ClientConfig::service_account`] |
//! | `FEDERATED_AUTH_INCLUDE_EMAIL` | [`ClientConfig::include_email`] |
//! | `FEDERATED_AUTH_IAM_ENDPOINT` | [`ClientConfig::iam_endpoint`] |
//! | `FEDERATED_AUTH_SERVER_LISTEN_ADDR` | [`ServerConfig::listen_addr`] |
//! | `FEDERATED_AUTH_SERVER_SIGNING_KEY_FILE` | [`ServerConfig::signing_key_file`] |
//! | `FEDERATED_AUTH_SERVER_KEY_ID` | [`ServerConfig::key_id`] |

// std
use std::net::{Ipv4Addr, SocketAddr};
// crates.io
use figment::{
	Figment,
	providers::{Env, Serialized},
};
// self
use crate::{
	_prelude::*,
	auth::{Audience, ServiceAccountEmail},
	error::ConfigError,
	iam::DEFAULT_IAM_ENDPOINT,
};

/// Environment prefix for client settings.
pub const ENV_PREFIX: &str = "FEDERATED_AUTH_";
/// Environment prefix for server settings.
pub const SERVER_ENV_PREFIX: &str = "FEDERATED_AUTH_SERVER_";
/// Endpoint called with the identity token when nothing is configured.
pub const DEFAULT_TARGET_URL: &str = "https://federated-auth-cloud-run-6w42z6vi3q-uc.a.run.app/dump";
/// Audience requested when nothing is configured.
pub const DEFAULT_AUDIENCE: &str = "https://federated-auth-cloud-run-6w42z6vi3q-uc.a.run.app";
/// Service account impersonated when nothing is configured.
pub const DEFAULT_SERVICE_ACCOUNT: &str = "oidc-federated@mineral-minutia-820.iam.gserviceaccount.com";
/// Key identifier advertised by the mock IdP.
pub const DEFAULT_KEY_ID: &str = "123456";
/// Port both servers listen on.
pub const DEFAULT_PORT: u16 = 8080;

/// Settings of the identity token client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Endpoint receiving the authenticated GET.
	pub target_url: Url,
	/// `aud` claim of the minted identity token.
	pub audience: Audience,
	/// Service account whose identity token is minted.
	pub service_account: ServiceAccountEmail,
	/// Whether the token carries email claims.
	pub include_email: bool,
	/// IAM Credentials API base URL.
	pub iam_endpoint: Url,
}
impl ClientConfig {
	/// Builds the defaults; fails only if a built-in constant is malformed.
	pub fn defaults() -> Result<Self> {
		Ok(Self {
			target_url: Url::parse(DEFAULT_TARGET_URL)
				.map_err(|source| ConfigError::invalid_url("target", source))?,
			audience: Audience::new(DEFAULT_AUDIENCE).map_err(ConfigError::from)?,
			service_account: ServiceAccountEmail::new(DEFAULT_SERVICE_ACCOUNT)
				.map_err(ConfigError::from)?,
			include_email: true,
			iam_endpoint: Url::parse(DEFAULT_IAM_ENDPOINT)
				.map_err(|source| ConfigError::invalid_url("IAM endpoint", source))?,
		})
	}

	/// Defaults layered under `FEDERATED_AUTH_*` variables.
	pub fn figment() -> Result<Figment> {
		Ok(Figment::new()
			.merge(Serialized::defaults(Self::defaults()?))
			.merge(Env::prefixed(ENV_PREFIX)))
	}

	/// Extracts the configuration from [`ClientConfig::figment`].
	pub fn load() -> Result<Self> {
		Self::figment()?.extract().map_err(|e| ConfigError::from(e).into())
	}
}

/// Settings shared by the dump server and the mock IdP.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
	/// Socket the server binds.
	pub listen_addr: SocketAddr,
	/// PEM RSA key the IdP signs with; the IdP refuses to start without one.
	pub signing_key_file: Option<PathBuf>,
	/// `kid` advertised in the JWKS and stamped on issued tokens.
	pub key_id: String,
}
impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
			signing_key_file: None,
			key_id: DEFAULT_KEY_ID.into(),
		}
	}
}
impl ServerConfig {
	/// Defaults layered under `FEDERATED_AUTH_SERVER_*` variables.
	pub fn figment() -> Figment {
		Figment::new().merge(Serialized::defaults(Self::default())).merge(Env::prefixed(SERVER_ENV_PREFIX))
	}

	/// Extracts the configuration from [`ServerConfig::figment`].
	pub fn load() -> Result<Self> {
		Self::figment().extract().map_err(|e| ConfigError::from(e).into())
	}
}
