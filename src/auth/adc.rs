//! Application Default Credentials discovery.
//!
//! The lookup order is:
//!
//! 1. The file named by `GOOGLE_APPLICATION_CREDENTIALS`. A file that cannot be read or parsed
//!    is an error; discovery does not fall through to later steps.
//! 2. The gcloud well-known file (`$HOME/.config/gcloud/application_default_credentials.json`,
//!    or `%APPDATA%\gcloud\application_default_credentials.json` on Windows), when it exists.
//! 3. The GCE metadata server.
//!
//! Files are dispatched on their `type` field into [`CredentialsFile`].

// self
use crate::{
	_prelude::*,
	auth::{
		AccessTokenProvider, AuthorizedUserCredentials, ExternalAccountCredentials,
		MetadataServerCredentials, ServiceAccountCredentials, TokenSecret,
	},
	error::{ConfigError, CredentialsError},
	http::ReqwestHttpClient,
};

/// Environment variable naming an explicit credential file.
pub const GOOGLE_APPLICATION_CREDENTIALS: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Default OAuth token endpoint for user and service account keys.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const USER_CREDENTIAL_FILE: &str = "application_default_credentials.json";
const UNIX_HOME: &str = "HOME";
const WINDOWS_APPDATA: &str = "APPDATA";

/// Where discovered credentials came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialsOrigin {
	/// File named by `GOOGLE_APPLICATION_CREDENTIALS`.
	EnvironmentVariable(PathBuf),
	/// gcloud well-known file.
	WellKnownFile(PathBuf),
	/// No file was found; the metadata server is used.
	MetadataServer,
}
impl Display for CredentialsOrigin {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::EnvironmentVariable(path) =>
				write!(f, "{GOOGLE_APPLICATION_CREDENTIALS}={}", path.display()),
			Self::WellKnownFile(path) => write!(f, "well-known file {}", path.display()),
			Self::MetadataServer => f.write_str("metadata server"),
		}
	}
}

/// Result of Application Default Credentials discovery.
#[derive(Clone, Debug)]
pub struct DiscoveredCredentials {
	/// Where the credentials were found.
	pub origin: CredentialsOrigin,
	/// Parsed credential file; `None` for the metadata server.
	pub file: Option<CredentialsFile>,
}
impl DiscoveredCredentials {
	/// Builds the access-token provider matching the discovered credentials.
	pub fn into_provider(self, http: ReqwestHttpClient) -> Result<Arc<dyn AccessTokenProvider>> {
		let provider: Arc<dyn AccessTokenProvider> = match self.file {
			Some(CredentialsFile::AuthorizedUser(key)) =>
				Arc::new(AuthorizedUserCredentials::new(key, http)?),
			Some(CredentialsFile::ServiceAccount(key)) =>
				Arc::new(ServiceAccountCredentials::new(key, http)?),
			Some(CredentialsFile::ExternalAccount(config)) =>
				Arc::new(ExternalAccountCredentials::new(config, http)?),
			None => Arc::new(MetadataServerCredentials::new(http)?),
		};

		Ok(provider)
	}
}

/// Credential file contents keyed by their `type` field.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsFile {
	/// gcloud user credentials (`gcloud auth application-default login`).
	AuthorizedUser(AuthorizedUserKey),
	/// Service account key file.
	ServiceAccount(ServiceAccountKey),
	/// Workload or workforce identity federation configuration.
	ExternalAccount(ExternalAccountConfig),
}
impl CredentialsFile {
	/// Label of the credential type, matching the file's `type` field.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::AuthorizedUser(_) => "authorized_user",
			Self::ServiceAccount(_) => "service_account",
			Self::ExternalAccount(_) => "external_account",
		}
	}
}

/// `authorized_user` credential file.
#[derive(Clone, Debug, Deserialize)]
pub struct AuthorizedUserKey {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: TokenSecret,
	/// Long-lived refresh token.
	pub refresh_token: TokenSecret,
	/// Token endpoint; [`DEFAULT_TOKEN_URI`] when absent.
	#[serde(default)]
	pub token_uri: Option<Url>,
	/// Project billed for quota, if any.
	#[serde(default)]
	pub quota_project_id: Option<String>,
}
impl AuthorizedUserKey {
	/// Resolved token endpoint.
	pub fn token_uri(&self) -> Result<Url> {
		resolve_token_uri(self.token_uri.as_ref())
	}
}

/// `service_account` key file.
#[derive(Clone, Debug, Deserialize)]
pub struct ServiceAccountKey {
	/// Service account email used as the assertion issuer.
	pub client_email: String,
	/// PEM encoded RSA private key.
	pub private_key: TokenSecret,
	/// Key identifier placed in the assertion header.
	#[serde(default)]
	pub private_key_id: Option<String>,
	/// Token endpoint, also the assertion audience.
	#[serde(default)]
	pub token_uri: Option<Url>,
	/// Owning project, if recorded.
	#[serde(default)]
	pub project_id: Option<String>,
	/// Project billed for quota, if any.
	#[serde(default)]
	pub quota_project_id: Option<String>,
}
impl ServiceAccountKey {
	/// Resolved token endpoint.
	pub fn token_uri(&self) -> Result<Url> {
		resolve_token_uri(self.token_uri.as_ref())
	}
}

/// `external_account` configuration for identity federation.
#[derive(Clone, Debug, Deserialize)]
pub struct ExternalAccountConfig {
	/// Workload identity pool provider audience.
	pub audience: String,
	/// Type URI of the subject token (e.g. `urn:ietf:params:oauth:token-type:jwt`).
	pub subject_token_type: String,
	/// STS token exchange endpoint.
	pub token_url: Url,
	/// Where to read the subject token from.
	pub credential_source: CredentialSource,
	/// IAM `generateAccessToken` URL of the service account to impersonate.
	#[serde(default)]
	pub service_account_impersonation_url: Option<Url>,
	/// Scopes requested from STS; defaults to cloud-platform.
	#[serde(default)]
	pub scopes: Vec<String>,
	/// Workforce pool user project, sent as STS `options`.
	#[serde(default)]
	pub workforce_pool_user_project: Option<String>,
	/// Project billed for quota, if any.
	#[serde(default)]
	pub quota_project_id: Option<String>,
}

/// Subject token location of an external account.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CredentialSource {
	/// File holding the subject token.
	#[serde(default)]
	pub file: Option<PathBuf>,
	/// URL returning the subject token.
	#[serde(default)]
	pub url: Option<Url>,
	/// Headers sent with the URL request.
	#[serde(default)]
	pub headers: BTreeMap<String, String>,
	/// How to extract the token from the file or response body.
	#[serde(default)]
	pub format: SubjectTokenFormat,
	/// Executable-sourced configuration; recognized only to reject it.
	#[serde(default)]
	pub executable: Option<serde_json::Value>,
	/// AWS environment identifier; recognized only to reject it.
	#[serde(default)]
	pub environment_id: Option<String>,
}

/// Encoding of a file- or URL-sourced subject token.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SubjectTokenFormat {
	/// The whole payload, trimmed, is the token.
	#[default]
	Text,
	/// The payload is a JSON object holding the token in a named field.
	Json {
		/// Field containing the token.
		subject_token_field_name: String,
	},
}

/// Runs the discovery chain described in the module documentation.
pub fn discover() -> Result<DiscoveredCredentials> {
	if let Some(path) = std::env::var_os(GOOGLE_APPLICATION_CREDENTIALS) {
		let path = PathBuf::from(path);
		let file = load_file(&path)?;

		return Ok(DiscoveredCredentials {
			origin: CredentialsOrigin::EnvironmentVariable(path),
			file: Some(file),
		});
	}
	if let Some(path) = well_known_file().filter(|path| path.is_file()) {
		let file = load_file(&path)?;

		return Ok(DiscoveredCredentials {
			origin: CredentialsOrigin::WellKnownFile(path),
			file: Some(file),
		});
	}

	Ok(DiscoveredCredentials { origin: CredentialsOrigin::MetadataServer, file: None })
}

/// Reads and parses a credential file.
pub fn load_file(path: &Path) -> Result<CredentialsFile> {
	let contents = std::fs::read(path)
		.map_err(|source| CredentialsError::Read { path: path.to_owned(), source })?;

	parse_file(path, &contents)
}

fn parse_file(path: &Path, contents: &[u8]) -> Result<CredentialsFile> {
	#[derive(Deserialize)]
	struct TypeProbe {
		#[serde(rename = "type")]
		kind: String,
	}

	let probe: TypeProbe = deserialize(path, contents)?;

	// Each key type is decoded on its own so parse errors keep their field path.
	match probe.kind.as_str() {
		"authorized_user" => deserialize(path, contents).map(CredentialsFile::AuthorizedUser),
		"service_account" => deserialize(path, contents).map(CredentialsFile::ServiceAccount),
		"external_account" => deserialize(path, contents).map(CredentialsFile::ExternalAccount),
		_ => Err(CredentialsError::UnsupportedType { kind: probe.kind }.into()),
	}
}

fn deserialize<T>(path: &Path, contents: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(contents);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| CredentialsError::Parse { path: path.to_owned(), source }.into())
}

/// Path of the gcloud well-known credential file, when the home directory is known.
pub fn well_known_file() -> Option<PathBuf> {
	let mut path = if cfg!(windows) {
		PathBuf::from(std::env::var_os(WINDOWS_APPDATA)?)
	} else {
		let mut home = PathBuf::from(std::env::var_os(UNIX_HOME)?);

		home.push(".config");

		home
	};

	path.push("gcloud");
	path.push(USER_CREDENTIAL_FILE);

	Some(path)
}

fn resolve_token_uri(configured: Option<&Url>) -> Result<Url> {
	match configured {
		Some(url) => Ok(url.clone()),
		None => Url::parse(DEFAULT_TOKEN_URI)
			.map_err(|source| ConfigError::invalid_url("token", source).into()),
	}
}
