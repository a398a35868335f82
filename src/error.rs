//! Crate-level error types shared by credential sources, the IAM client, and the servers.

// self
use crate::{_prelude::*, upstream::Upstream};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Application Default Credentials could not be located or loaded.
	#[error(transparent)]
	Credentials(#[from] CredentialsError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Upstream rejected the caller's credentials.
	#[error("{upstream} rejected the caller's credentials: {reason}.")]
	Unauthenticated {
		/// Service that produced the failure.
		upstream: Upstream,
		/// Upstream-supplied reason string.
		reason: String,
	},
	/// Caller is authenticated but lacks permission on the target resource.
	#[error("{upstream} denied permission: {reason}.")]
	PermissionDenied {
		/// Service that produced the failure.
		upstream: Upstream,
		/// Upstream-supplied reason string.
		reason: String,
	},
	/// Requested resource (usually the service account) does not exist.
	#[error("{upstream} could not find the requested resource: {reason}.")]
	NotFound {
		/// Service that produced the failure.
		upstream: Upstream,
		/// Upstream-supplied reason string.
		reason: String,
	},
	/// Token endpoint rejected the grant (bad refresh token, assertion, or subject token).
	#[error("{upstream} rejected the grant: {reason}.")]
	InvalidGrant {
		/// Service that produced the failure.
		upstream: Upstream,
		/// Upstream-supplied reason string.
		reason: String,
	},
	/// OAuth client authentication failed or the client is not allowed to use the grant.
	#[error("{upstream} rejected the client: {reason}.")]
	InvalidClient {
		/// Service that produced the failure.
		upstream: Upstream,
		/// Upstream-supplied reason string.
		reason: String,
	},
	/// Any other non-retryable rejection.
	#[error("{upstream} rejected the request with HTTP {status}: {reason}.")]
	Rejected {
		/// Service that produced the failure.
		upstream: Upstream,
		/// HTTP status code.
		status: u16,
		/// Upstream-supplied reason string.
		reason: String,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// An endpoint URL could not be parsed.
	#[error("The {what} URL is invalid.")]
	InvalidUrl {
		/// Which URL failed to parse.
		what: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Layered configuration could not be extracted.
	#[error("Configuration could not be loaded: {source}")]
	Load {
		/// Underlying figment failure.
		#[source]
		source: Box<figment::Error>,
	},
	/// Identifier failed validation.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::auth::IdentifierError),
	/// RSA signing key could not be parsed or used.
	#[error("Signing key is invalid: {reason}.")]
	InvalidSigningKey {
		/// Parser- or signer-supplied reason.
		reason: String,
	},
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Wraps a URL parse failure for the named endpoint.
	pub fn invalid_url(what: &'static str, source: url::ParseError) -> Self {
		Self::InvalidUrl { what, source }
	}
}
impl From<figment::Error> for ConfigError {
	fn from(e: figment::Error) -> Self {
		Self::Load { source: Box::new(e) }
	}
}
impl From<jsonwebtoken::errors::Error> for ConfigError {
	fn from(e: jsonwebtoken::errors::Error) -> Self {
		Self::InvalidSigningKey { reason: e.to_string() }
	}
}

/// Application Default Credentials discovery and loading failures.
#[derive(Debug, ThisError)]
pub enum CredentialsError {
	/// No credential file was found and the metadata server is unavailable.
	#[error("Unable to detect default credentials: {reason}.")]
	NotFound {
		/// Explanation of what was searched.
		reason: String,
	},
	/// Credential file exists but could not be read.
	#[error("Error reading credential file from location {}.", path.display())]
	Read {
		/// Path that failed to read.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Credential file is not valid JSON for its declared type.
	#[error("Error parsing credential file from location {}: {source}", path.display())]
	Parse {
		/// Path that failed to parse.
		path: PathBuf,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Credential file declares a type this crate does not understand.
	#[error("Unsupported credential type found: {kind}.")]
	UnsupportedType {
		/// Value of the file's `type` field.
		kind: String,
	},
	/// External account configuration names no usable subject token source.
	#[error("External account credential source is invalid: {reason}.")]
	InvalidCredentialSource {
		/// Explanation of the missing or conflicting fields.
		reason: String,
	},
	/// Subject token could not be obtained or was empty.
	#[error("Subject token could not be retrieved: {reason}.")]
	SubjectToken {
		/// Explanation of the failure.
		reason: String,
	},
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream returned a retryable status or an unexpected response.
	#[error("{upstream} returned an unexpected response: {message}.")]
	Upstream {
		/// Service that produced the failure.
		upstream: Upstream,
		/// Upstream- or crate-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Upstream responded with JSON that does not match the expected schema.
	#[error("{upstream} returned malformed JSON: {source}")]
	ResponseParse {
		/// Service that produced the failure.
		upstream: Upstream,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred: {source}")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred: {0}")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
