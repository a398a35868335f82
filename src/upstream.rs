//! Upstream services contacted by the crate and classification of their failures.
//!
//! Every non-success response (IAM Credentials, OAuth token endpoints, STS, metadata server)
//! funnels through [`UpstreamErrorContext`], which keeps only primitive data (status code,
//! OAuth fields, Google status envelope, body preview) so classification never depends on a
//! particular HTTP client.

// self
use crate::{_prelude::*, error::TransientError, http::ResponseMetadata};

/// Remote services the crate talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Upstream {
	/// IAM Credentials API (`generateIdToken`, `generateAccessToken`).
	IamCredentials,
	/// OAuth 2.0 token endpoint used by user and service account keys.
	TokenEndpoint,
	/// Security Token Service performing workload identity federation exchanges.
	SecurityTokenService,
	/// GCE metadata server.
	MetadataServer,
	/// URL-sourced subject token endpoint of an external account.
	SubjectTokenUrl,
	/// Endpoint invoked with the identity token.
	Target,
}
impl Upstream {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Upstream::IamCredentials => "iam_credentials",
			Upstream::TokenEndpoint => "token_endpoint",
			Upstream::SecurityTokenService => "sts",
			Upstream::MetadataServer => "metadata_server",
			Upstream::SubjectTokenUrl => "subject_token_url",
			Upstream::Target => "target",
		}
	}

	const fn display_name(self) -> &'static str {
		match self {
			Upstream::IamCredentials => "IAM Credentials API",
			Upstream::TokenEndpoint => "OAuth token endpoint",
			Upstream::SecurityTokenService => "Security Token Service",
			Upstream::MetadataServer => "Metadata server",
			Upstream::SubjectTokenUrl => "Subject token URL",
			Upstream::Target => "Target endpoint",
		}
	}
}
impl Display for Upstream {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.display_name())
	}
}

/// Canonical failure categories derived from an upstream response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpstreamErrorKind {
	/// Credentials were missing, expired, or not accepted.
	Unauthenticated,
	/// Caller lacks permission on the resource.
	PermissionDenied,
	/// Resource does not exist.
	NotFound,
	/// OAuth grant was rejected.
	InvalidGrant,
	/// OAuth client was rejected.
	InvalidClient,
	/// Failure is temporary and may be retried.
	Transient,
	/// Any other non-retryable rejection.
	Rejected,
}

/// Context collected from a failing upstream response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamErrorContext {
	/// Service that produced the response.
	pub upstream: Upstream,
	/// HTTP status code, when available.
	pub http_status: Option<u16>,
	/// Retry-After hint, when supplied.
	pub retry_after: Option<Duration>,
	/// OAuth `error` field.
	pub oauth_error: Option<String>,
	/// OAuth `error_description` field.
	pub error_description: Option<String>,
	/// Google status envelope `error.status` (e.g. `PERMISSION_DENIED`).
	pub google_status: Option<String>,
	/// Google status envelope `error.message`.
	pub google_message: Option<String>,
	/// Preview of the response body for payloads that are neither OAuth nor Google errors.
	pub body_preview: Option<String>,
}
impl UpstreamErrorContext {
	const BODY_PREVIEW_LIMIT: usize = 256;

	/// Creates an empty context for `upstream`.
	pub fn new(upstream: Upstream) -> Self {
		Self {
			upstream,
			http_status: None,
			retry_after: None,
			oauth_error: None,
			error_description: None,
			google_status: None,
			google_message: None,
			body_preview: None,
		}
	}

	/// Seeds status and retry hint from captured response metadata.
	pub fn with_metadata(mut self, meta: Option<&ResponseMetadata>) -> Self {
		if let Some(meta) = meta {
			self.http_status = meta.status;
			self.retry_after = meta.retry_after;
		}

		self
	}

	/// Adds an HTTP status code.
	pub fn with_http_status(mut self, status: u16) -> Self {
		self.http_status = Some(status);

		self
	}

	/// Adds the OAuth `error` code.
	pub fn with_oauth_error(mut self, error: impl Into<String>) -> Self {
		self.oauth_error = Some(error.into());

		self
	}

	/// Adds the OAuth `error_description` field.
	pub fn with_error_description(mut self, description: impl Into<String>) -> Self {
		self.error_description = Some(description.into());

		self
	}

	/// Adds a body preview, truncated to a fixed number of characters.
	pub fn with_body_preview(mut self, body: impl Into<String>) -> Self {
		self.body_preview = Some(truncate_preview(body.into()));

		self
	}

	/// Parses a raw error body, recognizing Google status envelopes and OAuth error objects.
	pub fn with_body(mut self, body: &[u8]) -> Self {
		match serde_json::from_slice::<ErrorBody>(body) {
			Ok(ErrorBody::Google { error }) => {
				self.google_status = error.status;
				self.google_message = error.message;

				if self.http_status.is_none() {
					self.http_status = error.code;
				}

				self
			},
			Ok(ErrorBody::OAuth { error, error_description }) => {
				self.oauth_error = Some(error);
				self.error_description = error_description;

				self
			},
			Err(_) => {
				let text = String::from_utf8_lossy(body);
				let text = text.trim();

				if text.is_empty() { self } else { self.with_body_preview(text) }
			},
		}
	}

	/// Classifies the failure, preferring structured fields over the status code.
	pub fn classify(&self) -> UpstreamErrorKind {
		if let Some(kind) = self.oauth_error.as_deref().and_then(classify_oauth_error) {
			return kind;
		}
		if let Some(kind) = self.google_status.as_deref().and_then(classify_google_status) {
			return kind;
		}

		classify_status(self.http_status)
	}

	/// Human-readable reason assembled from the most specific field available.
	pub fn reason(&self) -> String {
		if let Some(message) = &self.google_message {
			return message.clone();
		}
		if let Some(description) = &self.error_description {
			return description.clone();
		}
		if let Some(error) = self.oauth_error.as_ref().or(self.google_status.as_ref()) {
			return error.clone();
		}
		if let Some(preview) = &self.body_preview {
			return preview.clone();
		}

		match self.http_status {
			Some(status) => format!("HTTP {status}"),
			None => "no response details".into(),
		}
	}

	/// Converts the context into the crate error matching [`classify`](Self::classify).
	pub fn into_error(self) -> Error {
		let upstream = self.upstream;
		// Messages add their own terminal period.
		let reason = self.reason().trim_end_matches('.').to_owned();

		match self.classify() {
			UpstreamErrorKind::Unauthenticated => Error::Unauthenticated { upstream, reason },
			UpstreamErrorKind::PermissionDenied => Error::PermissionDenied { upstream, reason },
			UpstreamErrorKind::NotFound => Error::NotFound { upstream, reason },
			UpstreamErrorKind::InvalidGrant => Error::InvalidGrant { upstream, reason },
			UpstreamErrorKind::InvalidClient => Error::InvalidClient { upstream, reason },
			UpstreamErrorKind::Rejected => Error::Rejected {
				upstream,
				status: self.http_status.unwrap_or_default(),
				reason,
			},
			UpstreamErrorKind::Transient => TransientError::Upstream {
				upstream,
				message: reason,
				status: self.http_status,
				retry_after: self.retry_after,
			}
			.into(),
		}
	}
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
	Google { error: GoogleStatus },
	OAuth { error: String, error_description: Option<String> },
}

#[derive(Deserialize)]
struct GoogleStatus {
	code: Option<u16>,
	message: Option<String>,
	status: Option<String>,
}

fn truncate_preview(body: String) -> String {
	if body.chars().count() <= UpstreamErrorContext::BODY_PREVIEW_LIMIT {
		return body;
	}

	let mut buf = body.chars().take(UpstreamErrorContext::BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}

fn classify_oauth_error(value: &str) -> Option<UpstreamErrorKind> {
	if value.eq_ignore_ascii_case("invalid_grant") || value.eq_ignore_ascii_case("access_denied") {
		Some(UpstreamErrorKind::InvalidGrant)
	} else if value.eq_ignore_ascii_case("invalid_client")
		|| value.eq_ignore_ascii_case("unauthorized_client")
	{
		Some(UpstreamErrorKind::InvalidClient)
	} else if value.eq_ignore_ascii_case("temporarily_unavailable")
		|| value.eq_ignore_ascii_case("server_error")
	{
		Some(UpstreamErrorKind::Transient)
	} else {
		None
	}
}

fn classify_google_status(value: &str) -> Option<UpstreamErrorKind> {
	match value {
		"UNAUTHENTICATED" => Some(UpstreamErrorKind::Unauthenticated),
		"PERMISSION_DENIED" => Some(UpstreamErrorKind::PermissionDenied),
		"NOT_FOUND" => Some(UpstreamErrorKind::NotFound),
		"UNAVAILABLE" | "DEADLINE_EXCEEDED" | "RESOURCE_EXHAUSTED" | "INTERNAL" =>
			Some(UpstreamErrorKind::Transient),
		_ => None,
	}
}

fn classify_status(status: Option<u16>) -> UpstreamErrorKind {
	match status {
		Some(401) => UpstreamErrorKind::Unauthenticated,
		Some(403) => UpstreamErrorKind::PermissionDenied,
		Some(404) => UpstreamErrorKind::NotFound,
		Some(408 | 429) => UpstreamErrorKind::Transient,
		Some(code) if code >= 500 => UpstreamErrorKind::Transient,
		Some(_) => UpstreamErrorKind::Rejected,
		None => UpstreamErrorKind::Transient,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn google_envelope_drives_classification() {
		let body = br#"{"error":{"code":403,"message":"Permission 'iam.serviceAccounts.getOpenIdToken' denied on resource (or it may not exist).","status":"PERMISSION_DENIED"}}"#;
		let ctx = UpstreamErrorContext::new(Upstream::IamCredentials).with_body(body);

		assert_eq!(ctx.classify(), UpstreamErrorKind::PermissionDenied);
		assert_eq!(ctx.http_status, Some(403));
		assert!(ctx.reason().starts_with("Permission 'iam.serviceAccounts.getOpenIdToken'"));
	}

	#[test]
	fn oauth_error_beats_status() {
		let ctx = UpstreamErrorContext::new(Upstream::TokenEndpoint)
			.with_http_status(400)
			.with_body(br#"{"error":"invalid_grant","error_description":"Bad Request"}"#);

		assert_eq!(ctx.classify(), UpstreamErrorKind::InvalidGrant);
		assert_eq!(ctx.reason(), "Bad Request");
		assert!(matches!(ctx.into_error(), Error::InvalidGrant { .. }));
	}

	#[test]
	fn plain_bodies_become_previews() {
		let long = "x".repeat(300);
		let ctx = UpstreamErrorContext::new(Upstream::MetadataServer)
			.with_http_status(503)
			.with_body(long.as_bytes());
		let preview = ctx.body_preview.clone().expect("Preview should be captured.");

		assert_eq!(preview.chars().count(), UpstreamErrorContext::BODY_PREVIEW_LIMIT + 1);
		assert!(matches!(
			ctx.into_error(),
			Error::Transient(TransientError::Upstream { status: Some(503), .. })
		));
	}

	#[test]
	fn status_fallbacks() {
		assert_eq!(classify_status(Some(401)), UpstreamErrorKind::Unauthenticated);
		assert_eq!(classify_status(Some(404)), UpstreamErrorKind::NotFound);
		assert_eq!(classify_status(Some(400)), UpstreamErrorKind::Rejected);
		assert_eq!(classify_status(Some(429)), UpstreamErrorKind::Transient);
		assert_eq!(classify_status(Some(502)), UpstreamErrorKind::Transient);

		let empty = UpstreamErrorContext::new(Upstream::Target).with_http_status(400);

		assert_eq!(empty.reason(), "HTTP 400");
	}
}
