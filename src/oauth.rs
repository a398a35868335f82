//! OAuth 2.0 token endpoint plumbing shared by the credential sources.
//!
//! Refresh-token grants go through the `oauth2` crate over a [`TokenHttpClient`]; grants the
//! crate does not model (JWT bearer assertions, RFC 8693 token exchange) post a form directly
//! with [`post_token_form`]. Both paths classify failures with [`UpstreamErrorContext`].

pub use oauth2;

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RefreshToken, RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, TransientError, TransportError},
	http::{self, ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	upstream::{Upstream, UpstreamErrorContext},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;
type FacadeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		upstream: Upstream,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		upstream: Upstream,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<ReqwestError>,
	) -> Error {
		match err {
			HttpClientError::Reqwest(inner) => map_reqwest_error(upstream, meta, *inner),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => UpstreamErrorContext::new(upstream)
				.with_metadata(meta)
				.with_body_preview(format!("HTTP client error: {message}"))
				.into_error(),
			_ => UpstreamErrorContext::new(upstream)
				.with_metadata(meta)
				.with_body_preview("HTTP client error")
				.into_error(),
		}
	}
}

/// Successful token endpoint payload shared by every access-token grant.
#[derive(Clone, Debug, Deserialize)]
pub struct AccessTokenResponse {
	/// Issued access token.
	pub access_token: TokenSecret,
	/// Lifetime in seconds, when reported.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Token type, normally `Bearer`.
	#[serde(default)]
	pub token_type: Option<String>,
	/// Token type URI returned by RFC 8693 exchanges.
	#[serde(default)]
	pub issued_token_type: Option<String>,
}
impl AccessTokenResponse {
	/// Validates the lifetime and yields the token.
	pub fn into_token(self) -> Result<TokenSecret> {
		if matches!(self.expires_in, Some(secs) if secs <= 0) {
			return Err(ConfigError::NonPositiveExpiresIn.into());
		}

		Ok(self.access_token)
	}
}

/// Posts `form` to a token endpoint and decodes an [`AccessTokenResponse`].
pub(crate) async fn post_token_form(
	http: &ReqwestHttpClient,
	upstream: Upstream,
	url: &Url,
	form: &BTreeMap<&'static str, String>,
) -> Result<AccessTokenResponse> {
	let response = http
		.post(url.clone())
		.header(reqwest::header::ACCEPT, "application/json")
		.form(form)
		.send()
		.await
		.map_err(|err| map_reqwest_error(upstream, None, err))?;

	http::read_json(upstream, response).await
}

/// Refresh-token grant over the `oauth2` crate.
pub(crate) struct RefreshFacade<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	oauth_client: ConfiguredBasicClient,
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> RefreshFacade<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		token_uri: &Url,
		client_id: &str,
		client_secret: &TokenSecret,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(token_uri.to_string())
			.map_err(|source| ConfigError::invalid_url("token", source))?;
		let oauth_client = BasicClient::new(ClientId::new(client_id.to_owned()))
			.set_client_secret(ClientSecret::new(client_secret.expose().to_owned()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(token_url);

		Ok(Self { oauth_client, http_client: http_client.into(), error_mapper: error_mapper.into() })
	}

	pub(crate) fn refresh_access_token<'a>(
		&'a self,
		refresh_token: &'a TokenSecret,
		scopes: &'a [&'a str],
	) -> FacadeFuture<'a, TokenSecret> {
		let meta = ResponseMetadataSlot::default();

		Box::pin(async move {
			let instrumented = self.http_client.with_metadata(meta.clone());
			let refresh_secret = RefreshToken::new(refresh_token.expose().to_owned());
			let mut request = self.oauth_client.exchange_refresh_token(&refresh_secret);

			for scope in scopes {
				request = request.add_scope(Scope::new((*scope).to_owned()));
			}

			let response = request.request_async(&instrumented).await.map_err(|err| {
				map_request_error(
					Upstream::TokenEndpoint,
					meta.take(),
					err,
					self.error_mapper.as_ref(),
				)
			})?;

			if response.expires_in().is_some_and(|lifetime| lifetime.is_zero()) {
				return Err(ConfigError::NonPositiveExpiresIn.into());
			}

			Ok(TokenSecret::new(response.access_token().secret().to_owned()))
		})
	}
}

fn map_request_error<E, M>(
	upstream: Upstream,
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<E>>,
	mapper: &M,
) -> Error
where
	E: 'static + Send + Sync + StdError,
	M: ?Sized + TransportErrorMapper<E>,
{
	let meta_ref = meta.as_ref();

	match err {
		RequestTokenError::ServerResponse(response) =>
			map_server_response_error(upstream, response, meta_ref),
		RequestTokenError::Request(error) => mapper.map_transport_error(upstream, meta_ref, error),
		RequestTokenError::Parse(error, _body) => TransientError::ResponseParse {
			upstream,
			source: error,
			status: meta_ref.and_then(|value| value.status),
		}
		.into(),
		RequestTokenError::Other(message) => UpstreamErrorContext::new(upstream)
			.with_metadata(meta_ref)
			.with_body_preview(message)
			.into_error(),
	}
}

fn map_server_response_error(
	upstream: Upstream,
	response: BasicErrorResponse,
	meta: Option<&ResponseMetadata>,
) -> Error {
	let mut ctx = UpstreamErrorContext::new(upstream)
		.with_metadata(meta)
		.with_oauth_error(response.error().as_ref().to_string());

	if let Some(description) = response.error_description() {
		ctx = ctx.with_error_description(description.clone());
	}

	ctx.into_error()
}

pub(crate) fn map_reqwest_error(
	upstream: Upstream,
	meta: Option<&ResponseMetadata>,
	err: ReqwestError,
) -> Error {
	if err.is_builder() {
		return ConfigError::from(err).into();
	}
	if err.is_timeout() {
		return TransientError::Upstream {
			upstream,
			message: "Request timed out".into(),
			status: meta.and_then(|value| value.status).or_else(|| reqwest_status(&err)),
			retry_after: meta.and_then(|value| value.retry_after),
		}
		.into();
	}

	TransportError::from(err).into()
}

fn reqwest_status(err: &ReqwestError) -> Option<u16> {
	err.status().map(|code| code.as_u16())
}
