// self
use crate::{
	_prelude::*,
	auth::{AccessTokenProvider, AuthorizedUserKey, TokenFuture},
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{RefreshFacade, ReqwestTransportErrorMapper, TransportErrorMapper},
	obs::{self, Stage},
};

/// Exchanges a gcloud user refresh token for access tokens.
///
/// The refresh request carries no `scope` parameter, so the token inherits the scopes granted
/// at `gcloud auth application-default login` time.
pub struct AuthorizedUserCredentials<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	key: AuthorizedUserKey,
	facade: RefreshFacade<C, M>,
}
impl AuthorizedUserCredentials {
	/// Builds credentials over the default reqwest transport.
	pub fn new(key: AuthorizedUserKey, http: ReqwestHttpClient) -> Result<Self> {
		Self::with_http_client(key, Arc::new(http), Arc::new(ReqwestTransportErrorMapper))
	}
}
impl<C, M> AuthorizedUserCredentials<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Builds credentials over a custom [`TokenHttpClient`] and error mapper.
	pub fn with_http_client(
		key: AuthorizedUserKey,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		let facade = RefreshFacade::new(
			&key.token_uri()?,
			&key.client_id,
			&key.client_secret,
			http_client,
			error_mapper,
		)?;

		Ok(Self { key, facade })
	}
}
impl<C, M> AccessTokenProvider for AuthorizedUserCredentials<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn access_token(&self) -> TokenFuture<'_> {
		Box::pin(obs::observe(
			Stage::AccessToken,
			"authorized_user",
			self.facade.refresh_access_token(&self.key.refresh_token, &[]),
		))
	}

	fn quota_project_id(&self) -> Option<&str> {
		self.key.quota_project_id.as_deref()
	}
}
impl<C, M> Debug for AuthorizedUserCredentials<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizedUserCredentials")
			.field("client_id", &self.key.client_id)
			.field("token_uri", &self.key.token_uri)
			.finish_non_exhaustive()
	}
}
