//! Authenticated call to the protected endpoint.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::ReqwestHttpClient,
	oauth,
	obs::{self, Stage},
	upstream::Upstream,
};

/// Sends `GET url` with `Authorization: Bearer <token>` and returns the response status.
///
/// Every HTTP status, including 4xx and 5xx, is a successful outcome; only transport failures
/// are errors. The response body is dropped unread.
pub async fn get_with_bearer(
	http: &ReqwestHttpClient,
	url: &Url,
	token: &TokenSecret,
) -> Result<StatusCode> {
	obs::observe(Stage::Invoke, "get_with_bearer", async {
		let response = http
			.get(url.clone())
			.header(reqwest::header::AUTHORIZATION, token.bearer())
			.send()
			.await
			.map_err(|err| oauth::map_reqwest_error(Upstream::Target, None, err))?;
		let status = response.status();

		#[cfg(feature = "tracing")]
		tracing::debug!(status = status.as_u16(), url = %url, "target responded");

		Ok(status)
	})
	.await
}
