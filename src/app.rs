//! The client program: mint an identity token, present it, report the outcome.

// std
use std::io::Write;
// self
use crate::{
	_prelude::*,
	auth::{self, AccessTokenProvider},
	config::ClientConfig,
	http::ReqwestHttpClient,
	iam::{GenerateIdTokenRequest, IamCredentialsClient},
	invoke,
};

/// Runs the token → GET sequence and writes its result lines to `out`.
///
/// Prints `IDToken <token>` as soon as the token is minted, then `Response Code: <code>`. The
/// first failure stops the sequence and prints `Error: <message>` instead. Only failures to
/// write to `out` are returned.
pub async fn run<W>(
	config: &ClientConfig,
	credentials: Arc<dyn AccessTokenProvider>,
	http: &ReqwestHttpClient,
	out: &mut W,
) -> std::io::Result<()>
where
	W: Write,
{
	if let Err(err) = run_inner(config, credentials, http, out).await? {
		writeln!(out, "Error: {err}")?;
	}

	out.flush()
}

/// Loads [`ClientConfig`] and Application Default Credentials, then [`run`]s.
///
/// Configuration and discovery failures are reported on `out` like any other error.
pub async fn run_from_env<W>(out: &mut W) -> std::io::Result<()>
where
	W: Write,
{
	let http = ReqwestHttpClient::default();
	let prepared = ClientConfig::load().and_then(|config| {
		let discovered = auth::discover()?;

		#[cfg(feature = "tracing")]
		tracing::info!(
			origin = %discovered.origin,
			kind = discovered.file.as_ref().map(|file| file.kind()),
			"credentials discovered"
		);

		Ok((config, discovered.into_provider(http.clone())?))
	});

	match prepared {
		Ok((config, credentials)) => run(&config, credentials, &http, out).await,
		Err(err) => {
			writeln!(out, "Error: {err}")?;

			out.flush()
		},
	}
}

// Write failures short-circuit through the outer result; pipeline failures land in the inner one.
async fn run_inner<W>(
	config: &ClientConfig,
	credentials: Arc<dyn AccessTokenProvider>,
	http: &ReqwestHttpClient,
	out: &mut W,
) -> std::io::Result<Result<()>>
where
	W: Write,
{
	let client =
		IamCredentialsClient::with_endpoint(http.clone(), config.iam_endpoint.clone(), credentials);
	let request =
		GenerateIdTokenRequest::new(config.service_account.clone(), config.audience.clone())
			.include_email(config.include_email);
	let token = match client.generate_id_token(&request).await {
		Ok(token) => token,
		Err(err) => return Ok(Err(err)),
	};

	writeln!(out, "IDToken {}", token.expose())?;

	let status = match invoke::get_with_bearer(http, &config.target_url, &token).await {
		Ok(status) => status,
		Err(err) => return Ok(Err(err)),
	};

	writeln!(out, "Response Code: {}", status.as_u16())?;

	Ok(Ok(()))
}
