//! Mock OIDC identity provider signing claims with `FEDERATED_AUTH_SERVER_SIGNING_KEY_FILE`.

// self
use federated_auth::{
	config::ServerConfig,
	obs,
	server::{self, idp::IdpState},
};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	obs::init_logging();

	let config = ServerConfig::load()?;
	let state = IdpState::load(&config)?;

	server::serve(config.listen_addr, server::idp::router(state)).await?;

	Ok(())
}
