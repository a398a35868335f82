//! Serves `/` and `/dump` on `FEDERATED_AUTH_SERVER_LISTEN_ADDR` (default `0.0.0.0:8080`).

// self
use federated_auth::{config::ServerConfig, obs, server};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	obs::init_logging();

	let config = ServerConfig::load()?;

	server::serve(config.listen_addr, server::dump::router()).await?;

	Ok(())
}
