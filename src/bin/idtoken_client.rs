//! Mints a federated identity token and calls the configured endpoint with it.
//!
//! Prints `IDToken <token>` and `Response Code: <code>`, or `Error: <message>`, and exits 0.

// self
use federated_auth::{app, obs};

#[tokio::main]
async fn main() {
	obs::init_logging();

	let mut stdout = std::io::stdout().lock();

	if let Err(err) = app::run_from_env(&mut stdout).await {
		eprintln!("failed to write output: {err}");
	}
}
