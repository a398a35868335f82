//! Axum servers used to exercise federation end to end.
//!
//! [`dump`] echoes authenticated requests back to the caller, and [`idp`] is a minimal OIDC
//! identity provider whose tokens a workload identity pool can be configured to trust.

pub mod dump;
pub mod idp;

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Router,
	http::{HeaderMap, Uri, header},
};
use tokio::net::TcpListener;
// self
use crate::{_prelude::*, error::TransportError};

/// Body returned by the liveness routes.
pub const OK_BODY: &str = "ok";

/// Binds `addr` and serves `router` over HTTP/1.1 and cleartext HTTP/2 until the process exits.
pub async fn serve(addr: SocketAddr, router: Router) -> Result<()> {
	let listener = TcpListener::bind(addr).await.map_err(TransportError::from)?;

	#[cfg(feature = "tracing")]
	tracing::info!(addr = %listener.local_addr().map_err(TransportError::from)?, "server listening");

	axum::serve(listener, router).await.map_err(TransportError::from)?;

	Ok(())
}

// HTTP/2 requests carry the host in `:authority`, which lands in the URI.
fn request_host(headers: &HeaderMap, uri: &Uri) -> Option<String> {
	headers
		.get(header::HOST)
		.and_then(|value| value.to_str().ok())
		.map(str::to_owned)
		.or_else(|| uri.authority().map(ToString::to_string))
}

async fn front() -> &'static str {
	#[cfg(feature = "tracing")]
	tracing::info!("/ called");

	OK_BODY
}
