//! Request-dump server: `/dump` answers with the request it received, in HTTP/1.x wire format.

// crates.io
use axum::{
	Router,
	body::{self, Body},
	http::{HeaderMap, Request, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{any, get},
};
/// Largest request body echoed back; bigger bodies are answered with `500`.
pub const MAX_DUMP_BODY: usize = 1024 * 1024;

/// Routes: `GET /` liveness, `ANY /dump`, everything else falls back to liveness.
pub fn router() -> Router {
	Router::new()
		.route("/", get(super::front))
		.route("/dump", any(dump))
		.fallback(super::front)
}

async fn dump(request: Request<Body>) -> Response {
	let (parts, body) = request.into_parts();
	let body = match body::to_bytes(body, MAX_DUMP_BODY).await {
		Ok(bytes) => bytes,
		Err(err) => return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
	};
	let target = parts.uri.path_and_query().map_or("/", |value| value.as_str());
	let host = super::request_host(&parts.headers, &parts.uri);
	let mut dumped = format!("{} {target} {:?}\r\n", parts.method, parts.version).into_bytes();

	if let Some(host) = host {
		dumped.extend_from_slice(format!("Host: {host}\r\n").as_bytes());
	}

	for (name, value) in sorted_headers(&parts.headers) {
		dumped.extend_from_slice(format!("{name}: ").as_bytes());
		dumped.extend_from_slice(value);
		dumped.extend_from_slice(b"\r\n");
	}

	dumped.extend_from_slice(b"\r\n");
	dumped.extend_from_slice(&body);

	([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], dumped).into_response()
}

fn sorted_headers(headers: &HeaderMap) -> Vec<(String, &[u8])> {
	let mut lines = headers
		.iter()
		.filter(|(name, _)| {
			*name != header::HOST && *name != header::TRANSFER_ENCODING && *name != header::TRAILER
		})
		.map(|(name, value)| (canonical_name(name.as_str()), value.as_bytes()))
		.collect::<Vec<_>>();

	// Stable: repeated headers keep their arrival order.
	lines.sort_by(|a, b| a.0.cmp(&b.0));

	lines
}

/// `x-goog-user-project` → `X-Goog-User-Project`.
fn canonical_name(name: &str) -> String {
	name.split('-')
		.map(|part| {
			let mut chars = part.chars();

			match chars.next() {
				Some(first) =>
					format!("{}{}", first.to_ascii_uppercase(), chars.as_str().to_ascii_lowercase()),
				None => String::new(),
			}
		})
		.collect::<Vec<_>>()
		.join("-")
}
