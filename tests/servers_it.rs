#![cfg(feature = "test")]

// crates.io
use axum::{
	body::{self, Body},
	http::{Request, StatusCode, header},
	response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::json;
use tower::ServiceExt;
// self
use federated_auth::{
	_preludet::*,
	server::{
		OK_BODY, dump,
		idp::{self, IdpState, JwkSet, OpenIdConfiguration},
	},
};

fn idp_router() -> axum::Router {
	let state = IdpState::from_pem(include_str!("fixtures/idp_signing_key.pem"), "123456")
		.expect("Fixture signing key should parse.");

	idp::router(state)
}

async fn body_text(response: Response) -> String {
	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Response body should be readable.");

	String::from_utf8(bytes.to_vec()).expect("Response body should be UTF-8.")
}

fn get(uri: &str) -> Request<Body> {
	Request::builder()
		.uri(uri)
		.header(header::HOST, "idp.example.com")
		.body(Body::empty())
		.expect("Request should build.")
}

#[tokio::test]
async fn dump_echoes_the_request_in_wire_format() {
	let request = Request::builder()
		.method("POST")
		.uri("/dump?verbose=1")
		.header(header::HOST, "dump.example.com")
		.header("x-cloud-trace-context", "abc/1")
		.header(header::AUTHORIZATION, "Bearer abc123")
		.body(Body::from("payload"))
		.expect("Request should build.");
	let response = dump::router().oneshot(request).await.expect("Router should respond.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		body_text(response).await,
		"POST /dump?verbose=1 HTTP/1.1\r\nHost: dump.example.com\r\nAuthorization: Bearer abc123\r\nX-Cloud-Trace-Context: abc/1\r\n\r\npayload"
	);
}

#[tokio::test]
async fn dump_root_and_unknown_paths_answer_ok() {
	for uri in ["/", "/healthz"] {
		let response = dump::router().oneshot(get(uri)).await.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::OK);
		assert_eq!(body_text(response).await, OK_BODY);
	}
}

#[tokio::test]
async fn idp_issues_tokens_verifiable_with_its_jwks() {
	let router = idp_router();
	let certs = router.clone().oneshot(get("/certs")).await.expect("Router should respond.");

	assert_eq!(certs.status(), StatusCode::OK);

	let jwks: JwkSet =
		serde_json::from_str(&body_text(certs).await).expect("JWKS should be valid JSON.");
	let jwk = &jwks.keys[0];

	assert_eq!((jwk.kty.as_str(), jwk.kid.as_str(), jwk.alg.as_str()), ("RSA", "123456", "RS256"));

	let exp = (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp();
	let request = Request::builder()
		.method("POST")
		.uri("/token")
		.body(Body::from(
			json!({
				"iss": "https://idp.example.com",
				"aud": "//iam.googleapis.com/projects/1/locations/global/workloadIdentityPools/pool/providers/oidc",
				"sub": "alice@domain.com",
				"exp": exp
			})
			.to_string(),
		))
		.expect("Request should build.");
	let response = router.oneshot(request).await.expect("Router should respond.");

	assert_eq!(response.status(), StatusCode::OK);
	assert_eq!(
		response.headers().get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok()),
		Some("text/plain")
	);

	let jwt = body_text(response).await;
	let header = jsonwebtoken::decode_header(&jwt).expect("JWT header should decode.");

	assert_eq!(header.kid.as_deref(), Some("123456"));

	let mut validation = Validation::new(Algorithm::RS256);

	validation.set_issuer(&["https://idp.example.com"]);
	validation.set_audience(&[
		"//iam.googleapis.com/projects/1/locations/global/workloadIdentityPools/pool/providers/oidc",
	]);

	let claims = jsonwebtoken::decode::<serde_json::Value>(
		&jwt,
		&DecodingKey::from_rsa_components(&jwk.n, &jwk.e).expect("JWK should form a key."),
		&validation,
	)
	.expect("Issued token should verify against the published key.")
	.claims;

	assert_eq!(claims["sub"], "alice@domain.com");
}

#[tokio::test]
async fn idp_rejects_non_object_claims() {
	for body in ["not json", "[1,2,3]"] {
		let request = Request::builder()
			.method("POST")
			.uri("/token")
			.body(Body::from(body))
			.expect("Request should build.");
		let response = idp_router().oneshot(request).await.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
		assert!(body_text(response).await.starts_with("couldn't parse claims JSON: "));
	}
}

#[tokio::test]
async fn idp_discovery_uses_the_host_header() {
	let response = idp_router()
		.oneshot(get("/.well-known/openid-configuration"))
		.await
		.expect("Router should respond.");
	let doc: OpenIdConfiguration =
		serde_json::from_str(&body_text(response).await).expect("Discovery should be JSON.");

	assert_eq!(doc.issuer, "https://idp.example.com");
	assert_eq!(doc.jwks_uri, "https://idp.example.com/certs");
	assert_eq!(doc.id_token_signing_alg_values_supported, ["RS256"]);
	assert_eq!(doc.response_types_supported, ["id_token"]);
	assert_eq!(doc.subject_types_supported, ["public"]);
}

#[tokio::test]
async fn idp_discovery_falls_back_to_the_http2_authority() {
	let request = Request::builder()
		.version(axum::http::Version::HTTP_2)
		.uri("https://idp.example.com/.well-known/openid-configuration")
		.body(Body::empty())
		.expect("Request should build.");
	let response = idp_router().oneshot(request).await.expect("Router should respond.");
	let doc: OpenIdConfiguration =
		serde_json::from_str(&body_text(response).await).expect("Discovery should be JSON.");

	assert_eq!(doc.issuer, "https://idp.example.com");
	assert_eq!(doc.jwks_uri, "https://idp.example.com/certs");
}

#[tokio::test]
async fn idp_only_allows_listed_methods() {
	let response = idp_router().oneshot(get("/token")).await.expect("Router should respond.");

	assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

	let request = Request::builder()
		.method("DELETE")
		.uri("/certs")
		.body(Body::empty())
		.expect("Request should build.");
	let response = idp_router().oneshot(request).await.expect("Router should respond.");

	assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
