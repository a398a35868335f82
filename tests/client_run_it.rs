#![cfg(feature = "test")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use federated_auth::{_preludet::*, app};

const SERVICE_ACCOUNT_PATH: &str =
	"/v1/projects/-/serviceAccounts/federated@mock-project.iam.gserviceaccount.com:generateIdToken";

async fn run_to_string(server: &MockServer, credentials: Arc<StaticAccessToken>) -> String {
	let config = test_client_config(&server.base_url(), &server.url("/dump"));
	let mut out = Vec::new();

	app::run(&config, credentials, &test_reqwest_http_client(), &mut out)
		.await
		.expect("Writing to an in-memory buffer should succeed.");

	String::from_utf8(out).expect("Client output should be UTF-8.")
}

#[tokio::test]
async fn prints_token_then_status() {
	let server = MockServer::start_async().await;
	let iam = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(SERVICE_ACCOUNT_PATH)
				.header("authorization", "Bearer ya29.mock")
				.json_body(json!({
					"audience": "https://mock-run.example.com",
					"includeEmail": true
				}));
			then.status(200).json_body(json!({ "token": "abc123" }));
		})
		.await;
	let target = server
		.mock_async(|when, then| {
			when.method(GET).path("/dump").header("authorization", "Bearer abc123");
			then.status(200).body("GET /dump HTTP/1.1\r\n");
		})
		.await;
	let credentials = Arc::new(StaticAccessToken::new("ya29.mock"));
	let printed = run_to_string(&server, credentials.clone()).await;

	iam.assert_async().await;
	target.assert_async().await;

	assert_eq!(printed, "IDToken abc123\nResponse Code: 200\n");
	assert_eq!(credentials.calls(), 1);
}

#[tokio::test]
async fn permission_denied_skips_the_target() {
	let server = MockServer::start_async().await;
	let iam = server
		.mock_async(|when, then| {
			when.method(POST).path(SERVICE_ACCOUNT_PATH);
			then.status(403).json_body(json!({
				"error": {
					"code": 403,
					"message": "Permission 'iam.serviceAccounts.getOpenIdToken' denied on resource (or it may not exist).",
					"status": "PERMISSION_DENIED"
				}
			}));
		})
		.await;
	let target = server
		.mock_async(|when, then| {
			when.path("/dump");
			then.status(200);
		})
		.await;
	let printed = run_to_string(&server, Arc::new(StaticAccessToken::new("ya29.mock"))).await;

	iam.assert_async().await;
	target.assert_calls_async(0).await;

	assert_eq!(
		printed,
		"Error: IAM Credentials API denied permission: Permission 'iam.serviceAccounts.getOpenIdToken' denied on resource (or it may not exist).\n"
	);
}

#[tokio::test]
async fn error_statuses_from_the_target_are_reported_as_codes() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(SERVICE_ACCOUNT_PATH);
			then.status(200).json_body(json!({ "token": "eyJhbGciOiJSUzI1NiJ9.e30.sig" }));
		})
		.await;

	let target = server
		.mock_async(|when, then| {
			when.method(GET).path("/dump");
			then.status(403).body("Forbidden");
		})
		.await;
	let printed = run_to_string(&server, Arc::new(StaticAccessToken::new("ya29.mock"))).await;

	target.assert_async().await;

	assert_eq!(printed, "IDToken eyJhbGciOiJSUzI1NiJ9.e30.sig\nResponse Code: 403\n");
}

#[tokio::test]
async fn malformed_iam_response_is_a_parse_error() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(SERVICE_ACCOUNT_PATH);
			then.status(200).json_body(json!({ "idToken": "abc123" }));
		})
		.await;

	let printed = run_to_string(&server, Arc::new(StaticAccessToken::new("ya29.mock"))).await;

	assert!(printed.starts_with("Error: IAM Credentials API returned malformed JSON"), "{printed}");
	assert_eq!(printed.lines().count(), 1);
}

#[tokio::test]
async fn unreachable_target_follows_the_token_line() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(SERVICE_ACCOUNT_PATH);
			then.status(200).json_body(json!({ "token": "abc123" }));
		})
		.await;

	let config = test_client_config(&server.base_url(), "http://127.0.0.1:9/dump");
	let mut out = Vec::new();

	app::run(
		&config,
		Arc::new(StaticAccessToken::new("ya29.mock")),
		&test_reqwest_http_client(),
		&mut out,
	)
	.await
	.expect("Writing to an in-memory buffer should succeed.");

	let printed = String::from_utf8(out).expect("Client output should be UTF-8.");
	let lines = printed.lines().collect::<Vec<_>>();

	assert_eq!(lines.len(), 2);
	assert_eq!(lines[0], "IDToken abc123");
	assert!(lines[1].starts_with("Error: Network error occurred"), "{printed}");
}
