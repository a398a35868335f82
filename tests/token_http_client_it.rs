#![cfg(feature = "test")]

// self
use federated_auth::{
	_preludet::*,
	auth::{AccessTokenProvider, AuthorizedUserCredentials, AuthorizedUserKey, TokenSecret},
	error::{ConfigError, TransientError, TransportError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
	oauth::{
		TransportErrorMapper,
		oauth2::{AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse},
	},
	upstream::Upstream,
};

#[derive(Debug)]
enum FakeTransportError {
	Throttled,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Throttled => write!(f, "Transport throttled."),
		}
	}
}
impl StdError for FakeTransportError {}

#[derive(Clone, Copy)]
struct FakeHttpClient {
	retry_after: Duration,
}
impl FakeHttpClient {
	fn throttled(retry_after: Duration) -> Self {
		Self { retry_after }
	}
}
impl TokenHttpClient for FakeHttpClient {
	type Handle = FakeHttpHandle;
	type TransportError = FakeTransportError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		FakeHttpHandle { slot, retry_after: self.retry_after }
	}
}

struct FakeHttpHandle {
	slot: ResponseMetadataSlot,
	retry_after: Duration,
}
impl<'a> AsyncHttpClient<'a> for FakeHttpHandle {
	type Error = HttpClientError<FakeTransportError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'a + Send + Sync>>;

	fn call(&'a self, request: HttpRequest) -> Self::Future {
		let slot = self.slot.clone();
		let retry_after = self.retry_after;

		Box::pin(async move {
			assert!(
				slot.take().is_none(),
				"ResponseMetadataSlot must be clear before dispatching a request."
			);
			assert_eq!(request.uri(), "https://oauth2.example.com/token");

			slot.store(ResponseMetadata { status: Some(429), retry_after: Some(retry_after) });

			Err(HttpClientError::Reqwest(Box::new(FakeTransportError::Throttled)))
		})
	}
}

#[derive(Clone, Default)]
struct RecordingTransportErrorMapper {
	metadata: Arc<Mutex<Vec<(Upstream, Option<ResponseMetadata>)>>>,
}
impl RecordingTransportErrorMapper {
	fn recorded(&self) -> Vec<(Upstream, Option<ResponseMetadata>)> {
		self.metadata.lock().clone()
	}
}
impl TransportErrorMapper<FakeTransportError> for RecordingTransportErrorMapper {
	fn map_transport_error(
		&self,
		upstream: Upstream,
		meta: Option<&ResponseMetadata>,
		err: HttpClientError<FakeTransportError>,
	) -> Error {
		let status = meta.and_then(|value| value.status);
		let retry_after = meta.and_then(|value| value.retry_after);

		self.metadata.lock().push((upstream, meta.cloned()));

		match err {
			HttpClientError::Reqwest(inner) => TransientError::Upstream {
				upstream,
				message: format!("Fake transport error: {inner}"),
				status,
				retry_after,
			}
			.into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			other => TransientError::Upstream {
				upstream,
				message: format!("Unhandled HTTP client error: {other:?}"),
				status,
				retry_after,
			}
			.into(),
		}
	}
}

fn key() -> AuthorizedUserKey {
	AuthorizedUserKey {
		client_id: "fake-client".into(),
		client_secret: TokenSecret::new("fake-secret"),
		refresh_token: TokenSecret::new("1//fake-refresh"),
		token_uri: Some(
			Url::parse("https://oauth2.example.com/token").expect("Token URI should parse."),
		),
		quota_project_id: None,
	}
}

#[tokio::test]
async fn fake_token_http_client_surfaces_metadata() {
	let credentials: AuthorizedUserCredentials<FakeHttpClient, RecordingTransportErrorMapper> =
		AuthorizedUserCredentials::with_http_client(
			key(),
			Arc::new(FakeHttpClient::throttled(Duration::seconds(5))),
			Arc::new(RecordingTransportErrorMapper::default()),
		)
		.expect("Credentials should build over the fake transport.");
	let err = credentials.access_token().await.expect_err("Refresh should be throttled.");

	match err {
		Error::Transient(TransientError::Upstream { upstream, status, retry_after, .. }) => {
			assert_eq!(upstream, Upstream::TokenEndpoint);
			assert_eq!(status, Some(429));
			assert_eq!(retry_after, Some(Duration::seconds(5)));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn fake_mapper_captures_response_metadata() {
	let mapper = Arc::new(RecordingTransportErrorMapper::default());
	let credentials: AuthorizedUserCredentials<FakeHttpClient, RecordingTransportErrorMapper> =
		AuthorizedUserCredentials::with_http_client(
			key(),
			Arc::new(FakeHttpClient::throttled(Duration::seconds(30))),
			mapper.clone(),
		)
		.expect("Credentials should build over the fake transport.");
	let _ = credentials.access_token().await.expect_err("Refresh should be throttled.");
	let observed = mapper.recorded();

	assert_eq!(observed.len(), 1, "Mapper must record a single request.");

	let (upstream, meta) = observed.into_iter().next().expect("One record should exist.");
	let meta = meta.expect("Response metadata should be recorded.");

	assert_eq!(upstream, Upstream::TokenEndpoint);
	assert_eq!(meta.status, Some(429));
	assert_eq!(meta.retry_after, Some(Duration::seconds(30)));
}
