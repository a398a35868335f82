//! Mock OIDC identity provider.
//!
//! Publishes a discovery document and a single-key JWKS, and signs arbitrary claim sets posted
//! to `/token`. The issued JWTs can be fed to an external-account credential as subject tokens.

// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::State,
	http::{HeaderMap, StatusCode, Uri, header},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::{
	RsaPrivateKey, pkcs1::DecodeRsaPrivateKey, pkcs8::DecodePrivateKey, traits::PublicKeyParts,
};
// self
use crate::{_prelude::*, config::ServerConfig, error::ConfigError};

const SIGNING_ALG: &str = "RS256";

/// Public half of the signing key as a JSON Web Key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
	/// Key type, always `RSA`.
	pub kty: String,
	/// Key identifier.
	pub kid: String,
	/// Intended use, always `sig`.
	#[serde(rename = "use")]
	pub usage: String,
	/// Signing algorithm, always `RS256`.
	pub alg: String,
	/// Base64url modulus.
	pub n: String,
	/// Base64url public exponent.
	pub e: String,
}

/// JSON Web Key Set served from `/certs`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
	/// Published keys.
	pub keys: Vec<Jwk>,
}

/// Discovery document served from `/.well-known/openid-configuration`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdConfiguration {
	/// `https://<Host>`.
	pub issuer: String,
	/// `https://<Host>/certs`.
	pub jwks_uri: String,
	/// Always `["RS256"]`.
	pub id_token_signing_alg_values_supported: Vec<String>,
	/// Always `["id_token"]`.
	pub response_types_supported: Vec<String>,
	/// Always `["public"]`.
	pub subject_types_supported: Vec<String>,
}
impl OpenIdConfiguration {
	fn for_host(host: &str) -> Self {
		Self {
			issuer: format!("https://{host}"),
			jwks_uri: format!("https://{host}/certs"),
			id_token_signing_alg_values_supported: vec![SIGNING_ALG.into()],
			response_types_supported: vec!["id_token".into()],
			subject_types_supported: vec!["public".into()],
		}
	}
}

/// Signing material shared by the IdP handlers.
#[derive(Clone)]
pub struct IdpState(Arc<IdpKeys>);
impl IdpState {
	/// Parses a PKCS#1 or PKCS#8 PEM private key.
	pub fn from_pem(pem: &str, key_id: impl Into<String>) -> Result<Self> {
		let private = RsaPrivateKey::from_pkcs1_pem(pem)
			.or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
			.map_err(|e| ConfigError::InvalidSigningKey { reason: e.to_string() })?;
		let encoding = EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(ConfigError::from)?;
		let key_id = key_id.into();
		let jwk = Jwk {
			kty: "RSA".into(),
			kid: key_id.clone(),
			usage: "sig".into(),
			alg: SIGNING_ALG.into(),
			n: URL_SAFE_NO_PAD.encode(private.n().to_bytes_be()),
			e: URL_SAFE_NO_PAD.encode(private.e().to_bytes_be()),
		};

		Ok(Self(Arc::new(IdpKeys { key_id, encoding, jwk })))
	}

	/// Reads [`ServerConfig::signing_key_file`]; a missing setting is an error.
	pub fn load(config: &ServerConfig) -> Result<Self> {
		let path = config.signing_key_file.as_ref().ok_or_else(|| ConfigError::InvalidSigningKey {
			reason: "no signing key file configured (FEDERATED_AUTH_SERVER_SIGNING_KEY_FILE)".into(),
		})?;
		let pem = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidSigningKey {
			reason: format!("reading {}: {e}", path.display()),
		})?;

		Self::from_pem(&pem, config.key_id.clone())
	}

	/// Published JWK of the signing key.
	pub fn jwk(&self) -> &Jwk {
		&self.0.jwk
	}

	/// Signs `claims` as an RS256 JWT carrying the configured `kid`.
	pub fn sign(&self, claims: &serde_json::Map<String, serde_json::Value>) -> Result<String> {
		let mut header = Header::new(Algorithm::RS256);

		header.kid = Some(self.0.key_id.clone());

		jsonwebtoken::encode(&header, claims, &self.0.encoding)
			.map_err(|e| ConfigError::from(e).into())
	}
}
impl Debug for IdpState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdpState").field("key_id", &self.0.key_id).finish_non_exhaustive()
	}
}

struct IdpKeys {
	key_id: String,
	encoding: EncodingKey,
	jwk: Jwk,
}

/// Routes: `GET /`, `GET /certs`, `GET /.well-known/openid-configuration`, `POST /token`.
pub fn router(state: IdpState) -> Router {
	Router::new()
		.route("/", get(super::front))
		.route("/certs", get(certs))
		.route("/.well-known/openid-configuration", get(well_known))
		.route("/token", post(token))
		.with_state(state)
}

async fn certs(State(state): State<IdpState>) -> Json<JwkSet> {
	Json(JwkSet { keys: vec![state.jwk().clone()] })
}

async fn well_known(headers: HeaderMap, uri: Uri) -> Json<OpenIdConfiguration> {
	let host = super::request_host(&headers, &uri).unwrap_or_default();

	Json(OpenIdConfiguration::for_host(&host))
}

async fn token(State(state): State<IdpState>, body: Bytes) -> Response {
	let claims = match serde_json::from_slice::<serde_json::Map<String, serde_json::Value>>(&body) {
		Ok(claims) => claims,
		Err(err) =>
			return (StatusCode::INTERNAL_SERVER_ERROR, format!("couldn't parse claims JSON: {err}"))
				.into_response(),
	};

	match state.sign(&claims) {
		Ok(jwt) => ([(header::CONTENT_TYPE, "text/plain")], jwt).into_response(),
		Err(err) => {
			#[cfg(feature = "tracing")]
			tracing::error!(error = %err, "JWT signing failed");

			(StatusCode::INTERNAL_SERVER_ERROR, format!("Error creating JWT {err}")).into_response()
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	const TEST_KEY: &str = include_str!("../../tests/fixtures/idp_signing_key.pem");

	#[test]
	fn jwk_uses_unpadded_base64url() {
		let state = IdpState::from_pem(TEST_KEY, "123456").expect("Fixture key should parse.");
		let jwk = state.jwk();

		assert_eq!(jwk.kid, "123456");
		assert_eq!(jwk.e, "AQAB");
		assert!(!jwk.n.contains('=') && !jwk.n.contains('+') && !jwk.n.contains('/'));
	}

	#[test]
	fn rejects_non_rsa_material() {
		let err = IdpState::from_pem("-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----\n", "1")
			.expect_err("A public key cannot sign.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidSigningKey { .. })));
	}

	#[test]
	fn missing_key_file_setting_is_reported() {
		let err = IdpState::load(&ServerConfig::default()).expect_err("Key file is required.");

		assert!(err.to_string().contains("FEDERATED_AUTH_SERVER_SIGNING_KEY_FILE"));
	}

	#[test]
	fn discovery_document_follows_host() {
		let doc = OpenIdConfiguration::for_host("idp.example.com:8080");

		assert_eq!(doc.issuer, "https://idp.example.com:8080");
		assert_eq!(doc.jwks_uri, "https://idp.example.com:8080/certs");
	}
}
