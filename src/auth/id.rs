//! Strongly typed identifiers for the service account and token audience.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

macro_rules! def_id {
	($name:ident, $doc:literal, $kind:literal, $max:expr, $extra:path) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Creates a new identifier after validation.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				let view = value.as_ref();

				validate_view($kind, $max, view)?;
				$extra($kind, view)?;

				Ok(Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				validate_view($kind, $max, &value)?;
				$extra($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, concat!($kind, "({})"), self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

const EMAIL_MAX_LEN: usize = 254;
const AUDIENCE_MAX_LEN: usize = 2048;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (service account, audience).
		kind: &'static str,
	},
	/// The identifier contains whitespace characters.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// Kind of identifier (service account, audience).
		kind: &'static str,
	},
	/// The identifier exceeded the allowed character count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (service account, audience).
		kind: &'static str,
		/// Maximum permitted character count.
		max: usize,
	},
	/// The identifier is not shaped like `local@domain`.
	#[error("{kind} identifier must be an email address.")]
	NotAnEmail {
		/// Kind of identifier.
		kind: &'static str,
	},
}

def_id! {
	ServiceAccountEmail,
	"Email of the service account whose identity token is minted.",
	"Service account",
	EMAIL_MAX_LEN,
	validate_email
}
def_id! {
	Audience,
	"Intended recipient of an identity token, encoded as its `aud` claim.",
	"Audience",
	AUDIENCE_MAX_LEN,
	accept_any
}

impl ServiceAccountEmail {
	/// IAM resource name with the project wildcard, e.g.
	/// `projects/-/serviceAccounts/sa@project.iam.gserviceaccount.com`.
	pub fn resource_name(&self) -> String {
		format!("projects/-/serviceAccounts/{}", self.0)
	}
}

fn validate_view(kind: &'static str, max: usize, view: &str) -> Result<(), IdentifierError> {
	if view.is_empty() {
		return Err(IdentifierError::Empty { kind });
	}
	if view.chars().any(char::is_whitespace) {
		return Err(IdentifierError::ContainsWhitespace { kind });
	}
	if view.len() > max {
		return Err(IdentifierError::TooLong { kind, max });
	}

	Ok(())
}

fn validate_email(kind: &'static str, view: &str) -> Result<(), IdentifierError> {
	match view.split_once('@') {
		Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
			Ok(()),
		_ => Err(IdentifierError::NotAnEmail { kind }),
	}
}

fn accept_any(_kind: &'static str, _view: &str) -> Result<(), IdentifierError> {
	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn service_account_requires_email_shape() {
		let email = ServiceAccountEmail::new("oidc-federated@project.iam.gserviceaccount.com")
			.expect("Service account fixture should be valid.");

		assert_eq!(
			email.resource_name(),
			"projects/-/serviceAccounts/oidc-federated@project.iam.gserviceaccount.com"
		);
		assert!(ServiceAccountEmail::new("no-at-sign").is_err());
		assert!(ServiceAccountEmail::new("@project.iam").is_err());
		assert!(ServiceAccountEmail::new("sa@").is_err());
		assert!(ServiceAccountEmail::new("a@b@c").is_err());
		assert!(ServiceAccountEmail::new(" sa@project").is_err());
	}

	#[test]
	fn audience_rejects_blank_and_oversized_values() {
		assert!(Audience::new("").is_err());
		assert!(Audience::new("https://run.example.com path").is_err());

		let exact = "a".repeat(AUDIENCE_MAX_LEN);

		Audience::new(&exact).expect("Exact length should succeed.");

		assert!(Audience::new("a".repeat(AUDIENCE_MAX_LEN + 1)).is_err());
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let audience: Audience = serde_json::from_str("\"https://run.example.com\"")
			.expect("Audience should deserialize successfully.");

		assert_eq!(audience.as_ref(), "https://run.example.com");
		assert!(serde_json::from_str::<ServiceAccountEmail>("\"nobody\"").is_err());
	}
}
