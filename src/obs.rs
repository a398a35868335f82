//! Optional observability for the token pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `federated_auth.stage` with the `stage`
//!   (pipeline step) and `call_site` fields, and to install a stderr subscriber through
//!   [`init_logging`].
//! - Enable `metrics` to increment the `federated_auth_stage_total` counter for every
//!   attempt/success/failure, labeled by `stage` + `outcome`, and to time finished stages in
//!   the `federated_auth_stage_duration_seconds` histogram.
//!
//! Standard output is reserved for the client's result lines; diagnostics always go to stderr.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// std
use std::time::Instant;
// self
use crate::_prelude::*;

/// Steps of the identity token pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
	/// Obtaining an access token from Application Default Credentials.
	AccessToken,
	/// Calling IAM Credentials `generateIdToken`.
	IdToken,
	/// Presenting the identity token to the target endpoint.
	Invoke,
}
impl Stage {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Stage::AccessToken => "access_token",
			Stage::IdToken => "id_token",
			Stage::Invoke => "invoke",
		}
	}
}
impl Display for Stage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Entry to a pipeline step.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Runs `fut` inside a [`StageSpan`], records attempt plus success or failure, and times it.
pub async fn observe<T, Fut>(stage: Stage, call_site: &'static str, fut: Fut) -> Result<T>
where
	Fut: Future<Output = Result<T>>,
{
	let span = StageSpan::new(stage, call_site);

	record_stage_outcome(stage, StageOutcome::Attempt);

	let started = Instant::now();
	let result = span.instrument(fut).await;
	let outcome = match &result {
		Ok(_) => StageOutcome::Success,
		Err(err) => {
			log_failure(stage, call_site, err);

			StageOutcome::Failure
		},
	};

	record_stage_outcome(stage, outcome);
	record_stage_duration(stage, outcome, started.elapsed());

	result
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn observe_passes_results_through() {
		let ok = observe(Stage::IdToken, "test", async { Ok(7) }).await;

		assert_eq!(ok.expect("Successful future should pass through."), 7);

		let err = observe::<(), _>(Stage::Invoke, "test", async {
			Err(crate::error::TransportError::Io(std::io::Error::other("reset")).into())
		})
		.await;

		assert!(matches!(err, Err(Error::Transport(_))));
	}

	#[test]
	fn labels_are_stable() {
		assert_eq!(Stage::AccessToken.to_string(), "access_token");
		assert_eq!(StageOutcome::Failure.as_str(), "failure");
	}
}
