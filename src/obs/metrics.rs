//! Counters and latency histograms for the token pipeline.
//!
//! A client run touches each [`Stage`] at most once, so the counters mostly matter when the
//! library is embedded in a long-lived process that installs a `metrics` recorder.

// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{Stage, StageOutcome};

/// Counter incremented once per attempt, success, and failure.
pub const STAGE_TOTAL: &str = "federated_auth_stage_total";
/// Histogram of wall-clock time spent in a finished stage, in seconds.
pub const STAGE_DURATION_SECONDS: &str = "federated_auth_stage_duration_seconds";

/// Bumps [`STAGE_TOTAL`] for `stage` with the `outcome` label.
pub fn record_stage_outcome(stage: Stage, outcome: StageOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(STAGE_TOTAL, "stage" => stage.as_str(), "outcome" => outcome.as_str())
		.increment(1);

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}

/// Records how long a stage ran before it succeeded or failed.
///
/// Attempts are not timed; pass [`StageOutcome::Success`] or [`StageOutcome::Failure`].
pub fn record_stage_duration(stage: Stage, outcome: StageOutcome, elapsed: StdDuration) {
	#[cfg(feature = "metrics")]
	metrics::histogram!(
		STAGE_DURATION_SECONDS,
		"stage" => stage.as_str(),
		"outcome" => outcome.as_str()
	)
	.record(elapsed.as_secs_f64());

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome, elapsed);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn every_stage_records_without_a_recorder() {
		for stage in [Stage::AccessToken, Stage::IdToken, Stage::Invoke] {
			record_stage_outcome(stage, StageOutcome::Attempt);
			record_stage_outcome(stage, StageOutcome::Failure);
			record_stage_duration(stage, StageOutcome::Failure, StdDuration::from_millis(12));
		}
	}

	#[test]
	fn metric_names_share_the_crate_prefix() {
		assert!(STAGE_TOTAL.starts_with("federated_auth_stage"));
		assert!(STAGE_DURATION_SECONDS.ends_with("_seconds"));
	}
}
