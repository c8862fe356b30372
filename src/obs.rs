//! Observability helpers for dispatches.
//!
//! # Feature Flags
//!
//! - Spans named `oauth2_dispatch.dispatch` carry the `connection` and current `stage` fields;
//!   stage transitions are emitted as `trace` events inside them.
//! - Enable `metrics` to increment the `oauth2_dispatch_stage_total` counter for every stage
//!   attempt/success/fallthrough/failure, labeled by `stage` + `outcome`.

mod metrics;
mod tracing;

pub use self::{metrics::*, tracing::*};

// self
use crate::_prelude::*;

/// Outcome labels recorded for each stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageOutcome {
	/// Stage entered.
	Attempt,
	/// Stage produced the final response.
	Success,
	/// Stage gave up and handed over to the next stage.
	Fallthrough,
	/// Stage ended the dispatch with an error.
	Failure,
}
impl StageOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			StageOutcome::Attempt => "attempt",
			StageOutcome::Success => "success",
			StageOutcome::Fallthrough => "fallthrough",
			StageOutcome::Failure => "failure",
		}
	}
}
impl Display for StageOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
