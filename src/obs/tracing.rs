// crates.io
use tracing::{Span, field};
// self
use crate::{_prelude::*, dispatch::Stage, target::ConnectionTarget};

/// Span covering a single dispatch.
#[derive(Clone, Debug)]
pub struct DispatchSpan {
	span: Span,
}
impl DispatchSpan {
	/// Opens a span for a dispatch against `target`; the stage field starts empty.
	pub fn new(target: &ConnectionTarget) -> Self {
		let span = tracing::debug_span!(
			"oauth2_dispatch.dispatch",
			connection = %target.id,
			local = target.is_local(),
			stage = field::Empty,
		);

		Self { span }
	}

	/// Records the stage the dispatch just entered.
	pub fn record_stage(&self, stage: Stage) {
		self.span.record("stage", stage.as_str());
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> tracing::instrument::Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}
