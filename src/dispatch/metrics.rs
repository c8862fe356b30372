// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for dispatches and the broker calls they triggered.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	refreshes: AtomicU64,
	reauthentications: AtomicU64,
}
impl DispatchMetrics {
	/// Returns the total number of dispatches.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of dispatches that produced a response.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of dispatches that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh grants requested from the broker.
	pub fn refreshes(&self) -> u64 {
		self.refreshes.load(Ordering::Relaxed)
	}

	/// Returns the number of password grants requested from the broker.
	pub fn reauthentications(&self) -> u64 {
		self.reauthentications.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh(&self) {
		self.refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_reauthentication(&self) {
		self.reauthentications.fetch_add(1, Ordering::Relaxed);
	}
}
