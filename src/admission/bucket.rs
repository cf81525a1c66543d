//! Token-bucket arithmetic for a single client.

// self
use crate::_prelude::*;

// Absorbs float drift when `elapsed * rate` should land exactly on a whole permit.
const PERMIT_EPSILON: f64 = 1e-6;

/// Capped pool of permits that refills continuously.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenBucket {
	capacity: f64,
	refill_per_second: f64,
	tokens: f64,
	last_refill: OffsetDateTime,
}
impl TokenBucket {
	/// Creates a full bucket holding `capacity` permits.
	pub fn full(capacity: u32, refill_per_second: f64, now: OffsetDateTime) -> Self {
		let capacity = f64::from(capacity);

		Self { capacity, refill_per_second, tokens: capacity, last_refill: now }
	}

	/// Permits currently available (after the last refill).
	pub fn available(&self) -> f64 {
		self.tokens
	}

	/// Credits permits for the time elapsed since the last refill, capped at capacity.
	///
	/// A clock that moved backwards credits nothing and leaves the refill mark untouched.
	pub fn refill(&mut self, now: OffsetDateTime) {
		if now <= self.last_refill {
			return;
		}

		let elapsed = (now - self.last_refill).as_seconds_f64();

		self.tokens = (self.tokens + elapsed * self.refill_per_second).min(self.capacity);
		self.last_refill = now;
	}

	/// Refills, then consumes one permit if available.
	pub fn try_acquire(&mut self, now: OffsetDateTime) -> bool {
		self.refill(now);

		if self.tokens + PERMIT_EPSILON < 1.0 {
			return false;
		}

		self.tokens = (self.tokens - 1.0).max(0.0);

		true
	}
}
