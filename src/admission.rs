//! Per-client admission control.
//!
//! [`AdmissionController`] keeps one [`TokenBucket`] per [`ClientIdentity`]. Buckets are
//! created lazily on a client's first request, refilled and drawn on every call, and evicted
//! by a background sweep once the client has been idle for longer than
//! [`AdmissionConfig::eviction_idle`].
//!
//! The identity map sits behind a read/write lock and each bucket behind its own mutex:
//! known clients only take the shared side of the map lock, so admission checks for
//! different clients proceed in parallel and the sweep's exclusive hold is the only point
//! where they wait.

mod bucket;
mod identity;

pub use bucket::*;
pub use identity::*;

// crates.io
use tokio::{
	sync::watch,
	task::JoinHandle,
	time::{self as tokio_time, MissedTickBehavior},
};
// self
use crate::{_prelude::*, clock::Clock, error::ConfigError, obs};

/// Limiter settings; immutable once the controller is built.
#[derive(Clone, Debug, PartialEq)]
pub struct AdmissionConfig {
	/// Sustained permits granted per second.
	pub rate_per_second: f64,
	/// Bucket capacity; the number of back-to-back requests a fresh client may make.
	pub burst: u32,
	/// When `false`, every request is admitted.
	pub enabled: bool,
	/// Idle time after which a client's state is evicted.
	pub eviction_idle: Duration,
	/// Period of the background sweep.
	pub sweep_interval: Duration,
}
impl AdmissionConfig {
	/// Rejects settings that would make the limiter meaningless.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !self.rate_per_second.is_finite() || self.rate_per_second <= 0.0 {
			return Err(ConfigError::NonPositiveRate(self.rate_per_second));
		}
		if self.burst == 0 {
			return Err(ConfigError::ZeroBurst);
		}
		if !self.eviction_idle.is_positive() {
			return Err(ConfigError::ZeroDuration("limiter.eviction_idle"));
		}
		if !self.sweep_interval.is_positive() {
			return Err(ConfigError::ZeroDuration("limiter.sweep_interval"));
		}

		Ok(())
	}
}
impl Default for AdmissionConfig {
	fn default() -> Self {
		Self {
			rate_per_second: 2.0,
			burst: 4,
			enabled: true,
			eviction_idle: Duration::minutes(3),
			sweep_interval: Duration::minutes(1),
		}
	}
}

/// Decision returned by [`AdmissionController::admit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Admission {
	/// The request may proceed.
	Allowed,
	/// The client exceeded its budget.
	Denied,
}
impl Admission {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Admission::Allowed => "allowed",
			Admission::Denied => "denied",
		}
	}

	/// Returns `true` for [`Admission::Allowed`].
	pub fn is_allowed(self) -> bool {
		matches!(self, Admission::Allowed)
	}
}

#[derive(Debug)]
struct ClientState {
	bucket: TokenBucket,
	last_seen: OffsetDateTime,
}
impl ClientState {
	fn new(config: &AdmissionConfig, now: OffsetDateTime) -> Self {
		Self { bucket: TokenBucket::full(config.burst, config.rate_per_second, now), last_seen: now }
	}

	fn admit(&mut self, now: OffsetDateTime) -> Admission {
		self.last_seen = self.last_seen.max(now);

		if self.bucket.try_acquire(now) { Admission::Allowed } else { Admission::Denied }
	}
}

type ClientMap = RwLock<HashMap<ClientIdentity, Mutex<ClientState>>>;

/// Concurrent per-client rate limiter with idle eviction.
pub struct AdmissionController {
	config: AdmissionConfig,
	clock: Arc<dyn Clock>,
	clients: ClientMap,
}
impl AdmissionController {
	/// Creates a controller with an empty client map.
	pub fn new(config: AdmissionConfig, clock: Arc<dyn Clock>) -> Self {
		Self { config, clock, clients: Default::default() }
	}

	/// Settings the controller was built with.
	pub fn config(&self) -> &AdmissionConfig {
		&self.config
	}

	/// Decides whether the client's next request may proceed.
	///
	/// Lookup-or-create, refill, consume, and the `last_seen` stamp happen atomically with
	/// respect to other callers presenting the same identity.
	pub fn admit(&self, identity: &ClientIdentity) -> Admission {
		if !self.config.enabled {
			return Admission::Allowed;
		}

		let decision = self.decide(identity);

		obs::record_admission(decision);

		if !decision.is_allowed() {
			tracing::debug!(client = %identity, "admission denied");
		}

		decision
	}

	/// Parses the transport-level remote address, then admits the resulting identity.
	pub fn admit_remote(&self, remote_addr: &str) -> Result<Admission> {
		if !self.config.enabled {
			return Ok(Admission::Allowed);
		}

		let identity = ClientIdentity::from_remote_addr(remote_addr)?;

		Ok(self.admit(&identity))
	}

	fn decide(&self, identity: &ClientIdentity) -> Admission {
		{
			let clients = self.clients.read();

			if let Some(state) = clients.get(identity) {
				return state.lock().admit(self.clock.now());
			}
		}

		let mut clients = self.clients.write();
		// Read the clock under the exclusive lock so a racing creator cannot stamp a later
		// instant before this one.
		let now = self.clock.now();

		clients
			.entry(identity.clone())
			.or_insert_with(|| Mutex::new(ClientState::new(&self.config, now)))
			.get_mut()
			.admit(now)
	}

	/// Evicts every client idle for strictly longer than `eviction_idle`; returns the count.
	pub fn sweep(&self) -> usize {
		let mut clients = self.clients.write();
		let now = self.clock.now();
		let before = clients.len();

		clients.retain(|_, state| now - state.get_mut().last_seen <= self.config.eviction_idle);

		before - clients.len()
	}

	/// Number of clients currently tracked.
	pub fn tracked_clients(&self) -> usize {
		self.clients.read().len()
	}

	/// Runs [`sweep`](Self::sweep) every `sweep_interval` until `shutdown` flips to `true` or
	/// its sender is dropped.
	pub fn spawn_sweeper(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
		let this = self.clone();
		let period = this.config.sweep_interval.unsigned_abs();

		tokio::spawn(async move {
			let mut ticker = tokio_time::interval_at(tokio_time::Instant::now() + period, period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				tokio::select! {
					_ = ticker.tick() => {
						let evicted = this.sweep();

						if evicted > 0 {
							tracing::debug!(evicted, remaining = this.tracked_clients(), "limiter sweep");
						}
					},
					changed = shutdown.changed() => {
						if changed.is_err() || *shutdown.borrow() {
							break;
						}
					},
				}
			}

			tracing::debug!("limiter sweeper stopped");
		})
	}
}
impl Debug for AdmissionController {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AdmissionController")
			.field("config", &self.config)
			.field("tracked_clients", &self.tracked_clients())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::clock::ManualClock;

	fn controller(config: AdmissionConfig) -> (AdmissionController, Arc<ManualClock>) {
		let clock = Arc::new(ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC)));

		(AdmissionController::new(config, clock.clone()), clock)
	}

	fn client(raw: &str) -> ClientIdentity {
		ClientIdentity::from_remote_addr(raw).expect("Client fixture should parse.")
	}

	#[test]
	fn burst_then_deny() {
		let (limiter, _) = controller(AdmissionConfig { burst: 4, ..Default::default() });
		let a = client("198.51.100.1:4000");
		let decisions: Vec<_> = (0..5).map(|_| limiter.admit(&a)).collect();

		assert_eq!(decisions, [
			Admission::Allowed,
			Admission::Allowed,
			Admission::Allowed,
			Admission::Allowed,
			Admission::Denied
		]);
	}

	#[test]
	fn clients_have_independent_buckets() {
		let (limiter, _) = controller(AdmissionConfig { burst: 1, ..Default::default() });

		assert!(limiter.admit(&client("198.51.100.1:1")).is_allowed());
		assert!(!limiter.admit(&client("198.51.100.1:2")).is_allowed());
		assert!(limiter.admit(&client("198.51.100.2:1")).is_allowed());
	}

	#[test]
	fn disabled_limiter_always_allows_and_tracks_nothing() {
		let (limiter, _) =
			controller(AdmissionConfig { burst: 1, enabled: false, ..Default::default() });
		let a = client("198.51.100.1:1");

		for _ in 0..10 {
			assert!(limiter.admit(&a).is_allowed());
		}

		assert_eq!(limiter.tracked_clients(), 0);
		assert_eq!(limiter.admit_remote("garbage").ok(), Some(Admission::Allowed));
	}

	#[test]
	fn malformed_remote_addr_is_an_error_not_a_denial() {
		let (limiter, _) = controller(AdmissionConfig::default());
		let err = limiter.admit_remote("nope").expect_err("Malformed address must fail.");

		assert!(matches!(err, Error::Identity(IdentityError::Malformed { .. })));
		assert!(err.is_server_fault());
	}

	#[test]
	fn denied_requests_still_refresh_last_seen() {
		let (limiter, clock) = controller(AdmissionConfig {
			burst: 1,
			rate_per_second: 0.001,
			eviction_idle: Duration::minutes(3),
			..Default::default()
		});
		let a = client("198.51.100.9:1");

		assert!(limiter.admit(&a).is_allowed());

		clock.advance(Duration::minutes(2));

		assert!(!limiter.admit(&a).is_allowed());

		clock.advance(Duration::minutes(2));

		assert_eq!(limiter.sweep(), 0, "Denied call at +2m keeps the client alive at +4m.");
	}

	#[test]
	fn config_validation_rejects_degenerate_limits() {
		assert!(AdmissionConfig::default().validate().is_ok());
		assert!(matches!(
			AdmissionConfig { rate_per_second: 0.0, ..Default::default() }.validate(),
			Err(ConfigError::NonPositiveRate(_))
		));
		assert!(matches!(
			AdmissionConfig { rate_per_second: f64::NAN, ..Default::default() }.validate(),
			Err(ConfigError::NonPositiveRate(_))
		));
		assert!(matches!(
			AdmissionConfig { burst: 0, ..Default::default() }.validate(),
			Err(ConfigError::ZeroBurst)
		));
		assert!(matches!(
			AdmissionConfig { sweep_interval: Duration::ZERO, ..Default::default() }.validate(),
			Err(ConfigError::ZeroDuration(_))
		));
	}
}
