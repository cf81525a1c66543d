//! Signal-driven graceful shutdown.
//!
//! The process moves through [`ShutdownState::Running`], [`ShutdownState::Draining`], and
//! [`ShutdownState::Stopped`] exactly once. [`ShutdownCoordinator::run`] races the serve loop
//! against a termination signal; once the signal wins, the serve loop is told to stop
//! accepting connections and is given the drain timeout to finish in-flight requests, with
//! supervised background jobs draining under the same deadline.

// std
use std::{
	sync::atomic::{AtomicU8, Ordering},
	task::{Context, Poll},
};
// crates.io
use tokio::{sync::watch, task::JoinError, time as tokio_time};
// self
use crate::{_prelude::*, background::Background};

/// Process-wide shutdown phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShutdownState {
	/// Accepting work.
	Running = 0,
	/// Refusing new work; waiting for in-flight work.
	Draining = 1,
	/// Finished.
	Stopped = 2,
}
impl ShutdownState {
	fn from_u8(raw: u8) -> Self {
		match raw {
			0 => ShutdownState::Running,
			1 => ShutdownState::Draining,
			_ => ShutdownState::Stopped,
		}
	}
}

#[derive(Debug)]
struct Shared {
	state: AtomicU8,
	stop: watch::Sender<bool>,
}

/// Cloneable trigger and observer for the shutdown sequence.
#[derive(Clone, Debug)]
pub struct ShutdownHandle(Arc<Shared>);
impl ShutdownHandle {
	fn new() -> Self {
		let (stop, _) = watch::channel(false);

		Self(Arc::new(Shared { state: AtomicU8::new(ShutdownState::Running as u8), stop }))
	}

	/// Starts draining. Returns `false`, changing nothing, when a shutdown already started.
	pub fn trigger(&self) -> bool {
		let started = self
			.0
			.state
			.compare_exchange(
				ShutdownState::Running as u8,
				ShutdownState::Draining as u8,
				Ordering::SeqCst,
				Ordering::SeqCst,
			)
			.is_ok();

		if started {
			tracing::info!("shutting down server");

			self.0.stop.send_replace(true);
		} else {
			tracing::debug!(state = ?self.state(), "shutdown already requested");
		}

		started
	}

	/// Current phase.
	pub fn state(&self) -> ShutdownState {
		ShutdownState::from_u8(self.0.state.load(Ordering::SeqCst))
	}

	/// Receiver that flips to `true` when draining starts.
	pub fn subscribe(&self) -> watch::Receiver<bool> {
		self.0.stop.subscribe()
	}

	/// Future resolving when draining starts.
	pub fn signal(&self) -> ShutdownSignal {
		let mut stop = self.subscribe();

		ShutdownSignal(Box::pin(async move {
			let _ = stop.wait_for(|stopping| *stopping).await;
		}))
	}

	fn finish(&self) {
		self.0.state.store(ShutdownState::Stopped as u8, Ordering::SeqCst);
	}
}

/// Resolves once the serve loop should stop accepting connections.
pub struct ShutdownSignal(Pin<Box<dyn Future<Output = ()> + Send>>);
impl Future for ShutdownSignal {
	type Output = ();

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		self.0.as_mut().poll(cx)
	}
}
impl Debug for ShutdownSignal {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ShutdownSignal")
	}
}

/// Owns the serving lifetime of the process.
#[derive(Debug)]
pub struct ShutdownCoordinator {
	drain_timeout: Duration,
	handle: ShutdownHandle,
	background: Option<Background>,
}
impl ShutdownCoordinator {
	/// Creates a coordinator in [`ShutdownState::Running`].
	pub fn new(drain_timeout: Duration) -> Self {
		Self { drain_timeout, handle: ShutdownHandle::new(), background: None }
	}

	/// Also drains `background` jobs within the drain timeout.
	pub fn with_background(mut self, background: Background) -> Self {
		self.background = Some(background);

		self
	}

	/// Handle for triggering or observing the shutdown from elsewhere.
	pub fn handle(&self) -> ShutdownHandle {
		self.handle.clone()
	}

	/// Current phase.
	pub fn state(&self) -> ShutdownState {
		self.handle.state()
	}

	/// Runs `serve` until it ends on its own or `signal` (or [`ShutdownHandle::trigger`])
	/// starts a shutdown.
	///
	/// Returns `Ok(())` when the serve loop stopped because of the shutdown and draining
	/// finished in time, [`Error::Timeout`] when the drain timeout elapsed first (the serve
	/// loop is then abandoned), and the serve loop's own error when it failed for any other
	/// reason.
	pub async fn run<S, Fut, Sig>(self, serve: S, signal: Sig) -> Result<()>
	where
		S: FnOnce(ShutdownSignal) -> Fut,
		Fut: 'static + Send + Future<Output = Result<()>>,
		Sig: Future<Output = ()>,
	{
		let mut serving = tokio::spawn(serve(self.handle.signal()));
		let mut stop = self.handle.subscribe();

		tokio::pin!(signal);

		tokio::select! {
			joined = &mut serving => {
				self.handle.finish();

				return flatten(joined);
			},
			_ = &mut signal => {
				self.handle.trigger();
			},
			_ = async { let _ = stop.wait_for(|stopping| *stopping).await; } => {},
		}

		let background = self.background.clone();
		let drain = async {
			let served = (&mut serving).await;

			if let Some(background) = &background {
				background.wait_idle().await;
			}

			served
		};
		let outcome = tokio_time::timeout(self.drain_timeout.unsigned_abs(), drain).await;

		self.handle.finish();

		match outcome {
			Ok(joined) => {
				tracing::info!("stopped server");

				flatten(joined)
			},
			Err(_) => {
				serving.abort();

				tracing::error!(
					timeout = %self.drain_timeout,
					"drain timed out; abandoning in-flight work"
				);

				Err(Error::Timeout { operation: "shutdown.drain" })
			},
		}
	}
}

fn flatten(joined: Result<Result<()>, JoinError>) -> Result<()> {
	match joined {
		Ok(served) => served,
		Err(e) if e.is_panic() => Err(Error::internal("serve loop panicked")),
		Err(_) => Err(Error::internal("serve loop was cancelled")),
	}
}

/// Resolves on SIGINT or SIGTERM (ctrl-c only on non-unix targets).
///
/// Once installed, the handlers stay in place, so later signals are swallowed instead of
/// killing a drain in progress.
pub async fn termination_signal() {
	let interrupt = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "failed to listen for SIGINT");

			std::future::pending::<()>().await;
		}
	};
	#[cfg(unix)]
	let terminate = async {
		// crates.io
		use tokio::signal::unix::{self, SignalKind};

		match unix::signal(SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			},
			Err(e) => {
				tracing::error!(error = %e, "failed to listen for SIGTERM");

				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = interrupt => tracing::info!(signal = "SIGINT", "caught signal"),
		_ = terminate => tracing::info!(signal = "SIGTERM", "caught signal"),
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::future;
	// self
	use super::*;

	fn secs(n: u64) -> std::time::Duration {
		std::time::Duration::from_secs(n)
	}

	#[tokio::test(start_paused = true)]
	async fn clean_drain_reports_success() {
		let coordinator = ShutdownCoordinator::new(Duration::seconds(5));
		let handle = coordinator.handle();
		let result = coordinator
			.run(
				|stop| async move {
					stop.await;
					tokio::time::sleep(secs(1)).await;

					Ok(())
				},
				tokio::time::sleep(secs(1)),
			)
			.await;

		assert!(result.is_ok());
		assert_eq!(handle.state(), ShutdownState::Stopped);
	}

	#[tokio::test(start_paused = true)]
	async fn slow_drain_times_out() {
		let coordinator = ShutdownCoordinator::new(Duration::seconds(2));
		let result = coordinator
			.run(
				|stop| async move {
					stop.await;
					tokio::time::sleep(secs(60)).await;

					Ok(())
				},
				async {},
			)
			.await;

		assert!(matches!(result, Err(Error::Timeout { operation: "shutdown.drain" })));
	}

	#[tokio::test(start_paused = true)]
	async fn unrelated_serve_failure_is_reported_as_is() {
		let coordinator = ShutdownCoordinator::new(Duration::seconds(5));
		let handle = coordinator.handle();
		let result = coordinator
			.run(|_| async { Err(Error::internal("listener died")) }, future::pending())
			.await;

		assert!(matches!(result, Err(Error::Internal { .. })));
		assert_eq!(handle.state(), ShutdownState::Stopped);
	}

	#[tokio::test(start_paused = true)]
	async fn second_trigger_is_a_noop() {
		let coordinator = ShutdownCoordinator::new(Duration::seconds(5));
		let handle = coordinator.handle();

		assert_eq!(handle.state(), ShutdownState::Running);
		assert!(handle.trigger());
		assert!(!handle.trigger());
		assert_eq!(handle.state(), ShutdownState::Draining);

		let result = coordinator
			.run(
				|stop| async move {
					stop.await;

					Ok(())
				},
				future::pending(),
			)
			.await;

		assert!(result.is_ok());
		assert!(!handle.trigger());
		assert_eq!(handle.state(), ShutdownState::Stopped);
	}

	#[tokio::test(start_paused = true)]
	async fn background_jobs_share_the_drain_deadline() {
		let background = Background::new();

		background.spawn("mail", async {
			tokio::time::sleep(secs(30)).await;

			Ok(())
		});

		let coordinator =
			ShutdownCoordinator::new(Duration::seconds(3)).with_background(background.clone());
		let result = coordinator
			.run(
				|stop| async move {
					stop.await;

					Ok(())
				},
				async {},
			)
			.await;

		assert!(matches!(result, Err(Error::Timeout { .. })));
		assert_eq!(background.in_flight(), 1);
	}
}
