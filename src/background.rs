//! Supervised fire-and-forget jobs.
//!
//! A job's failure or panic is logged at its own boundary and never reaches the request that
//! launched it or the process. [`Background::wait_idle`] lets shutdown wait for jobs still in
//! flight.

// std
use std::{
	any::Any,
	panic::AssertUnwindSafe,
	sync::atomic::{AtomicUsize, Ordering},
};
// crates.io
use futures_util::FutureExt;
use tokio::{sync::Notify, task::JoinHandle};
// self
use crate::_prelude::*;

#[derive(Debug, Default)]
struct Tracker {
	in_flight: AtomicUsize,
	idle: Notify,
}

struct InFlight(Arc<Tracker>);
impl InFlight {
	fn enter(tracker: &Arc<Tracker>) -> Self {
		tracker.in_flight.fetch_add(1, Ordering::SeqCst);

		Self(tracker.clone())
	}
}
impl Drop for InFlight {
	fn drop(&mut self) {
		if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
			self.0.idle.notify_waiters();
		}
	}
}

/// Launches supervised jobs on the tokio runtime and counts the ones still running.
#[derive(Clone, Debug, Default)]
pub struct Background(Arc<Tracker>);
impl Background {
	/// Creates a supervisor with no jobs.
	pub fn new() -> Self {
		Self::default()
	}

	/// Runs `job` on its own task. Errors and panics are logged under `name` and dropped.
	pub fn spawn<Fut>(&self, name: &'static str, job: Fut) -> JoinHandle<()>
	where
		Fut: 'static + Send + Future<Output = Result<()>>,
	{
		let guard = InFlight::enter(&self.0);

		tokio::spawn(async move {
			let _guard = guard;

			match AssertUnwindSafe(job).catch_unwind().await {
				Ok(Ok(())) => tracing::debug!(job = name, "background job finished"),
				Ok(Err(e)) => tracing::error!(job = name, error = %e, "background job failed"),
				Err(panic) => tracing::error!(
					job = name,
					panic = panic_message(panic.as_ref()),
					"background job panicked"
				),
			}
		})
	}

	/// Number of jobs not yet finished.
	pub fn in_flight(&self) -> usize {
		self.0.in_flight.load(Ordering::SeqCst)
	}

	/// Resolves once no job is running.
	pub async fn wait_idle(&self) {
		loop {
			let notified = self.0.idle.notified();

			tokio::pin!(notified);

			// Register before checking so a job finishing in between still wakes us.
			notified.as_mut().enable();

			if self.in_flight() == 0 {
				return;
			}

			notified.await;
		}
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
	payload
		.downcast_ref::<&str>()
		.copied()
		.or_else(|| payload.downcast_ref::<String>().map(String::as_str))
		.unwrap_or("non-string panic payload")
}
