//! Movie catalog API backend: per-client admission control, version-stamped records, hashed
//! bearer credentials, and a signal-driven graceful shutdown, wired together behind an axum
//! router.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod accounts;
pub mod admission;
pub mod app;
pub mod background;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod mailer;
pub mod models;
pub mod obs;
pub mod shutdown;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		app::App,
		clock::{Clock, ManualClock},
		config::Config,
		mailer::{LogMailer, Mailer},
	};

	/// Builds an [`App`] over in-memory stores, a manual clock pinned to `now`, and a
	/// [`LogMailer`] the caller can inspect.
	pub fn build_test_app(now: OffsetDateTime) -> (App, Arc<ManualClock>, Arc<LogMailer>) {
		let clock = Arc::new(ManualClock::new(now));
		let mailer = Arc::new(LogMailer::default());
		let config = Config::default();
		let app = App::in_memory(
			Arc::new(config),
			clock.clone() as Arc<dyn Clock>,
			mailer.clone() as Arc<dyn Mailer>,
		);

		(app, clock, mailer)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, BTreeSet, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
// Binary-only dependency.
use color_eyre as _;
#[cfg(test)] use {httpmock as _, tower as _};
