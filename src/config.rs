//! Process configuration loaded from `GREENLIGHT_*` environment variables.
//!
//! Environment variables:
//! - `GREENLIGHT_PORT`: listen port (default: 4000)
//! - `GREENLIGHT_ENV`: `development`, `staging`, or `production` (default: development)
//! - `GREENLIGHT_LIMITER_RPS`: sustained requests per second per client (default: 2)
//! - `GREENLIGHT_LIMITER_BURST`: back-to-back requests per client (default: 4)
//! - `GREENLIGHT_LIMITER_ENABLED`: `true` or `false` (default: true)
//! - `GREENLIGHT_DB_PATH`: directory for JSON snapshots; records stay in memory when unset
//! - `GREENLIGHT_DB_TIMEOUT_MS`: per-operation store deadline (default: 3000)
//! - `GREENLIGHT_MAILER_URL`: HTTP mail relay endpoint; mail is only logged when unset
//! - `GREENLIGHT_MAILER_SENDER`: from-address (default: `Greenlight <no-reply@greenlight.local>`)
//! - `GREENLIGHT_DRAIN_TIMEOUT_SECS`: graceful shutdown deadline (default: 30)
//! - `GREENLIGHT_LOG_FORMAT`: `text` or `json` (default: text)
//!
//! A value that is present but unparsable is an error rather than a silent fallback.

// std
use std::path::PathBuf;
// crates.io
use url::Url;
// self
use crate::{_prelude::*, admission::AdmissionConfig, error::ConfigError, obs::LogFormat};

/// Deployment environment label.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
	/// Local development.
	#[default]
	Development,
	/// Pre-production.
	Staging,
	/// Production.
	Production,
}
impl Environment {
	/// Stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Environment::Development => "development",
			Environment::Staging => "staging",
			Environment::Production => "production",
		}
	}
}
impl FromStr for Environment {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"development" => Ok(Environment::Development),
			"staging" => Ok(Environment::Staging),
			"production" => Ok(Environment::Production),
			other => Err(ConfigError::UnknownEnvironment(other.to_owned())),
		}
	}
}
impl Display for Environment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Record storage settings.
#[derive(Clone, Debug, PartialEq)]
pub struct StoreConfig {
	/// Snapshot directory; `None` keeps everything in memory.
	pub path: Option<PathBuf>,
	/// Deadline applied to every store operation.
	pub op_timeout: Duration,
}
impl Default for StoreConfig {
	fn default() -> Self {
		Self { path: None, op_timeout: Duration::milliseconds(3_000) }
	}
}

/// Outbound mail settings.
#[derive(Clone, Debug, PartialEq)]
pub struct MailerConfig {
	/// Relay endpoint; `None` logs mail instead of sending it.
	pub url: Option<Url>,
	/// From-address.
	pub sender: String,
}
impl Default for MailerConfig {
	fn default() -> Self {
		Self { url: None, sender: "Greenlight <no-reply@greenlight.local>".into() }
	}
}

/// Complete process configuration; validated once at startup and shared immutably.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
	/// Listen port.
	pub port: u16,
	/// Deployment environment.
	pub env: Environment,
	/// Admission control.
	pub limiter: AdmissionConfig,
	/// Record storage.
	pub store: StoreConfig,
	/// Outbound mail.
	pub mailer: MailerConfig,
	/// Graceful shutdown deadline.
	pub drain_timeout: Duration,
	/// Log output format.
	pub log_format: LogFormat,
}
impl Config {
	/// Loads the configuration from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Loads the configuration through `lookup`, falling back to defaults for unset keys.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let defaults = Self::default();
		let env = Vars(lookup);
		let log_format = match env.get("GREENLIGHT_LOG_FORMAT").as_deref() {
			None | Some("text") => LogFormat::Text,
			Some("json") => LogFormat::Json,
			Some(other) => return Err(invalid("GREENLIGHT_LOG_FORMAT", other)),
		};
		let url = env
			.get("GREENLIGHT_MAILER_URL")
			.filter(|raw| !raw.is_empty())
			.map(|raw| Url::parse(&raw))
			.transpose()
			.map_err(|source| ConfigError::InvalidMailerUrl { source })?;

		Ok(Self {
			port: env.parse("GREENLIGHT_PORT")?.unwrap_or(defaults.port),
			env: match env.get("GREENLIGHT_ENV") {
				Some(raw) => raw.parse()?,
				None => defaults.env,
			},
			limiter: AdmissionConfig {
				rate_per_second: env
					.parse("GREENLIGHT_LIMITER_RPS")?
					.unwrap_or(defaults.limiter.rate_per_second),
				burst: env.parse("GREENLIGHT_LIMITER_BURST")?.unwrap_or(defaults.limiter.burst),
				enabled: env
					.parse("GREENLIGHT_LIMITER_ENABLED")?
					.unwrap_or(defaults.limiter.enabled),
				..defaults.limiter
			},
			store: StoreConfig {
				path: env.get("GREENLIGHT_DB_PATH").filter(|raw| !raw.is_empty()).map(PathBuf::from),
				op_timeout: env
					.parse::<i64>("GREENLIGHT_DB_TIMEOUT_MS")?
					.map(Duration::milliseconds)
					.unwrap_or(defaults.store.op_timeout),
			},
			mailer: MailerConfig {
				url,
				sender: env.get("GREENLIGHT_MAILER_SENDER").unwrap_or(defaults.mailer.sender),
			},
			drain_timeout: env
				.parse::<i64>("GREENLIGHT_DRAIN_TIMEOUT_SECS")?
				.map(Duration::seconds)
				.unwrap_or(defaults.drain_timeout),
			log_format,
		})
	}

	/// Rejects settings the process cannot run with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.port == 0 {
			return Err(invalid("GREENLIGHT_PORT", "0"));
		}

		self.limiter.validate()?;

		if !self.store.op_timeout.is_positive() {
			return Err(ConfigError::ZeroDuration("store.op_timeout"));
		}
		if !self.drain_timeout.is_positive() {
			return Err(ConfigError::ZeroDuration("drain_timeout"));
		}

		Ok(())
	}
}
impl Default for Config {
	fn default() -> Self {
		Self {
			port: 4000,
			env: Environment::default(),
			limiter: AdmissionConfig::default(),
			store: StoreConfig::default(),
			mailer: MailerConfig::default(),
			drain_timeout: Duration::seconds(30),
			log_format: LogFormat::default(),
		}
	}
}

struct Vars<F>(F);
impl<F> Vars<F>
where
	F: Fn(&str) -> Option<String>,
{
	fn get(&self, key: &str) -> Option<String> {
		(self.0)(key)
	}

	fn parse<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
	where
		T: FromStr,
	{
		self.get(key)
			.map(|raw| raw.trim().parse().map_err(|_| invalid(key, &raw)))
			.transpose()
	}
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
	ConfigError::InvalidVar { key, value: value.to_owned() }
}
