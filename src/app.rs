//! Application state shared by every request.

// self
use crate::{
	_prelude::*,
	accounts::Accounts,
	admission::AdmissionController,
	background::Background,
	clock::{Clock, SystemClock},
	config::Config,
	credentials::{FileTokenStore, MemoryTokenStore, TokenStore, Tokens},
	mailer::{LogMailer, Mailer},
	models::{Movie, Movies, PermissionGrant, PermissionStore, User, Users},
	store::{FileStore, MemoryStore, RecordStore},
};

struct Engines {
	movies: Arc<dyn RecordStore<Movie>>,
	users: Arc<dyn RecordStore<User>>,
	grants: Arc<dyn RecordStore<PermissionGrant>>,
	tokens: Arc<dyn TokenStore>,
}
impl Engines {
	fn memory() -> Self {
		Self {
			movies: Arc::new(<MemoryStore<Movie>>::new()),
			users: Arc::new(<MemoryStore<User>>::new()),
			grants: Arc::new(<MemoryStore<PermissionGrant>>::new()),
			tokens: Arc::new(MemoryTokenStore::default()),
		}
	}

	fn files(dir: &std::path::Path) -> Result<Self> {
		Ok(Self {
			movies: Arc::new(<FileStore<Movie>>::open(dir.join("movies.json"))?),
			users: Arc::new(<FileStore<User>>::open(dir.join("users.json"))?),
			grants: Arc::new(<FileStore<PermissionGrant>>::open(dir.join("permissions.json"))?),
			tokens: Arc::new(FileTokenStore::open(dir.join("tokens.json"))?),
		})
	}
}

/// Cheaply cloneable handle to every subsystem.
#[derive(Clone)]
pub struct App {
	/// Validated configuration.
	pub config: Arc<Config>,
	/// Time source.
	pub clock: Arc<dyn Clock>,
	/// Per-client limiter.
	pub admission: Arc<AdmissionController>,
	/// Movie catalog.
	pub movies: Movies,
	/// User accounts.
	pub users: Users,
	/// Token lifecycle.
	pub tokens: Tokens,
	/// Permission grants.
	pub permissions: PermissionStore,
	/// Account flows.
	pub accounts: Accounts,
	/// Supervisor for fire-and-forget jobs.
	pub background: Background,
}
impl App {
	/// Builds the production state: system clock, configured mailer, and file-backed stores
	/// when a snapshot directory is set.
	pub fn build(config: Config) -> Result<Self> {
		let mailer = mailer_for(&config)?;

		Self::open(Arc::new(config), Arc::new(SystemClock), mailer)
	}

	/// Builds the state over the configured storage engine.
	pub fn open(config: Arc<Config>, clock: Arc<dyn Clock>, mailer: Arc<dyn Mailer>) -> Result<Self> {
		let engines = match &config.store.path {
			Some(dir) => {
				tracing::info!(path = %dir.display(), "using file-backed stores");

				Engines::files(dir)?
			},
			None => Engines::memory(),
		};

		Ok(Self::assemble(config, clock, mailer, engines))
	}

	/// Builds the state over in-memory stores.
	pub fn in_memory(config: Arc<Config>, clock: Arc<dyn Clock>, mailer: Arc<dyn Mailer>) -> Self {
		Self::assemble(config, clock, mailer, Engines::memory())
	}

	fn assemble(
		config: Arc<Config>,
		clock: Arc<dyn Clock>,
		mailer: Arc<dyn Mailer>,
		engines: Engines,
	) -> Self {
		let deadline = config.store.op_timeout;
		let admission = Arc::new(AdmissionController::new(config.limiter.clone(), clock.clone()));
		let tokens = Tokens::new(engines.tokens, clock.clone(), deadline);
		let movies = Movies::new(engines.movies, clock.clone(), deadline);
		let users = Users::new(engines.users, tokens.clone(), clock.clone(), deadline);
		let permissions = PermissionStore::new(engines.grants, clock.clone(), deadline);
		let background = Background::new();
		let accounts = Accounts::new(
			users.clone(),
			tokens.clone(),
			permissions.clone(),
			mailer,
			background.clone(),
		);

		Self { config, clock, admission, movies, users, tokens, permissions, accounts, background }
	}

	/// Current calendar year according to the app clock.
	pub fn current_year(&self) -> i32 {
		self.clock.now().year()
	}
}
impl Debug for App {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("App")
			.field("config", &self.config)
			.field("admission", &self.admission)
			.field("background_in_flight", &self.background.in_flight())
			.finish_non_exhaustive()
	}
}

fn mailer_for(config: &Config) -> Result<Arc<dyn Mailer>> {
	#[cfg(feature = "reqwest")]
	{
		if let Some(url) = &config.mailer.url {
			let mailer =
				crate::mailer::HttpMailer::new(url.clone(), config.mailer.sender.clone())?;

			tracing::info!(relay = %url, "using HTTP mail relay");

			return Ok(Arc::new(mailer));
		}
	}

	#[cfg(not(feature = "reqwest"))]
	{
		if config.mailer.url.is_some() {
			tracing::warn!("mail relay configured without the `reqwest` feature; logging mail");
		}
	}

	Ok(Arc::new(LogMailer::default()))
}
