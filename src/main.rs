//! Greenlight API server.

// std
use std::net::SocketAddr;
// crates.io
use color_eyre::eyre::{Result, WrapErr};
use time::Duration;
use tokio::net::TcpListener;
// self
use greenlight::{
	app::App,
	config::Config,
	error::{ConfigError, Error},
	http, obs,
	shutdown::{self, ShutdownCoordinator},
};

const TOKEN_PURGE_PERIOD: Duration = Duration::minutes(10);

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = Config::from_env().wrap_err("failed to load configuration")?;

	config.validate().wrap_err("invalid configuration")?;
	obs::init_subscriber(config.log_format);

	let port = config.port;
	let env = config.env;
	let app = App::build(config)?;
	let coordinator = ShutdownCoordinator::new(app.config.drain_timeout)
		.with_background(app.background.clone());
	let handle = coordinator.handle();
	let sweeper = app.admission.spawn_sweeper(handle.subscribe());
	let purger = app.tokens.spawn_purger(TOKEN_PURGE_PERIOD, handle.subscribe());
	let addr = SocketAddr::from(([0, 0, 0, 0], port));
	let listener = TcpListener::bind(addr).await.map_err(ConfigError::bind)?;

	tracing::info!(addr = %addr, env = env.as_str(), "starting server");

	coordinator
		.run(
			move |signal| async move {
				axum::serve(
					listener,
					http::router(app).into_make_service_with_connect_info::<SocketAddr>(),
				)
				.with_graceful_shutdown(signal)
				.await
				.map_err(|e| Error::internal(format!("serve loop failed: {e}")))
			},
			shutdown::termination_signal(),
		)
		.await?;

	let _ = tokio::join!(sweeper, purger);

	Ok(())
}
