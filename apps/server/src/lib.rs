//! # Shortly Server
//!
//! The HTTP entry point: URL shortener, auth, chat sockets, mail parsing and the
//! assistant, served by `Axum` on top of `SurrealDB`, the event bus and the
//! in-process task queue.
//!
//! ## Example
//! ```no_run
//! use shortly_server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Server::builder()
//!         .port(8000)
//!         .build()
//!         .await?
//!         .run()
//!         .await
//! }
//! ```

mod router;

pub use router::cors;

use anyhow::{Context, Result};
use axum_server::Handle;
use shortly::domain::config::ApiConfig;
use shortly::kernel::server::ApiState;
use shortly_database::{Database, MigrationReport};
use shortly_event_bus::EventBus;
use shortly_tasks::Scheduler;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// A fluent builder for configuring and initializing the [`Server`].
#[must_use = "builders do nothing unless you call .build()"]
#[derive(Debug, Default)]
pub struct ServerBuilder {
    cfg: ApiConfig,
}

impl ServerBuilder {
    pub fn config(mut self, cfg: ApiConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.cfg.server.port = port;
        self
    }

    fn validate_ssl_config(&self) -> Result<()> {
        if let Some(ssl) = &self.cfg.server.ssl {
            if !ssl.cert.exists() {
                anyhow::bail!("SSL certificate not found at: {}", ssl.cert.display());
            }
            if !ssl.key.exists() {
                anyhow::bail!("SSL key not found at: {}", ssl.key.display());
            }

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if ssl.key.metadata()?.permissions().mode() & 0o077 != 0 {
                    tracing::warn!(
                        key = %ssl.key.display(),
                        "SSL private key is readable by group or others (should be 600)"
                    );
                }
            }
        }
        Ok(())
    }

    /// Consumes the builder and initializes the server.
    ///
    /// Connects to the database and applies every slice's migrations, then wires
    /// the event bus, the task queue and the feature slices into one [`ApiState`].
    ///
    /// # Errors
    /// * Missing SSL certificate or key files.
    /// * Database connection or migration failures.
    /// * A slice that rejects its configuration.
    pub async fn build(self) -> Result<Server> {
        self.validate_ssl_config()?;

        let address = SocketAddr::new(self.cfg.server.address, self.cfg.server.port);
        info!(%address, "Initializing server");

        let db = connect(&self.cfg, true).await?;
        let events = EventBus::new();
        let tasks = shortly::task_queue(&self.cfg);
        let slices = shortly::init(&self.cfg, &db, &events, &tasks).context("Platform bootstrap failed")?;
        let scheduler = shortly::scheduler(&tasks).context("Invalid task schedule")?;

        let state = ApiState::builder()
            .config(self.cfg)
            .db(db)
            .events(events)
            .tasks(tasks)
            .register_slices(slices)
            .build()
            .context("Failed to finalize API state registry")?;

        Ok(Server { state, scheduler })
    }
}

/// A fully initialized server instance ready to run.
#[must_use = "call .run().await to start the server"]
#[derive(Debug)]
pub struct Server {
    state: ApiState,
    scheduler: Scheduler,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    /// Starts the task workers and the scheduler, then serves HTTP(S) until a
    /// shutdown signal arrives. Workers drain before this returns.
    ///
    /// # Errors
    /// Binding the address or loading the TLS certificates fails.
    pub async fn run(self) -> Result<()> {
        let cfg = self.state.config.clone();
        let address = SocketAddr::new(cfg.server.address, cfg.server.port);

        let cancel = CancellationToken::new();
        let workers = self.state.tasks.start(&cancel);
        let timers = self.scheduler.start(&cancel);
        info!(workers = workers.len(), schedules = timers.len(), "Background tasks started");

        let app = router::init(self.state);

        let handle = Handle::<SocketAddr>::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            if let Err(e) = shutdown_signal().await {
                error!("Error while waiting for shutdown signal: {e}");
                return;
            }
            info!("Shutdown signal received, starting graceful shutdown...");
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        let served = if let Some(ssl) = &cfg.server.ssl {
            info!("Starting HTTPS server on https://{address}");
            let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&ssl.cert, &ssl.key)
                .await
                .context("Failed to load SSL/TLS certificates")?;
            axum_server::bind_rustls(address, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTPS server failed")
        } else {
            info!("Starting HTTP server on http://{address}");
            axum_server::bind(address)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .context("HTTP server failed")
        };

        cancel.cancel();
        workers.join().await;
        for timer in timers {
            if let Err(e) = timer.await {
                error!(error = %e, "Scheduler terminated abnormally");
            }
        }

        info!("Server shutdown complete");
        served
    }

    #[must_use]
    pub const fn state(&self) -> &ApiState {
        &self.state
    }

    /// The full router, for serving or testing without binding a socket.
    pub fn router(&self) -> axum::Router {
        router::init(self.state.clone())
    }
}

/// Applies pending migrations and exits, for deploy pipelines.
///
/// # Errors
/// Connection or migration failures.
pub async fn migrate(cfg: &ApiConfig) -> Result<MigrationReport> {
    let db = connect(cfg, false).await?;
    let report = db.migrate(&shortly::migrations()).await.context("Migration failed")?;
    info!(applied = report.applied.len(), skipped = report.skipped.len(), "Migrations finished");
    Ok(report)
}

async fn connect(cfg: &ApiConfig, with_migrations: bool) -> Result<Database> {
    let db_cfg = &cfg.database;
    let mut builder = Database::builder().url(&db_cfg.url).session(&db_cfg.namespace, &db_cfg.database);

    if let Some(creds) = &db_cfg.credentials {
        builder = builder.auth(&creds.username, &creds.password);
    }
    if with_migrations {
        builder = builder.migrations(shortly::migrations());
    }

    builder.init().await.context("Failed to establish database connection")
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async { signal::ctrl_c().await.context("Failed to install Ctrl+C handler") };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<_, anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        res = ctrl_c => res?,
        res = terminate => res?,
    }

    Ok(())
}
