use anyhow::Context;
use clap::{Parser, Subcommand};
use shortly::domain::config::ApiConfig;
use shortly::kernel::config::load_config;
use shortly_logger::{LevelFilter, Logger};
use shortly_server::Server;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[command(name = "shortly-server", version, about = "Shortly API server")]
struct Cli {
    /// Config file; `server.toml` in the working directory when omitted.
    #[arg(short, long, global = true, env = "SHORTLY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server with its task workers (default).
    Serve,
    /// Apply pending database migrations and exit.
    Migrate,
}

#[shortly_runtime::main(high_performance)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg: ApiConfig =
        load_config(cli.config.as_deref()).context("Critical: Configuration is malformed")?;
    let _log = init_logger(&cfg).context("Failed to initialize logging")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => Server::builder().config(cfg).build().await?.run().await,
        Command::Migrate => shortly_server::migrate(&cfg).await.map(|_| ()),
    }
}

fn init_logger(cfg: &ApiConfig) -> anyhow::Result<Logger> {
    let logging = &cfg.logging;
    let level = LevelFilter::from_str(&logging.level)
        .with_context(|| format!("Unknown log level '{}'", logging.level))?;
    let builder = Logger::builder().name(env!("CARGO_PKG_NAME")).console(true).level(level);

    let logger = match &logging.dir {
        Some(dir) => builder
            .path(dir)
            .json(logging.json)
            .error_file(logging.error_file)
            .max_files(logging.max_files)
            .init()?,
        None => builder.init()?,
    };
    Ok(logger)
}
