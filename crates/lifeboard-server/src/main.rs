//! Lifeboard server binary.
//!
//! Reads its settings from `LIFEBOARD_*` environment variables, installs a
//! `tracing` subscriber filtered by `RUST_LOG` (default `info`), and serves
//! until interrupted with ctrl-c.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use lifeboard::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:8001";
const DEFAULT_STATIC_DIR: &str = "./static";

/// A `LIFEBOARD_*` variable that is set but does not parse.
#[derive(Debug, thiserror::Error)]
#[error("invalid value {value:?} for {var}")]
struct EnvError {
    var: &'static str,
    value: String,
}

/// Builds the server configuration from `lookup`, which maps a variable
/// name to its value.
fn config_from(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ServerConfig, EnvError> {
    let mut config = ServerConfig {
        bind_addr: lookup("LIFEBOARD_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string()),
        static_dir: Some(
            lookup("LIFEBOARD_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
        ),
        ..ServerConfig::default()
    };

    if let Some(life) = parse(&lookup, "LIFEBOARD_STARTING_LIFE")? {
        config.room.starting_life = life;
    }
    config.malformed_limit = parse(&lookup, "LIFEBOARD_MALFORMED_LIMIT")?;
    config.idle_sweep =
        parse(&lookup, "LIFEBOARD_IDLE_SWEEP_SECS")?.map(Duration::from_secs);

    Ok(config)
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, EnvError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EnvError { var, value }),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config_from(|var| std::env::var(var).ok())?;
    tracing::info!(
        addr = %config.bind_addr,
        starting_life = config.room.starting_life,
        malformed_limit = ?config.malformed_limit,
        idle_sweep = ?config.idle_sweep,
        "starting lifeboard"
    );

    let server = LifeboardServer::builder().config(config).build().await?;
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "could not listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
