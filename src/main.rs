use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use clap::Parser;
use clap_serde_derive::ClapSerde;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::api::AppState;
use crate::config::Config;
use crate::telemetry::init_telemetry;
use crate::transcript::youtube::YoutubeTranscriptFetcher;

mod api;
mod config;
mod error;
mod telemetry;
mod transcript;

#[cfg(unix)]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

const DEFAULT_CONFIG_FILE: &str = "TranscriptFetcher.toml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();
    let config = match Config::from_toml(&args.config_file) {
        Ok(opt) => Config::from(opt).merge(&mut args.opt_config),
        Err(err) => {
            let missing = err
                .downcast_ref::<std::io::Error>()
                .is_some_and(|err| err.kind() == std::io::ErrorKind::NotFound);
            if missing && args.config_file == DEFAULT_CONFIG_FILE {
                Config::from(&mut args.opt_config)
            } else {
                exit_err!(
                    1,
                    "Failed to read configuration file {} with error: {}",
                    args.config_file,
                    err
                );
            }
        }
    };
    init_telemetry(&config.otlp_endpoint, config.console)?;

    let fetcher = YoutubeTranscriptFetcher::new(
        &config.youtube_base_url,
        &config.user_agent,
        config.fetch_timeout(),
    )?;
    let router = api::router(AppState::new(fetcher));

    match config.tls_paths() {
        Some((cert, key)) => serve_tls(&config, router, cert, key).await,
        None => serve(&config, router).await,
    }
}

async fn serve(config: &Config, router: Router) -> Result<()> {
    let listener = TcpListener::bind(format!("{}:{}", config.address, config.port)).await?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn serve_tls(config: &Config, router: Router, cert: &str, key: &str) -> Result<()> {
    // Both ring (reqwest) and aws-lc-rs (axum-server) are linked, so rustls cannot pick one itself
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    let addr: SocketAddr = format!("{}:{}", config.address, config.port).parse()?;
    let tls_config = RustlsConfig::from_pem_file(cert, key).await?;

    let handle = Handle::new();
    let shutdown_handle = handle.clone();
    let grace_period = config.shutdown_timeout();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown_handle.graceful_shutdown(Some(grace_period));
    });

    info!("Server listening on https://{}", addr);
    axum_server::bind_rustls(addr, tls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down..."),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

#[macro_export]
macro_rules! exit_err {
    ($code:expr, $fmt:expr $(, $arg:expr)*) => {
        {
            eprintln!($fmt $(, $arg)*);
            std::process::exit($code);
        }
    };
}
