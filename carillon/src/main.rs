mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;

use carillon_proto::dav::{DavConfig, Server};
use carillon_store::Store;

use config::{AutocreatePolicy, Config};

#[derive(Parser, Debug)]
#[clap(author, version, about = "A CalDAV/CardDAV server on a content-addressed versioned store", long_about = None)]
struct Args {
    /// Path to the configuration file
    #[clap(short, long, env = "CARILLON_CONFIG")]
    config_file: Option<PathBuf>,

    /// Filesystem root for the collection hierarchy
    #[clap(long, env = "CARILLON_DATA_ROOT")]
    data_root: Option<PathBuf>,

    /// Listen address
    #[clap(long, env = "CARILLON_BIND")]
    bind: Option<std::net::SocketAddr>,

    /// Principal path for the single-user deployment
    #[clap(long, env = "CARILLON_PRINCIPAL")]
    current_user_principal: Option<String>,

    /// none | principal | defaults
    #[clap(long, env = "CARILLON_AUTOCREATE")]
    autocreate: Option<AutocreatePolicy>,

    /// Leading URI path to strip before routing
    #[clap(long, env = "CARILLON_ROUTE_PREFIX")]
    route_prefix: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "carillon=info,carillon_proto=info")
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = match &args.config_file {
        Some(path) => Config::load(path)?,
        None => {
            let data_root = args
                .data_root
                .clone()
                .ok_or_else(|| anyhow::anyhow!("either --config-file or --data-root is required"))?;
            Config::with_root(data_root)
        }
    };
    if let Some(data_root) = args.data_root {
        config.data_root = data_root;
    }
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(principal) = args.current_user_principal {
        config.current_user_principal = Some(principal);
    }
    if let Some(autocreate) = args.autocreate {
        config.autocreate = autocreate;
    }
    if let Some(prefix) = args.route_prefix {
        config.route_prefix = prefix;
    }

    std::fs::create_dir_all(&config.data_root)?;
    let store = Arc::new(Store::new(&config.data_root, config.index_capacity));

    let dav_config = DavConfig {
        route_prefix: config.route_prefix.trim_end_matches('/').to_string(),
        autocreate: config.autocreate.into(),
        current_user_principal: config.current_user_principal.clone(),
        strict: config.strict,
        index_threshold: config.index_threshold,
    };

    let (exit_tx, exit_rx) = watch::channel(false);
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("installing SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => (),
                _ = sigterm.recv() => (),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }
        tracing::info!("shutdown requested");
        let _ = exit_tx.send(true);
    });

    let server = Server::new(config.bind_addr, store, dav_config);
    server.run(exit_rx).await
}
