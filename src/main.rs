//! PeerCache Node
//!
//! Runs one cache node: a peer server answering other nodes and, optionally,
//! a front API for clients. Start several with the same `--peers` list to
//! form a cluster:
//!
//! ```text
//! peercache --addr 127.0.0.1:8001 --peers http://127.0.0.1:8001,http://127.0.0.1:8002 \
//!           --api-addr 127.0.0.1:9999
//! peercache --addr 127.0.0.1:8002 --peers http://127.0.0.1:8001,http://127.0.0.1:8002
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use peercache::error::{Error, Result};
use peercache::peers::{normalize_peer_url, HttpPool, PoolConfig};
use peercache::ring::DEFAULT_REPLICAS;
use peercache::server::{self, ApiHandler, PeerHandler};
use peercache::{GroupRegistry, StaticLoader};

// =============================================================================
// CLI Arguments
// =============================================================================

/// PeerCache - distributed read-through cache node
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Peer server bind address
    #[arg(long, env = "CACHE_ADDR", default_value = "127.0.0.1:8001")]
    addr: String,

    /// Base URL other nodes use to reach this node (defaults to http://<addr>)
    #[arg(long, env = "CACHE_SELF_URL")]
    self_url: Option<String>,

    /// Base URLs of every node in the cluster, comma-separated
    #[arg(long, env = "CACHE_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Front API bind address; disabled when unset
    #[arg(long, env = "CACHE_API_ADDR")]
    api_addr: Option<String>,

    /// Name of the cache group
    #[arg(long, env = "CACHE_GROUP", default_value = "scores")]
    group: String,

    /// Local cache budget in bytes (0 = unbounded)
    #[arg(long, env = "CACHE_BYTES", default_value = "2048")]
    cache_bytes: u64,

    /// Virtual nodes per peer on the hash ring
    #[arg(long, env = "CACHE_REPLICAS", default_value_t = DEFAULT_REPLICAS)]
    replicas: usize,

    /// JSON object of key/value pairs served by the fallback loader
    #[arg(long, env = "CACHE_SEED_FILE")]
    seed_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let default_url = format!("http://{}", args.addr);
    let self_url = normalize_peer_url(args.self_url.as_deref().unwrap_or(&default_url));

    let mut peers: Vec<String> = args
        .peers
        .iter()
        .map(|p| normalize_peer_url(p))
        .filter(|p| !p.is_empty())
        .collect();
    if !peers.contains(&self_url) {
        peers.push(self_url.clone());
    }

    info!("Starting PeerCache node");
    info!("  Peer address: {}", args.addr);
    info!("  Self URL: {}", self_url);
    info!("  Peers: {:?}", peers);
    info!("  Group: {} ({} bytes)", args.group, args.cache_bytes);

    let loader = load_seed(args.seed_file.as_deref())?;
    info!("  Seed entries: {}", loader.len());

    let registry = Arc::new(GroupRegistry::new());
    let group = registry.new_group(&args.group, args.cache_bytes, loader)?;

    let config = PoolConfig {
        replicas: args.replicas,
        ..Default::default()
    };
    let pool = Arc::new(HttpPool::with_config(self_url, config)?);
    pool.set_peers(peers);
    group.register_peers(pool.clone())?;

    // Start peer server
    let listener = server::bind(&args.addr).await?;
    let peer_handler = Arc::new(PeerHandler::with_base_path(
        Arc::clone(&registry),
        pool.base_path(),
    ));
    let peer_server = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, peer_handler).await {
            error!("Peer server error: {}", e);
        }
    });

    // Start front API
    if let Some(api_addr) = args.api_addr.as_deref() {
        let listener = server::bind(api_addr).await?;
        let api_handler = Arc::new(ApiHandler::new(Arc::clone(&registry), group));
        tokio::spawn(async move {
            if let Err(e) = server::serve(listener, api_handler).await {
                error!("API server error: {}", e);
            }
        });
    }

    info!("PeerCache node started");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        _ = peer_server => {
            warn!("Peer server exited");
        }
    }

    info!("PeerCache node shutting down");
    Ok(())
}

/// Fallback data: the seed file if given, else a small built-in table
fn load_seed(path: Option<&str>) -> Result<StaticLoader> {
    let Some(path) = path else {
        return Ok([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]
            .into_iter()
            .collect());
    };

    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read seed file {}: {}", path, e)))?;
    let data: HashMap<String, String> = serde_json::from_str(&raw)
        .map_err(|e| Error::Config(format!("Invalid seed file {}: {}", path, e)))?;
    Ok(StaticLoader::new(data))
}

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "reqwest=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
