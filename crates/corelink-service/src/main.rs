// ============================================
// File: crates/corelink-service/src/main.rs
// ============================================
//! # corelinkd Entry Point
//!
//! ## Creation Reason
//! Command-line front end for the link service: identity management,
//! configuration checks and running a node.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading
//! - Identity key generation and loading
//! - Service execution until Ctrl-C
//!
//! ## Usage
//! ```bash
//! corelinkd keygen                  # write a new identity
//! corelinkd start                   # run until Ctrl-C
//! corelinkd validate                # print the effective configuration
//! corelinkd pubkey --format base64  # show this node's peer identity
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `start` runs on the in-process transport; network transports plug
//!   in through `corelink_transport::{Transport, Link}`
//! - The key file holds the secret seed; it is written with mode 0600
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use corelink_common::{PeerId, Timestamp};
use corelink_core::crypto::IdentityKeyPair;
use corelink_core::SessionKey;
use corelink_service::services::admission::ChannelSink;
use corelink_service::services::handshake::{HandshakeState, KeyExchange};
use corelink_service::stats::InMemoryStats;
use corelink_service::{Collaborators, CoreConfig, CoreState, LinkService};
use corelink_transport::MemoryTransport;

// ============================================
// CLI Definition
// ============================================

/// Encrypted neighbour link daemon
#[derive(Parser, Debug)]
#[command(name = "corelinkd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the link service
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/corelink/corelink.toml")]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/corelink/corelink.toml")]
        config: PathBuf,
    },

    /// Generate a new identity key
    Keygen {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/corelink/corelink.toml")]
        config: PathBuf,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Show this node's peer identity
    Pubkey {
        /// Path to configuration file
        #[arg(short, long, default_value = "/etc/corelink/corelink.toml")]
        config: PathBuf,

        /// Output format: hex (default), base64
        #[arg(long, default_value = "hex")]
        format: String,
    },
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging("info");

    let result = match cli.command {
        Commands::Start { config } => cmd_start(config).await,
        Commands::Validate { config } => cmd_validate(config).await,
        Commands::Keygen { config, force } => cmd_keygen(config, force).await,
        Commands::Pubkey { config, format } => cmd_pubkey(config, &format).await,
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Runs the service until Ctrl-C.
async fn cmd_start(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_or_default_config(&config_path).await?;
    init_logging(&config.logging.level);

    let key_path = PathBuf::from(&config.identity.key_file);
    if !key_path.exists() {
        anyhow::bail!(
            "identity key {} not found, run `corelinkd keygen` first",
            key_path.display()
        );
    }
    let identity = load_key(&key_path).await?;
    let local = identity.peer_id();
    info!(peer = %local, "Loaded identity");

    let transport = Arc::new(MemoryTransport::new(local));
    let (clients, mut notifications) = ChannelSink::new();
    let stats = Arc::new(InMemoryStats::new());

    let state = CoreState::new(
        local,
        config,
        Collaborators {
            transport: transport.clone(),
            key_exchange: Arc::new(LoggingKeyExchange),
            clients: Arc::new(clients),
            stats: stats.clone(),
        },
    );
    let service = LinkService::new(state, transport);
    let handle = service.handle();

    tokio::spawn(async move {
        while let Some((client, notification)) = notifications.recv().await {
            debug!(%client, ?notification, "Client notification");
        }
    });
    let task = tokio::spawn(service.run());

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    handle.shutdown();

    let state = task.await??;
    for (name, value) in stats.snapshot() {
        info!(counter = %name, value, "Final statistics");
    }
    info!(neighbours = state.neighbour_count(), "Shutdown complete");
    Ok(())
}

/// Prints the effective configuration.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Service will use default values.");
        return Ok(());
    }

    let config = CoreConfig::load(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    print!("{}", config.to_toml());
    Ok(())
}

/// Writes a fresh identity key.
async fn cmd_keygen(config_path: PathBuf, force: bool) -> anyhow::Result<()> {
    let config = load_or_default_config(&config_path).await?;
    let key_path = PathBuf::from(&config.identity.key_file);

    if key_path.exists() && !force {
        anyhow::bail!(
            "{} already exists, pass --force to replace it",
            key_path.display()
        );
    }

    let identity = IdentityKeyPair::generate();
    save_key(&identity, &key_path).await?;

    println!("✅ Identity written to {}", key_path.display());
    println!("   Peer ID:    {}", identity.peer_id());
    println!("   Public Key: {}", hex::encode(identity.public_key_bytes()));
    Ok(())
}

/// Shows the peer identity.
async fn cmd_pubkey(config_path: PathBuf, format: &str) -> anyhow::Result<()> {
    let config = load_or_default_config(&config_path).await?;
    let key_path = PathBuf::from(&config.identity.key_file);
    let identity = load_key(&key_path).await?;
    let peer = identity.peer_id();

    match format {
        "base64" => println!("{peer}"),
        _ => println!("{}", peer.to_hex()),
    }
    Ok(())
}

// ============================================
// Key Exchange
// ============================================

/// Stand-in key exchange that only logs outgoing keys.
struct LoggingKeyExchange;

impl KeyExchange for LoggingKeyExchange {
    fn send_key(&self, peer: &PeerId, _key: &SessionKey, created: Timestamp, state: HandshakeState) {
        debug!(peer = %peer, created = created.as_micros(), %state, "Session key ready for exchange");
    }
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

/// Loads config or returns the defaults if the file is missing.
async fn load_or_default_config(path: &Path) -> anyhow::Result<CoreConfig> {
    if path.exists() {
        Ok(CoreConfig::load(path).await?)
    } else {
        info!("Config file not found, using defaults");
        Ok(CoreConfig::default())
    }
}

/// Loads an identity key from a JSON file.
async fn load_key(path: &Path) -> anyhow::Result<IdentityKeyPair> {
    use base64::Engine;

    let content = tokio::fs::read_to_string(path).await?;
    let key_data: KeyFile = serde_json::from_str(&content)?;
    let private_bytes = base64::engine::general_purpose::STANDARD.decode(&key_data.private_key)?;
    Ok(IdentityKeyPair::from_bytes(&private_bytes)?)
}

/// Saves an identity key to a JSON file.
async fn save_key(identity: &IdentityKeyPair, path: &Path) -> anyhow::Result<()> {
    use base64::Engine;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let key_data = KeyFile {
        version: "1.0".to_string(),
        key_type: "ed25519".to_string(),
        public_key: base64::engine::general_purpose::STANDARD.encode(identity.public_key_bytes()),
        private_key: base64::engine::general_purpose::STANDARD.encode(identity.to_bytes()),
        created_at: Timestamp::now().as_micros(),
    };

    let content = serde_json::to_string_pretty(&key_data)?;
    tokio::fs::write(path, content).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(path).await?.permissions();
        perms.set_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}

/// Identity key file format.
#[derive(serde::Serialize, serde::Deserialize)]
struct KeyFile {
    version: String,
    key_type: String,
    public_key: String,
    private_key: String,
    /// Microseconds since the epoch
    created_at: u64,
}
