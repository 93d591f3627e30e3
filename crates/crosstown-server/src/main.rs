//! Crosstown Multiplayer Server
//!
//! Authoritative game server for 2-8 players.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use crosstown_core::{load_board, BoardError, BoardSource};
use renet::{ConnectionConfig, RenetServer, ServerEvent};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crosstown_server::{
    channel_for, channel_id, create_channel_configs, serialize_server_message, ConfigError,
    Outgoing, Server, ServerConfig, ServerRunner, TransportConfig, TransportError, PROTOCOL_ID,
};

const TICK: Duration = Duration::from_millis(16); // ~60 Hz

#[derive(Debug, Parser)]
#[command(name = "crosstown-server", version, about = "Authoritative Crosstown game server")]
struct Cli {
    /// YAML config file
    #[arg(long, env = "CROSSTOWN_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overrides the config file
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Secret required to restart a game
    #[arg(long, env = "CROSSTOWN_ADMIN_SECRET")]
    admin_secret: Option<String>,

    /// Fixed dice seed
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to load board: {0}")]
    Board(#[from] BoardError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Cli {
    fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if let Some(secret) = &self.admin_secret {
            config.admin_secret = Some(secret.clone());
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("crosstown_server=info,crosstown_core=info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let config = cli.server_config()?;

    let source = match &config.board_dir {
        Some(dir) => BoardSource::Path(dir.clone()),
        None => BoardSource::Embedded,
    };
    let board = Arc::new(load_board(source)?);

    let mut transport = ServerRunner::new(TransportConfig {
        public_address: config.bind_address,
        max_clients: config.max_players as usize,
        private_key: None, // unsecure mode for development
    })?;
    let mut renet = RenetServer::new(ConnectionConfig {
        available_bytes_per_tick: 60_000,
        server_channels_config: create_channel_configs(),
        client_channels_config: create_channel_configs(),
    });

    info!("Crosstown Server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Listening on {}",
        transport.local_addr().unwrap_or(config.bind_address)
    );
    info!("Protocol ID: {:016x}", PROTOCOL_ID);

    let mut server = Server::new(config, board);
    let mut interval = tokio::time::interval(TICK);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }

        let now = Instant::now();
        let delta = now - last_tick;
        last_tick = now;

        renet.update(delta);
        transport.receive(delta, &mut renet);

        while let Some(event) = renet.get_event() {
            match event {
                ServerEvent::ClientConnected { client_id } => server.client_connected(client_id),
                ServerEvent::ClientDisconnected { client_id, reason } => {
                    info!("Client {:?} disconnected: {:?}", client_id, reason);
                    server.client_disconnected(client_id);
                }
            }
        }

        for client_id in renet.clients_id() {
            for channel in channel_id::INBOUND {
                while let Some(message) = renet.receive_message(client_id, channel) {
                    server.handle_data(client_id, &message);
                }
            }
        }

        server.tick();
        for outgoing in server.drain_outbox() {
            dispatch(&mut renet, outgoing);
        }
        transport.send(&mut renet);
    }

    transport.disconnect_all(&mut renet);
    Ok(())
}

fn dispatch(renet: &mut RenetServer, outgoing: Outgoing) {
    let (target, message) = match outgoing {
        Outgoing::Direct { client_id, message } => (Some(client_id), message),
        Outgoing::Broadcast { message } => (None, message),
    };
    let channel = channel_for(&message);
    let data = match serialize_server_message(&message) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to serialize server message: {}", e);
            return;
        }
    };
    match target {
        Some(client_id) => renet.send_message(client_id, channel, data),
        None => renet.broadcast_message(channel, data),
    }
}
