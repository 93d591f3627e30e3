//! UDP transport through renet_netcode.

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use renet::RenetServer;
use renet_netcode::{NetcodeServerTransport, ServerAuthentication, ServerConfig};
use tracing::{error, info};

/// Must match the client. "XTOWN" plus a protocol revision.
pub const PROTOCOL_ID: u64 = 0x5854_4F57_4E00_0001;

pub struct TransportConfig {
    pub public_address: SocketAddr,
    pub max_clients: usize,
    /// 32-byte key for secure netcode tokens; unsecure when None.
    pub private_key: Option<[u8; 32]>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            public_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 7777)),
            max_clients: 8,
            private_key: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind socket to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    #[error("failed to determine bound address for {0}: {1}")]
    LocalAddrFailed(SocketAddr, std::io::Error),

    #[error("failed to configure socket: {0}")]
    SocketConfig(std::io::Error),

    #[error("system clock is before the unix epoch")]
    Clock,

    #[error("failed to create transport: {0}")]
    TransportCreation(String),
}

fn now() -> Result<Duration, TransportError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TransportError::Clock)
}

pub fn create_server_transport(
    config: TransportConfig,
) -> Result<NetcodeServerTransport, TransportError> {
    let socket = UdpSocket::bind(config.public_address)
        .map_err(|e| TransportError::BindFailed(config.public_address, e))?;
    let bound_addr = socket
        .local_addr()
        .map_err(|e| TransportError::LocalAddrFailed(config.public_address, e))?;
    socket
        .set_nonblocking(true)
        .map_err(TransportError::SocketConfig)?;

    let authentication = match config.private_key {
        Some(key) => ServerAuthentication::Secure { private_key: key },
        None => ServerAuthentication::Unsecure,
    };
    let server_config = ServerConfig {
        current_time: now()?,
        max_clients: config.max_clients,
        protocol_id: PROTOCOL_ID,
        public_addresses: vec![bound_addr],
        authentication,
    };

    let transport = NetcodeServerTransport::new(server_config, socket)
        .map_err(|e| TransportError::TransportCreation(e.to_string()))?;

    info!(
        "Transport bound to {} (max {} clients, protocol {:016x})",
        bound_addr, config.max_clients, PROTOCOL_ID
    );
    Ok(transport)
}

/// Pairs the netcode transport with the tick loop's RenetServer.
pub struct ServerRunner {
    transport: NetcodeServerTransport,
}

impl ServerRunner {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        let transport = create_server_transport(config)?;
        Ok(Self { transport })
    }

    /// Advance the transport by `delta` and receive pending packets into `renet_server`.
    pub fn receive(&mut self, delta: Duration, renet_server: &mut RenetServer) {
        if let Err(e) = self.transport.update(delta, renet_server) {
            error!("Transport update error: {}", e);
        }
    }

    /// Flush messages queued on `renet_server`.
    pub fn send(&mut self, renet_server: &mut RenetServer) {
        self.transport.send_packets(renet_server);
    }

    /// Tell every client the server is going away and flush the notice.
    pub fn disconnect_all(&mut self, renet_server: &mut RenetServer) {
        self.transport.disconnect_all(renet_server);
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.addresses().first().copied()
    }
}
