//! Renet channel layout.
//!
//! Channel 0: ReliableOrdered - commands, state deltas and snapshots
//! Channel 1: Unreliable - ping/pong

use std::time::Duration;

use renet::ChannelConfig;

use crate::protocol::ServerMessage;

pub mod channel_id {
    /// Everything that changes or describes game state; must arrive in order.
    pub const COMMANDS: u8 = 0;
    /// Ping/keepalive - can be lost
    pub const HEARTBEAT: u8 = 1;

    /// Channels drained for client traffic every tick.
    pub const INBOUND: [u8; 2] = [COMMANDS, HEARTBEAT];
}

/// Channel a server message goes out on. Pongs answer on the heartbeat channel.
pub fn channel_for(message: &ServerMessage) -> u8 {
    match message {
        ServerMessage::Pong { .. } => channel_id::HEARTBEAT,
        _ => channel_id::COMMANDS,
    }
}

const MAX_CHANNEL_MEMORY: usize = 5 * 1024 * 1024; // 5 MB

pub fn create_channel_configs() -> Vec<ChannelConfig> {
    vec![
        ChannelConfig {
            channel_id: channel_id::COMMANDS,
            max_memory_usage_bytes: MAX_CHANNEL_MEMORY,
            send_type: renet::SendType::ReliableOrdered {
                resend_time: Duration::from_millis(300),
            },
        },
        ChannelConfig {
            channel_id: channel_id::HEARTBEAT,
            max_memory_usage_bytes: 64 * 1024,
            send_type: renet::SendType::Unreliable,
        },
    ]
}
