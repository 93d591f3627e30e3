//! Lobby and game flow through `Server`, without a socket.

use std::sync::Arc;

use crosstown_core::{load_board, BoardSource};
use crosstown_protocol::{Awaiting, Command, Direction, Event, PlayerId};
use crosstown_server::{
    channel_for, channel_id, serialize_client_message, ClientMessage, CommandRejectReason,
    Outgoing, RegisterRejectReason, Server, ServerConfig, ServerMessage,
};

fn server() -> Server {
    let config = ServerConfig {
        seed: Some(42),
        admin_secret: Some("hunter2".into()),
        ..ServerConfig::default()
    };
    let board = Arc::new(load_board(BoardSource::Embedded).unwrap());
    Server::new(config, board)
}

fn register(server: &mut Server, client_id: u64, name: &str) -> (PlayerId, String) {
    server.handle_message(
        client_id,
        ClientMessage::Register {
            name: name.into(),
            color: "#aa0000".into(),
            reconnect_token: None,
        },
    );
    let registered = server.drain_outbox().into_iter().find_map(|out| match out {
        Outgoing::Direct {
            message:
                ServerMessage::Registered {
                    player_id,
                    reconnect_token,
                },
            ..
        } => Some((player_id, reconnect_token)),
        _ => None,
    });
    registered.expect("client was not registered")
}

fn started(server: &mut Server) {
    register(server, 1, "Ada");
    register(server, 2, "Bo");
    server.handle_message(1, ClientMessage::StartGame);
}

fn rejections(outbox: &[Outgoing], client: u64) -> Vec<CommandRejectReason> {
    outbox
        .iter()
        .filter_map(|out| match out {
            Outgoing::Direct {
                client_id,
                message: ServerMessage::CommandRejected { reason },
            } if *client_id == client => Some(reason.clone()),
            _ => None,
        })
        .collect()
}

fn deltas(outbox: &[Outgoing]) -> Vec<(Vec<Event>, u64)> {
    outbox
        .iter()
        .filter_map(|out| match out {
            Outgoing::Broadcast {
                message: ServerMessage::StateDelta { events, checksum },
            } => Some((events.clone(), *checksum)),
            _ => None,
        })
        .collect()
}

#[test]
fn registration_broadcasts_lobby() {
    let mut server = server();
    let (p0, _) = register(&mut server, 1, "Ada");
    assert_eq!(p0, PlayerId(0));

    server.handle_message(
        2,
        ClientMessage::Register {
            name: "Bo".into(),
            color: "#00aa00".into(),
            reconnect_token: None,
        },
    );
    let outbox = server.drain_outbox();
    let lobby = outbox.iter().find_map(|out| match out {
        Outgoing::Broadcast {
            message: ServerMessage::LobbyState { players, host, .. },
        } => Some((players.clone(), *host)),
        _ => None,
    });
    let (players, host) = lobby.expect("no lobby broadcast");
    assert_eq!(players.len(), 2);
    assert_eq!(host, Some(p0));
    assert!(players[0].is_host);
}

#[test]
fn only_host_can_start() {
    let mut server = server();
    register(&mut server, 1, "Ada");
    server.handle_message(1, ClientMessage::StartGame);
    let outbox = server.drain_outbox();
    assert_eq!(
        rejections(&outbox, 1),
        vec![CommandRejectReason::NotEnoughPlayers]
    );

    register(&mut server, 2, "Bo");
    server.handle_message(2, ClientMessage::StartGame);
    let outbox = server.drain_outbox();
    assert_eq!(rejections(&outbox, 2), vec![CommandRejectReason::NotHost]);
    assert!(server.game().is_none());
}

#[test]
fn start_broadcasts_snapshot_and_prompt() {
    let mut server = server();
    started(&mut server);

    let outbox = server.drain_outbox();
    let snapshot = outbox.iter().find_map(|out| match out {
        Outgoing::Broadcast {
            message: ServerMessage::GameStarted { snapshot, checksum },
        } => Some((snapshot.clone(), *checksum)),
        _ => None,
    });
    let (snapshot, checksum) = snapshot.expect("no GameStarted");
    assert_eq!(snapshot.players.len(), 2);
    assert_eq!(snapshot.current_player, PlayerId(0));
    assert_eq!(checksum, server.game().unwrap().checksum());

    let (events, _) = deltas(&outbox).pop().expect("no opening delta");
    assert!(events.contains(&Event::Prompt {
        player: PlayerId(0),
        awaiting: Awaiting::WaitingDirectionAtCenter,
        candidates: vec![],
    }));

    server.handle_message(
        3,
        ClientMessage::Register {
            name: "Late".into(),
            color: "#000".into(),
            reconnect_token: None,
        },
    );
    let outbox = server.drain_outbox();
    assert!(outbox.iter().any(|out| matches!(
        out,
        Outgoing::Direct {
            client_id: 3,
            message: ServerMessage::RegisterRejected {
                reason: RegisterRejectReason::GameInProgress
            }
        }
    )));
}

#[test]
fn commands_are_checked_against_turn_owner() {
    let mut server = server();
    started(&mut server);
    server.drain_outbox();

    server.handle_message(
        2,
        ClientMessage::Command {
            command: Command::RollDice,
        },
    );
    let outbox = server.drain_outbox();
    assert_eq!(rejections(&outbox, 2), vec![CommandRejectReason::NotYourTurn]);
    assert!(deltas(&outbox).is_empty());

    server.handle_message(
        1,
        ClientMessage::Command {
            command: Command::EndTurn,
        },
    );
    let outbox = server.drain_outbox();
    assert!(matches!(
        rejections(&outbox, 1).as_slice(),
        [CommandRejectReason::Rejected { .. }]
    ));

    server.handle_message(
        1,
        ClientMessage::Command {
            command: Command::ChooseDirection {
                direction: Direction::Left,
            },
        },
    );
    let outbox = server.drain_outbox();
    let (events, checksum) = deltas(&outbox).pop().expect("no delta");
    assert_eq!(checksum, server.game().unwrap().checksum());
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Prompt {
            awaiting: Awaiting::WaitingDiceRoll,
            ..
        }
    )));
}

#[test]
fn raw_bytes_reach_the_game() {
    let mut server = server();
    started(&mut server);
    server.drain_outbox();

    let bytes = serialize_client_message(&ClientMessage::Command {
        command: Command::ChooseDirection {
            direction: Direction::Up,
        },
    })
    .unwrap();
    server.handle_data(1, &bytes);
    assert_eq!(deltas(&server.drain_outbox()).len(), 1);

    server.handle_data(1, b"not msgpack at all");
    assert!(server.drain_outbox().is_empty());
}

#[test]
fn disconnect_and_reconnect_during_game() {
    let mut server = server();
    register(&mut server, 1, "Ada");
    let (p1, token) = register(&mut server, 2, "Bo");
    server.handle_message(1, ClientMessage::StartGame);
    server.drain_outbox();

    server.client_disconnected(2);
    let outbox = server.drain_outbox();
    assert!(outbox.iter().any(|out| matches!(
        out,
        Outgoing::Broadcast {
            message: ServerMessage::PlayerDisconnected { player_id }
        } if *player_id == p1
    )));
    assert!(deltas(&outbox)[0].0.contains(&Event::PlayerOffline {
        player: p1,
        offline: true,
    }));
    assert!(server.game().unwrap().snapshot().players[1].is_offline);

    server.handle_message(
        7,
        ClientMessage::Register {
            name: String::new(),
            color: String::new(),
            reconnect_token: Some(token.clone()),
        },
    );
    let outbox = server.drain_outbox();
    assert!(outbox.iter().any(|out| matches!(
        out,
        Outgoing::Direct {
            client_id: 7,
            message: ServerMessage::Registered { player_id, .. }
        } if *player_id == p1
    )));
    assert!(outbox.iter().any(|out| matches!(
        out,
        Outgoing::Direct {
            client_id: 7,
            message: ServerMessage::GameState { .. }
        }
    )));
    assert!(!server.game().unwrap().snapshot().players[1].is_offline);

    server.handle_message(
        8,
        ClientMessage::Register {
            name: String::new(),
            color: String::new(),
            reconnect_token: Some(token),
        },
    );
    let outbox = server.drain_outbox();
    assert!(outbox.iter().any(|out| matches!(
        out,
        Outgoing::Direct {
            client_id: 8,
            message: ServerMessage::RegisterRejected {
                reason: RegisterRejectReason::AlreadyConnected
            }
        }
    )));
}

#[test]
fn restart_requires_admin_secret() {
    let mut server = server();
    started(&mut server);
    server.drain_outbox();

    server.handle_message(
        1,
        ClientMessage::Restart {
            admin_secret: "guess".into(),
        },
    );
    let outbox = server.drain_outbox();
    assert_eq!(rejections(&outbox, 1), vec![CommandRejectReason::NotAuthorized]);
    assert!(server.game().is_some());

    server.handle_message(
        2,
        ClientMessage::Restart {
            admin_secret: "hunter2".into(),
        },
    );
    let outbox = server.drain_outbox();
    assert!(outbox.contains(&Outgoing::Broadcast {
        message: ServerMessage::GameRestarted
    }));
    assert!(server.game().is_none());
    assert_eq!(server.players().player_count(), 0);

    // Seats are gone; clients register again from scratch.
    let (p0, _) = register(&mut server, 2, "Bo");
    assert_eq!(p0, PlayerId(0));
}

#[test]
fn ping_gets_pong() {
    let mut server = server();
    server.handle_message(9, ClientMessage::Ping { timestamp: 1234 });
    let outbox = server.drain_outbox();
    assert!(matches!(
        outbox.as_slice(),
        [Outgoing::Direct {
            client_id: 9,
            message: ServerMessage::Pong {
                client_timestamp: 1234,
                ..
            }
        }]
    ));
}

#[test]
fn ping_bytes_are_answered_on_the_heartbeat_channel() {
    let mut server = server();
    let bytes = serialize_client_message(&ClientMessage::Ping { timestamp: 77 }).unwrap();
    server.handle_data(4, &bytes);

    let outbox = server.drain_outbox();
    let [Outgoing::Direct {
        client_id: 4,
        message,
    }] = outbox.as_slice()
    else {
        panic!("expected one reply, got {outbox:?}");
    };
    assert!(matches!(
        message,
        ServerMessage::Pong {
            client_timestamp: 77,
            ..
        }
    ));
    assert_eq!(channel_for(message), channel_id::HEARTBEAT);
    assert!(channel_id::INBOUND.contains(&channel_id::HEARTBEAT));
}

#[test]
fn state_request_in_lobby_returns_lobby() {
    let mut server = server();
    register(&mut server, 1, "Ada");
    server.handle_message(1, ClientMessage::RequestState);
    let outbox = server.drain_outbox();
    assert!(matches!(
        outbox.as_slice(),
        [Outgoing::Direct {
            client_id: 1,
            message: ServerMessage::LobbyState { .. }
        }]
    ));
}
