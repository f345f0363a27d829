//! Server network layer handling TCP sessions and event loop coordination

use crate::client_manager::{ClientManager, OUTBOUND_QUEUE_LEN};
use crate::game::{GameState, Outbound};
use crate::ServerResult;
use log::{debug, error, info, warn};
use shared::codec::{decode_client_event, read_frame, write_frame};
use shared::{ClientEvent, ProtocolError, ServerEvent, SessionId};
use std::collections::VecDeque;
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Accepted {
        stream: TcpStream,
        addr: SocketAddr,
    },
    EventReceived {
        session_id: SessionId,
        event: ClientEvent,
    },
    ConnectionClosed {
        session_id: SessionId,
    },
}

/// Main server coordinating sessions and the authoritative game state
///
/// Only the loop in [`Server::run`] touches `clients` and `game_state`; every
/// inbound event is fully handled before the next one is taken.
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: ClientManager,
    game_state: GameState,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(addr: &str, max_clients: usize) -> ServerResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: ClientManager::new(max_clients),
            game_state: GameState::new(),
            server_tx,
            server_rx,
        })
    }

    /// Replaces the initial game state, e.g. with a seeded one.
    pub fn with_game_state(mut self, game_state: GameState) -> Self {
        self.game_state = game_state;
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Spawns task that accepts connections and hands them to the main loop
    fn spawn_listener(listener: TcpListener, server_tx: mpsc::UnboundedSender<ServerMessage>) {
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
                        }
                        if server_tx
                            .send(ServerMessage::Accepted { stream, addr })
                            .is_err()
                        {
                            error!("Main loop is gone, stopping listener");
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that decodes frames from one session and forwards them
    fn spawn_session_reader(
        session_id: SessionId,
        mut reader: OwnedReadHalf,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match read_frame(&mut reader).await {
                    Ok(Some(payload)) => match decode_client_event(&payload) {
                        Ok(event) => {
                            if server_tx
                                .send(ServerMessage::EventReceived { session_id, event })
                                .is_err()
                            {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!("Dropping malformed event from session {}: {}", session_id, e);
                        }
                    },
                    Ok(None) => break,
                    Err(ProtocolError::FrameTooLarge(len)) => {
                        warn!(
                            "Session {} sent a {} byte frame, closing connection",
                            session_id, len
                        );
                        break;
                    }
                    Err(e) => {
                        debug!("Read error on session {}: {}", session_id, e);
                        break;
                    }
                }
            }

            if let Err(e) = server_tx.send(ServerMessage::ConnectionClosed { session_id }) {
                error!("Failed to report closed session: {}", e);
            }
        })
    }

    /// Spawns task that writes queued events to one session
    ///
    /// Ends when the session is removed from the registry, which aborts it
    /// even if it is blocked on a peer that stopped reading.
    fn spawn_session_writer(
        session_id: SessionId,
        mut writer: OwnedWriteHalf,
        mut events: mpsc::Receiver<ServerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = write_frame(&mut writer, &event).await {
                    debug!("Write error on session {}: {}", session_id, e);
                    break;
                }
            }
        })
    }

    /// Tells an over-capacity connection why it is being closed
    fn spawn_refusal(mut stream: TcpStream, addr: SocketAddr, reason: &str) {
        let event = ServerEvent::Disconnected {
            reason: reason.to_string(),
        };
        tokio::spawn(async move {
            if let Err(e) = write_frame(&mut stream, &event).await {
                debug!("Failed to notify refused connection {}: {}", addr, e);
            }
        });
    }

    /// Delivers events in order, disconnecting any session whose queue overflows.
    ///
    /// The removal of a stalled session is announced like any other disconnect.
    fn dispatch_all(&mut self, outbound: Vec<Outbound>) {
        let mut pending = VecDeque::from(outbound);
        while let Some(message) = pending.pop_front() {
            for session_id in self.clients.dispatch(message) {
                pending.extend(self.close_session(session_id));
            }
        }
    }

    fn close_session(&mut self, session_id: SessionId) -> Vec<Outbound> {
        self.clients.remove_client(session_id);
        self.game_state.handle_disconnect(session_id)
    }

    fn handle_accepted(&mut self, stream: TcpStream, addr: SocketAddr) {
        let (event_tx, event_rx) = mpsc::channel(OUTBOUND_QUEUE_LEN);

        let Some(session_id) = self.clients.add_client(addr, event_tx) else {
            warn!("Refusing connection from {}: server full", addr);
            Self::spawn_refusal(stream, addr, "Server full");
            return;
        };

        let (reader, writer) = stream.into_split();
        let writer_task = Self::spawn_session_writer(session_id, writer, event_rx);
        let reader_task = Self::spawn_session_reader(session_id, reader, self.server_tx.clone());
        self.clients.attach_tasks(
            session_id,
            vec![writer_task.abort_handle(), reader_task.abort_handle()],
        );
        debug!("{} sessions connected", self.clients.len());

        let outbound = self.game_state.handle_connect(session_id);
        self.dispatch_all(outbound);
    }

    fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Accepted { stream, addr } => {
                self.handle_accepted(stream, addr);
            }
            ServerMessage::EventReceived { session_id, event } => {
                debug!("Session {} sent {:?}", session_id, event);
                let outbound = self.game_state.handle_event(session_id, event);
                self.dispatch_all(outbound);
            }
            ServerMessage::ConnectionClosed { session_id } => {
                let outbound = self.close_session(session_id);
                self.dispatch_all(outbound);
            }
        }
    }

    /// Main server loop: accepts sessions and processes their events one at a time
    pub async fn run(mut self) -> ServerResult<()> {
        let listener = self
            .listener
            .take()
            .ok_or("server listener was already started")?;
        Self::spawn_listener(listener, self.server_tx.clone());
        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            self.handle_message(message);
        }

        info!("Server shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::codec::decode;
    use shared::Pose;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::timeout;

    async fn start_server(max_clients: usize) -> SocketAddr {
        let server = Server::new("127.0.0.1:0", max_clients)
            .await
            .unwrap()
            .with_game_state(GameState::with_seed(7));
        let addr = server.local_addr();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        addr
    }

    async fn next_event(stream: &mut TcpStream) -> ServerEvent {
        let payload = timeout(Duration::from_secs(2), read_frame(stream))
            .await
            .expect("timed out waiting for frame")
            .unwrap()
            .expect("connection closed");
        decode(&payload).unwrap()
    }

    /// Reads the four frames every accepted session starts with
    async fn handshake(stream: &mut TcpStream) -> SessionId {
        let session_id = match next_event(stream).await {
            ServerEvent::Welcome { session_id } => session_id,
            other => panic!("Expected welcome, got {:?}", other),
        };
        assert!(matches!(next_event(stream).await, ServerEvent::CurrentPlayers(_)));
        assert!(matches!(next_event(stream).await, ServerEvent::StarLocation(_)));
        assert!(matches!(next_event(stream).await, ServerEvent::ScoreUpdate(_)));
        session_id
    }

    fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_stalled_session_is_dropped() {
        let mut server = Server::new("127.0.0.1:0", 4)
            .await
            .unwrap()
            .with_game_state(GameState::with_seed(3));
        let peer: SocketAddr = "127.0.0.1:9".parse().unwrap();

        // Nobody drains this queue, like a peer that stopped reading.
        let (stalled_tx, _stalled_rx) = mpsc::channel(OUTBOUND_QUEUE_LEN);
        let stalled = server.clients.add_client(peer, stalled_tx).unwrap();
        let outbound = server.game_state.handle_connect(stalled);
        server.dispatch_all(outbound);

        let (mover_tx, mut mover_rx) = mpsc::channel(OUTBOUND_QUEUE_LEN);
        let mover = server.clients.add_client(peer, mover_tx).unwrap();
        let outbound = server.game_state.handle_connect(mover);
        server.dispatch_all(outbound);
        drain(&mut mover_rx);

        for i in 0..OUTBOUND_QUEUE_LEN * 2 {
            server.handle_message(ServerMessage::EventReceived {
                session_id: mover,
                event: ClientEvent::PlayerMovement(Pose::new(i as f32, 0.0, 0.0)),
            });
        }

        assert!(!server.clients.contains(stalled));
        assert!(server.game_state.player(stalled).is_none());
        assert!(server.clients.contains(mover));
        assert_eq!(drain(&mut mover_rx), vec![ServerEvent::RemovePlayer(stalled)]);
    }

    #[tokio::test]
    async fn test_refuses_connections_over_capacity() {
        let addr = start_server(1).await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        handshake(&mut first).await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        match next_event(&mut second).await {
            ServerEvent::Disconnected { reason } => assert_eq!(reason, "Server full"),
            other => panic!("Expected refusal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_close_session() {
        let addr = start_server(4).await;

        let mut a = TcpStream::connect(addr).await.unwrap();
        let a_id = handshake(&mut a).await;
        let mut b = TcpStream::connect(addr).await.unwrap();
        handshake(&mut b).await;
        assert!(matches!(next_event(&mut a).await, ServerEvent::NewPlayer(_)));

        // Undecodable payload, then a non-finite pose, then a valid move.
        let mut garbage = 3u32.to_be_bytes().to_vec();
        garbage.extend_from_slice(&[0xff, 0xff, 0xff]);
        a.write_all(&garbage).await.unwrap();
        write_frame(&mut a, &ClientEvent::PlayerMovement(Pose::new(f32::NAN, 0.0, 0.0)))
            .await
            .unwrap();
        write_frame(&mut a, &ClientEvent::PlayerMovement(Pose::new(3.0, 4.0, 0.25)))
            .await
            .unwrap();

        match next_event(&mut b).await {
            ServerEvent::PlayerMoved(player) => {
                assert_eq!(player.id, a_id);
                assert_eq!(player.pose(), Pose::new(3.0, 4.0, 0.25));
            }
            other => panic!("Expected movement broadcast, got {:?}", other),
        }
    }
}
