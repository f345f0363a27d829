//! Connection to the game server
//!
//! The render loop runs on macroquad's thread and never blocks, so the socket
//! lives on a dedicated thread running a single-threaded tokio runtime. The
//! two sides talk through unbounded queues: [`NetworkClient::send`] enqueues
//! intents and [`NetworkClient::poll`] drains whatever the server has said.

use log::{debug, error, info, warn};
use shared::codec::{decode, read_frame, write_frame};
use shared::{ClientEvent, ServerEvent};
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// What the network thread reports back to the game loop
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Connected,
    Received(ServerEvent),
    Disconnected(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected(String),
}

impl ConnectionStatus {
    pub fn apply(&mut self, event: &NetworkEvent) {
        match event {
            NetworkEvent::Connected => *self = ConnectionStatus::Connected,
            NetworkEvent::Disconnected(reason) => {
                *self = ConnectionStatus::Disconnected(reason.clone())
            }
            NetworkEvent::Received(_) => {}
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

pub struct NetworkClient {
    outgoing: mpsc::UnboundedSender<(Instant, ClientEvent)>,
    incoming: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl NetworkClient {
    /// Starts the network thread and begins connecting in the background.
    ///
    /// `fake_ping_ms` adds half the given round trip to each direction.
    pub fn connect(server_addr: &str, fake_ping_ms: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let addr: SocketAddr = server_addr.parse()?;
        let delay = Duration::from_millis(fake_ping_ms / 2);

        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        thread::Builder::new()
            .name("network".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!("Failed to start network runtime: {}", e);
                        let _ = incoming_tx.send(NetworkEvent::Disconnected(e.to_string()));
                        return;
                    }
                };
                runtime.block_on(run_connection(addr, delay, outgoing_rx, incoming_tx));
            })?;

        Ok(Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
        })
    }

    /// Queues an intent for the server.
    ///
    /// Returns false, dropping the intent, once the network thread has exited.
    pub fn send(&self, event: ClientEvent) -> bool {
        if self.outgoing.send((Instant::now(), event)).is_err() {
            debug!("Network thread has stopped, dropping intent");
            return false;
        }
        true
    }

    /// Everything received since the last call, in arrival order.
    pub fn poll(&mut self) -> Vec<NetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.incoming.try_recv() {
            events.push(event);
        }
        events
    }
}

async fn run_connection(
    addr: SocketAddr,
    delay: Duration,
    mut outgoing: mpsc::UnboundedReceiver<(Instant, ClientEvent)>,
    incoming: mpsc::UnboundedSender<NetworkEvent>,
) {
    info!("Connecting to {}...", addr);
    let stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to connect to {}: {}", addr, e);
            let _ = incoming.send(NetworkEvent::Disconnected(format!(
                "failed to connect to {}: {}",
                addr, e
            )));
            return;
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY: {}", e);
    }

    info!("Connected to {}", addr);
    if incoming.send(NetworkEvent::Connected).is_err() {
        return;
    }

    let (reader, mut writer) = stream.into_split();
    let mut reader_task = tokio::spawn(receive_events(reader, delay, incoming));

    // Runs until the game drops its handle or the server side of the connection ends.
    loop {
        let (queued_at, event) = tokio::select! {
            _ = &mut reader_task => break,
            queued = outgoing.recv() => match queued {
                Some(queued) => queued,
                None => break,
            },
        };

        if !delay.is_zero() {
            sleep_until(queued_at + delay).await;
        }
        if let Err(e) = write_frame(&mut writer, &event).await {
            warn!("Failed to send {:?}: {}", event, e);
            break;
        }
    }

    reader_task.abort();
    debug!("Network thread finished");
}

async fn receive_events(
    mut reader: OwnedReadHalf,
    delay: Duration,
    incoming: mpsc::UnboundedSender<NetworkEvent>,
) {
    let reason = loop {
        match read_frame(&mut reader).await {
            Ok(Some(payload)) => {
                let received_at = Instant::now();
                match decode::<ServerEvent>(&payload) {
                    Ok(ServerEvent::Disconnected { reason }) => break reason,
                    Ok(event) => {
                        if !delay.is_zero() {
                            sleep_until(received_at + delay).await;
                        }
                        if incoming.send(NetworkEvent::Received(event)).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("Dropping malformed server event: {}", e),
                }
            }
            Ok(None) => break "server closed the connection".to_string(),
            Err(e) => break format!("connection error: {}", e),
        }
    };

    info!("Disconnected: {}", reason);
    let _ = incoming.send(NetworkEvent::Disconnected(reason));
}
