//! WebTransport server
//!
//! Each session opens one bidirectional stream for reliable requests and
//! sends movement input as datagrams.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::game::entities::PlayerId;
use crate::game::input_buffer::{InputBufferError, InputSender};
use crate::metrics::Metrics;
use crate::net::framing::{read_frame, validate_datagram_size, FramingError};
use crate::net::game_session::{
    deliver, send_to_player, start_broadcast_loop, start_game_loop, GameSession, StreamWriter,
};
use crate::net::protocol::{decode, ClientMessage};
use crate::net::tls::TlsConfig;

pub struct WebTransportServer {
    config: ServerConfig,
    tls_config: TlsConfig,
    session: Arc<RwLock<GameSession>>,
    metrics: Arc<Metrics>,
}

impl WebTransportServer {
    pub async fn new(config: ServerConfig, metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let tls_config = TlsConfig::load(&config).await?;
        let session = Arc::new(RwLock::new(GameSession::new(&config, metrics.clone())));

        Ok(Self {
            config,
            tls_config,
            session,
            metrics,
        })
    }

    pub fn cert_hash(&self) -> &str {
        self.tls_config.cert_hash()
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.port)
    }

    pub fn session(&self) -> Arc<RwLock<GameSession>> {
        self.session.clone()
    }

    /// Accept sessions until the task is cancelled
    pub async fn run(self) -> anyhow::Result<()> {
        use wtransport::Endpoint;

        let bind = self.bind_addr();
        let builder = wtransport::ServerConfig::builder();
        // Unspecified address binds dual-stack
        let builder = if self.config.bind_address.is_unspecified() {
            builder.with_bind_default(self.config.port)
        } else {
            builder.with_bind_address(bind)
        };
        let server_config = builder.with_identity(self.tls_config.identity).build();
        let endpoint = Endpoint::server(server_config)?;

        info!("WebTransport server listening on {}", bind);

        start_game_loop(self.session.clone());
        start_broadcast_loop(self.session.clone());

        let inputs = self.session.read().await.input_sender();

        loop {
            let incoming = endpoint.accept().await;
            let session = self.session.clone();
            let inputs = inputs.clone();
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(incoming, session, inputs, metrics).await {
                    warn!("Connection error: {}", e);
                }
            });
        }
    }
}

async fn handle_connection(
    incoming: wtransport::endpoint::IncomingSession,
    session: Arc<RwLock<GameSession>>,
    inputs: InputSender,
    metrics: Arc<Metrics>,
) -> anyhow::Result<()> {
    let request = incoming.await?;
    debug!(
        "New session from {:?}, path {}",
        request.authority(),
        request.path()
    );
    let connection = request.accept().await?;

    // Reliable traffic rides on the first stream the client opens
    let (send, recv) = connection.accept_bi().await?;
    let writer: StreamWriter = Arc::new(RwLock::new(Some(send)));
    let player_id = Uuid::new_v4();

    let init = session.write().await.connect(player_id, writer.clone());
    match send_to_player(&writer, &init).await {
        Ok(()) => {
            debug!("Sent Init to {}", player_id);
            let mut reader = tokio::spawn(read_requests(
                recv,
                session.clone(),
                metrics.clone(),
                player_id,
            ));

            loop {
                tokio::select! {
                    _ = &mut reader => break,
                    datagram = connection.receive_datagram() => match datagram {
                        Ok(data) => {
                            metrics.record_received(data.len());
                            handle_datagram(&inputs, player_id, &data);
                        }
                        Err(e) => {
                            debug!("Datagram receive error for {}: {}", player_id, e);
                            break;
                        }
                    },
                }
            }
            reader.abort();
        }
        Err(e) => warn!("Failed to send Init to {}: {}", player_id, e),
    }

    *writer.write().await = None;
    let dispatches = session.write().await.disconnect(player_id);
    deliver(&session, dispatches).await;
    debug!("Session {} closed", player_id);
    Ok(())
}

/// Read framed requests until the stream closes or the client leaves
async fn read_requests(
    mut recv: wtransport::RecvStream,
    session: Arc<RwLock<GameSession>>,
    metrics: Arc<Metrics>,
    player_id: PlayerId,
) {
    loop {
        let frame = match read_frame(&mut recv).await {
            Ok(frame) => frame,
            Err(FramingError::ConnectionClosed) => break,
            Err(e) => {
                warn!("Stream error for {}: {}", player_id, e);
                break;
            }
        };
        metrics.record_received(frame.len() + 4);

        let message: ClientMessage = match decode(&frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to decode client message: {}", e);
                continue;
            }
        };

        let leaving = matches!(message, ClientMessage::Leave);
        let dispatches = session.write().await.handle_message(player_id, message);
        deliver(&session, dispatches).await;
        if leaving {
            break;
        }
    }
}

/// Forward a datagram input to the game loop. Anything else is ignored.
fn handle_datagram(inputs: &InputSender, player_id: PlayerId, data: &[u8]) {
    if let Err(e) = validate_datagram_size(data) {
        debug!("Dropping datagram from {}: {}", player_id, e);
        return;
    }
    match decode::<ClientMessage>(data) {
        Ok(ClientMessage::Input(input)) => match inputs.try_send(player_id, input) {
            Ok(()) => {}
            Err(InputBufferError::Full) => debug!("Input queue full, dropped input from {}", player_id),
            Err(InputBufferError::Disconnected) => warn!("Input queue closed"),
        },
        Ok(other) => debug!("Ignoring unreliable {:?} from {}", other, player_id),
        Err(e) => debug!("Failed to decode datagram: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::net::MAX_DATAGRAM_SIZE;
    use crate::game::input_buffer::InputBuffer;
    use crate::net::protocol::{encode, PlayerInput};

    #[test]
    fn test_datagram_input_reaches_buffer() {
        let buffer = InputBuffer::new(8);
        let id = Uuid::new_v4();
        let input = PlayerInput {
            down: true,
            angle: -1.0,
            ..Default::default()
        };

        handle_datagram(&buffer.sender(), id, &encode(&ClientMessage::Input(input)).unwrap());
        assert_eq!(buffer.drain_latest().get(&id), Some(&input));
    }

    #[test]
    fn test_datagram_non_input_ignored() {
        let buffer = InputBuffer::new(8);
        handle_datagram(&buffer.sender(), Uuid::new_v4(), &encode(&ClientMessage::Shoot).unwrap());
        handle_datagram(&buffer.sender(), Uuid::new_v4(), &[0xff, 0x00, 0x13]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_oversized_datagram_dropped() {
        let buffer = InputBuffer::new(8);
        handle_datagram(&buffer.sender(), Uuid::new_v4(), &vec![0u8; MAX_DATAGRAM_SIZE + 1]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_full_queue_drops_input() {
        let buffer = InputBuffer::new(1);
        let id = Uuid::new_v4();
        let first = PlayerInput { up: true, ..Default::default() };
        let second = PlayerInput { left: true, ..Default::default() };

        handle_datagram(&buffer.sender(), id, &encode(&ClientMessage::Input(first)).unwrap());
        handle_datagram(&buffer.sender(), id, &encode(&ClientMessage::Input(second)).unwrap());
        assert_eq!(buffer.drain_latest().get(&id), Some(&first));
    }

    #[tokio::test]
    async fn test_run_binds_configured_address() {
        let dir = std::env::temp_dir().join(format!("arena-tanks-transport-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["localhost".to_string()])
            .unwrap()
            .self_signed(&key_pair)
            .unwrap();
        let cert_path = dir.join("cert.pem");
        let key_path = dir.join("key.pem");
        std::fs::write(&cert_path, cert.pem()).unwrap();
        std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

        let config = ServerConfig {
            bind_address: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            port: 0,
            tls_cert_path: Some(cert_path.to_string_lossy().into_owned()),
            tls_key_path: Some(key_path.to_string_lossy().into_owned()),
            ..ServerConfig::default()
        };
        let server = WebTransportServer::new(config, Arc::new(Metrics::new()))
            .await
            .unwrap();
        assert_eq!(server.bind_addr().ip(), std::net::Ipv4Addr::LOCALHOST);

        let handle = tokio::spawn(server.run());
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!handle.is_finished());

        handle.abort();
        let _ = std::fs::remove_dir_all(dir);
    }
}
