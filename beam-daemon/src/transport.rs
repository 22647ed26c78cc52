//! TCP peer transport: listener for inbound peers, outbound dials,
//! identifier handshake, framed payload exchange.
//!
//! Identifiers are the listen address a peer declares during the handshake,
//! so a learned identifier is re-dialable. Payloads travel as length-prefixed
//! bincode frames (see beam-core's wire module). Each send is acked only
//! once its frame has been flushed to the socket, which is what lets the
//! broadcast loop attribute a failure to a single (file, destination) pair.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use beam_core::wire::{decode_frame, encode_frame, LEN_SIZE, MAX_FRAME_LEN};
use beam_core::{
    ConnectError, Payload, PeerId, SendError, SessionStartError, Transport, TransportEvent,
    PROTOCOL_VERSION,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

const MAX_ID_LEN: u16 = 512;

/// A queued payload plus an ack resolved once the frame is flushed.
type Outbound = (Payload, oneshot::Sender<std::io::Result<()>>);
type PeerSenders = Arc<Mutex<HashMap<PeerId, mpsc::UnboundedSender<Outbound>>>>;

pub struct TcpTransport {
    bind_addr: SocketAddr,
    local_id: Option<PeerId>,
    events: mpsc::UnboundedSender<TransportEvent>,
    peer_senders: PeerSenders,
}

impl TcpTransport {
    pub fn new(bind_addr: SocketAddr, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            bind_addr,
            local_id: None,
            events,
            peer_senders: Arc::new(Mutex::new(HashMap::new())),
        }
    }

}

impl Transport for TcpTransport {
    async fn start_session(&mut self) -> Result<PeerId, SessionStartError> {
        let listener = TcpListener::bind(self.bind_addr)
            .await
            .map_err(|e| SessionStartError(e.to_string()))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| SessionStartError(e.to_string()))?;
        let local_id = PeerId::new(local_addr.to_string());
        self.local_id = Some(local_id.clone());
        info!(identifier = %local_id, "peer transport listening");

        let accept_id = local_id.clone();
        let accept_events = self.events.clone();
        let accept_senders = self.peer_senders.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((mut stream, from)) => {
                        let local_id = accept_id.clone();
                        let events = accept_events.clone();
                        let senders = accept_senders.clone();
                        tokio::spawn(async move {
                            match handshake_accept(&mut stream, &local_id).await {
                                Ok(peer_id) => {
                                    spawn_connection(stream, peer_id, events, senders).await;
                                }
                                Err(e) => {
                                    debug!(%from, error = %e, "inbound handshake failed");
                                }
                            }
                        });
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(local_id)
    }

    async fn connect(&self, input: &str) -> Result<(), ConnectError> {
        let local_id = self.local_id.clone().ok_or_else(|| ConnectError {
            input: input.to_string(),
            reason: "session not started".to_string(),
        })?;
        let addr: SocketAddr = input.trim().parse().map_err(|_| ConnectError {
            input: input.to_string(),
            reason: "not a valid peer address".to_string(),
        })?;
        let mut stream = TcpStream::connect(addr).await.map_err(|e| ConnectError {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        let peer_id = handshake_connect(&mut stream, &local_id)
            .await
            .map_err(|e| ConnectError {
                input: input.to_string(),
                reason: e.to_string(),
            })?;
        spawn_connection(stream, peer_id, self.events.clone(), self.peer_senders.clone()).await;
        Ok(())
    }

    async fn send(&self, peer: &PeerId, payload: Payload) -> Result<(), SendError> {
        let tx = {
            let senders = self.peer_senders.lock().await;
            senders.get(peer).cloned()
        }
        .ok_or_else(|| SendError {
            peer: peer.clone(),
            reason: "peer is not connected".to_string(),
        })?;
        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send((payload, ack_tx)).map_err(|_| SendError {
            peer: peer.clone(),
            reason: "connection closed".to_string(),
        })?;
        match ack_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SendError {
                peer: peer.clone(),
                reason: e.to_string(),
            }),
            Err(_) => Err(SendError {
                peer: peer.clone(),
                reason: "connection closed before the send settled".to_string(),
            }),
        }
    }
}

/// Register the peer's writer channel, announce the connection, and spawn
/// the writer and reader tasks. The reader task owns deregistration and the
/// disconnect event.
async fn spawn_connection(
    stream: TcpStream,
    peer_id: PeerId,
    events: mpsc::UnboundedSender<TransportEvent>,
    peer_senders: PeerSenders,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    {
        let mut senders = peer_senders.lock().await;
        senders.insert(peer_id.clone(), tx);
    }
    let _ = events.send(TransportEvent::PeerConnected(peer_id.clone()));

    tokio::spawn(async move {
        while let Some((payload, ack)) = rx.recv().await {
            let res = write_payload(&mut writer, &payload).await;
            let failed = res.is_err();
            let _ = ack.send(res);
            if failed {
                break;
            }
        }
    });

    tokio::spawn(async move {
        loop {
            let mut len_buf = [0u8; LEN_SIZE];
            if reader.read_exact(&mut len_buf).await.is_err() {
                break;
            }
            let len = u32::from_le_bytes(len_buf);
            if len > MAX_FRAME_LEN {
                warn!(peer = %peer_id, len, "oversized frame, dropping connection");
                break;
            }
            let mut frame = vec![0u8; LEN_SIZE + len as usize];
            frame[..LEN_SIZE].copy_from_slice(&len_buf);
            if reader.read_exact(&mut frame[LEN_SIZE..]).await.is_err() {
                break;
            }
            match decode_frame(&frame) {
                Ok((payload, _)) => {
                    let _ = events.send(TransportEvent::FileReceived {
                        from: peer_id.clone(),
                        payload,
                    });
                }
                Err(e) => {
                    warn!(peer = %peer_id, error = %e, "undecodable frame, dropping connection");
                    break;
                }
            }
        }
        peer_senders.lock().await.remove(&peer_id);
        let _ = events.send(TransportEvent::PeerDisconnected(peer_id));
    });
}

async fn write_payload(writer: &mut OwnedWriteHalf, payload: &Payload) -> std::io::Result<()> {
    let frame = encode_frame(payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writer.write_all(&frame).await?;
    writer.flush().await
}

/// Hello: version byte + 2-byte LE identifier length + utf8 identifier.
/// Accept side reads the dialer's hello first, then answers with its own.
async fn handshake_accept(stream: &mut TcpStream, local_id: &PeerId) -> std::io::Result<PeerId> {
    let peer = read_hello(stream).await?;
    write_hello(stream, local_id).await?;
    Ok(peer)
}

async fn handshake_connect(stream: &mut TcpStream, local_id: &PeerId) -> std::io::Result<PeerId> {
    write_hello(stream, local_id).await?;
    read_hello(stream).await
}

async fn read_hello(stream: &mut TcpStream) -> std::io::Result<PeerId> {
    let mut head = [0u8; 3];
    stream.read_exact(&mut head).await?;
    if head[0] != PROTOCOL_VERSION {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "unsupported protocol version",
        ));
    }
    let len = u16::from_le_bytes([head[1], head[2]]);
    if len == 0 || len > MAX_ID_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "bad identifier length",
        ));
    }
    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    let id = String::from_utf8(buf)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "identifier not utf8"))?;
    Ok(PeerId::new(id))
}

async fn write_hello(stream: &mut TcpStream, id: &PeerId) -> std::io::Result<()> {
    let bytes = id.as_str().as_bytes();
    let mut out = Vec::with_capacity(3 + bytes.len());
    out.push(PROTOCOL_VERSION);
    out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    out.extend_from_slice(bytes);
    stream.write_all(&out).await?;
    stream.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn started() -> (TcpTransport, PeerId, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut t = TcpTransport::new("127.0.0.1:0".parse().unwrap(), tx);
        let id = t.start_session().await.unwrap();
        (t, id, rx)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for transport event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn connect_send_receive_loopback() {
        let (a, a_id, mut a_rx) = started().await;
        let (_b, b_id, mut b_rx) = started().await;

        a.connect(b_id.as_str()).await.unwrap();

        match next_event(&mut a_rx).await {
            TransportEvent::PeerConnected(id) => assert_eq!(id, b_id),
            other => panic!("unexpected event: {:?}", other),
        }
        match next_event(&mut b_rx).await {
            TransportEvent::PeerConnected(id) => assert_eq!(id, a_id),
            other => panic!("unexpected event: {:?}", other),
        }

        let payload = Payload::File {
            file_name: "hello.txt".into(),
            mime_type: "text/plain".into(),
            bytes: b"hi there".to_vec(),
        };
        a.send(&b_id, payload).await.unwrap();

        match next_event(&mut b_rx).await {
            TransportEvent::FileReceived { from, payload } => {
                assert_eq!(from, a_id);
                assert_eq!(payload.file_name(), "hello.txt");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_to_unknown_peer_fails() {
        let (a, _, _rx) = started().await;
        let err = a
            .send(
                &PeerId::new("127.0.0.1:1"),
                Payload::File {
                    file_name: "x".into(),
                    mime_type: "application/octet-stream".into(),
                    bytes: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(err.reason.contains("not connected"));
    }

    #[tokio::test]
    async fn connect_rejects_garbage_input() {
        let (a, _, _rx) = started().await;
        let err = a.connect("not-an-address").await.unwrap_err();
        assert!(err.reason.contains("address"));
    }

    #[tokio::test]
    async fn connect_before_session_start_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let t = TcpTransport::new("127.0.0.1:0".parse().unwrap(), tx);
        let err = t.connect("127.0.0.1:45770").await.unwrap_err();
        assert!(err.reason.contains("session"));
    }
}
