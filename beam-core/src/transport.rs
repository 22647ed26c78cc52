//! Transport collaborator boundary: the primitives the core expects from
//! whatever performs actual peer discovery, connection, and data transfer.

use std::future::Future;

use crate::identity::PeerId;
use crate::protocol::Payload;

/// The session could not be started (the local identifier was never
/// assigned).
#[derive(Debug, thiserror::Error)]
#[error("session start failed: {0}")]
pub struct SessionStartError(pub String);

/// An outbound connect attempt failed. The registry is left unchanged;
/// only the `connecting` flag is reset.
#[derive(Debug, thiserror::Error)]
#[error("connect to {input} failed: {reason}")]
pub struct ConnectError {
    /// The identifier the user typed.
    pub input: String,
    pub reason: String,
}

/// A single (file, destination) send failed. Aborts the remainder of the
/// broadcast loop.
#[derive(Debug, thiserror::Error)]
#[error("send to {peer} failed: {reason}")]
pub struct SendError {
    pub peer: PeerId,
    pub reason: String,
}

/// Connection-lifecycle events the transport emits toward the host's
/// single state-update loop.
#[derive(Debug)]
pub enum TransportEvent {
    /// A peer (inbound or outbound) finished its handshake.
    PeerConnected(PeerId),
    /// A peer's channel closed or errored.
    PeerDisconnected(PeerId),
    /// A peer delivered a payload on its data channel.
    FileReceived { from: PeerId, payload: Payload },
}

/// Connect/send primitives the orchestrator suspends on. Lifecycle events
/// arrive out-of-band on the channel the implementation was built with.
pub trait Transport {
    /// Start the local session; resolves to the identifier the transport
    /// assigned to this peer.
    fn start_session(&mut self)
        -> impl Future<Output = Result<PeerId, SessionStartError>> + Send;

    /// Dial the peer described by the user's typed input. On success a
    /// `PeerConnected` event for the remote peer follows on the event
    /// channel.
    fn connect(&self, input: &str) -> impl Future<Output = Result<(), ConnectError>> + Send;

    /// Deliver one payload to one peer. Resolves only once the payload has
    /// been handed to the peer's channel and flushed; the broadcast loop
    /// awaits each call before issuing the next.
    fn send(
        &self,
        peer: &PeerId,
        payload: Payload,
    ) -> impl Future<Output = Result<(), SendError>> + Send;
}
