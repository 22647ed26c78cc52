//! Beamdrop broadcast core.
//! Host-driven: no I/O; the host passes events in and drives the send plan out.

pub mod broadcast;
pub mod identity;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;
pub mod wire;

pub use broadcast::{BroadcastJob, BroadcastStatus, Broadcaster, FileBlob, TriggerError, ValidationError};
pub use identity::PeerId;
pub use protocol::{Payload, PROTOCOL_VERSION};
pub use registry::ConnectionRegistry;
pub use session::PeerSession;
pub use transport::{ConnectError, SendError, SessionStartError, Transport, TransportEvent};
pub use wire::{decode_frame, encode_frame, FrameDecodeError, FrameEncodeError};
