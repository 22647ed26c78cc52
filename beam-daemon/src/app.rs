//! The single state-update loop: owns the session, the connection registry,
//! and the broadcaster, and is the only mutator of any of them.
//!
//! Transport lifecycle events and user intents arrive on one channel and
//! are processed strictly one at a time, in arrival order. The broadcast
//! loop runs inline in the handler and suspends at each individual send,
//! so sends are sequential by construction and a new trigger cannot slip
//! in mid-broadcast.

use std::path::{Path, PathBuf};

use beam_core::{
    Broadcaster, ConnectionRegistry, FileBlob, Payload, PeerId, PeerSession, SessionStartError,
    Transport, TransportEvent, TriggerError,
};
use tracing::{debug, error, info, warn};

/// What the UI boundary may ask the core to do.
#[derive(Debug)]
pub enum UserIntent {
    /// Connect to the peer described by the typed input.
    DiscoverPeer(String),
    Select(PeerId),
    Deselect(PeerId),
    SetFiles(Vec<FileBlob>),
    TriggerBroadcast,
}

/// Everything the state-update loop consumes.
#[derive(Debug)]
pub enum AppEvent {
    Transport(TransportEvent),
    Intent(UserIntent),
}

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// The last user-visible message; what a presentation layer would render.
#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

pub struct App<T: Transport> {
    session: PeerSession,
    registry: ConnectionRegistry,
    broadcaster: Broadcaster,
    staged: Vec<FileBlob>,
    last_notice: Option<Notice>,
    transport: T,
    download_dir: PathBuf,
}

impl<T: Transport> App<T> {
    pub fn new(transport: T, download_dir: PathBuf) -> Self {
        Self {
            session: PeerSession::new(),
            registry: ConnectionRegistry::new(),
            broadcaster: Broadcaster::new(),
            staged: Vec::new(),
            last_notice: None,
            transport,
            download_dir,
        }
    }

    /// Bootstrap the session against the transport. The assigned identifier
    /// is recorded once and never changes.
    pub async fn start(&mut self) -> Result<PeerId, SessionStartError> {
        let id = self.transport.start_session().await?;
        self.session.mark_started(id.clone());
        Ok(id)
    }

    /// Consume events until the channel closes.
    pub async fn run(mut self, mut rx: tokio::sync::mpsc::UnboundedReceiver<AppEvent>) {
        while let Some(ev) = rx.recv().await {
            self.handle_event(ev).await;
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn session(&self) -> &PeerSession {
        &self.session
    }

    pub fn staged_files(&self) -> &[FileBlob] {
        &self.staged
    }

    pub fn last_notice(&self) -> Option<&Notice> {
        self.last_notice.as_ref()
    }

    pub fn broadcast_status(&self) -> beam_core::BroadcastStatus {
        self.broadcaster.status()
    }

    async fn handle_event(&mut self, ev: AppEvent) {
        match ev {
            AppEvent::Transport(ev) => self.handle_transport_event(ev).await,
            AppEvent::Intent(intent) => self.handle_intent(intent).await,
        }
    }

    async fn handle_transport_event(&mut self, ev: TransportEvent) {
        match ev {
            TransportEvent::PeerConnected(id) => {
                info!(peer = %id.short(), "peer connected");
                self.registry.on_peer_discovered(id);
            }
            TransportEvent::PeerDisconnected(id) => {
                info!(peer = %id.short(), "peer disconnected");
                self.registry.on_peer_lost(&id);
            }
            TransportEvent::FileReceived { from, payload } => {
                self.save_received(&from, payload).await;
            }
        }
    }

    async fn handle_intent(&mut self, intent: UserIntent) {
        match intent {
            UserIntent::DiscoverPeer(input) => self.discover_peer(input).await,
            UserIntent::Select(id) => self.registry.select(id),
            UserIntent::Deselect(id) => self.registry.deselect(&id),
            UserIntent::SetFiles(files) => self.staged = files,
            UserIntent::TriggerBroadcast => self.run_broadcast().await,
        }
    }

    async fn discover_peer(&mut self, input: String) {
        self.registry.set_pending_input(input.clone());
        if input.trim().is_empty() {
            self.notice(NoticeLevel::Warning, "please enter a peer identifier");
            return;
        }
        self.registry.set_connecting(true);
        let result = self.transport.connect(&input).await;
        self.registry.set_connecting(false);
        if let Err(e) = result {
            self.notice(NoticeLevel::Error, e.to_string());
        }
    }

    /// Drive one broadcast job to its terminal status: file-major,
    /// destination-minor, one awaited send at a time, aborting the rest of
    /// the loop on the first failure.
    async fn run_broadcast(&mut self) {
        let files = self.staged.clone();
        let destinations = self.registry.selected().to_vec();
        match self.broadcaster.trigger(files, destinations) {
            Ok(_) => {}
            Err(TriggerError::Busy) => {
                debug!("broadcast trigger ignored: a job is already sending");
                return;
            }
            Err(TriggerError::Invalid(e)) => {
                let msg = e.to_string();
                self.notice(NoticeLevel::Warning, msg);
                return;
            }
        }

        let failure = loop {
            let next = self
                .broadcaster
                .active()
                .and_then(|job| job.next_send())
                .map(|(file, dest)| {
                    (
                        Payload::File {
                            file_name: file.name.clone(),
                            mime_type: file.mime_type.clone(),
                            bytes: file.bytes.clone(),
                        },
                        file.name.clone(),
                        dest.clone(),
                    )
                });
            let Some((payload, file_name, dest)) = next else {
                break None;
            };
            match self.transport.send(&dest, payload).await {
                Ok(()) => {
                    if let Some(job) = self.broadcaster.active_mut() {
                        job.on_send_ok();
                    }
                }
                Err(e) => {
                    if let Some(job) = self.broadcaster.active_mut() {
                        job.on_send_failed();
                    }
                    break Some((file_name, e));
                }
            }
        };

        match failure {
            None => {
                self.staged.clear();
                self.notice(NoticeLevel::Success, "file(s) sent");
            }
            Some((file_name, e)) => {
                self.notice(
                    NoticeLevel::Error,
                    format!("sending {} failed: {}", file_name, e),
                );
            }
        }
        let _ = self.broadcaster.finish();
    }

    async fn save_received(&mut self, from: &PeerId, payload: Payload) {
        let Payload::File {
            file_name,
            mime_type,
            bytes,
        } = payload;
        // Strip any path components the sender put in the name.
        let name = Path::new(&file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "received.bin".to_string());
        let dest = self.download_dir.join(&name);
        let created = tokio::fs::create_dir_all(&self.download_dir).await;
        let written = match created {
            Ok(()) => tokio::fs::write(&dest, &bytes).await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => {
                info!(
                    peer = %from.short(),
                    file = %name,
                    mime = %mime_type,
                    size = bytes.len(),
                    "file received"
                );
            }
            Err(e) => {
                self.notice(
                    NoticeLevel::Error,
                    format!("could not save {}: {}", name, e),
                );
            }
        }
    }

    fn notice(&mut self, level: NoticeLevel, text: impl Into<String>) {
        let text = text.into();
        match level {
            NoticeLevel::Error => error!("{}", text),
            NoticeLevel::Warning => warn!("{}", text),
            NoticeLevel::Success => info!("{}", text),
        }
        self.last_notice = Some(Notice { level, text });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beam_core::{BroadcastStatus, ConnectError, SendError, SessionStartError};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MockTransport {
        /// (destination, file name) per attempted send, in call order.
        sent: Arc<Mutex<Vec<(String, String)>>>,
        /// Fail the send with this call index (0-based).
        fail_at: Option<usize>,
        fail_connect: bool,
    }

    impl Transport for MockTransport {
        async fn start_session(&mut self) -> Result<PeerId, SessionStartError> {
            Ok(PeerId::new("local-peer"))
        }

        async fn connect(&self, input: &str) -> Result<(), ConnectError> {
            if self.fail_connect {
                return Err(ConnectError {
                    input: input.to_string(),
                    reason: "connection refused".to_string(),
                });
            }
            Ok(())
        }

        async fn send(&self, peer: &PeerId, payload: Payload) -> Result<(), SendError> {
            let mut sent = self.sent.lock().unwrap();
            let call = sent.len();
            sent.push((peer.to_string(), payload.file_name().to_string()));
            if self.fail_at == Some(call) {
                return Err(SendError {
                    peer: peer.clone(),
                    reason: "broken pipe".to_string(),
                });
            }
            Ok(())
        }
    }

    fn pid(s: &str) -> PeerId {
        PeerId::new(s)
    }

    fn blob(name: &str) -> FileBlob {
        FileBlob::new(name, "text/plain", name.as_bytes().to_vec())
    }

    fn app_with(mock: MockTransport) -> App<MockTransport> {
        App::new(mock, std::env::temp_dir().join("beamdrop-app-tests"))
    }

    async fn connected_pair(app: &mut App<MockTransport>) {
        app.handle_event(AppEvent::Transport(TransportEvent::PeerConnected(pid("x"))))
            .await;
        app.handle_event(AppEvent::Transport(TransportEvent::PeerConnected(pid("y"))))
            .await;
        app.handle_event(AppEvent::Intent(UserIntent::Select(pid("y"))))
            .await;
    }

    #[tokio::test]
    async fn start_assigns_identifier_once() {
        let mut app = app_with(MockTransport::default());
        let id = app.start().await.unwrap();
        assert_eq!(id.as_str(), "local-peer");
        assert!(app.session().started());
        assert_eq!(app.session().identifier(), Some(&id));
    }

    #[tokio::test]
    async fn broadcast_sends_file_major_destination_minor() {
        let mock = MockTransport::default();
        let mut app = app_with(mock.clone());
        connected_pair(&mut app).await;
        app.handle_event(AppEvent::Intent(UserIntent::SetFiles(vec![
            blob("a"),
            blob("b"),
        ])))
        .await;
        app.handle_event(AppEvent::Intent(UserIntent::TriggerBroadcast))
            .await;

        let sent = mock.sent.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                ("x".to_string(), "a".to_string()),
                ("y".to_string(), "a".to_string()),
                ("x".to_string(), "b".to_string()),
                ("y".to_string(), "b".to_string()),
            ]
        );
        // Success: staged files cleared, job discarded, trigger re-armed.
        assert!(app.staged_files().is_empty());
        assert_eq!(app.last_notice().unwrap().level, NoticeLevel::Success);
        assert_eq!(app.broadcast_status(), BroadcastStatus::Idle);
    }

    #[tokio::test]
    async fn send_failure_aborts_remaining_pairs() {
        let mock = MockTransport {
            fail_at: Some(1), // fails on (a, y)
            ..Default::default()
        };
        let mut app = app_with(mock.clone());
        connected_pair(&mut app).await;
        app.handle_event(AppEvent::Intent(UserIntent::SetFiles(vec![
            blob("a"),
            blob("b"),
        ])))
        .await;
        app.handle_event(AppEvent::Intent(UserIntent::TriggerBroadcast))
            .await;

        let sent = mock.sent.lock().unwrap().clone();
        // (b, x) and (b, y) were never attempted.
        assert_eq!(
            sent,
            vec![
                ("x".to_string(), "a".to_string()),
                ("y".to_string(), "a".to_string()),
            ]
        );
        let notice = app.last_notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.text.contains("a"));
        // Files stay staged so the user can re-trigger after fixing the cause.
        assert_eq!(app.staged_files().len(), 2);
        assert_eq!(app.broadcast_status(), BroadcastStatus::Idle);
    }

    #[tokio::test]
    async fn trigger_without_files_warns_and_sends_nothing() {
        let mock = MockTransport::default();
        let mut app = app_with(mock.clone());
        connected_pair(&mut app).await;
        app.handle_event(AppEvent::Intent(UserIntent::TriggerBroadcast))
            .await;

        assert!(mock.sent.lock().unwrap().is_empty());
        let notice = app.last_notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.text.contains("file"));
    }

    #[tokio::test]
    async fn trigger_without_destinations_warns_and_sends_nothing() {
        let mock = MockTransport::default();
        let mut app = app_with(mock.clone());
        app.handle_event(AppEvent::Intent(UserIntent::SetFiles(vec![blob("a")])))
            .await;
        app.handle_event(AppEvent::Intent(UserIntent::TriggerBroadcast))
            .await;

        assert!(mock.sent.lock().unwrap().is_empty());
        let notice = app.last_notice().unwrap();
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert!(notice.text.contains("destination"));
    }

    #[tokio::test]
    async fn connect_failure_resets_connecting_and_keeps_registry() {
        let mock = MockTransport {
            fail_connect: true,
            ..Default::default()
        };
        let mut app = app_with(mock);
        app.handle_event(AppEvent::Transport(TransportEvent::PeerConnected(pid("x"))))
            .await;
        app.handle_event(AppEvent::Intent(UserIntent::DiscoverPeer(
            "10.0.0.9:45770".to_string(),
        )))
        .await;

        assert!(!app.registry().connecting());
        assert_eq!(app.registry().pending_input(), "10.0.0.9:45770");
        assert_eq!(app.registry().reachable(), &[pid("x")]);
        assert_eq!(app.last_notice().unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn empty_discover_input_warns_without_connecting() {
        let mut app = app_with(MockTransport::default());
        app.handle_event(AppEvent::Intent(UserIntent::DiscoverPeer(String::new())))
            .await;
        assert!(!app.registry().connecting());
        assert_eq!(app.last_notice().unwrap().level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn disconnect_updates_registry() {
        let mut app = app_with(MockTransport::default());
        connected_pair(&mut app).await;
        app.handle_event(AppEvent::Transport(TransportEvent::PeerDisconnected(pid(
            "x",
        ))))
        .await;
        assert_eq!(app.registry().reachable(), &[pid("y")]);
        assert_eq!(app.registry().selected(), &[pid("y")]);
    }

    #[tokio::test]
    async fn received_file_is_persisted() {
        let dir = std::env::temp_dir().join(format!("beamdrop-recv-{}", std::process::id()));
        let mock = MockTransport::default();
        let mut app = App::new(mock, dir.clone());
        app.handle_event(AppEvent::Transport(TransportEvent::FileReceived {
            from: pid("x"),
            payload: Payload::File {
                file_name: "../sneaky/report.txt".into(),
                mime_type: "text/plain".into(),
                bytes: b"contents".to_vec(),
            },
        }))
        .await;

        // Path components are stripped from the sender-supplied name.
        let saved = std::fs::read(dir.join("report.txt")).unwrap();
        assert_eq!(saved, b"contents");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
