//! Broadcast orchestration: sequential per-file, per-destination delivery.
//!
//! The job itself is a pure cursor state machine; the host drives it by
//! asking for the next (file, destination) pair, performing the actual
//! send, and reporting the outcome back. This keeps the core free of
//! async/network concerns while preserving the strict file-major,
//! destination-minor ordering and abort-on-first-failure semantics.

use uuid::Uuid;

use crate::identity::PeerId;

/// A file staged for sending: name, mime type, raw bytes.
#[derive(Debug, Clone)]
pub struct FileBlob {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileBlob {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// Lifecycle of a broadcast: `Idle → Sending → {Completed | Failed}`,
/// re-armed to `Idle` when the finished job is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastStatus {
    Idle,
    Sending,
    Completed,
    Failed,
}

/// Precondition failure: surfaced as a user-visible warning, no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no file selected to send")]
    NoFiles,
    #[error("no destination selected")]
    NoDestinations,
}

/// Why a trigger did not start a job.
#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    /// A job is still sending; the trigger is ignored.
    #[error("a broadcast is already in progress")]
    Busy,
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// One user-triggered send action: a snapshot of the staged files and the
/// selected destinations, walked in file-major, destination-minor order.
/// Ephemeral; discarded once a terminal status has been reported.
#[derive(Debug)]
pub struct BroadcastJob {
    id: Uuid,
    files: Vec<FileBlob>,
    destinations: Vec<PeerId>,
    status: BroadcastStatus,
    file_idx: usize,
    dest_idx: usize,
}

impl BroadcastJob {
    /// Validate preconditions and arm the job. Each precondition fails
    /// independently, before any network activity.
    pub fn new(files: Vec<FileBlob>, destinations: Vec<PeerId>) -> Result<Self, ValidationError> {
        if files.is_empty() {
            return Err(ValidationError::NoFiles);
        }
        if destinations.is_empty() {
            return Err(ValidationError::NoDestinations);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            files,
            destinations,
            status: BroadcastStatus::Sending,
            file_idx: 0,
            dest_idx: 0,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> BroadcastStatus {
        self.status
    }

    pub fn destinations(&self) -> &[PeerId] {
        &self.destinations
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            BroadcastStatus::Completed | BroadcastStatus::Failed
        )
    }

    /// The next (file, destination) pair to send, or `None` once the job
    /// has reached a terminal status. The same pair is returned until the
    /// host reports its outcome.
    pub fn next_send(&self) -> Option<(&FileBlob, &PeerId)> {
        if self.status != BroadcastStatus::Sending {
            return None;
        }
        let file = self.files.get(self.file_idx)?;
        let dest = self.destinations.get(self.dest_idx)?;
        Some((file, dest))
    }

    /// The current pair settled without error; advance the cursor.
    /// Completes the job after the last pair.
    pub fn on_send_ok(&mut self) {
        if self.status != BroadcastStatus::Sending {
            return;
        }
        self.dest_idx += 1;
        if self.dest_idx == self.destinations.len() {
            self.dest_idx = 0;
            self.file_idx += 1;
            if self.file_idx == self.files.len() {
                self.status = BroadcastStatus::Completed;
            }
        }
    }

    /// The current pair failed; abort the remainder of the loop.
    pub fn on_send_failed(&mut self) {
        if self.status != BroadcastStatus::Sending {
            return;
        }
        self.status = BroadcastStatus::Failed;
    }
}

/// Gate enforcing at-most-one-active-job. Owns the active job, if any.
#[derive(Debug, Default)]
pub struct Broadcaster {
    active: Option<BroadcastJob>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a job is mid-send; the trigger path is expected to be
    /// disabled in the UI, and any trigger that slips through is rejected.
    pub fn is_sending(&self) -> bool {
        matches!(
            self.active.as_ref().map(BroadcastJob::status),
            Some(BroadcastStatus::Sending)
        )
    }

    /// Start a new job from the staged files and the destination snapshot.
    pub fn trigger(
        &mut self,
        files: Vec<FileBlob>,
        destinations: Vec<PeerId>,
    ) -> Result<&mut BroadcastJob, TriggerError> {
        if self.is_sending() {
            return Err(TriggerError::Busy);
        }
        let job = BroadcastJob::new(files, destinations)?;
        Ok(self.active.insert(job))
    }

    pub fn active(&self) -> Option<&BroadcastJob> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut BroadcastJob> {
        self.active.as_mut()
    }

    /// Discard the job once its terminal status has been reported,
    /// re-arming the trigger. Returns the finished job, or `None` if the
    /// job is still sending (or there is none).
    pub fn finish(&mut self) -> Option<BroadcastJob> {
        if self.active.as_ref().is_some_and(BroadcastJob::is_terminal) {
            return self.active.take();
        }
        None
    }

    /// Observable status: `Idle` when no job is held.
    pub fn status(&self) -> BroadcastStatus {
        self.active
            .as_ref()
            .map(BroadcastJob::status)
            .unwrap_or(BroadcastStatus::Idle)
    }
}
