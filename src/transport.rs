//! Transport primitives and the in-process loopback hub
//!
//! The session layer supplies two primitives: reliable messages, delivered
//! in per-sender order to every participant including the sender, and
//! unreliable per-tick messages, delivered to every other participant with
//! no ordering guarantee. Buffered reliable messages are additionally kept
//! per sender and replayed, in send order, to participants that connect
//! later. Inbound traffic lands in crossbeam queues that the tick drains at
//! fixed points.

use crate::error::SyncError;
use crate::session::ParticipantId;
use crossbeam::channel::{unbounded, Receiver, Sender, TryIter};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Outgoing side of a session transport
pub trait Transport {
    fn send_reliable(&self, from: ParticipantId, payload: Vec<u8>) -> Result<(), SyncError>;
    /// Reliable send that is also replayed to participants joining later,
    /// until the sender disconnects
    fn send_buffered(&self, from: ParticipantId, payload: Vec<u8>) -> Result<(), SyncError>;
    fn send_unreliable(&self, from: ParticipantId, payload: Vec<u8>) -> Result<(), SyncError>;
}

/// Payload tagged with the participant that sent it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: ParticipantId,
    pub payload: Vec<u8>,
}

/// Cloneable enqueue side used by transport callbacks
#[derive(Debug, Clone)]
pub struct InboxHandle {
    reliable: Sender<Envelope>,
    unreliable: Sender<Envelope>,
}

impl InboxHandle {
    pub fn push_reliable(&self, envelope: Envelope) -> Result<(), SyncError> {
        self.reliable
            .send(envelope)
            .map_err(|e| SyncError::Transport(e.to_string()))
    }

    pub fn push_unreliable(&self, envelope: Envelope) -> Result<(), SyncError> {
        self.unreliable
            .send(envelope)
            .map_err(|e| SyncError::Transport(e.to_string()))
    }
}

/// Drain side owned by the tick
#[derive(Debug)]
pub struct Inbox {
    reliable: Receiver<Envelope>,
    unreliable: Receiver<Envelope>,
}

impl Inbox {
    pub fn drain_reliable(&self) -> TryIter<'_, Envelope> {
        self.reliable.try_iter()
    }

    pub fn drain_unreliable(&self) -> TryIter<'_, Envelope> {
        self.unreliable.try_iter()
    }
}

/// Create a connected inbox pair
pub fn inbox() -> (InboxHandle, Inbox) {
    let (reliable_tx, reliable_rx) = unbounded();
    let (unreliable_tx, unreliable_rx) = unbounded();
    (
        InboxHandle {
            reliable: reliable_tx,
            unreliable: unreliable_tx,
        },
        Inbox {
            reliable: reliable_rx,
            unreliable: unreliable_rx,
        },
    )
}

#[derive(Debug, Default)]
struct HubState {
    peers: Vec<(ParticipantId, InboxHandle)>,
    backlog: BTreeMap<ParticipantId, Vec<Vec<u8>>>,
}

impl HubState {
    fn fan_out_reliable(&self, from: ParticipantId, payload: &[u8]) -> Result<(), SyncError> {
        for (_, handle) in self.peers.iter() {
            handle.push_reliable(Envelope {
                from,
                payload: payload.to_vec(),
            })?;
        }
        Ok(())
    }
}

/// In-process hub connecting any number of clients
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    state: Arc<Mutex<HubState>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant and return its inbox
    ///
    /// The new inbox starts with every other sender's buffered backlog.
    pub fn connect(&self, id: ParticipantId) -> Inbox {
        let (handle, inbox) = inbox();
        let mut state = self.state.lock();
        state.peers.retain(|(peer, _)| *peer != id);
        state.backlog.remove(&id);

        let mut replayed = 0;
        for (from, messages) in state.backlog.iter() {
            for payload in messages {
                if let Err(e) = handle.push_reliable(Envelope {
                    from: *from,
                    payload: payload.clone(),
                }) {
                    debug!("Backlog replay to {} failed: {}", id, e);
                }
                replayed += 1;
            }
        }

        state.peers.push((id, handle));
        info!(
            "Loopback peer {} connected ({} total, {} buffered messages replayed)",
            id,
            state.peers.len(),
            replayed
        );
        inbox
    }

    /// Remove a participant along with its buffered backlog
    pub fn disconnect(&self, id: ParticipantId) {
        let mut state = self.state.lock();
        state.peers.retain(|(peer, _)| *peer != id);
        state.backlog.remove(&id);
        info!("Loopback peer {} disconnected", id);
    }

    /// Enqueue handle of a connected participant
    pub fn handle(&self, id: ParticipantId) -> Option<InboxHandle> {
        self.state
            .lock()
            .peers
            .iter()
            .find(|(peer, _)| *peer == id)
            .map(|(_, handle)| handle.clone())
    }

    pub fn peer_count(&self) -> usize {
        self.state.lock().peers.len()
    }

    /// Number of buffered messages held for `from`
    pub fn backlog_len(&self, from: ParticipantId) -> usize {
        self.state.lock().backlog.get(&from).map_or(0, Vec::len)
    }
}

impl Transport for LoopbackHub {
    fn send_reliable(&self, from: ParticipantId, payload: Vec<u8>) -> Result<(), SyncError> {
        // Holding the lock for the whole fan-out keeps per-sender order
        self.state.lock().fan_out_reliable(from, &payload)
    }

    fn send_buffered(&self, from: ParticipantId, payload: Vec<u8>) -> Result<(), SyncError> {
        let mut state = self.state.lock();
        // Only connected senders keep a backlog; it goes away on disconnect
        if state.peers.iter().any(|(peer, _)| *peer == from) {
            state.backlog.entry(from).or_default().push(payload.clone());
        }
        state.fan_out_reliable(from, &payload)
    }

    fn send_unreliable(&self, from: ParticipantId, payload: Vec<u8>) -> Result<(), SyncError> {
        let state = self.state.lock();
        for (peer, handle) in state.peers.iter().filter(|(peer, _)| *peer != from) {
            // A vanished peer only loses this frame
            if let Err(e) = handle.push_unreliable(Envelope {
                from,
                payload: payload.clone(),
            }) {
                debug!("Dropping frame for {}: {}", peer, e);
            }
        }
        Ok(())
    }
}
