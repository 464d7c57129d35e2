//! One client's view of the session, driven by a fixed per-tick step
//!
//! All inbound traffic is queued by its producer and drained only inside
//! [`SyncClient::tick`], in this order:
//!
//! 1. session membership events (evictions land before any message)
//! 2. local mode requests, sent out as buffered reliable `SetMode` broadcasts
//! 3. reliable messages -> coordinator
//! 4. unreliable pose frames -> remote poses and hands presence
//! 5. control events -> gesture engine, discrete edges sent reliably
//! 6. hands override, smoothing and rig animation
//! 7. the local pose frame for this tick

use super::snapshot::{ParticipantSnapshot, RenderSnapshot};
use super::{ParticipantId, SessionContext, SessionEvent};
use crate::config::{AppConfig, PoseConfig};
use crate::error::SyncError;
use crate::gesture::GestureDerivationEngine;
use crate::instrument::{DiscreteEdge, InstrumentMode, InstrumentState};
use crate::pose::{IkTarget, PoseFrame, PoseSender, ReferenceFrame, RemotePose, TrackingSample};
use crate::protocol::ReliableMessage;
use crate::rig::InstrumentModeCoordinator;
use crate::transport::{Envelope, Inbox, Transport};
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::collections::BTreeMap;
use tracing::{debug, info, trace, warn};

/// Request from the local user interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalCommand {
    SetMode(InstrumentMode),
}

/// Counters for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickStats {
    pub reliable_applied: usize,
    pub frames_applied: usize,
    pub control_events: usize,
    /// Inputs rejected and absorbed this tick
    pub dropped: usize,
}

/// Sync core of one client: gesture engine, pose channel and rig coordinator
pub struct SyncClient<T: Transport> {
    context: SessionContext,
    pose_config: PoseConfig,
    engine: GestureDerivationEngine,
    sender: PoseSender,
    remotes: BTreeMap<ParticipantId, RemotePose>,
    coordinator: InstrumentModeCoordinator,
    transport: T,
    inbox: Inbox,
    control_tx: Sender<String>,
    control_rx: Receiver<String>,
    command_tx: Sender<LocalCommand>,
    command_rx: Receiver<LocalCommand>,
    session_tx: Sender<SessionEvent>,
    session_rx: Receiver<SessionEvent>,
}

impl<T: Transport> SyncClient<T> {
    pub fn new(config: &AppConfig, context: SessionContext, transport: T, inbox: Inbox) -> Self {
        let (control_tx, control_rx) = unbounded();
        let (command_tx, command_rx) = unbounded();
        let (session_tx, session_rx) = unbounded();

        let mut client = Self {
            context,
            pose_config: config.pose.clone(),
            engine: GestureDerivationEngine::new(config.gesture),
            sender: PoseSender::new(),
            remotes: BTreeMap::new(),
            coordinator: InstrumentModeCoordinator::new(config.rig.clone()),
            transport,
            inbox,
            control_tx,
            control_rx,
            command_tx,
            command_rx,
            session_tx,
            session_rx,
        };

        let members: Vec<ParticipantId> = client.context.participants().map(|p| p.id).collect();
        for id in members {
            client.add_member(id);
        }
        client
    }

    /// Queue for raw control-event strings from the bridge
    pub fn control_sender(&self) -> Sender<String> {
        self.control_tx.clone()
    }

    /// Queue for local user commands
    pub fn command_sender(&self) -> Sender<LocalCommand> {
        self.command_tx.clone()
    }

    /// Queue for membership events from the session layer
    pub fn session_sender(&self) -> Sender<SessionEvent> {
        self.session_tx.clone()
    }

    /// Ask for a mode change; it takes effect when the broadcast comes back
    pub fn request_mode(&self, mode: InstrumentMode) {
        // The receiver lives in self, so the queue cannot be disconnected
        let _ = self.command_tx.send(LocalCommand::SetMode(mode));
    }

    pub fn local_id(&self) -> ParticipantId {
        self.context.local_id()
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn engine(&self) -> &GestureDerivationEngine {
        &self.engine
    }

    pub fn coordinator(&self) -> &InstrumentModeCoordinator {
        &self.coordinator
    }

    pub fn remote(&self, id: ParticipantId) -> Option<&RemotePose> {
        self.remotes.get(&id)
    }

    pub fn local_state(&self) -> &InstrumentState {
        self.engine.state()
    }

    /// Run one simulation tick of `dt` seconds with this tick's local tracking
    pub fn tick(&mut self, dt: f32, sample: &TrackingSample) -> TickStats {
        let mut stats = TickStats::default();
        let local = self.context.local_id();

        self.drain_session_events();
        self.drain_local_commands();
        self.drain_reliable(&mut stats);
        self.drain_frames(&mut stats);
        self.drain_control(&mut stats);

        self.coordinator.set_continuous(local, self.engine.state().continuous);
        self.coordinator.set_hands_present(local, sample.hands_present());
        self.coordinator.refresh_overrides();

        let reference = *self.context.reference();
        for remote in self.remotes.values_mut() {
            remote.advance(dt, self.pose_config.smoothing_rate, &reference);
        }
        self.coordinator.advance(dt);

        self.send_frame(sample);
        trace!("Tick {:?}", stats);
        stats
    }

    /// Apply reloaded configuration at a tick boundary
    pub fn reconfigure(&mut self, config: &AppConfig) {
        self.engine.reconfigure(config.gesture);
        self.pose_config = config.pose.clone();
        let rest = rest_targets(&self.pose_config);
        for remote in self.remotes.values_mut() {
            remote.set_rest(rest);
        }
        self.coordinator.reconfigure(config.rig.clone());
        info!("✅ Applied reloaded configuration");
    }

    pub fn snapshot(&self) -> RenderSnapshot {
        let participants = self
            .context
            .participants()
            .filter_map(|p| {
                let rig = self.coordinator.rig(p.id)?;
                Some(ParticipantSnapshot::build(
                    p.id,
                    &p.display_name,
                    p.color,
                    rig,
                    self.remotes.get(&p.id),
                ))
            })
            .collect();

        RenderSnapshot {
            local: self.context.local_id().0,
            local_state: *self.engine.state(),
            participants,
        }
    }

    fn add_member(&mut self, id: ParticipantId) {
        self.coordinator.track(id);
        if id != self.context.local_id() {
            let rest = rest_targets(&self.pose_config);
            self.remotes.entry(id).or_insert_with(|| RemotePose::new(id, rest));
        }
    }

    fn drain_session_events(&mut self) {
        while let Ok(event) = self.session_rx.try_recv() {
            match event {
                SessionEvent::Joined(participant) => {
                    let id = participant.id;
                    info!("👋 {} ({}) joined", participant.display_name, id);
                    self.context.join(participant);
                    self.add_member(id);
                }
                SessionEvent::Left(id) => {
                    if self.context.leave(id).is_some() {
                        self.coordinator.evict(id);
                        self.remotes.remove(&id);
                        info!("{} left, state evicted", id);
                    } else {
                        debug!("Ignoring departure of non-member {}", id);
                    }
                }
                SessionEvent::ReferenceMoved(reference) => {
                    debug!("Shared reference frame moved");
                    self.context.set_reference(reference);
                }
            }
        }
    }

    fn drain_local_commands(&mut self) {
        let local = self.context.local_id();
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                LocalCommand::SetMode(mode) => {
                    debug!("Requesting mode {}", mode);
                    self.broadcast(ReliableMessage::set_mode(local, mode));
                }
            }
        }
    }

    fn drain_reliable(&mut self, stats: &mut TickStats) {
        let local = self.context.local_id();
        let envelopes: Vec<Envelope> = self.inbox.drain_reliable().collect();
        for envelope in envelopes {
            let result = ReliableMessage::decode(&envelope.payload).and_then(|message| {
                self.coordinator.apply(&message)?;
                Ok(message)
            });
            match result {
                Ok(message) => {
                    stats.reliable_applied += 1;
                    // The engine derives for whatever mode the broadcast settled on
                    if let ReliableMessage::SetMode { participant, mode } = message {
                        if participant == local {
                            if let Some(mode) = InstrumentMode::from_index(mode) {
                                self.engine.set_mode(mode);
                            }
                        }
                    }
                }
                Err(e) => {
                    stats.dropped += 1;
                    debug!("Dropping reliable message from {}: {}", envelope.from, e);
                }
            }
        }
    }

    fn drain_frames(&mut self, stats: &mut TickStats) {
        let local = self.context.local_id();
        let reference = *self.context.reference();
        let envelopes: Vec<Envelope> = self.inbox.drain_unreliable().collect();
        for envelope in envelopes {
            if envelope.from == local {
                continue;
            }
            let result = self.accept_frame(&envelope, &reference);
            match result {
                Ok(()) => stats.frames_applied += 1,
                Err(e) => {
                    stats.dropped += 1;
                    debug!("Dropping pose frame: {}", e);
                }
            }
        }
    }

    fn accept_frame(&mut self, envelope: &Envelope, reference: &ReferenceFrame) -> Result<(), SyncError> {
        let remote = self
            .remotes
            .get_mut(&envelope.from)
            .ok_or(SyncError::UnknownParticipant(envelope.from))?;
        let frame = PoseFrame::decode(&envelope.payload)?;
        let present = remote.accept(&frame, reference)?;
        self.coordinator.set_hands_present(envelope.from, present);
        self.coordinator.set_continuous(envelope.from, frame.gesture);
        Ok(())
    }

    fn drain_control(&mut self, stats: &mut TickStats) {
        while let Ok(raw) = self.control_rx.try_recv() {
            match self.engine.apply_text(&raw) {
                Ok(_) => stats.control_events += 1,
                Err(_) => stats.dropped += 1,
            }
        }

        let local = self.context.local_id();
        for edge in self.engine.take_edges() {
            let message = match edge {
                DiscreteEdge::Hit { side, state } => ReliableMessage::HitEvent {
                    participant: local,
                    side,
                    state,
                },
                DiscreteEdge::Strum { state } => ReliableMessage::StrumEvent {
                    participant: local,
                    state,
                },
            };
            self.broadcast(message);
        }
    }

    fn send_frame(&mut self, sample: &TrackingSample) {
        let frame = self
            .sender
            .build_frame(self.context.reference(), sample, self.engine.state().continuous);
        let sent = frame
            .encode()
            .and_then(|bytes| self.transport.send_unreliable(self.context.local_id(), bytes));
        if let Err(e) = sent {
            warn!("Failed to send pose frame {}: {}", frame.sequence, e);
        }
    }

    /// Send a reliable message; mode changes are buffered for late joiners
    fn broadcast(&self, message: ReliableMessage) {
        let local = self.context.local_id();
        let sent = message.encode().and_then(|bytes| match message {
            ReliableMessage::SetMode { .. } => self.transport.send_buffered(local, bytes),
            _ => self.transport.send_reliable(local, bytes),
        });
        if let Err(e) = sent {
            warn!("Failed to send {:?}: {}", message, e);
        }
    }
}

fn rest_targets(config: &PoseConfig) -> [IkTarget; 2] {
    [
        IkTarget::new(config.left_rest.point(), config.left_rest.rotation()),
        IkTarget::new(config.right_rest.point(), config.right_rest.rotation()),
    ]
}
