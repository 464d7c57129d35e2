//! Multi-client session scenarios over the loopback transport

use super::*;
use crate::config::AppConfig;
use crate::instrument::{HandSide, InstrumentMode};
use crate::pose::frame::{HandFrame, PoseFrame};
use crate::pose::{HandSample, TrackingSample};
use crate::protocol::ReliableMessage;
use crate::transport::{Envelope, LoopbackHub};
use nalgebra::{Point3, UnitQuaternion};

const ALICE: ParticipantId = ParticipantId(1);
const BOB: ParticipantId = ParticipantId(2);
const CAROL: ParticipantId = ParticipantId(3);
const DT: f32 = 1.0 / 60.0;

fn names(id: ParticipantId) -> &'static str {
    match id.0 {
        1 => "alice",
        2 => "bob",
        _ => "carol",
    }
}

fn client(hub: &LoopbackHub, id: ParticipantId, members: &[ParticipantId]) -> SyncClient<LoopbackHub> {
    let mut context = SessionContext::new(Participant::new(id, names(id)), ReferenceFrame::identity());
    for other in members.iter().filter(|m| **m != id) {
        context.join(Participant::new(*other, names(*other)));
    }
    let inbox = hub.connect(id);
    SyncClient::new(&AppConfig::default(), context, hub.clone(), inbox)
}

fn pair() -> (LoopbackHub, SyncClient<LoopbackHub>, SyncClient<LoopbackHub>) {
    let hub = LoopbackHub::new();
    let members = [ALICE, BOB];
    let a = client(&hub, ALICE, &members);
    let b = client(&hub, BOB, &members);
    (hub, a, b)
}

fn idle() -> TrackingSample {
    TrackingSample::body(Point3::new(0.0, 1.6, 1.0), UnitQuaternion::identity())
}

fn with_hands() -> TrackingSample {
    let mut sample = idle();
    sample.left = Some(HandSample {
        wrist_position: Point3::new(-0.2, 1.2, 0.8),
        wrist_rotation: UnitQuaternion::identity(),
        joints: std::array::from_fn(|i| Point3::new(-0.2, 1.2 + i as f32 * 0.005, 0.8)),
    });
    sample
}

fn raw_frame(sequence: u64, x: f32, left: bool) -> Vec<u8> {
    PoseFrame {
        sequence,
        position: [x, 1.6, 1.0],
        rotation: [0.0, 0.0, 0.0, 1.0],
        left: left.then(|| HandFrame {
            wrist_position: [0.0, 1.2, 0.8],
            wrist_rotation: [0.0, 0.0, 0.0, 1.0],
            joints: [[0.0, 1.2, 0.8]; 21],
        }),
        right: None,
        gesture: Default::default(),
    }
    .encode()
    .unwrap()
}

fn inject_frame(hub: &LoopbackHub, to: ParticipantId, from: ParticipantId, payload: Vec<u8>) {
    hub.handle(to)
        .unwrap()
        .push_unreliable(Envelope { from, payload })
        .unwrap();
}

fn inject_reliable(hub: &LoopbackHub, to: ParticipantId, from: ParticipantId, message: ReliableMessage) {
    hub.handle(to)
        .unwrap()
        .push_reliable(Envelope {
            from,
            payload: message.encode().unwrap(),
        })
        .unwrap();
}

fn mode_of(client: &SyncClient<LoopbackHub>, id: ParticipantId) -> InstrumentMode {
    client.coordinator().rig(id).unwrap().mode()
}

#[test]
fn test_mode_request_applies_through_broadcast() {
    let (_hub, mut a, mut b) = pair();

    a.request_mode(InstrumentMode::Guitar);
    assert_eq!(mode_of(&a, ALICE), InstrumentMode::Hands, "nothing changes before the tick");

    a.tick(DT, &idle());
    assert_eq!(mode_of(&a, ALICE), InstrumentMode::Guitar);
    assert_eq!(a.local_state().mode, InstrumentMode::Guitar);

    assert_eq!(mode_of(&b, ALICE), InstrumentMode::Hands);
    b.tick(DT, &idle());
    assert_eq!(mode_of(&b, ALICE), InstrumentMode::Guitar);
    assert_eq!(mode_of(&b, BOB), InstrumentMode::Hands);
}

#[test]
fn test_mode_changes_apply_in_send_order_everywhere() {
    let (_hub, mut a, mut b) = pair();

    for mode in [InstrumentMode::Drum, InstrumentMode::Keyboard, InstrumentMode::Guitar, InstrumentMode::Drum] {
        a.request_mode(mode);
    }
    a.tick(DT, &idle());
    b.tick(DT, &idle());

    assert_eq!(mode_of(&a, ALICE), InstrumentMode::Drum);
    assert_eq!(mode_of(&b, ALICE), InstrumentMode::Drum);
}

#[test]
fn test_control_events_reach_remote_rig() {
    let (_hub, mut a, mut b) = pair();
    a.request_mode(InstrumentMode::Keyboard);
    a.tick(DT, &idle());
    b.tick(DT, &idle());

    let control = a.control_sender();
    control.send("/NoteOn/1 22 100".to_string()).unwrap();
    control.send("/NoteOn/1 66 100".to_string()).unwrap();

    let stats = a.tick(DT, &idle());
    assert_eq!(stats.control_events, 2);
    assert!((a.local_state().continuous.keyboard_left - 0.5).abs() < 1e-5);
    assert!((a.local_state().continuous.keyboard_right - 0.5).abs() < 1e-5);

    b.tick(DT, &idle());
    let remote = b.remote(ALICE).unwrap();
    assert!((remote.gesture().keyboard_left - 0.5).abs() < 1e-5);

    let handlers = b.coordinator().rig(ALICE).unwrap().handlers();
    assert!(handlers.last_hit(HandSide::Left));
    assert!(handlers.last_hit(HandSide::Right));
    assert!((handlers.continuous().keyboard_right - 0.5).abs() < 1e-5);

    // The sender's own rig sees the same broadcast one tick later
    a.tick(DT, &idle());
    assert!(a.coordinator().rig(ALICE).unwrap().handlers().last_hit(HandSide::Left));
}

#[test]
fn test_malformed_control_is_counted_and_skipped() {
    let (_hub, mut a, _b) = pair();
    let control = a.control_sender();
    control.send("/NoteOn/1 22".to_string()).unwrap();
    control.send("/NoteOn/1 22 90".to_string()).unwrap();

    let stats = a.tick(DT, &idle());
    assert_eq!(stats.control_events, 1);
    assert_eq!(stats.dropped, 1);
    assert!(a.engine().notes().contains(1, 22));
}

#[test]
fn test_stale_frames_are_dropped() {
    let (hub, _a, mut b) = pair();

    inject_frame(&hub, BOB, ALICE, raw_frame(5, 1.0, false));
    let stats = b.tick(DT, &idle());
    assert_eq!(stats.frames_applied, 1);
    let target = b.remote(ALICE).unwrap().target_position();

    inject_frame(&hub, BOB, ALICE, raw_frame(4, 9.0, false));
    let stats = b.tick(DT, &idle());
    assert_eq!(stats.frames_applied, 0);
    assert_eq!(stats.dropped, 1);
    assert_eq!(b.remote(ALICE).unwrap().target_position(), target);
    assert_eq!(b.remote(ALICE).unwrap().last_sequence(), Some(5));

    inject_frame(&hub, BOB, ALICE, raw_frame(6, 2.0, false));
    b.tick(DT, &idle());
    assert_eq!(b.remote(ALICE).unwrap().last_sequence(), Some(6));
    assert_eq!(b.remote(ALICE).unwrap().target_position().x, 2.0);
}

#[test]
fn test_reordered_frames_within_one_tick() {
    let (hub, _a, mut b) = pair();
    for seq in [3, 1, 7, 2, 7] {
        inject_frame(&hub, BOB, ALICE, raw_frame(seq, seq as f32, false));
    }
    let stats = b.tick(DT, &idle());
    assert_eq!(stats.frames_applied, 2);
    assert_eq!(stats.dropped, 3);
    assert_eq!(b.remote(ALICE).unwrap().last_sequence(), Some(7));
    assert_eq!(b.remote(ALICE).unwrap().target_position().x, 7.0);
}

#[test]
fn test_hands_override_follows_presence_each_frame() {
    let (_hub, mut a, mut b) = pair();
    a.request_mode(InstrumentMode::Guitar);
    a.tick(DT, &idle());
    b.tick(DT, &idle());

    // Alice raises her hands
    a.tick(DT, &with_hands());
    let local = a.coordinator().rig(ALICE).unwrap();
    assert_eq!(local.visual().weight(InstrumentMode::Hands), 1.0);
    assert_eq!(local.visual().weight(InstrumentMode::Guitar), 0.0);

    b.tick(DT, &idle());
    let rig = b.coordinator().rig(ALICE).unwrap();
    assert_eq!(rig.mode(), InstrumentMode::Guitar);
    assert_eq!(rig.visual().weight(InstrumentMode::Hands), 1.0);
    assert_eq!(rig.visual().weight(InstrumentMode::Guitar), 0.0);
    assert!(rig.visual().prop_active(InstrumentMode::Guitar));

    let remote = b.remote(ALICE).unwrap();
    assert!(remote.hand(HandSide::Left).markers.is_visible());
    assert!(!remote.hand(HandSide::Right).markers.is_visible());

    // And lowers them again
    a.tick(DT, &idle());
    b.tick(DT, &idle());
    let rig = b.coordinator().rig(ALICE).unwrap();
    assert_eq!(rig.visual().weight(InstrumentMode::Guitar), 1.0);
    assert_eq!(rig.visual().weight(InstrumentMode::Hands), 0.0);
    assert!(!b.remote(ALICE).unwrap().hand(HandSide::Left).markers.is_visible());
}

#[test]
fn test_override_holds_while_no_new_frame_arrives() {
    let (hub, _a, mut b) = pair();
    inject_frame(&hub, BOB, ALICE, raw_frame(1, 0.0, true));
    b.tick(DT, &idle());
    assert!(b.coordinator().rig(ALICE).unwrap().visual().hands_override());

    // No frame this tick: last known presence still applies
    b.tick(DT, &idle());
    assert!(b.coordinator().rig(ALICE).unwrap().visual().hands_override());
}

#[test]
fn test_unknown_mode_index_is_ignored() {
    let (hub, _a, mut b) = pair();
    inject_reliable(&hub, BOB, ALICE, ReliableMessage::set_mode(ALICE, InstrumentMode::Drum));
    inject_reliable(&hub, BOB, ALICE, ReliableMessage::SetMode { participant: ALICE, mode: 9 });

    let stats = b.tick(DT, &idle());
    assert_eq!(stats.reliable_applied, 1);
    assert_eq!(stats.dropped, 1);
    assert_eq!(mode_of(&b, ALICE), InstrumentMode::Drum);
    assert_eq!(
        b.coordinator().rig(ALICE).unwrap().visual().weights(),
        [0.0, 0.0, 1.0, 0.0]
    );
}

#[test]
fn test_hit_for_unknown_participant_is_a_no_op() {
    let (hub, _a, mut b) = pair();
    let before = b.snapshot();
    inject_reliable(
        &hub,
        BOB,
        ALICE,
        ReliableMessage::HitEvent {
            participant: ParticipantId(99),
            side: HandSide::Left,
            state: true,
        },
    );

    let stats = b.tick(DT, &idle());
    assert_eq!(stats.dropped, 1);
    assert!(!b.coordinator().is_tracked(ParticipantId(99)));
    assert_eq!(b.snapshot().participants.len(), before.participants.len());
}

#[test]
fn test_departure_evicts_before_queued_frames() {
    let (hub, mut a, mut b) = pair();
    a.request_mode(InstrumentMode::Keyboard);
    a.tick(DT, &idle());
    b.tick(DT, &idle());
    assert!(b.remote(ALICE).is_some());

    // A frame is already in flight when the session layer reports the departure
    a.tick(DT, &idle());
    b.session_sender().send(SessionEvent::Left(ALICE)).unwrap();

    let stats = b.tick(DT, &idle());
    assert_eq!(stats.frames_applied, 0);
    assert_eq!(stats.dropped, 1);
    assert!(b.remote(ALICE).is_none());
    assert!(!b.coordinator().is_tracked(ALICE));
    assert!(!b.context().is_member(ALICE));
    assert!(b.snapshot().participant(ALICE).is_none());
}

#[test]
fn test_rejoin_starts_from_initial_state() {
    let (hub, _a, mut b) = pair();
    inject_reliable(&hub, BOB, ALICE, ReliableMessage::set_mode(ALICE, InstrumentMode::Guitar));
    inject_frame(&hub, BOB, ALICE, raw_frame(40, 1.0, false));
    b.tick(DT, &idle());

    b.session_sender().send(SessionEvent::Left(ALICE)).unwrap();
    b.tick(DT, &idle());
    b.session_sender()
        .send(SessionEvent::Joined(Participant::new(ALICE, "alice")))
        .unwrap();
    inject_frame(&hub, BOB, ALICE, raw_frame(1, 3.0, false));
    b.tick(DT, &idle());

    assert_eq!(mode_of(&b, ALICE), InstrumentMode::Hands);
    // Sequence tracking restarted, so a low sequence is accepted
    assert_eq!(b.remote(ALICE).unwrap().last_sequence(), Some(1));
}

#[test]
fn test_three_clients_agree_on_modes() {
    let hub = LoopbackHub::new();
    let members = [ALICE, BOB, CAROL];
    let mut clients: Vec<SyncClient<LoopbackHub>> =
        members.iter().map(|id| client(&hub, *id, &members)).collect();

    clients[0].request_mode(InstrumentMode::Drum);
    clients[1].request_mode(InstrumentMode::Guitar);
    clients[2].request_mode(InstrumentMode::Keyboard);
    for _ in 0..2 {
        for c in clients.iter_mut() {
            c.tick(DT, &idle());
        }
    }

    for c in &clients {
        assert_eq!(mode_of(c, ALICE), InstrumentMode::Drum);
        assert_eq!(mode_of(c, BOB), InstrumentMode::Guitar);
        assert_eq!(mode_of(c, CAROL), InstrumentMode::Keyboard);
    }
}

#[test]
fn test_late_joiner_learns_current_modes() {
    let (hub, mut a, mut b) = pair();
    a.request_mode(InstrumentMode::Drum);
    a.request_mode(InstrumentMode::Guitar);
    b.request_mode(InstrumentMode::Keyboard);
    a.tick(DT, &idle());
    b.tick(DT, &idle());
    a.tick(DT, &idle());

    // Carol connects after every switch has been applied
    let mut c = client(&hub, CAROL, &[ALICE, BOB, CAROL]);
    for existing in [&a, &b] {
        existing
            .session_sender()
            .send(SessionEvent::Joined(Participant::new(CAROL, "carol")))
            .unwrap();
    }
    for _ in 0..3 {
        a.tick(DT, &idle());
        b.tick(DT, &idle());
        c.tick(DT, &idle());
    }

    for view in [&a, &b, &c] {
        assert_eq!(mode_of(view, ALICE), InstrumentMode::Guitar);
        assert_eq!(mode_of(view, BOB), InstrumentMode::Keyboard);
        assert_eq!(mode_of(view, CAROL), InstrumentMode::Hands);
    }
    assert_eq!(c.local_state().mode, InstrumentMode::Hands);
}

#[test]
fn test_departed_participant_modes_not_replayed() {
    let (hub, mut a, mut b) = pair();
    a.request_mode(InstrumentMode::Drum);
    a.tick(DT, &idle());
    b.tick(DT, &idle());

    hub.disconnect(ALICE);
    b.session_sender().send(SessionEvent::Left(ALICE)).unwrap();
    b.tick(DT, &idle());
    drop(a);

    // Alice comes back with a fresh client and must start in Hands everywhere
    let mut a = client(&hub, ALICE, &[ALICE, BOB]);
    b.session_sender()
        .send(SessionEvent::Joined(Participant::new(ALICE, "alice")))
        .unwrap();
    a.tick(DT, &idle());
    b.tick(DT, &idle());

    assert_eq!(mode_of(&a, ALICE), InstrumentMode::Hands);
    assert_eq!(mode_of(&b, ALICE), InstrumentMode::Hands);
}

#[test]
fn test_remote_body_smooths_towards_sender() {
    let (_hub, mut a, mut b) = pair();
    a.tick(DT, &idle());
    b.tick(DT, &idle());
    let start = b.remote(ALICE).unwrap().rendered_position();
    assert!((start - Point3::new(0.0, 1.6, 1.0)).norm() < 1e-5, "first frame snaps");

    let moved = TrackingSample::body(Point3::new(1.0, 1.6, 1.0), UnitQuaternion::identity());
    a.tick(DT, &moved);
    b.tick(DT, &idle());
    let x = b.remote(ALICE).unwrap().rendered_position().x;
    assert!(x > 0.0 && x <= 1.0);
}

#[test]
fn test_reference_placement_cancels_out() {
    let hub = LoopbackHub::new();
    let members = [ALICE, BOB];
    let mut a = client(&hub, ALICE, &members);
    let mut b = client(&hub, BOB, &members);

    // Bob anchors the session two metres to the right
    b.session_sender()
        .send(SessionEvent::ReferenceMoved(ReferenceFrame::new(
            Point3::new(2.0, 0.0, 0.0),
            UnitQuaternion::identity(),
        )))
        .unwrap();
    b.tick(DT, &idle());

    a.tick(DT, &idle());
    b.tick(DT, &idle());
    let seen = b.remote(ALICE).unwrap().rendered_position();
    assert!((seen - Point3::new(2.0, 1.6, 1.0)).norm() < 1e-5);
}

#[test]
fn test_reconfigure_applies_new_thresholds() {
    let (_hub, mut a, _b) = pair();
    a.request_mode(InstrumentMode::Keyboard);
    a.tick(DT, &idle());

    let mut config = AppConfig::default();
    config.gesture.middle_note = 60;
    a.reconfigure(&config);

    a.control_sender().send("NoteOn/1 90 100".to_string()).unwrap();
    a.tick(DT, &idle());
    assert!((a.local_state().continuous.keyboard_right - 0.5).abs() < 1e-5);
}

#[test]
fn test_snapshot_serializes_to_json() {
    let (_hub, mut a, mut b) = pair();
    a.request_mode(InstrumentMode::Drum);
    a.tick(DT, &with_hands());
    b.tick(DT, &idle());

    let snapshot = b.snapshot();
    assert_eq!(snapshot.local, BOB.0);
    let alice = snapshot.participant(ALICE).unwrap();
    assert_eq!(alice.mode, InstrumentMode::Drum);
    assert!(alice.hands_override);
    assert!(alice.pose.unwrap().hands[0].present);
    assert!(snapshot.participant(BOB).unwrap().pose.is_none());

    let json = serde_json::to_string(&snapshot).unwrap();
    let back: RenderSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, snapshot);
}
