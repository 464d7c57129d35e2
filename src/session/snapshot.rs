//! Serializable per-tick view handed to the render layer

use super::{ParticipantId, PlayerColor};
use crate::instrument::{HandSide, InstrumentMode, InstrumentState};
use crate::pose::frame::{to_wire_point, to_wire_rotation, WireQuat, WireVec3};
use crate::pose::{IkTarget, RemotePose};
use crate::rig::ParticipantRig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub local: u32,
    /// Authoritative state of the local participant
    pub local_state: InstrumentState,
    pub participants: Vec<ParticipantSnapshot>,
}

impl RenderSnapshot {
    pub fn participant(&self, id: ParticipantId) -> Option<&ParticipantSnapshot> {
        self.participants.iter().find(|p| p.id == id.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub id: u32,
    pub name: String,
    pub color: PlayerColor,
    pub mode: InstrumentMode,
    pub weights: [f32; 4],
    pub props: [bool; 4],
    pub hands_override: bool,
    /// Smoothed remote pose; `None` for the local participant
    pub pose: Option<PoseSnapshot>,
    /// Avatar-relative IK targets of the active instrument rig
    pub rig_targets: Option<[TargetSnapshot; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSnapshot {
    pub position: WireVec3,
    pub head_rotation: WireQuat,
    pub body_rotation: WireQuat,
    pub hands: [HandSnapshot; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HandSnapshot {
    pub present: bool,
    pub markers_visible: bool,
    pub ik_target: TargetSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub position: WireVec3,
    pub rotation: WireQuat,
}

impl From<&IkTarget> for TargetSnapshot {
    fn from(target: &IkTarget) -> Self {
        Self {
            position: to_wire_point(&target.position),
            rotation: to_wire_rotation(&target.rotation),
        }
    }
}

impl From<&RemotePose> for PoseSnapshot {
    fn from(pose: &RemotePose) -> Self {
        let hand = |side: HandSide| {
            let h = pose.hand(side);
            HandSnapshot {
                present: h.present,
                markers_visible: h.markers.is_visible(),
                ik_target: TargetSnapshot::from(&h.ik_target),
            }
        };
        Self {
            position: to_wire_point(&pose.rendered_position()),
            head_rotation: to_wire_rotation(&pose.head_rotation()),
            body_rotation: to_wire_rotation(&pose.body_rotation()),
            hands: [hand(HandSide::Left), hand(HandSide::Right)],
        }
    }
}

impl ParticipantSnapshot {
    pub(crate) fn build(
        id: ParticipantId,
        name: &str,
        color: PlayerColor,
        rig: &ParticipantRig,
        pose: Option<&RemotePose>,
    ) -> Self {
        let visual = rig.visual();
        let rig_targets = rig
            .handlers()
            .targets(visual.active_rig())
            .map(|[l, r]| [TargetSnapshot::from(&l), TargetSnapshot::from(&r)]);

        Self {
            id: id.0,
            name: name.to_string(),
            color,
            mode: rig.mode(),
            weights: visual.weights(),
            props: visual.props(),
            hands_override: visual.hands_override(),
            pose: pose.map(PoseSnapshot::from),
            rig_targets,
        }
    }
}
