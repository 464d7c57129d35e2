//! Receiver side: sequence-gated application of remote pose frames
//!
//! Frames are converted out of the shared reference frame into the local
//! world on acceptance. Body position is smoothed per tick in [`RemotePose::advance`];
//! head rotation and hand data are applied directly.

use super::frame::{from_wire_point, from_wire_rotation, HandFrame, PoseFrame, WireVec3};
use super::space::ReferenceFrame;
use super::{IkTarget, JOINT_COUNT};
use crate::error::SyncError;
use crate::instrument::{ContinuousParams, HandSide};
use crate::session::ParticipantId;
use nalgebra::{Point3, UnitQuaternion};
use tracing::trace;

/// Fixed set of joint marker positions for one hand, updated in place
#[derive(Debug, Clone, PartialEq)]
pub struct JointMarkers {
    positions: [Point3<f32>; JOINT_COUNT],
    visible: bool,
}

impl JointMarkers {
    pub fn new() -> Self {
        Self {
            positions: [Point3::origin(); JOINT_COUNT],
            visible: false,
        }
    }

    fn show(&mut self, joints: &[WireVec3; JOINT_COUNT], reference: &ReferenceFrame) {
        for (marker, joint) in self.positions.iter_mut().zip(joints.iter()) {
            *marker = reference.to_world_point(&from_wire_point(joint));
        }
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    pub fn positions(&self) -> &[Point3<f32>; JOINT_COUNT] {
        &self.positions
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

impl Default for JointMarkers {
    fn default() -> Self {
        Self::new()
    }
}

/// One remote hand: wrist IK target plus its joint markers
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteHand {
    pub present: bool,
    pub ik_target: IkTarget,
    pub markers: JointMarkers,
}

impl RemoteHand {
    fn track(&mut self, hand: &HandFrame, reference: &ReferenceFrame) {
        self.present = true;
        self.ik_target = IkTarget::new(
            reference.to_world_point(&from_wire_point(&hand.wrist_position)),
            reference.to_world_rotation(&from_wire_rotation(&hand.wrist_rotation)),
        );
        self.markers.show(&hand.joints, reference);
    }

    fn release(&mut self, rest: IkTarget) {
        self.present = false;
        self.ik_target = rest;
        self.markers.hide();
    }
}

/// Render-side pose state of one remote participant
#[derive(Debug, Clone)]
pub struct RemotePose {
    participant: ParticipantId,
    last_sequence: Option<u64>,
    target_position: Point3<f32>,
    rendered_position: Point3<f32>,
    head_rotation: UnitQuaternion<f32>,
    body_rotation: UnitQuaternion<f32>,
    hands: [RemoteHand; 2],
    gesture: ContinuousParams,
    /// Rest IK targets relative to the avatar body
    rest: [IkTarget; 2],
}

impl RemotePose {
    pub fn new(participant: ParticipantId, rest: [IkTarget; 2]) -> Self {
        let mut pose = Self {
            participant,
            last_sequence: None,
            target_position: Point3::origin(),
            rendered_position: Point3::origin(),
            head_rotation: UnitQuaternion::identity(),
            body_rotation: UnitQuaternion::identity(),
            hands: [RemoteHand::default(), RemoteHand::default()],
            gesture: ContinuousParams::default(),
            rest,
        };
        for side in HandSide::BOTH {
            let rest = pose.rest_target(side);
            pose.hands[side.slot()].release(rest);
        }
        pose
    }

    /// Apply a received frame
    ///
    /// Frames at or below the last applied sequence are rejected with
    /// [`SyncError::StaleFrame`] and leave the state untouched. Returns
    /// whether the frame carried tracking data for either hand.
    pub fn accept(&mut self, frame: &PoseFrame, reference: &ReferenceFrame) -> Result<bool, SyncError> {
        if let Some(last) = self.last_sequence {
            if frame.sequence <= last {
                return Err(SyncError::StaleFrame {
                    participant: self.participant,
                    sequence: frame.sequence,
                    last_applied: last,
                });
            }
        }

        let position = reference.to_world_point(&from_wire_point(&frame.position));
        if self.last_sequence.is_none() {
            self.rendered_position = position;
        }
        self.target_position = position;
        self.head_rotation = reference.to_world_rotation(&from_wire_rotation(&frame.rotation));

        for side in HandSide::BOTH {
            match frame.hand(side) {
                Some(hand) => self.hands[side.slot()].track(hand, reference),
                None => {
                    let rest = self.rest_target(side);
                    self.hands[side.slot()].release(rest);
                }
            }
        }

        self.gesture = frame.gesture;
        self.last_sequence = Some(frame.sequence);
        trace!("{} applied frame {}", self.participant, frame.sequence);

        Ok(frame.hands_present())
    }

    /// Advance body smoothing and facing by one tick of `dt` seconds
    pub fn advance(&mut self, dt: f32, smoothing_rate: f32, reference: &ReferenceFrame) {
        let alpha = (smoothing_rate * dt).clamp(0.0, 1.0);
        self.rendered_position += (self.target_position - self.rendered_position) * alpha;

        if let Some(facing) = reference.facing_rotation(&self.rendered_position, &self.head_rotation) {
            self.body_rotation = facing;
        }

        // Rest targets follow the body while a hand is untracked
        for side in HandSide::BOTH {
            if !self.hands[side.slot()].present {
                self.hands[side.slot()].ik_target = self.rest_target(side);
            }
        }
    }

    pub fn set_rest(&mut self, rest: [IkTarget; 2]) {
        self.rest = rest;
    }

    fn rest_target(&self, side: HandSide) -> IkTarget {
        let rest = &self.rest[side.slot()];
        IkTarget::new(
            self.rendered_position + self.body_rotation * rest.position.coords,
            self.body_rotation * rest.rotation,
        )
    }

    pub fn participant(&self) -> ParticipantId {
        self.participant
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn rendered_position(&self) -> Point3<f32> {
        self.rendered_position
    }

    pub fn target_position(&self) -> Point3<f32> {
        self.target_position
    }

    pub fn head_rotation(&self) -> UnitQuaternion<f32> {
        self.head_rotation
    }

    pub fn body_rotation(&self) -> UnitQuaternion<f32> {
        self.body_rotation
    }

    pub fn hand(&self, side: HandSide) -> &RemoteHand {
        &self.hands[side.slot()]
    }

    pub fn hands_present(&self) -> bool {
        self.hands.iter().any(|h| h.present)
    }

    /// Continuous gesture parameters from the latest accepted frame
    pub fn gesture(&self) -> ContinuousParams {
        self.gesture
    }
}
