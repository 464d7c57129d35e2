//! Per-tick pose frame wire format
//!
//! Field order is fixed:
//!
//! ```text
//! sequence:u64  position:vec3  rotation:quat
//! leftPresent:u8  [wristPos:vec3 wristRot:quat joints:21×vec3]
//! rightPresent:u8 [same]
//! keyboardLeft:f32 keyboardRight:f32 guitarNeck:f32
//! ```
//!
//! All vectors are reference-relative. Quaternions are `[x, y, z, w]`.
//! Encoding is bincode's fixed-width little-endian layout, where an
//! optional section is a one-byte presence flag followed by its fields.

use super::JOINT_COUNT;
use crate::error::SyncError;
use crate::instrument::{ContinuousParams, HandSide};
use nalgebra::{Point3, Quaternion, UnitQuaternion};
use serde::{Deserialize, Serialize};

pub type WireVec3 = [f32; 3];
pub type WireQuat = [f32; 4];

/// Encoded size of a frame with no hand sections
pub const BASE_FRAME_LEN: usize = 8 + 12 + 16 + 1 + 1 + 12;

/// Encoded size of one hand section
pub const HAND_SECTION_LEN: usize = 12 + 16 + JOINT_COUNT * 12;

/// Wrist pose plus all joints of one tracked hand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandFrame {
    pub wrist_position: WireVec3,
    pub wrist_rotation: WireQuat,
    pub joints: [WireVec3; JOINT_COUNT],
}

/// One tick of pose data for one participant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    pub sequence: u64,
    pub position: WireVec3,
    pub rotation: WireQuat,
    pub left: Option<HandFrame>,
    pub right: Option<HandFrame>,
    pub gesture: ContinuousParams,
}

impl PoseFrame {
    pub fn hand(&self, side: HandSide) -> Option<&HandFrame> {
        match side {
            HandSide::Left => self.left.as_ref(),
            HandSide::Right => self.right.as_ref(),
        }
    }

    /// True when either hand carries tracking data
    pub fn hands_present(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }

    pub fn encode(&self) -> Result<Vec<u8>, SyncError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a frame, rejecting truncated data and non-finite values
    pub fn decode(bytes: &[u8]) -> Result<Self, SyncError> {
        let frame: PoseFrame = bincode::deserialize(bytes)?;
        if !frame.is_finite() {
            return Err(SyncError::Wire(Box::new(bincode::ErrorKind::Custom(
                "pose frame contains non-finite values".to_string(),
            ))));
        }
        Ok(frame)
    }

    fn is_finite(&self) -> bool {
        let hand_ok = |hand: &Option<HandFrame>| match hand {
            Some(h) => {
                finite(&h.wrist_position)
                    && finite(&h.wrist_rotation)
                    && h.joints.iter().all(|j| finite(j))
            }
            None => true,
        };
        let g = &self.gesture;
        finite(&self.position)
            && finite(&self.rotation)
            && hand_ok(&self.left)
            && hand_ok(&self.right)
            && finite(&[g.keyboard_left, g.keyboard_right, g.guitar_neck])
    }
}

fn finite(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

pub fn to_wire_point(p: &Point3<f32>) -> WireVec3 {
    [p.x, p.y, p.z]
}

pub fn from_wire_point(v: &WireVec3) -> Point3<f32> {
    Point3::new(v[0], v[1], v[2])
}

pub fn to_wire_rotation(q: &UnitQuaternion<f32>) -> WireQuat {
    [q.i, q.j, q.k, q.w]
}

/// Wire quaternion to a unit rotation; degenerate input becomes identity
pub fn from_wire_rotation(q: &WireQuat) -> UnitQuaternion<f32> {
    UnitQuaternion::try_new(Quaternion::new(q[3], q[0], q[1], q[2]), 1e-6)
        .unwrap_or_else(UnitQuaternion::identity)
}
