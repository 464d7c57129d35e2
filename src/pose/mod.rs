//! Pose synchronization
//!
//! Each tick the local participant's head and hand pose is expressed
//! relative to the shared reference frame and broadcast unreliably as a
//! [`PoseFrame`]. Receivers keep one [`RemotePose`] per remote participant,
//! drop stale frames by sequence number, and smooth the body towards the
//! latest accepted position.

pub mod frame;
pub mod receiver;
pub mod sender;
pub mod space;

pub use frame::{HandFrame, PoseFrame};
pub use receiver::{JointMarkers, RemoteHand, RemotePose};
pub use sender::{HandSample, PoseSender, TrackingSample};
pub use space::ReferenceFrame;

use nalgebra::{Point3, UnitQuaternion};

/// Number of tracked joints per hand
pub const JOINT_COUNT: usize = 21;

/// Position and rotation an IK solver drives a wrist towards
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkTarget {
    pub position: Point3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl IkTarget {
    pub fn new(position: Point3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self { position, rotation }
    }
}

impl Default for IkTarget {
    fn default() -> Self {
        Self::new(Point3::origin(), UnitQuaternion::identity())
    }
}
