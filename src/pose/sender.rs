//! Sender side: local tracking sample -> outgoing pose frame

use super::frame::{to_wire_point, to_wire_rotation, HandFrame, PoseFrame};
use super::space::ReferenceFrame;
use super::JOINT_COUNT;
use crate::instrument::ContinuousParams;
use nalgebra::{Point3, UnitQuaternion};

/// World-space hand tracking for one hand this tick
#[derive(Debug, Clone, PartialEq)]
pub struct HandSample {
    pub wrist_position: Point3<f32>,
    pub wrist_rotation: UnitQuaternion<f32>,
    pub joints: [Point3<f32>; JOINT_COUNT],
}

/// Everything the local tracker reports in one tick, in world space
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSample {
    pub position: Point3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub left: Option<HandSample>,
    pub right: Option<HandSample>,
}

impl TrackingSample {
    /// Head/body pose only, no hand tracking
    pub fn body(position: Point3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            position,
            rotation,
            left: None,
            right: None,
        }
    }

    pub fn hands_present(&self) -> bool {
        self.left.is_some() || self.right.is_some()
    }
}

impl Default for TrackingSample {
    fn default() -> Self {
        Self::body(Point3::origin(), UnitQuaternion::identity())
    }
}

/// Builds one frame per tick with a strictly increasing sequence number
#[derive(Debug, Default)]
pub struct PoseSender {
    last_sequence: u64,
}

impl PoseSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn build_frame(
        &mut self,
        reference: &ReferenceFrame,
        sample: &TrackingSample,
        gesture: ContinuousParams,
    ) -> PoseFrame {
        self.last_sequence += 1;

        let hand = |h: &HandSample| HandFrame {
            wrist_position: to_wire_point(&reference.to_relative_point(&h.wrist_position)),
            wrist_rotation: to_wire_rotation(&reference.to_relative_rotation(&h.wrist_rotation)),
            joints: std::array::from_fn(|i| to_wire_point(&reference.to_relative_point(&h.joints[i]))),
        };

        PoseFrame {
            sequence: self.last_sequence,
            position: to_wire_point(&reference.to_relative_point(&sample.position)),
            rotation: to_wire_rotation(&reference.to_relative_rotation(&sample.rotation)),
            left: sample.left.as_ref().map(hand),
            right: sample.right.as_ref().map(hand),
            gesture,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::frame::from_wire_point;

    fn sample_hand(x: f32) -> HandSample {
        HandSample {
            wrist_position: Point3::new(x, 1.0, 0.0),
            wrist_rotation: UnitQuaternion::identity(),
            joints: std::array::from_fn(|i| Point3::new(x, 1.0 + i as f32 * 0.01, 0.0)),
        }
    }

    #[test]
    fn test_sequence_strictly_increases() {
        let mut sender = PoseSender::new();
        let reference = ReferenceFrame::identity();
        let sample = TrackingSample::default();

        let seqs: Vec<u64> = (0..5)
            .map(|_| sender.build_frame(&reference, &sample, ContinuousParams::default()).sequence)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        assert_eq!(sender.last_sequence(), 5);
    }

    #[test]
    fn test_positions_are_reference_relative() {
        let mut sender = PoseSender::new();
        let reference = ReferenceFrame::new(Point3::new(10.0, 0.0, 0.0), UnitQuaternion::identity());
        let mut sample = TrackingSample::body(Point3::new(11.0, 1.6, 0.0), UnitQuaternion::identity());
        sample.right = Some(sample_hand(10.5));

        let frame = sender.build_frame(&reference, &sample, ContinuousParams::default());
        assert_eq!(frame.position, [1.0, 1.6, 0.0]);
        assert!(frame.left.is_none());

        let right = frame.right.unwrap();
        assert_eq!(right.wrist_position, [0.5, 1.0, 0.0]);
        assert!((from_wire_point(&right.joints[10]) - Point3::new(0.5, 1.1, 0.0)).norm() < 1e-5);
    }

    #[test]
    fn test_gesture_params_ride_along() {
        let mut sender = PoseSender::new();
        let gesture = ContinuousParams {
            keyboard_left: 0.25,
            keyboard_right: 0.75,
            guitar_neck: 0.5,
        };
        let frame = sender.build_frame(&ReferenceFrame::identity(), &TrackingSample::default(), gesture);
        assert_eq!(frame.gesture, gesture);
    }
}
