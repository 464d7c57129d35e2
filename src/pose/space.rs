//! Shared reference frame
//!
//! Every client places the session anchor somewhere in its own world.
//! Poses travel relative to that anchor so per-client placement cancels out.

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

/// Anchor transform that all participants express poses against
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceFrame {
    anchor: Isometry3<f32>,
}

impl ReferenceFrame {
    pub fn new(position: Point3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            anchor: Isometry3::from_parts(Translation3::from(position.coords), rotation),
        }
    }

    pub fn identity() -> Self {
        Self { anchor: Isometry3::identity() }
    }

    /// Anchor position in world space
    pub fn origin(&self) -> Point3<f32> {
        Point3::from(self.anchor.translation.vector)
    }

    pub fn rotation(&self) -> UnitQuaternion<f32> {
        self.anchor.rotation
    }

    pub fn to_relative_point(&self, world: &Point3<f32>) -> Point3<f32> {
        self.anchor.inverse_transform_point(world)
    }

    pub fn to_relative_rotation(&self, world: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
        self.anchor.rotation.inverse() * world
    }

    pub fn to_world_point(&self, relative: &Point3<f32>) -> Point3<f32> {
        self.anchor.transform_point(relative)
    }

    pub fn to_world_rotation(&self, relative: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
        self.anchor.rotation * relative
    }

    /// Body yaw for an avatar at `position` whose head looks along `head`
    ///
    /// The body faces along the horizontal line through the anchor: towards
    /// it when the head points to the anchor side, away from it otherwise.
    /// Returns `None` when the avatar stands on the anchor's vertical axis.
    pub fn facing_rotation(
        &self,
        position: &Point3<f32>,
        head: &UnitQuaternion<f32>,
    ) -> Option<UnitQuaternion<f32>> {
        let mut to_center = position - self.origin();
        to_center.y = 0.0;
        let to_center = to_center.try_normalize(1e-6)?;

        let mut forward = head * Vector3::z();
        forward.y = 0.0;

        let dir = if forward.dot(&to_center) > 0.0 { to_center } else { -to_center };
        Some(UnitQuaternion::face_towards(&dir, &Vector3::y()))
    }
}

impl Default for ReferenceFrame {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn assert_point_eq(a: Point3<f32>, b: Point3<f32>) {
        assert!((a - b).norm() < 1e-5, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_point_round_trip() {
        let frame = ReferenceFrame::new(
            Point3::new(2.0, 0.0, -1.0),
            UnitQuaternion::from_euler_angles(0.0, FRAC_PI_2, 0.0),
        );
        let world = Point3::new(3.0, 1.5, 4.0);
        let relative = frame.to_relative_point(&world);
        assert_point_eq(frame.to_world_point(&relative), world);
    }

    #[test]
    fn test_relative_pose_is_placement_independent() {
        // Two clients anchor the session differently; the same relative pose
        // lands at the same spot relative to each anchor.
        let a = ReferenceFrame::new(Point3::new(1.0, 0.0, 0.0), UnitQuaternion::identity());
        let b = ReferenceFrame::new(
            Point3::new(-5.0, 2.0, 3.0),
            UnitQuaternion::from_euler_angles(0.0, 1.0, 0.0),
        );

        let world_a = Point3::new(1.5, 1.0, 2.0);
        let relative = a.to_relative_point(&world_a);
        let world_b = b.to_world_point(&relative);

        assert_point_eq(b.to_relative_point(&world_b), relative);
        assert!(((world_b - b.origin()).norm() - (world_a - a.origin()).norm()).abs() < 1e-5);
    }

    #[test]
    fn test_rotation_round_trip() {
        let frame = ReferenceFrame::new(Point3::origin(), UnitQuaternion::from_euler_angles(0.3, 0.2, 0.1));
        let world = UnitQuaternion::from_euler_angles(0.0, 1.0, 0.0);
        let back = frame.to_world_rotation(&frame.to_relative_rotation(&world));
        assert!(back.angle_to(&world) < 1e-5);
    }

    #[test]
    fn test_facing_towards_and_away_from_anchor() {
        let frame = ReferenceFrame::identity();
        let position = Point3::new(0.0, 1.6, 2.0);

        // Head looks along +z, same side as the anchor-to-avatar direction
        let facing = frame
            .facing_rotation(&position, &UnitQuaternion::identity())
            .unwrap();
        assert!(((facing * Vector3::z()) - Vector3::z()).norm() < 1e-5);

        // Head turned around -> body faces the other way
        let turned = UnitQuaternion::from_euler_angles(0.0, std::f32::consts::PI, 0.0);
        let facing = frame.facing_rotation(&position, &turned).unwrap();
        assert!(((facing * Vector3::z()) + Vector3::z()).norm() < 1e-5);
    }

    #[test]
    fn test_facing_undefined_on_anchor_axis() {
        let frame = ReferenceFrame::identity();
        assert!(frame
            .facing_rotation(&Point3::new(0.0, 3.0, 0.0), &UnitQuaternion::identity())
            .is_none());
    }
}
