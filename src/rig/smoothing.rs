//! Critically damped spring used for IK target travel

use nalgebra::{Point3, Vector3};

/// Move `current` towards `target`, reaching it in roughly `smooth_time` seconds
///
/// `velocity` carries state between calls. The result never overshoots the
/// target.
pub fn smooth_damp(
    current: Point3<f32>,
    target: Point3<f32>,
    velocity: &mut Vector3<f32>,
    smooth_time: f32,
    dt: f32,
) -> Point3<f32> {
    if dt <= 0.0 {
        return current;
    }

    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let exp = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + change * omega) * dt;
    *velocity = (*velocity - temp * omega) * exp;
    let output = target + (change + temp) * exp;

    // Overshoot: clamp to the target and stop
    if (target - current).dot(&(output - target)) > 0.0 {
        *velocity = Vector3::zeros();
        return target;
    }
    output
}
