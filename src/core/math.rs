//! Vector helpers shared by the simulator and the arena.
//!
//! Conventions: Y is world up, the ground is the XZ plane, and a character's
//! forward axis is local +Z.

use glam::{Mat3, Quat, Vec2, Vec3};

/// Lengths below this are treated as zero.
pub const DIRECTION_EPSILON: f32 = 1e-4;

/// Linear interpolation between two scalars, `t` clamped to [0, 1].
#[inline]
pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t.clamp(0.0, 1.0)
}

/// Frame-rate independent smoothing weight for a step of `dt` seconds.
///
/// Applying `1 - exp(-k * dt)` repeatedly converges at the same rate whatever
/// the step size, so two ticks of `dt` equal one tick of `2 * dt`.
#[inline]
pub fn smoothing_factor(sharpness: f32, dt: f32) -> f32 {
    1.0 - (-sharpness.max(0.0) * dt.max(0.0)).exp()
}

/// Shear-free scale along a single axis.
///
/// Returns `I + (squeeze - 1) * (up ⊗ up)`. Any vector orthogonal to `up` is
/// left unchanged and the `up` component is multiplied by `squeeze`, whatever
/// the orientation of `up`.
pub fn squeeze_matrix(up: Vec3, squeeze: f32) -> Mat3 {
    let up = up.normalize_or_zero();
    if up == Vec3::ZERO {
        return Mat3::IDENTITY;
    }
    let k = squeeze - 1.0;
    // Columns of the outer product up ⊗ up are up * up[i].
    let outer = Mat3::from_cols(up * up.x, up * up.y, up * up.z);
    Mat3::IDENTITY + outer * k
}

/// Map a 2D move axis onto the ground plane.
///
/// With no facing hint, x maps to world X and y to world Z. With a hint, the
/// axis is rotated by the hint's yaw so "forward" follows the camera.
pub fn planar_direction(axis: Vec2, facing_hint: Vec3) -> Vec3 {
    let axis = axis.clamp_length_max(1.0);
    let local = Vec3::new(axis.x, 0.0, axis.y);
    let forward = Vec3::new(facing_hint.x, 0.0, facing_hint.z);
    if forward.length_squared() < DIRECTION_EPSILON * DIRECTION_EPSILON {
        return local;
    }
    yaw_rotation(forward) * local
}

/// Rotation about world Y that turns local +Z toward `direction` (projected
/// onto the ground plane). Identity for a zero direction.
pub fn yaw_rotation(direction: Vec3) -> Quat {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() < DIRECTION_EPSILON * DIRECTION_EPSILON {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_y(flat.x.atan2(flat.z))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_vec(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn test_lerp_clamps() {
        assert_eq!(lerp(1.0, 0.5, 0.0), 1.0);
        assert_eq!(lerp(1.0, 0.5, 1.0), 0.5);
        assert_eq!(lerp(1.0, 0.5, 2.0), 0.5);
        assert_eq!(lerp(0.0, 10.0, 0.5), 5.0);
    }

    #[test]
    fn test_smoothing_is_step_independent() {
        let k = 10.0;
        let one_step = smoothing_factor(k, 0.1);
        let half = smoothing_factor(k, 0.05);
        let two_steps = 1.0 - (1.0 - half) * (1.0 - half);
        assert!((one_step - two_steps).abs() < 1e-6);
    }

    #[test]
    fn test_squeeze_upright_only_scales_y() {
        let m = squeeze_matrix(Vec3::Y, 0.5);
        assert!(approx_vec(m * Vec3::X, Vec3::X));
        assert!(approx_vec(m * Vec3::Z, Vec3::Z));
        assert!(approx_vec(m * Vec3::Y, Vec3::Y * 0.5));
    }

    #[test]
    fn test_squeeze_tilted_axis_is_shear_free() {
        let up = Vec3::new(1.0, 1.0, 0.0).normalize();
        let m = squeeze_matrix(up, 0.25);
        let side = Vec3::new(1.0, -1.0, 0.0).normalize();
        assert!(approx_vec(m * side, side));
        assert!(approx_vec(m * Vec3::Z, Vec3::Z));
        assert!(approx_vec(m * up, up * 0.25));
        // Symmetric matrix: no shear component.
        assert!((m - m.transpose()).abs_diff_eq(Mat3::ZERO, 1e-6));
    }

    #[test]
    fn test_squeeze_one_is_identity() {
        let m = squeeze_matrix(Vec3::new(0.3, 0.9, 0.1), 1.0);
        assert!(m.abs_diff_eq(Mat3::IDENTITY, 1e-6));
    }

    #[test]
    fn test_planar_direction_without_hint() {
        let dir = planar_direction(Vec2::new(1.0, 0.0), Vec3::ZERO);
        assert!(approx_vec(dir, Vec3::X));
        let dir = planar_direction(Vec2::new(0.0, 1.0), Vec3::ZERO);
        assert!(approx_vec(dir, Vec3::Z));
    }

    #[test]
    fn test_planar_direction_follows_facing() {
        // Camera looking down +X: "forward" on the stick becomes +X.
        let dir = planar_direction(Vec2::new(0.0, 1.0), Vec3::X);
        assert!(approx_vec(dir, Vec3::X));
    }

    #[test]
    fn test_planar_direction_clamps_magnitude() {
        let dir = planar_direction(Vec2::new(3.0, 4.0), Vec3::ZERO);
        assert!((dir.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_yaw_rotation_points_forward() {
        let q = yaw_rotation(Vec3::new(-1.0, 5.0, 0.0));
        assert!(approx_vec(q * Vec3::Z, -Vec3::X));
        assert_eq!(yaw_rotation(Vec3::Y), Quat::IDENTITY);
    }
}
