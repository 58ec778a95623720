//! Camera sweep and field-of-view geometry
//!
//! Angles are in degrees, 0 pointing along +x and 90 along +y (screen down),
//! matching the facing table in the layout catalogue.

use super::layout::Position;
use super::state::Camera;

/// Extra half-angle, in degrees, of the near-miss band beyond the FOV edge
pub const NEAR_MISS_EXTRA_HALF_ANGLE: f64 = 15.0;
/// Extra range of the near-miss band
pub const NEAR_MISS_EXTRA_RANGE: f64 = 1.0;
/// Rotation speed ceiling reached through escalation
pub const MAX_ROTATION_SPEED: f64 = 60.0;

/// Wrap an angle into [0, 360)
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Smallest absolute difference between two angles, in [0, 180]
pub fn angle_between(a: f64, b: f64) -> f64 {
    let diff = (normalize_degrees(a) - normalize_degrees(b)).abs();
    if diff > 180.0 {
        360.0 - diff
    } else {
        diff
    }
}

/// Distance and bearing from the camera to a cell. `None` when the target
/// sits on the camera itself.
fn offset(camera: &Camera, target: Position) -> Option<(f64, f64)> {
    let dx = f64::from(target.x - camera.position.x);
    let dy = f64::from(target.y - camera.position.y);
    let distance = dx.hypot(dy);
    if distance == 0.0 {
        return None;
    }
    let bearing = normalize_degrees(dy.atan2(dx).to_degrees());
    Some((distance, bearing))
}

/// Whether the target lies inside the camera's detection cone
pub fn in_fov(camera: &Camera, target: Position) -> bool {
    let Some((distance, bearing)) = offset(camera, target) else {
        return false;
    };
    if distance > camera.fov_range {
        return false;
    }
    angle_between(camera.facing_degrees(), bearing) <= camera.fov_angle / 2.0
}

/// Whether the target lies in the band just outside the detection cone:
/// one cell of extra range and 15 degrees of extra half-angle, minus the
/// cone itself.
pub fn in_near_miss_band(camera: &Camera, target: Position) -> bool {
    let Some((distance, bearing)) = offset(camera, target) else {
        return false;
    };
    if distance > camera.fov_range + NEAR_MISS_EXTRA_RANGE {
        return false;
    }
    let half = camera.fov_angle / 2.0;
    let diff = angle_between(camera.facing_degrees(), bearing);
    if diff > half + NEAR_MISS_EXTRA_HALF_ANGLE {
        return false;
    }
    // Exclude the detection cone proper
    !(diff <= half && distance <= camera.fov_range)
}

/// Advance a rotating camera by one step, bouncing off its sweep bounds
pub fn sweep(camera: &mut Camera, step_secs: f64) {
    if !camera.rotates || camera.rotation_speed <= 0.0 {
        return;
    }

    camera.angle += camera.rotation_speed * f64::from(camera.rotation_direction) * step_secs;

    if camera.angle >= camera.max_angle {
        camera.angle = camera.max_angle;
        camera.rotation_direction = -1;
    } else if camera.angle <= camera.min_angle {
        camera.angle = camera.min_angle;
        camera.rotation_direction = 1;
    }
}

/// Speed a rotating camera up by a factor, capped
pub fn escalate(camera: &mut Camera, factor: f64) {
    if camera.rotates {
        camera.rotation_speed = (camera.rotation_speed * factor).min(MAX_ROTATION_SPEED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::layout::Facing;

    fn camera_at(x: i32, y: i32, facing: Facing, rotates: bool) -> Camera {
        let base = facing.degrees();
        Camera {
            id: 0,
            position: Position::new(x, y),
            facing,
            rotates,
            angle: base,
            fov_angle: 60.0,
            fov_range: 4.0,
            rotation_speed: if rotates { 25.0 } else { 0.0 },
            rotation_direction: 1,
            min_angle: base - 45.0,
            max_angle: base + 45.0,
            disabled: false,
            disabled_until: 0,
        }
    }

    #[test]
    fn normalizes_into_range() {
        assert_eq!(normalize_degrees(-45.0), 315.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
        assert_eq!(angle_between(350.0, 10.0), 20.0);
        assert_eq!(angle_between(-10.0, 10.0), 20.0);
    }

    #[test]
    fn detects_straight_ahead_within_range() {
        let cam = camera_at(5, 5, Facing::Down, false);
        assert!(in_fov(&cam, Position::new(5, 7)));
        assert!(in_fov(&cam, Position::new(5, 9)));
        assert!(!in_fov(&cam, Position::new(5, 10)));
        // Behind the camera
        assert!(!in_fov(&cam, Position::new(5, 3)));
    }

    #[test]
    fn own_cell_is_never_detected() {
        let cam = camera_at(5, 5, Facing::Right, false);
        assert!(!in_fov(&cam, Position::new(5, 5)));
        assert!(!in_near_miss_band(&cam, Position::new(5, 5)));
    }

    #[test]
    fn cone_edge_is_inclusive() {
        // 60 degree cone facing right; (2, 1) sits at ~26.6 degrees, (1, 1) at 45
        let cam = camera_at(0, 0, Facing::Right, false);
        assert!(in_fov(&cam, Position::new(2, 1)));
        assert!(!in_fov(&cam, Position::new(1, 1)));
    }

    #[test]
    fn near_miss_band_excludes_the_cone() {
        let cam = camera_at(0, 0, Facing::Right, false);
        // ~33.7 degrees: outside the 30 degree half-angle, inside 45
        assert!(in_near_miss_band(&cam, Position::new(3, 2)));
        // One past the range, dead ahead
        assert!(in_near_miss_band(&cam, Position::new(5, 0)));
        // Inside the cone is not a near miss
        assert!(!in_near_miss_band(&cam, Position::new(2, 0)));
        // Too far
        assert!(!in_near_miss_band(&cam, Position::new(6, 0)));
        // Too wide
        assert!(!in_near_miss_band(&cam, Position::new(0, 2)));
    }

    #[test]
    fn sweep_bounces_between_bounds() {
        let mut cam = camera_at(0, 0, Facing::Down, true);
        for _ in 0..8 {
            sweep(&mut cam, 0.5);
        }
        // 8 * 12.5 = 100 > 45, so it hit the max and turned around
        assert_eq!(cam.rotation_direction, -1);
        assert!(cam.angle <= cam.max_angle);
        for _ in 0..20 {
            sweep(&mut cam, 0.5);
            assert!(cam.angle >= cam.min_angle && cam.angle <= cam.max_angle);
        }
    }

    #[test]
    fn right_facing_sweep_crosses_zero_cleanly() {
        let mut cam = camera_at(0, 0, Facing::Right, true);
        cam.rotation_direction = -1;
        for _ in 0..3 {
            sweep(&mut cam, 0.5);
        }
        assert_eq!(cam.angle, -37.5);
        assert_eq!(cam.facing_degrees(), 322.5);
        assert!(in_fov(&cam, Position::new(3, -2)));
    }

    #[test]
    fn fixed_cameras_do_not_move() {
        let mut cam = camera_at(0, 0, Facing::Left, false);
        sweep(&mut cam, 0.5);
        escalate(&mut cam, 1.05);
        assert_eq!(cam.angle, 180.0);
        assert_eq!(cam.rotation_speed, 0.0);
    }

    #[test]
    fn escalation_is_capped() {
        let mut cam = camera_at(0, 0, Facing::Left, true);
        cam.rotation_speed = 59.0;
        escalate(&mut cam, 1.05);
        assert_eq!(cam.rotation_speed, MAX_ROTATION_SPEED);
    }
}
