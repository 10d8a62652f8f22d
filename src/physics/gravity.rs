use nalgebra::Vector3;

use crate::dynamics::state::{EARTH_RADIUS, G0};

/// Inverse-square gravity acceleration (inertial frame, ENU).
/// `altitude` is measured above sea level.
pub fn gravity_accel(altitude: f64) -> Vector3<f64> {
    let alt = altitude.max(0.0);
    let g = G0 * (EARTH_RADIUS / (EARTH_RADIUS + alt)).powi(2);
    Vector3::new(0.0, 0.0, -g)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sea_level_gravity() {
        let g = gravity_accel(0.0);
        assert!((g.z + G0).abs() < 1e-6);
    }

    #[test]
    fn gravity_decreases_with_altitude() {
        let g0 = gravity_accel(0.0).z.abs();
        let g100k = gravity_accel(100_000.0).z.abs();
        assert!(g100k < g0);
    }

    #[test]
    fn negative_altitude_clamps_to_sea_level() {
        assert_eq!(gravity_accel(-50.0), gravity_accel(0.0));
    }
}
