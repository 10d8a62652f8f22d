use nalgebra::Vector3;

use crate::physics::atmosphere::Atmo;

/// Below this airspeed aerodynamic moments are ignored, m/s.
const MIN_MOMENT_SPEED: f64 = 1.0;
const MIN_AIRFLOW_SPEED: f64 = 1e-6;

/// Dynamic pressure, Pa.
pub fn dynamic_pressure(atm: &Atmo, speed: f64) -> f64 {
    0.5 * atm.density * speed * speed
}

/// Compute aerodynamic drag force (inertial frame, opposing velocity).
/// `cd_area` is the drag coefficient already multiplied by its reference area.
pub fn drag_force(vel: &Vector3<f64>, atm: &Atmo, cd_area: f64) -> Vector3<f64> {
    let speed = vel.norm();
    if speed > MIN_AIRFLOW_SPEED {
        let drag_mag = dynamic_pressure(atm, speed) * cd_area;
        -vel / speed * drag_mag
    } else {
        Vector3::zeros()
    }
}

/// Transonic drag rise multiplier applied to the zero-lift drag coefficient.
///
/// Flat below Mach 0.8, linear rise to twice the subsonic value at Mach 1.1,
/// then decaying with the square of Mach number.
pub fn mach_drag_factor(mach: f64) -> f64 {
    let m = mach.max(0.0);
    if m < 0.8 {
        1.0
    } else if m < 1.1 {
        1.0 + (m - 0.8) / 0.3
    } else {
        1.0 + (1.1 / m).powi(2)
    }
}

/// Compute aerodynamic restoring moment from CP-CG offset (body frame).
///
/// `margin` is the distance from CG aft to CP in metres; positive values
/// turn the nose into the relative wind.
pub fn restoring_moment(
    vel_body: &Vector3<f64>,
    atm: &Atmo,
    ref_area: f64,
    cn_alpha: f64,
    margin: f64,
) -> Vector3<f64> {
    let speed = vel_body.norm();
    if speed <= MIN_MOMENT_SPEED || margin.abs() <= 1e-9 {
        return Vector3::zeros();
    }

    // Normal force follows sin(alpha) so tail-first flow gives no moment.
    let sin_y = vel_body.y / speed;
    let sin_x = vel_body.x / speed;
    let normal_force = dynamic_pressure(atm, speed) * ref_area * cn_alpha;

    Vector3::new(
        -normal_force * sin_y * margin,
        normal_force * sin_x * margin,
        0.0,
    )
}

/// Compute aerodynamic damping torque (body frame, proportional to angular rate).
pub fn damping_moment(
    omega: &Vector3<f64>,
    speed: f64,
    atm: &Atmo,
    ref_area: f64,
    ref_length: f64,
) -> Vector3<f64> {
    if speed <= MIN_MOMENT_SPEED {
        return Vector3::zeros();
    }
    let damp = dynamic_pressure(atm, speed) * ref_area * ref_length * 0.5;
    -omega * damp
}

/// Angle between the body axis and the relative wind, rad.
/// Angle between the body axis and the airflow, rad. Zero when there is no
/// airflow to speak of.
pub fn angle_of_attack(vel_body: &Vector3<f64>) -> f64 {
    let speed = vel_body.norm();
    if speed <= MIN_AIRFLOW_SPEED {
        return 0.0;
    }
    (vel_body.z / speed).clamp(-1.0, 1.0).acos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::atmosphere;

    #[test]
    fn drag_opposes_velocity() {
        let vel = Vector3::new(0.0, 0.0, 300.0);
        let atm = atmosphere::isa(0.0);
        let f = drag_force(&vel, &atm, 0.003);
        assert!(f.z < 0.0, "Drag should oppose upward velocity");
    }

    #[test]
    fn no_drag_at_rest() {
        let atm = atmosphere::isa(0.0);
        let f = drag_force(&Vector3::zeros(), &atm, 0.003);
        assert!(f.norm() < 1e-10);
    }

    #[test]
    fn restoring_moment_zero_at_zero_aoa() {
        let vel_body = Vector3::new(0.0, 0.0, 300.0);
        let atm = atmosphere::isa(0.0);
        let m = restoring_moment(&vel_body, &atm, 0.01, 8.0, 0.05);
        assert!(m.norm() < 1e-6, "No restoring moment at zero AoA");
    }

    #[test]
    fn negative_margin_flips_moment() {
        let vel_body = Vector3::new(0.0, 10.0, 100.0);
        let atm = atmosphere::isa(0.0);
        let stable = restoring_moment(&vel_body, &atm, 0.01, 8.0, 0.05);
        let unstable = restoring_moment(&vel_body, &atm, 0.01, 8.0, -0.05);
        assert!(stable.x < 0.0);
        assert!(unstable.x > 0.0);
    }

    #[test]
    fn drag_rise_peaks_transonic() {
        assert_eq!(mach_drag_factor(0.3), 1.0);
        assert!((mach_drag_factor(1.1) - 2.0).abs() < 1e-12);
        assert!(mach_drag_factor(2.0) < mach_drag_factor(1.1));
    }

    #[test]
    fn aoa_of_axial_flow_is_zero() {
        assert!(angle_of_attack(&Vector3::new(0.0, 0.0, 50.0)).abs() < 1e-12);
        let side = angle_of_attack(&Vector3::new(50.0, 0.0, 0.0));
        assert!((side - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn slow_fall_tail_first_is_fully_reversed_flow() {
        let aoa = angle_of_attack(&Vector3::new(0.0, 0.0, -1e-3));
        assert!((aoa - std::f64::consts::PI).abs() < 1e-12);
        assert_eq!(angle_of_attack(&Vector3::zeros()), 0.0);
    }
}
