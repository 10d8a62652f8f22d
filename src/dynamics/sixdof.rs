use nalgebra::{Quaternion, Vector3};

use super::state::{Deriv, SimulationState};
use super::Loads;
use crate::physics::aerodynamics::{damping_moment, drag_force, restoring_moment};

// ---------------------------------------------------------------------------
// 6DOF Equations of motion
// ---------------------------------------------------------------------------

/// Compute full 6DOF state derivatives.
///
/// Forces & moments:
///   1. Gravity (inertial frame)
///   2. Thrust along body +Z
///   3. Aerodynamic drag (opposing velocity)
///   4. Aerodynamic restoring moment (CP-CG offset)
///   5. Aerodynamic damping moment
pub fn derivatives(state: &SimulationState, loads: &Loads) -> Deriv {
    let mass = loads.mass.mass;

    let f_gravity = loads.gravity * mass;
    let f_thrust = state.quat * Vector3::new(0.0, 0.0, loads.thrust);
    let f_drag = drag_force(&state.vel, &loads.atm, loads.aero.cd * loads.aero.ref_area);

    let accel = (f_gravity + f_thrust + f_drag) / mass;

    // --- Torques (body frame) ---
    let vel_body = state.vel_body();
    let speed = state.vel.norm();
    let mut torque_body = Vector3::zeros();
    if let Some(cp) = loads.aero.cp {
        torque_body += restoring_moment(
            &vel_body,
            &loads.atm,
            loads.aero.ref_area,
            loads.aero.cn_alpha,
            cp - loads.mass.cg,
        );
    }
    torque_body += damping_moment(
        &state.omega,
        speed,
        &loads.atm,
        loads.aero.ref_area,
        loads.aero.ref_length,
    );

    // --- Euler's equation: I * domega = torque - omega × (I * omega) ---
    let i_vec = loads.mass.inertia;
    let i_omega = Vector3::new(
        i_vec.x * state.omega.x,
        i_vec.y * state.omega.y,
        i_vec.z * state.omega.z,
    );
    let domega = Vector3::new(
        (torque_body.x - (state.omega.y * i_omega.z - state.omega.z * i_omega.y)) / i_vec.x,
        (torque_body.y - (state.omega.z * i_omega.x - state.omega.x * i_omega.z)) / i_vec.y,
        (torque_body.z - (state.omega.x * i_omega.y - state.omega.y * i_omega.x)) / i_vec.z,
    );

    // --- Quaternion kinematics: dq/dt = 0.5 * q * omega_quat ---
    let omega_quat = Quaternion::new(0.0, state.omega.x, state.omega.y, state.omega.z);
    let dquat = state.quat.quaternion() * omega_quat * 0.5;

    Deriv {
        dpos: state.vel,
        dvel: accel,
        dquat,
        domega,
    }
}

/// Net force along the launch guide, N. Positive means the body would move
/// up the guide.
pub fn guide_force(state: &SimulationState, loads: &Loads, guide: &Vector3<f64>) -> f64 {
    let mass = loads.mass.mass;
    let f_drag = drag_force(&state.vel, &loads.atm, loads.aero.cd * loads.aero.ref_area);
    let total = loads.gravity * mass + guide * loads.thrust + f_drag;
    total.dot(guide)
}

/// Motion constrained to the launch guide `guide` (unit vector). Attitude is
/// held, and the body cannot slide back down the guide.
pub fn guided_derivatives(state: &SimulationState, loads: &Loads, guide: &Vector3<f64>) -> Deriv {
    let along = guide_force(state, loads, guide) / loads.mass.mass;
    let moving = state.vel.dot(guide) > 0.0;
    let accel = if moving || along > 0.0 { along } else { 0.0 };
    Deriv::translational(state.vel, guide * accel)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::atmosphere;
    use crate::physics::gravity::gravity_accel;
    use crate::vehicle::{AeroCoefficients, MassProperties};
    use nalgebra::UnitQuaternion;

    fn loads(thrust: f64) -> Loads {
        Loads {
            mass: MassProperties {
                mass: 0.1,
                cg: 0.3,
                inertia: Vector3::new(1e-3, 1e-3, 1e-5),
                propellant: 0.0,
            },
            thrust,
            aero: AeroCoefficients {
                cd: 0.5,
                cn_alpha: 8.0,
                cp: Some(0.35),
                ref_area: 5e-4,
                ref_length: 0.025,
                planform_area: 0.01,
                recovery_cd_area: 0.0,
            },
            atm: atmosphere::isa(0.0),
            gravity: gravity_accel(0.0),
        }
    }

    fn pad() -> SimulationState {
        SimulationState::at_rest(UnitQuaternion::identity(), 0.0)
    }

    #[test]
    fn net_upward_accel_with_thrust() {
        let d = derivatives(&pad(), &loads(5.0));
        assert!(d.dvel.z > 0.0, "TWR > 1 → net upward, got {}", d.dvel.z);
    }

    #[test]
    fn quat_deriv_zero_at_rest() {
        let d = derivatives(&pad(), &loads(5.0));
        let dq = d.dquat;
        let norm = (dq.w.powi(2) + dq.i.powi(2) + dq.j.powi(2) + dq.k.powi(2)).sqrt();
        assert!(norm < 1e-10, "No rotation → zero quat derivative");
    }

    #[test]
    fn stable_body_weathercocks_into_wind() {
        let mut s = pad();
        s.vel = Vector3::new(0.0, 5.0, 50.0);
        let d = derivatives(&s, &loads(0.0));
        assert!(d.domega.x < 0.0, "nose should turn toward +y, got {}", d.domega.x);
    }

    #[test]
    fn sits_on_guide_until_thrust_exceeds_weight() {
        let guide = Vector3::z();
        let d = guided_derivatives(&pad(), &loads(0.5), &guide);
        assert_eq!(d.dvel.z, 0.0);
        let d = guided_derivatives(&pad(), &loads(5.0), &guide);
        assert!(d.dvel.z > 0.0);
        assert!(d.dvel.x.abs() < 1e-12 && d.dvel.y.abs() < 1e-12);
    }

    #[test]
    fn guide_force_sign_tracks_thrust_to_weight() {
        let guide = Vector3::z();
        assert!(guide_force(&pad(), &loads(0.5), &guide) < 0.0);
        assert!(guide_force(&pad(), &loads(1.5), &guide) > 0.0);
    }
}
