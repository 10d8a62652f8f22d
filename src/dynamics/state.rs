use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Physical constants
// ---------------------------------------------------------------------------

pub const G0: f64 = 9.80665;
pub const EARTH_RADIUS: f64 = 6_371_000.0;

// ---------------------------------------------------------------------------
// 6DOF State: position, velocity, attitude, angular rate, propellant
// ---------------------------------------------------------------------------

/// Kinematic state of one flying body.
///
/// Mass properties are not integrated; they follow from the motor ledger and
/// the simulated time, `propellant` records what remained at `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    pub time: f64,
    pub pos: Vector3<f64>,              // m, inertial ENU, origin at the launch guide base
    pub vel: Vector3<f64>,              // m/s, inertial
    pub quat: UnitQuaternion<f64>,      // body→inertial rotation
    pub omega: Vector3<f64>,            // rad/s, body frame angular velocity
    pub propellant: f64,                // kg remaining in the body's motors
}

impl SimulationState {
    /// Body at rest at the origin, nose pointing along `quat * z`.
    pub fn at_rest(quat: UnitQuaternion<f64>, propellant: f64) -> Self {
        SimulationState {
            time: 0.0,
            pos: Vector3::zeros(),
            vel: Vector3::zeros(),
            quat,
            omega: Vector3::zeros(),
            propellant,
        }
    }

    pub fn apply(&self, d: &Deriv, dt: f64) -> SimulationState {
        // Quaternion integration: q_new = normalize(q + dq * dt)
        let q_raw = self.quat.quaternion() + d.dquat * dt;
        SimulationState {
            time: self.time + dt,
            pos: self.pos + d.dpos * dt,
            vel: self.vel + d.dvel * dt,
            quat: UnitQuaternion::new_normalize(q_raw),
            omega: self.omega + d.domega * dt,
            propellant: self.propellant,
        }
    }

    /// Height above the launch site, m.
    pub fn altitude(&self) -> f64 {
        self.pos.z
    }

    /// Body Z-axis (thrust direction) in inertial frame.
    pub fn body_z(&self) -> Vector3<f64> {
        self.quat * Vector3::z()
    }

    /// Pitch angle from local horizontal (rad). Positive = nose up.
    pub fn pitch(&self) -> f64 {
        self.body_z().z.clamp(-1.0, 1.0).asin()
    }

    /// Relative wind expressed in the body frame.
    pub fn vel_body(&self) -> Vector3<f64> {
        self.quat.inverse() * self.vel
    }

    pub fn is_finite(&self) -> bool {
        let q = self.quat.quaternion();
        self.time.is_finite()
            && self.pos.iter().all(|v| v.is_finite())
            && self.vel.iter().all(|v| v.is_finite())
            && self.omega.iter().all(|v| v.is_finite())
            && q.coords.iter().all(|v| v.is_finite())
            && self.propellant.is_finite()
    }
}

// ---------------------------------------------------------------------------
// State derivative
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Deriv {
    pub dpos: Vector3<f64>,
    pub dvel: Vector3<f64>,
    pub dquat: Quaternion<f64>,   // not unit: raw quaternion derivative
    pub domega: Vector3<f64>,     // angular acceleration, body frame
}

impl Deriv {
    /// Translation only; attitude frozen.
    pub fn translational(vel: Vector3<f64>, accel: Vector3<f64>) -> Self {
        Deriv {
            dpos: vel,
            dvel: accel,
            dquat: Quaternion::new(0.0, 0.0, 0.0, 0.0),
            domega: Vector3::zeros(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_advances_time_and_position() {
        let s = SimulationState::at_rest(UnitQuaternion::identity(), 1.0);
        let d = Deriv::translational(Vector3::new(0.0, 0.0, 10.0), Vector3::new(0.0, 0.0, 1.0));
        let n = s.apply(&d, 0.5);
        assert!((n.time - 0.5).abs() < 1e-12);
        assert!((n.pos.z - 5.0).abs() < 1e-12);
        assert!((n.vel.z - 0.5).abs() < 1e-12);
        assert_eq!(n.propellant, 1.0);
    }

    #[test]
    fn nan_is_not_finite() {
        let mut s = SimulationState::at_rest(UnitQuaternion::identity(), 0.0);
        assert!(s.is_finite());
        s.vel.x = f64::NAN;
        assert!(!s.is_finite());
    }

    #[test]
    fn identity_attitude_points_up() {
        let s = SimulationState::at_rest(UnitQuaternion::identity(), 0.0);
        assert!((s.pitch() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
