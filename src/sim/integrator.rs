use std::collections::BTreeSet;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::error::StepError;
use crate::dynamics::{pointmass, sixdof, Deriv, Loads, SimulationState};
use crate::physics::aerodynamics::{angle_of_attack, dynamic_pressure};
use crate::physics::atmosphere::AtmosphereModel;
use crate::physics::gravity::gravity_accel;
use crate::vehicle::{ComponentId, MotorLedger, PhysicsProvider, RocketBodyGroup};

/// Largest `h * lambda` allowed in one RK4 sub-step, where `lambda` is the
/// fastest decay or oscillation rate of the body.
const MAX_STIFFNESS: f64 = 0.5;
const MAX_SUBSTEPS: usize = 1000;

// ---------------------------------------------------------------------------
// Flight modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightMode {
    /// Sliding along the launch guide.
    Guided,
    /// Free 6DOF flight.
    Free,
    /// Unstable body falling end over end (3DOF).
    Tumbling,
    /// Hanging under deployed recovery devices (3DOF).
    Descent,
}

/// Quantities derived from one state, used by the event guards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightSample {
    pub thrust: f64,
    pub mass: f64,
    pub cg: f64,
    /// Net force up the launch guide, N.
    pub guide_force: f64,
    pub angle_of_attack: f64,
    /// Calibers; `None` when the body has no normal-force surfaces.
    pub stability_margin: Option<f64>,
    pub mach: f64,
}

// ---------------------------------------------------------------------------
// Flight model: provider + body + environment for one branch
// ---------------------------------------------------------------------------

/// Everything needed to evaluate the equations of motion of one flying body.
pub struct FlightModel<'a> {
    pub provider: &'a dyn PhysicsProvider,
    pub group: &'a RocketBodyGroup,
    pub motors: &'a MotorLedger,
    pub deployed: &'a BTreeSet<ComponentId>,
    pub mode: FlightMode,
    pub atmosphere: &'a AtmosphereModel,
    pub launch_altitude: f64,
    /// Unit vector up the launch guide.
    pub guide: Vector3<f64>,
}

impl FlightModel<'_> {
    pub fn loads(&self, state: &SimulationState) -> Loads {
        let altitude = self.launch_altitude + state.altitude();
        let atm = self.atmosphere.at(altitude);
        let mach = if atm.sound_speed > 0.0 { state.vel.norm() / atm.sound_speed } else { 0.0 };
        Loads {
            mass: self.provider.mass_properties(self.group, self.motors, state.time),
            thrust: self.provider.thrust(self.group, self.motors, state.time),
            aero: self.provider.aerodynamics(self.group, self.deployed, mach),
            atm,
            gravity: gravity_accel(altitude),
        }
    }

    pub fn derivatives(&self, state: &SimulationState) -> Deriv {
        let loads = self.loads(state);
        match self.mode {
            FlightMode::Guided => sixdof::guided_derivatives(state, &loads, &self.guide),
            FlightMode::Free => sixdof::derivatives(state, &loads),
            FlightMode::Tumbling => {
                pointmass::derivatives(state, &loads, pointmass::tumble_cd_area(&loads))
            }
            FlightMode::Descent => {
                pointmass::derivatives(state, &loads, pointmass::descent_cd_area(&loads))
            }
        }
    }

    pub fn sample(&self, state: &SimulationState) -> FlightSample {
        let loads = self.loads(state);
        let vel_body = state.vel_body();
        FlightSample {
            thrust: loads.thrust,
            mass: loads.mass.mass,
            cg: loads.mass.cg,
            guide_force: sixdof::guide_force(state, &loads, &self.guide),
            angle_of_attack: angle_of_attack(&vel_body),
            stability_margin: loads.aero.stability_margin(loads.mass.cg),
            mach: if loads.atm.sound_speed > 0.0 {
                state.vel.norm() / loads.atm.sound_speed
            } else {
                0.0
            },
        }
    }

    /// Fastest rate (1/s) at which the state responds at `state`, with the
    /// airspeed bounded over a step of length `dt`.
    fn stiffness(&self, state: &SimulationState, dt: f64) -> f64 {
        let loads = self.loads(state);
        let mass = loads.mass.mass;
        if mass <= 0.0 {
            return 0.0;
        }
        let accel = self.derivatives(state).dvel.norm();
        let speed = state.vel.norm() + accel * dt;
        let rho = loads.atm.density;
        let aero = &loads.aero;

        let cd_area = match self.mode {
            FlightMode::Tumbling => pointmass::tumble_cd_area(&loads),
            FlightMode::Descent => pointmass::descent_cd_area(&loads),
            FlightMode::Guided | FlightMode::Free => aero.cd * aero.ref_area,
        };
        let mut lambda = rho * speed * cd_area / mass;

        if self.mode == FlightMode::Free {
            let inertia = loads.mass.inertia.x.min(loads.mass.inertia.y);
            if inertia > 0.0 {
                let q = dynamic_pressure(&loads.atm, speed) * aero.ref_area;
                let arm = aero.cp.map_or(0.0, |cp| (cp - loads.mass.cg).abs());
                let pitch = (q * aero.cn_alpha.abs() * arm / inertia).sqrt();
                let damping = q * aero.ref_length * 0.5 / inertia;
                lambda = lambda.max(pitch + damping);
            }
        }
        lambda
    }

    fn rk4(&self, state: &SimulationState, dt: f64) -> SimulationState {
        let k1 = self.derivatives(state);
        let k2 = self.derivatives(&state.apply(&k1, dt * 0.5));
        let k3 = self.derivatives(&state.apply(&k2, dt * 0.5));
        let k4 = self.derivatives(&state.apply(&k3, dt));

        let new_quat_raw = state.quat.quaternion()
            + (k1.dquat + k2.dquat * 2.0 + k3.dquat * 2.0 + k4.dquat) * (dt / 6.0);

        SimulationState {
            time: state.time + dt,
            pos: state.pos + (k1.dpos + 2.0 * k2.dpos + 2.0 * k3.dpos + k4.dpos) * (dt / 6.0),
            vel: state.vel + (k1.dvel + 2.0 * k2.dvel + 2.0 * k3.dvel + k4.dvel) * (dt / 6.0),
            quat: UnitQuaternion::new_normalize(new_quat_raw),
            omega: state.omega
                + (k1.domega + 2.0 * k2.domega + 2.0 * k3.domega + k4.domega) * (dt / 6.0),
            propellant: state.propellant,
        }
    }

    /// Advance `state` by exactly `dt` seconds.
    ///
    /// The step is split into equal RK4 sub-steps when drag or the
    /// weathercock frequency would make a single step unstable.
    pub fn step(&self, state: &SimulationState, dt: f64) -> Result<SimulationState, StepError> {
        let lambda = self.stiffness(state, dt);
        let n = if lambda.is_finite() && lambda > 0.0 {
            ((dt * lambda / MAX_STIFFNESS).ceil() as usize).clamp(1, MAX_SUBSTEPS)
        } else {
            1
        };
        let h = dt / n as f64;

        let mut next = state.clone();
        for _ in 0..n {
            next = self.rk4(&next, h);
        }
        next.time = state.time + dt;

        let mass = self.provider.mass_properties(self.group, self.motors, next.time);
        next.propellant = mass.propellant;

        if !(mass.mass.is_finite() && mass.mass > 0.0) {
            return Err(StepError::NumericalInstability {
                time: next.time,
                detail: format!("body mass {} is not positive", mass.mass),
            });
        }
        if !next.is_finite() {
            return Err(StepError::NumericalInstability {
                time: next.time,
                detail: "non-finite state after integration".into(),
            });
        }
        Ok(next)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
