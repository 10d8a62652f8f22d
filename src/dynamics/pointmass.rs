use super::state::{Deriv, SimulationState};
use super::Loads;
use crate::physics::aerodynamics::drag_force;

/// Drag coefficient of a body tumbling end over end, referenced to its
/// side-on planform area.
pub const TUMBLE_CD: f64 = 0.56;

/// Drag area of a tumbling body, m^2.
pub fn tumble_cd_area(loads: &Loads) -> f64 {
    if loads.aero.planform_area > 0.0 {
        TUMBLE_CD * loads.aero.planform_area
    } else {
        loads.aero.cd * loads.aero.ref_area
    }
}

/// Drag area of a body hanging under its deployed recovery devices, m^2.
pub fn descent_cd_area(loads: &Loads) -> f64 {
    loads.aero.cd * loads.aero.ref_area + loads.aero.recovery_cd_area
}

/// 3DOF point-mass motion with a fixed drag area; attitude is frozen.
pub fn derivatives(state: &SimulationState, loads: &Loads, cd_area: f64) -> Deriv {
    let mass = loads.mass.mass;
    let f_thrust = state.body_z() * loads.thrust;
    let f_drag = drag_force(&state.vel, &loads.atm, cd_area);
    let accel = loads.gravity + (f_thrust + f_drag) / mass;
    Deriv::translational(state.vel, accel)
}
