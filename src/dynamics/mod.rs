pub mod pointmass;
pub mod sixdof;
pub mod state;

use nalgebra::Vector3;

use crate::physics::atmosphere::Atmo;
use crate::vehicle::{AeroCoefficients, MassProperties};

pub use state::{Deriv, SimulationState, EARTH_RADIUS, G0};

/// Everything acting on a body at one instant, as evaluated from the
/// physics provider and the environment.
#[derive(Debug, Clone, Copy)]
pub struct Loads {
    pub mass: MassProperties,
    pub thrust: f64,              // N along body +Z
    pub aero: AeroCoefficients,
    pub atm: Atmo,
    pub gravity: Vector3<f64>,    // m/s^2, inertial
}
