pub mod config;
pub mod dynamics;
pub mod io;
pub mod physics;
pub mod sim;
pub mod vehicle;

pub use sim::{simulate, simulate_with, SimulatedData, SimulationOptions};
pub use vehicle::{FlightConfiguration, PhysicsProvider, Rocket};
