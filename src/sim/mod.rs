pub mod branch;
pub mod detector;
pub mod error;
pub mod event;
pub mod integrator;
pub mod options;
pub mod runner;
pub mod scheduler;

pub use branch::{BranchId, BranchManager, BranchStatus, SimulatedData, SimulationBranch};
pub use error::{ConfigError, SimulationError, StepError};
pub use event::{EventSource, FlightEvent, FlightEventType};
pub use integrator::{FlightMode, FlightModel};
pub use options::{InstabilityPolicy, LaunchGuide, SimulationOptions};
pub use runner::{simulate, simulate_with};
pub use scheduler::Scheduler;
