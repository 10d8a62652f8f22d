use crate::vehicle::{ComponentId, StageId};

/// Problems with the rocket, flight configuration or options, found before
/// any branch starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("no active stages selected")]
    NoActiveStages,
    #[error("stage {0:?} does not exist")]
    UnknownStage(StageId),
    #[error("component {0:?} does not exist")]
    UnknownComponent(ComponentId),
    #[error("parallel stage {stage:?} is active but its parent {parent:?} is not")]
    InactiveParent { stage: StageId, parent: StageId },
    #[error("component {component:?} has invalid {quantity}: {value}")]
    InvalidMass { component: ComponentId, quantity: &'static str, value: f64 },
    #[error("motor on component {component:?} has an unusable thrust curve: {reason}")]
    InvalidThrustCurve { component: ComponentId, reason: &'static str },
    #[error("component {0:?} carries no motor")]
    NotAMotor(ComponentId),
    #[error("component {0:?} carries no recovery device")]
    NotARecoveryDevice(ComponentId),
    #[error("invalid {what}: {value}")]
    InvalidValue { what: &'static str, value: f64 },
    #[error("active rocket has no mass")]
    ZeroMass,
}

/// Failure of a single integration step. Terminates the owning branch only.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StepError {
    #[error("numerical instability at t={time:.4} s: {detail}")]
    NumericalInstability { time: f64, detail: String },
}

/// Top-level simulation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
