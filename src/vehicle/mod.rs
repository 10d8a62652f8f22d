pub mod body_group;
pub mod component;
pub mod config;
pub mod motor;
pub mod provider;
pub mod rocket;
pub mod stage;

pub use body_group::RocketBodyGroup;
pub use component::{
    AeroSurface, Capabilities, Component, ComponentBuilder, ComponentId, RecoveryDevice,
};
pub use config::{
    DeployEvent, DeployRule, FlightConfiguration, IgnitionEvent, IgnitionRule, SeparationEvent,
    SeparationRule,
};
pub use motor::{Motor, ThrustCurve};
pub use provider::{AeroCoefficients, MassProperties, MotorLedger, MotorPhase, PhysicsProvider};
pub use rocket::{presets, Rocket, RocketBuilder};
pub use stage::{Stage, StageId, StageKind};
