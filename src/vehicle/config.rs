use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::body_group::RocketBodyGroup;
use super::component::ComponentId;
use super::provider::{MotorLedger, PhysicsProvider};
use super::stage::StageId;
use crate::sim::error::ConfigError;

// ---------------------------------------------------------------------------
// Trigger rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnitionEvent {
    /// Ground-lit for the bottom core stage and strap-ons, otherwise lit
    /// when the stage below separates.
    Automatic,
    Launch,
    /// Any burnout in the stage below.
    Burnout,
    /// Any ejection charge in the stage below.
    EjectionCharge,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IgnitionRule {
    pub event: IgnitionEvent,
    pub delay: f64,
}

impl Default for IgnitionRule {
    fn default() -> Self {
        Self { event: IgnitionEvent::Automatic, delay: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparationEvent {
    /// A motor in the stage above ignites.
    UpperIgnition,
    /// A motor in this stage ignites.
    Ignition,
    Burnout,
    Ejection,
    Launch,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeparationRule {
    pub event: SeparationEvent,
    pub delay: f64,
}

impl Default for SeparationRule {
    fn default() -> Self {
        Self { event: SeparationEvent::Ejection, delay: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployEvent {
    /// The ejection charge of the device's own stage.
    Ejection,
    Apogee,
    /// Descending through the given height above the launch site, m.
    Altitude(f64),
    LowerStageSeparation,
    Launch,
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeployRule {
    pub event: DeployEvent,
    pub delay: f64,
}

impl Default for DeployRule {
    fn default() -> Self {
        Self { event: DeployEvent::Ejection, delay: 0.0 }
    }
}

// ---------------------------------------------------------------------------
// Flight configuration
// ---------------------------------------------------------------------------

/// Which stages fly and how motors, separations and recovery are triggered.
/// Rules that are not listed take their defaults.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlightConfiguration {
    pub name: String,
    pub active_stages: BTreeSet<StageId>,
    #[serde(default)]
    pub ignition: BTreeMap<ComponentId, IgnitionRule>,
    #[serde(default)]
    pub separation: BTreeMap<StageId, SeparationRule>,
    #[serde(default)]
    pub deployment: BTreeMap<ComponentId, DeployRule>,
}

impl FlightConfiguration {
    /// Every stage of `provider` active, all rules at their defaults.
    pub fn all_stages(name: impl Into<String>, provider: &dyn PhysicsProvider) -> Self {
        Self {
            name: name.into(),
            active_stages: provider.stages().iter().map(|s| s.id).collect(),
            ..Self::default()
        }
    }

    pub fn with_ignition(mut self, motor: ComponentId, event: IgnitionEvent, delay: f64) -> Self {
        self.ignition.insert(motor, IgnitionRule { event, delay });
        self
    }

    pub fn with_separation(mut self, stage: StageId, event: SeparationEvent, delay: f64) -> Self {
        self.separation.insert(stage, SeparationRule { event, delay });
        self
    }

    pub fn with_deployment(mut self, device: ComponentId, event: DeployEvent, delay: f64) -> Self {
        self.deployment.insert(device, DeployRule { event, delay });
        self
    }

    pub fn ignition_rule(&self, motor: ComponentId) -> IgnitionRule {
        self.ignition.get(&motor).copied().unwrap_or_default()
    }

    pub fn separation_rule(&self, stage: StageId) -> SeparationRule {
        self.separation.get(&stage).copied().unwrap_or_default()
    }

    pub fn deploy_rule(&self, device: ComponentId) -> DeployRule {
        self.deployment.get(&device).copied().unwrap_or_default()
    }

    pub fn is_active(&self, stage: StageId) -> bool {
        self.active_stages.contains(&stage)
    }

    /// The body that sits on the launch guide.
    pub fn launch_group(&self) -> RocketBodyGroup {
        RocketBodyGroup::new(self.active_stages.iter().copied())
    }

    /// Reject anything that would make the simulation meaningless before
    /// the first step is taken.
    pub fn validate(&self, provider: &dyn PhysicsProvider) -> Result<(), ConfigError> {
        if self.active_stages.is_empty() {
            return Err(ConfigError::NoActiveStages);
        }
        for &id in &self.active_stages {
            let stage = provider.stage(id).ok_or(ConfigError::UnknownStage(id))?;
            if let Some(parent) = stage.parent() {
                if !self.is_active(parent) {
                    return Err(ConfigError::InactiveParent { stage: id, parent });
                }
            }
        }
        let d = provider.reference_diameter();
        if !(d.is_finite() && d > 0.0) {
            return Err(ConfigError::InvalidValue { what: "reference diameter", value: d });
        }

        for c in provider.components() {
            provider.stage(c.stage).ok_or(ConfigError::UnknownStage(c.stage))?;
            non_negative_mass(c.id, "mass", c.mass)?;
            for v in c.inertia.iter() {
                non_negative_mass(c.id, "moment of inertia", *v)?;
            }
            if let Some(motor) = &c.motor {
                non_negative_mass(c.id, "casing mass", motor.casing_mass)?;
                non_negative_mass(c.id, "propellant mass", motor.propellant_mass)?;
                if let Some(reason) = motor.curve.defect() {
                    return Err(ConfigError::InvalidThrustCurve { component: c.id, reason });
                }
                if let Some(delay) = motor.ejection_delay {
                    delay_value("ejection delay", delay)?;
                }
            }
            if let Some(r) = &c.recovery {
                if !(r.cd.is_finite() && r.cd >= 0.0 && r.area.is_finite() && r.area >= 0.0) {
                    let value = r.cd * r.area;
                    return Err(ConfigError::InvalidValue { what: "recovery drag area", value });
                }
            }
        }

        for (&id, rule) in &self.ignition {
            let c = provider.component(id).ok_or(ConfigError::UnknownComponent(id))?;
            if !c.capabilities().has_motor {
                return Err(ConfigError::NotAMotor(id));
            }
            delay_value("ignition delay", rule.delay)?;
        }
        for (&id, rule) in &self.separation {
            provider.stage(id).ok_or(ConfigError::UnknownStage(id))?;
            delay_value("separation delay", rule.delay)?;
        }
        for (&id, rule) in &self.deployment {
            let c = provider.component(id).ok_or(ConfigError::UnknownComponent(id))?;
            if !c.capabilities().has_recovery_device {
                return Err(ConfigError::NotARecoveryDevice(id));
            }
            delay_value("deployment delay", rule.delay)?;
            if let DeployEvent::Altitude(h) = rule.event {
                if !h.is_finite() {
                    return Err(ConfigError::InvalidValue { what: "deployment altitude", value: h });
                }
            }
        }

        let group = self.launch_group();
        let mass = provider
            .mass_properties(&group, &MotorLedger::armed(provider, &group), 0.0)
            .mass;
        if !(mass.is_finite() && mass > 0.0) {
            return Err(ConfigError::ZeroMass);
        }
        Ok(())
    }
}

fn non_negative_mass(
    component: ComponentId,
    quantity: &'static str,
    value: f64,
) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidMass { component, quantity, value })
    }
}

fn delay_value(what: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue { what, value })
    }
}
