use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::motor::Motor;
use super::stage::StageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub usize);

/// What a component can do, queried by the simulation instead of its type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub has_motor: bool,
    pub has_recovery_device: bool,
    pub aerodynamic_surface: bool,
}

/// Aerodynamic contribution of one component, referenced to the rocket's
/// reference area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AeroSurface {
    pub cn_alpha: f64,        // normal force slope, 1/rad
    pub cp: f64,              // axial CP location from nose tip, m
    pub cd: f64,              // zero-lift drag coefficient
    pub planform_area: f64,   // side-on area used for tumble drag, m^2
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecoveryDevice {
    pub cd: f64,
    pub area: f64,            // m^2
}

// ---------------------------------------------------------------------------
// Component: one pre-resolved entry of the flattened rocket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub stage: StageId,
    pub mass: f64,                // kg per instance, excluding any motor
    pub cg: f64,                  // axial CG location from nose tip, m
    pub radial_offset: f64,       // m from the rocket axis
    pub instances: u32,
    pub inertia: Vector3<f64>,    // [Ixx, Iyy, Izz] about own CG, per instance, kg·m^2
    pub motor: Option<Motor>,
    pub recovery: Option<RecoveryDevice>,
    pub aero: Option<AeroSurface>,
}

impl Component {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            has_motor: self.motor.is_some(),
            has_recovery_device: self.recovery.is_some(),
            aerodynamic_surface: self.aero.is_some(),
        }
    }

    pub fn multiplicity(&self) -> f64 {
        f64::from(self.instances.max(1))
    }
}

// ---------------------------------------------------------------------------
// Component builder
// ---------------------------------------------------------------------------

pub struct ComponentBuilder {
    name: String,
    stage: StageId,
    mass: f64,
    cg: f64,
    radial_offset: f64,
    instances: u32,
    inertia: Vector3<f64>,
    motor: Option<Motor>,
    recovery: Option<RecoveryDevice>,
    aero: Option<AeroSurface>,
}

impl ComponentBuilder {
    pub fn new(name: impl Into<String>, stage: StageId) -> Self {
        Self {
            name: name.into(),
            stage,
            mass: 0.0,
            cg: 0.0,
            radial_offset: 0.0,
            instances: 1,
            inertia: Vector3::zeros(),
            motor: None,
            recovery: None,
            aero: None,
        }
    }

    pub fn mass(mut self, v: f64) -> Self { self.mass = v; self }
    pub fn cg(mut self, v: f64) -> Self { self.cg = v; self }
    pub fn radial_offset(mut self, v: f64) -> Self { self.radial_offset = v; self }
    pub fn instances(mut self, v: u32) -> Self { self.instances = v; self }
    pub fn inertia(mut self, v: Vector3<f64>) -> Self { self.inertia = v; self }
    pub fn motor(mut self, v: Motor) -> Self { self.motor = Some(v); self }
    pub fn recovery(mut self, v: RecoveryDevice) -> Self { self.recovery = Some(v); self }
    pub fn aero(mut self, v: AeroSurface) -> Self { self.aero = Some(v); self }

    /// Finish with the id assigned by the owning rocket.
    pub fn build(self, id: ComponentId) -> Component {
        Component {
            id,
            name: self.name,
            stage: self.stage,
            mass: self.mass,
            cg: self.cg,
            radial_offset: self.radial_offset,
            instances: self.instances,
            inertia: self.inertia,
            motor: self.motor,
            recovery: self.recovery,
            aero: self.aero,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::motor::ThrustCurve;

    #[test]
    fn capabilities_follow_attached_parts() {
        let c = ComponentBuilder::new("mount", StageId(0))
            .mass(0.01)
            .motor(Motor {
                designation: "A".into(),
                curve: ThrustCurve::trapezoid(3.0, 0.05, 1.0),
                casing_mass: 0.01,
                propellant_mass: 0.005,
                ejection_delay: None,
            })
            .build(ComponentId(3));
        let caps = c.capabilities();
        assert!(caps.has_motor);
        assert!(!caps.has_recovery_device);
        assert!(!caps.aerodynamic_surface);
        assert_eq!(c.id, ComponentId(3));
    }

    #[test]
    fn zero_instances_counts_as_one() {
        let c = ComponentBuilder::new("tube", StageId(0)).instances(0).build(ComponentId(0));
        assert_eq!(c.multiplicity(), 1.0);
    }
}
