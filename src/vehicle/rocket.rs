use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::body_group::RocketBodyGroup;
use super::component::{Component, ComponentBuilder, ComponentId};
use super::provider::PhysicsProvider;
use super::stage::Stage;

// ---------------------------------------------------------------------------
// Rocket: stage topology plus the flattened component list
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rocket {
    pub name: String,
    pub reference_diameter: f64,  // m
    pub stages: Vec<Stage>,
    pub components: Vec<Component>,
}

impl Rocket {
    /// Group made of every stage of the rocket.
    pub fn full_group(&self) -> RocketBodyGroup {
        RocketBodyGroup::new(self.stages.iter().map(|s| s.id))
    }

    /// Dry plus loaded-motor mass of the whole rocket, kg.
    pub fn total_mass(&self) -> f64 {
        self.components
            .iter()
            .map(|c| {
                let motor = c.motor.as_ref().map_or(0.0, |m| m.casing_mass + m.propellant_mass);
                (c.mass + motor) * c.multiplicity()
            })
            .sum()
    }

    pub fn motor_ids(&self) -> Vec<ComponentId> {
        self.components.iter().filter(|c| c.capabilities().has_motor).map(|c| c.id).collect()
    }

    pub fn recovery_ids(&self) -> Vec<ComponentId> {
        self.components
            .iter()
            .filter(|c| c.capabilities().has_recovery_device)
            .map(|c| c.id)
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<ComponentId> {
        self.components.iter().find(|c| c.name == name).map(|c| c.id)
    }

    /// Attach another component, e.g. nose ballast.
    pub fn add_component(&mut self, component: ComponentBuilder) -> ComponentId {
        let id = ComponentId(self.components.len());
        self.components.push(component.build(id));
        id
    }
}

impl PhysicsProvider for Rocket {
    fn components(&self) -> &[Component] {
        &self.components
    }

    fn stages(&self) -> &[Stage] {
        &self.stages
    }

    fn reference_diameter(&self) -> f64 {
        self.reference_diameter
    }
}

// ---------------------------------------------------------------------------
// Rocket builder
// ---------------------------------------------------------------------------

pub struct RocketBuilder {
    name: String,
    reference_diameter: f64,
    stages: Vec<Stage>,
    components: Vec<ComponentBuilder>,
}

impl RocketBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference_diameter: 0.025,
            stages: vec![],
            components: vec![],
        }
    }

    pub fn reference_diameter(mut self, v: f64) -> Self { self.reference_diameter = v; self }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn component(mut self, component: ComponentBuilder) -> Self {
        self.components.push(component);
        self
    }

    pub fn build(self) -> Rocket {
        Rocket {
            name: self.name,
            reference_diameter: self.reference_diameter,
            stages: self.stages,
            components: self
                .components
                .into_iter()
                .enumerate()
                .map(|(i, c)| c.build(ComponentId(i)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Preset rockets
// ---------------------------------------------------------------------------

pub mod presets {
    use super::*;
    use crate::vehicle::component::{AeroSurface, RecoveryDevice};
    use crate::vehicle::config::{FlightConfiguration, IgnitionEvent};
    use crate::vehicle::motor::{Motor, ThrustCurve};
    use crate::vehicle::stage::StageId;

    pub const NOSE_CONE: &str = "Nose cone";
    pub const BODY_TUBE: &str = "Body tube";
    pub const MOTOR_MOUNT: &str = "Motor mount tube";
    pub const PARACHUTE: &str = "Parachute";
    pub const BOOSTER_MOUNT: &str = "Center booster mount";
    pub const SIDE_BOOSTER_MOUNT: &str = "Side booster mounts";

    fn nose_cone(stage: StageId) -> ComponentBuilder {
        ComponentBuilder::new(NOSE_CONE, stage)
            .mass(0.008)
            .cg(0.06)
            .inertia(Vector3::new(8.0e-6, 8.0e-6, 4.0e-7))
            .aero(AeroSurface { cn_alpha: 2.0, cp: 0.046, cd: 0.12, planform_area: 0.0018 })
    }

    fn body_tube(stage: StageId) -> ComponentBuilder {
        ComponentBuilder::new(BODY_TUBE, stage)
            .mass(0.018)
            .cg(0.25)
            .inertia(Vector3::new(1.35e-4, 1.35e-4, 2.8e-6))
            .aero(AeroSurface { cn_alpha: 0.0, cp: 0.25, cd: 0.2, planform_area: 0.0075 })
    }

    fn fins(stage: StageId) -> ComponentBuilder {
        ComponentBuilder::new("Fin set", stage)
            .mass(0.01)
            .cg(0.37)
            .inertia(Vector3::new(5.0e-6, 5.0e-6, 6.0e-6))
            .aero(AeroSurface { cn_alpha: 8.0, cp: 0.37, cd: 0.12, planform_area: 0.004 })
    }

    fn parachute(stage: StageId, area: f64) -> ComponentBuilder {
        ComponentBuilder::new(PARACHUTE, stage)
            .mass(0.004)
            .cg(0.15)
            .inertia(Vector3::new(1.0e-6, 1.0e-6, 1.0e-7))
            .recovery(RecoveryDevice { cd: 0.8, area })
    }

    /// Single-stage sport rocket with a 2 s motor, zero ejection delay and a
    /// parachute deployed by the ejection charge.
    ///
    /// The motor comes up to the rocket's weight about 0.13 s after
    /// ignition. With a zero-length guide, 0.05 s steps and ISA air the
    /// flight peaks at about 2.49 s and lands at about 43.08 s.
    pub fn single_stage() -> Rocket {
        let s0 = StageId(0);
        RocketBuilder::new("Alpha")
            .stage(Stage::axial(0, "Sustainer"))
            .component(nose_cone(s0))
            .component(body_tube(s0))
            .component(fins(s0))
            .component(
                ComponentBuilder::new(MOTOR_MOUNT, s0)
                    .mass(0.004)
                    .cg(0.33)
                    .inertia(Vector3::new(3.0e-6, 3.0e-6, 3.0e-7))
                    .motor(Motor {
                        designation: "C-2.0-0".into(),
                        curve: ThrustCurve::new(vec![
                            (0.0, 0.0),
                            (0.1275, 0.5),
                            (0.2, 11.0),
                            (0.35, 5.55),
                            (1.9, 3.7),
                            (2.0, 0.0),
                        ]),
                        casing_mass: 0.013,
                        propellant_mass: 0.011,
                        ejection_delay: Some(0.0),
                    }),
            )
            .component(parachute(s0, 0.12))
            .build()
    }

    /// Sustainer on a center booster with two strap-on side boosters.
    ///
    /// Side boosters burn 0.85 s and drop on their ejection charge; the
    /// center booster (lit 0.01 s after launch by its flight configuration)
    /// burns 2 s and drops, lighting the sustainer. Both discarded bodies
    /// are aerodynamically unstable on their own.
    ///
    /// The stack sits on the pad until the side boosters' final high-thrust
    /// phase at about 0.826 s. With a zero-length guide, 0.05 s steps and ISA
    /// air the side boosters turn over at about 1.03 s and land at about
    /// 1.21 s, the center booster turns over at about 2.85 s, and the
    /// sustainer peaks at about 8.5 s and lands at about 83.27 s.
    pub fn three_body() -> Rocket {
        let (s0, s1, s2) = (StageId(0), StageId(1), StageId(2));
        RocketBuilder::new("Three-body test rocket")
            .stage(Stage::axial(0, "Sustainer"))
            .stage(Stage::axial(1, "Center booster"))
            .stage(Stage::parallel(2, "Side boosters", s1))
            .component(nose_cone(s0))
            .component(body_tube(s0))
            .component(fins(s0))
            .component(parachute(s0, 0.2038))
            .component(
                ComponentBuilder::new(MOTOR_MOUNT, s0)
                    .mass(0.003)
                    .cg(0.33)
                    .inertia(Vector3::new(3.0e-6, 3.0e-6, 3.0e-7))
                    .motor(Motor {
                        designation: "S-2.0-5".into(),
                        curve: ThrustCurve::trapezoid(2.12, 0.05, 2.0),
                        casing_mass: 0.012,
                        propellant_mass: 0.010,
                        ejection_delay: Some(5.0),
                    }),
            )
            .component(
                ComponentBuilder::new("Center booster body", s1)
                    .mass(0.015)
                    .cg(0.55)
                    .inertia(Vector3::new(1.1e-4, 1.1e-4, 2.4e-6))
                    .aero(AeroSurface { cn_alpha: 0.5, cp: 0.42, cd: 0.15, planform_area: 0.0075 }),
            )
            .component(
                ComponentBuilder::new(BOOSTER_MOUNT, s1)
                    .mass(0.003)
                    .cg(0.6)
                    .inertia(Vector3::new(3.0e-6, 3.0e-6, 3.0e-7))
                    .motor(Motor {
                        designation: "B-2.0-0".into(),
                        // holds back while the side boosters are attached
                        curve: ThrustCurve::new(vec![
                            (0.0, 0.0),
                            (0.05, 1.3),
                            (0.84, 1.3),
                            (0.9, 1.72),
                            (1.95, 1.72),
                            (2.0, 0.0),
                        ]),
                        casing_mass: 0.015,
                        propellant_mass: 0.012,
                        ejection_delay: Some(0.0),
                    }),
            )
            .component(
                ComponentBuilder::new("Side booster bodies", s2)
                    .mass(0.01)
                    .cg(0.58)
                    .radial_offset(0.025)
                    .instances(2)
                    .inertia(Vector3::new(6.0e-5, 6.0e-5, 1.0e-6))
                    .aero(AeroSurface { cn_alpha: 0.5, cp: 0.45, cd: 0.1, planform_area: 0.004 }),
            )
            .component(
                ComponentBuilder::new(SIDE_BOOSTER_MOUNT, s2)
                    .mass(0.002)
                    .cg(0.6)
                    .radial_offset(0.025)
                    .instances(2)
                    .inertia(Vector3::new(2.0e-6, 2.0e-6, 2.0e-7))
                    .motor(Motor {
                        designation: "A-0.85-0".into(),
                        curve: ThrustCurve::new(vec![
                            (0.0, 0.0),
                            (0.05, 0.1),
                            (0.826, 0.1),
                            (0.8265, 2.75),
                            (0.85, 2.75),
                        ]),
                        casing_mass: 0.01,
                        propellant_mass: 0.006,
                        ejection_delay: Some(0.0),
                    }),
            )
            .build()
    }

    /// Flight configuration for [`three_body`]: every stage active, center
    /// booster lit 0.01 s after launch.
    pub fn three_body_configuration(rocket: &Rocket) -> FlightConfiguration {
        let config = FlightConfiguration::all_stages("Three-body", rocket);
        match rocket.find(BOOSTER_MOUNT) {
            Some(center) => config.with_ignition(center, IgnitionEvent::Launch, 0.01),
            None => config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::stage::StageId;

    #[test]
    fn builder_assigns_sequential_ids() {
        let r = presets::single_stage();
        for (i, c) in r.components.iter().enumerate() {
            assert_eq!(c.id, ComponentId(i));
        }
        assert_eq!(r.motor_ids().len(), 1);
        assert_eq!(r.recovery_ids().len(), 1);
    }

    #[test]
    fn ballast_adds_mass() {
        let mut r = presets::single_stage();
        let before = r.total_mass();
        r.add_component(ComponentBuilder::new("Ballast", StageId(0)).mass(0.01).cg(0.05));
        assert!((r.total_mass() - before - 0.01).abs() < 1e-12);
    }

    #[test]
    fn side_boosters_count_both_instances() {
        let r = presets::three_body();
        let id = r.find(presets::SIDE_BOOSTER_MOUNT).unwrap();
        let c = r.component(id).unwrap();
        assert_eq!(c.multiplicity(), 2.0);
        assert!(r.total_mass() > 0.15);
    }
}
