use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::body_group::RocketBodyGroup;
use super::component::{Component, ComponentId};
use super::stage::{Stage, StageId};
use crate::physics::aerodynamics::mach_drag_factor;

// ---------------------------------------------------------------------------
// Motor ledger: which motors of a body have lit, and when
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotorPhase {
    Armed,
    Burning,
    BurntOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorRun {
    pub phase: MotorPhase,
    pub ignition: Option<f64>,
}

/// Per-branch record of motor ignitions, owned by the flying body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorLedger {
    runs: BTreeMap<ComponentId, MotorRun>,
}

impl MotorLedger {
    /// Ledger with every motor of `group` armed.
    pub fn armed(provider: &dyn PhysicsProvider, group: &RocketBodyGroup) -> Self {
        let runs = provider
            .components()
            .iter()
            .filter(|c| c.motor.is_some() && group.contains(c.stage))
            .map(|c| (c.id, MotorRun { phase: MotorPhase::Armed, ignition: None }))
            .collect();
        Self { runs }
    }

    pub fn phase(&self, motor: ComponentId) -> Option<MotorPhase> {
        self.runs.get(&motor).map(|r| r.phase)
    }

    pub fn ignition_time(&self, motor: ComponentId) -> Option<f64> {
        self.runs.get(&motor).and_then(|r| r.ignition)
    }

    /// Armed → Burning. Returns false when the motor is unknown or not armed.
    pub fn ignite(&mut self, motor: ComponentId, time: f64) -> bool {
        match self.runs.get_mut(&motor) {
            Some(run) if run.phase == MotorPhase::Armed => {
                run.phase = MotorPhase::Burning;
                run.ignition = Some(time);
                true
            }
            _ => false,
        }
    }

    /// Burning → BurntOut. Returns false when the motor was not burning.
    pub fn burn_out(&mut self, motor: ComponentId) -> bool {
        match self.runs.get_mut(&motor) {
            Some(run) if run.phase == MotorPhase::Burning => {
                run.phase = MotorPhase::BurntOut;
                true
            }
            _ => false,
        }
    }

    pub fn any_burning(&self) -> bool {
        self.runs.values().any(|r| r.phase == MotorPhase::Burning)
    }

    /// Move the entries selected by `leaving` into a new ledger.
    pub fn split_off(&mut self, mut leaving: impl FnMut(ComponentId) -> bool) -> MotorLedger {
        let ids: Vec<ComponentId> = self.runs.keys().copied().filter(|&id| leaving(id)).collect();
        let mut runs = BTreeMap::new();
        for id in ids {
            if let Some(run) = self.runs.remove(&id) {
                runs.insert(id, run);
            }
        }
        MotorLedger { runs }
    }
}

// ---------------------------------------------------------------------------
// Provider outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    pub mass: f64,                // kg
    pub cg: f64,                  // axial CG from nose tip, m
    pub inertia: Vector3<f64>,    // [Ixx, Iyy, Izz] about the body CG, kg·m^2
    pub propellant: f64,          // kg
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AeroCoefficients {
    pub cd: f64,                  // zero-lift drag coefficient incl. Mach correction
    pub cn_alpha: f64,            // 1/rad
    /// Axial CP from nose tip. `None` when the body produces no normal force.
    pub cp: Option<f64>,
    pub ref_area: f64,            // m^2
    pub ref_length: f64,          // m
    pub planform_area: f64,       // m^2
    pub recovery_cd_area: f64,    // Σ Cd·A of deployed recovery devices, m^2
}

impl AeroCoefficients {
    /// CG-to-CP distance in calibers, positive when stable.
    pub fn stability_margin(&self, cg: f64) -> Option<f64> {
        self.cp.map(|cp| (cp - cg) / self.ref_length)
    }
}

// ---------------------------------------------------------------------------
// Physics provider: flattened, read-only view of a rocket
// ---------------------------------------------------------------------------

/// Read-only description of the rocket consumed by the simulation core.
///
/// Implementors supply the flattened component list and stage topology; the
/// mass, thrust and aerodynamic queries are derived from those for any body
/// group and may be overridden by providers with better models.
pub trait PhysicsProvider: Send + Sync {
    fn components(&self) -> &[Component];

    /// Stages ordered from the top of the rocket downwards.
    fn stages(&self) -> &[Stage];

    fn reference_diameter(&self) -> f64;

    fn reference_area(&self) -> f64 {
        let d = self.reference_diameter();
        PI * d * d / 4.0
    }

    fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components().iter().find(|c| c.id == id)
    }

    fn stage(&self, id: StageId) -> Option<&Stage> {
        self.stages().iter().find(|s| s.id == id)
    }

    /// Stages that leave the rocket when `stage` separates: an axial stage
    /// takes every axial stage below it, and parallel stages go with their
    /// parents.
    fn separating_stages(&self, stage: StageId) -> BTreeSet<StageId> {
        let mut leaving = BTreeSet::new();
        let Some(root) = self.stage(stage) else {
            return leaving;
        };
        leaving.insert(stage);
        if root.is_axial() {
            leaving.extend(
                self.stages()
                    .iter()
                    .filter(|s| s.is_axial() && s.id > stage)
                    .map(|s| s.id),
            );
        }
        loop {
            let extra: Vec<StageId> = self
                .stages()
                .iter()
                .filter(|s| !leaving.contains(&s.id))
                .filter(|s| s.parent().is_some_and(|p| leaving.contains(&p)))
                .map(|s| s.id)
                .collect();
            if extra.is_empty() {
                break;
            }
            leaving.extend(extra);
        }
        leaving
    }

    fn mass_properties(
        &self,
        group: &RocketBodyGroup,
        motors: &MotorLedger,
        time: f64,
    ) -> MassProperties {
        let mut parts = Vec::new();
        let mut mass = 0.0;
        let mut moment = 0.0;
        let mut propellant = 0.0;

        for c in self.components().iter().filter(|c| group.contains(c.stage)) {
            let n = c.multiplicity();
            let mut each = c.mass;
            if let Some(motor) = &c.motor {
                let left = match motors.ignition_time(c.id) {
                    Some(t0) => motor.propellant_remaining(time - t0),
                    None => motor.propellant_mass,
                };
                each += motor.casing_mass + left;
                propellant += left * n;
            }
            let m = each * n;
            mass += m;
            moment += m * c.cg;
            parts.push((c, m));
        }

        let cg = if mass > 0.0 { moment / mass } else { 0.0 };
        let mut inertia = Vector3::zeros();
        for (c, m) in parts {
            let n = c.multiplicity();
            let d = c.cg - cg;
            let r2 = c.radial_offset * c.radial_offset;
            inertia.x += c.inertia.x * n + m * d * d + 0.5 * m * r2;
            inertia.y += c.inertia.y * n + m * d * d + 0.5 * m * r2;
            inertia.z += c.inertia.z * n + m * r2;
        }

        MassProperties { mass, cg, inertia, propellant }
    }

    /// Total thrust of the group's lit motors at `time`, N.
    fn thrust(&self, group: &RocketBodyGroup, motors: &MotorLedger, time: f64) -> f64 {
        self.components()
            .iter()
            .filter(|c| group.contains(c.stage))
            .filter_map(|c| {
                let motor = c.motor.as_ref()?;
                let t0 = motors.ignition_time(c.id)?;
                Some(motor.curve.thrust_at(time - t0) * c.multiplicity())
            })
            .sum()
    }

    fn aerodynamics(
        &self,
        group: &RocketBodyGroup,
        deployed: &BTreeSet<ComponentId>,
        mach: f64,
    ) -> AeroCoefficients {
        let mut cd = 0.0;
        let mut cn_alpha = 0.0;
        let mut cn_moment = 0.0;
        let mut planform_area = 0.0;
        let mut recovery_cd_area = 0.0;

        for c in self.components().iter().filter(|c| group.contains(c.stage)) {
            let n = c.multiplicity();
            if let Some(a) = &c.aero {
                cd += a.cd * n;
                cn_alpha += a.cn_alpha * n;
                cn_moment += a.cn_alpha * n * a.cp;
                planform_area += a.planform_area * n;
            }
            if let Some(r) = &c.recovery {
                if deployed.contains(&c.id) {
                    recovery_cd_area += r.cd * r.area * n;
                }
            }
        }

        AeroCoefficients {
            cd: cd * mach_drag_factor(mach),
            cn_alpha,
            cp: (cn_alpha > 0.0).then(|| cn_moment / cn_alpha),
            ref_area: self.reference_area(),
            ref_length: self.reference_diameter(),
            planform_area,
            recovery_cd_area,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::rocket::presets;

    #[test]
    fn ledger_rejects_double_ignition() {
        let rocket = presets::single_stage();
        let group = rocket.full_group();
        let mut ledger = MotorLedger::armed(&rocket, &group);
        let motor = rocket.motor_ids()[0];
        assert!(ledger.ignite(motor, 0.0));
        assert!(!ledger.ignite(motor, 1.0));
        assert!(ledger.burn_out(motor));
        assert!(!ledger.ignite(motor, 2.0));
        assert_eq!(ledger.phase(motor), Some(MotorPhase::BurntOut));
    }

    #[test]
    fn mass_drops_as_propellant_burns() {
        let rocket = presets::single_stage();
        let group = rocket.full_group();
        let mut ledger = MotorLedger::armed(&rocket, &group);
        let before = rocket.mass_properties(&group, &ledger, 0.0);
        ledger.ignite(rocket.motor_ids()[0], 0.0);
        let after = rocket.mass_properties(&group, &ledger, 10.0);
        assert!(after.mass < before.mass);
        assert!(after.propellant.abs() < 1e-12);
        assert!(before.propellant > 0.0);
    }

    #[test]
    fn unlit_motor_gives_no_thrust() {
        let rocket = presets::single_stage();
        let group = rocket.full_group();
        let ledger = MotorLedger::armed(&rocket, &group);
        assert_eq!(rocket.thrust(&group, &ledger, 0.5), 0.0);
    }

    #[test]
    fn single_stage_preset_is_stable() {
        let rocket = presets::single_stage();
        let group = rocket.full_group();
        let ledger = MotorLedger::armed(&rocket, &group);
        let mp = rocket.mass_properties(&group, &ledger, 0.0);
        let aero = rocket.aerodynamics(&group, &BTreeSet::new(), 0.1);
        assert!(aero.stability_margin(mp.cg).unwrap() > 0.5);
    }

    #[test]
    fn axial_separation_takes_lower_stages_and_boosters() {
        let rocket = presets::three_body();
        let leaving = rocket.separating_stages(StageId(1));
        assert_eq!(leaving, [StageId(1), StageId(2)].into_iter().collect());
        let side = rocket.separating_stages(StageId(2));
        assert_eq!(side, [StageId(2)].into_iter().collect());
    }

    #[test]
    fn deployed_recovery_device_adds_drag_area() {
        let rocket = presets::single_stage();
        let group = rocket.full_group();
        let chute = rocket.recovery_ids()[0];
        let packed = rocket.aerodynamics(&group, &BTreeSet::new(), 0.1);
        let open = rocket.aerodynamics(&group, &[chute].into_iter().collect(), 0.1);
        assert_eq!(packed.recovery_cd_area, 0.0);
        assert!(open.recovery_cd_area > 0.01);
    }
}
