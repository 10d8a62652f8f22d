use std::collections::BTreeMap;

use super::event::{EventSource, FlightEvent, FlightEventType};
use crate::vehicle::{
    Component, ComponentId, DeployEvent, FlightConfiguration, IgnitionEvent, PhysicsProvider,
    RocketBodyGroup, SeparationEvent, StageId,
};

// ---------------------------------------------------------------------------
// Staging / ignition scheduler
// ---------------------------------------------------------------------------

/// Answers which ignitions, separations and recovery deployments a flight
/// event triggers under a flight configuration.
///
/// Only active stages take part. "Above" and "below" refer to the stack of
/// active axial stages; a parallel stage sits at its parent's level.
pub struct Scheduler<'a> {
    provider: &'a dyn PhysicsProvider,
    config: &'a FlightConfiguration,
    /// Active axial stages, top first.
    stack: Vec<StageId>,
}

impl<'a> Scheduler<'a> {
    pub fn new(provider: &'a dyn PhysicsProvider, config: &'a FlightConfiguration) -> Self {
        let stack = provider
            .stages()
            .iter()
            .filter(|s| s.is_axial() && config.is_active(s.id))
            .map(|s| s.id)
            .collect();
        Self { provider, config, stack }
    }

    fn level(&self, stage: StageId) -> Option<usize> {
        let axial = match self.provider.stage(stage)?.parent() {
            Some(parent) => parent,
            None => stage,
        };
        self.stack.iter().position(|&s| s == axial)
    }

    pub fn stage_below(&self, stage: StageId) -> Option<StageId> {
        let i = self.level(stage)?;
        self.stack.get(i + 1).copied()
    }

    pub fn stage_above(&self, stage: StageId) -> Option<StageId> {
        let i = self.level(stage)?;
        i.checked_sub(1).map(|j| self.stack[j])
    }

    fn is_bottom(&self, stage: StageId) -> bool {
        self.level(stage).is_some_and(|i| i + 1 == self.stack.len())
    }

    fn is_top(&self, stage: StageId) -> bool {
        self.stack.first() == Some(&stage)
    }

    /// Stage an event belongs to, if any.
    fn stage_of(&self, source: EventSource) -> Option<StageId> {
        match source {
            EventSource::Stage(s) => Some(s),
            EventSource::Component(c) => self.provider.component(c).map(|c| c.stage),
            EventSource::Rocket | EventSource::Ambient => None,
        }
    }

    fn active_components(&self) -> impl Iterator<Item = &Component> + '_ {
        self.provider
            .components()
            .iter()
            .filter(move |c| self.config.is_active(c.stage))
    }

    /// Does `event` trigger ignition of `motor`, and if so when?
    pub fn triggers_ignition(&self, event: &FlightEvent, motor: ComponentId) -> Option<f64> {
        let component = self.provider.component(motor)?;
        if component.motor.is_none() || !self.config.is_active(component.stage) {
            return None;
        }
        let rule = self.config.ignition_rule(motor);
        let own = component.stage;
        let from_below = || {
            self.stage_of(event.source)
                .is_some_and(|s| Some(s) == self.stage_below(own))
        };
        let hit = match rule.event {
            IgnitionEvent::Automatic => {
                let axial = self.provider.stage(own).is_some_and(|s| s.is_axial());
                let ground_lit = !axial || self.is_bottom(own);
                if ground_lit {
                    event.kind == FlightEventType::Launch
                } else {
                    event.kind == FlightEventType::StageSeparation && from_below()
                }
            }
            IgnitionEvent::Launch => event.kind == FlightEventType::Launch,
            IgnitionEvent::Burnout => event.kind == FlightEventType::Burnout && from_below(),
            IgnitionEvent::EjectionCharge => {
                event.kind == FlightEventType::EjectionCharge && from_below()
            }
            IgnitionEvent::Never => false,
        };
        hit.then_some(event.time + rule.delay)
    }

    pub fn ignitions_triggered_by(&self, event: &FlightEvent) -> Vec<FlightEvent> {
        self.active_components()
            .filter(|c| c.motor.is_some())
            .filter_map(|c| {
                let at = self.triggers_ignition(event, c.id)?;
                Some(FlightEvent::new(FlightEventType::Ignition, at, EventSource::Component(c.id)))
            })
            .collect()
    }

    pub fn separations_triggered_by(&self, event: &FlightEvent) -> Vec<FlightEvent> {
        let origin = self.stage_of(event.source);
        self.provider
            .stages()
            .iter()
            .filter(|s| self.config.is_active(s.id) && !self.is_top(s.id))
            .filter_map(|s| {
                let rule = self.config.separation_rule(s.id);
                let own = origin == Some(s.id);
                let kind = event.kind;
                let hit = match rule.event {
                    SeparationEvent::Ejection => kind == FlightEventType::EjectionCharge && own,
                    SeparationEvent::Burnout => kind == FlightEventType::Burnout && own,
                    SeparationEvent::Ignition => kind == FlightEventType::Ignition && own,
                    SeparationEvent::UpperIgnition => {
                        let upper = match s.parent() {
                            Some(parent) => Some(parent),
                            None => self.stage_above(s.id),
                        };
                        kind == FlightEventType::Ignition && origin.is_some() && origin == upper
                    }
                    SeparationEvent::Launch => kind == FlightEventType::Launch,
                    SeparationEvent::Never => false,
                };
                hit.then(|| {
                    let (time, source) = (event.time + rule.delay, EventSource::Stage(s.id));
                    FlightEvent::new(FlightEventType::StageSeparation, time, source)
                })
            })
            .collect()
    }

    pub fn deployments_triggered_by(&self, event: &FlightEvent) -> Vec<FlightEvent> {
        let origin = self.stage_of(event.source);
        self.active_components()
            .filter(|c| c.recovery.is_some())
            .filter_map(|c| {
                let rule = self.config.deploy_rule(c.id);
                let hit = match rule.event {
                    DeployEvent::Ejection => {
                        event.kind == FlightEventType::EjectionCharge && origin == Some(c.stage)
                    }
                    DeployEvent::Apogee => event.kind == FlightEventType::Apogee,
                    DeployEvent::LowerStageSeparation => {
                        event.kind == FlightEventType::StageSeparation
                            && origin.is_some()
                            && origin == self.stage_below(c.stage)
                    }
                    DeployEvent::Launch => event.kind == FlightEventType::Launch,
                    DeployEvent::Altitude(_) | DeployEvent::Never => false,
                };
                hit.then(|| {
                    FlightEvent::new(
                        FlightEventType::RecoveryDeviceDeployment,
                        event.time + rule.delay,
                        EventSource::Component(c.id),
                    )
                })
            })
            .collect()
    }

    /// Everything `event` schedules, in the order it should be queued.
    pub fn consequences(&self, event: &FlightEvent) -> Vec<FlightEvent> {
        let mut out = self.ignitions_triggered_by(event);
        out.extend(self.separations_triggered_by(event));
        out.extend(self.deployments_triggered_by(event));
        out
    }

    /// Recovery devices in `group` deployed when descending through a
    /// height, keyed by device.
    pub fn altitude_triggers(&self, group: &RocketBodyGroup) -> BTreeMap<ComponentId, f64> {
        self.active_components()
            .filter(|c| c.recovery.is_some() && group.contains(c.stage))
            .filter_map(|c| match self.config.deploy_rule(c.id).event {
                DeployEvent::Altitude(h) => Some((c.id, h)),
                _ => None,
            })
            .collect()
    }

    /// Delay between an altitude trigger and its deployment.
    pub fn deploy_delay(&self, device: ComponentId) -> f64 {
        self.config.deploy_rule(device).delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::presets;

    fn at(kind: FlightEventType, time: f64, source: EventSource) -> FlightEvent {
        FlightEvent::new(kind, time, source)
    }

    #[test]
    fn stack_order_for_three_body() {
        let r = presets::three_body();
        let cfg = FlightConfiguration::all_stages("all", &r);
        let s = Scheduler::new(&r, &cfg);
        assert_eq!(s.stage_below(StageId(0)), Some(StageId(1)));
        assert_eq!(s.stage_above(StageId(1)), Some(StageId(0)));
        assert_eq!(s.stage_above(StageId(0)), None);
        assert_eq!(s.stage_below(StageId(2)), None);
        assert_eq!(s.stage_above(StageId(2)), Some(StageId(0)));
    }

    #[test]
    fn automatic_ignition_lights_bottom_and_boosters_at_launch() {
        let r = presets::three_body();
        let cfg = FlightConfiguration::all_stages("all", &r);
        let s = Scheduler::new(&r, &cfg);
        let launch = at(FlightEventType::Launch, 0.0, EventSource::Rocket);
        let lit: Vec<_> = s.ignitions_triggered_by(&launch).iter().map(|e| e.source).collect();
        let center = r.find(presets::BOOSTER_MOUNT).unwrap();
        let side = r.find(presets::SIDE_BOOSTER_MOUNT).unwrap();
        assert_eq!(lit, vec![EventSource::Component(center), EventSource::Component(side)]);
    }

    #[test]
    fn sustainer_lights_on_booster_separation() {
        let r = presets::three_body();
        let cfg = FlightConfiguration::all_stages("all", &r);
        let s = Scheduler::new(&r, &cfg);
        let sustainer = r.find(presets::MOTOR_MOUNT).unwrap();
        let sep = at(FlightEventType::StageSeparation, 2.01, EventSource::Stage(StageId(1)));
        assert_eq!(s.triggers_ignition(&sep, sustainer), Some(2.01));
        let side_sep = at(FlightEventType::StageSeparation, 0.85, EventSource::Stage(StageId(2)));
        assert_eq!(s.triggers_ignition(&side_sep, sustainer), None);
    }

    #[test]
    fn ignition_delay_is_added() {
        let r = presets::three_body();
        let center = r.find(presets::BOOSTER_MOUNT).unwrap();
        let cfg = FlightConfiguration::all_stages("all", &r).with_ignition(
            center,
            IgnitionEvent::Launch,
            0.01,
        );
        let s = Scheduler::new(&r, &cfg);
        let launch = at(FlightEventType::Launch, 0.0, EventSource::Rocket);
        assert_eq!(s.triggers_ignition(&launch, center), Some(0.01));
    }

    #[test]
    fn ejection_separates_own_stage_but_never_the_top() {
        let r = presets::three_body();
        let cfg = FlightConfiguration::all_stages("all", &r);
        let s = Scheduler::new(&r, &cfg);
        let side = at(FlightEventType::EjectionCharge, 0.85, EventSource::Stage(StageId(2)));
        let seps = s.separations_triggered_by(&side);
        assert_eq!(seps.len(), 1);
        assert_eq!(seps[0].source, EventSource::Stage(StageId(2)));
        let top = at(FlightEventType::EjectionCharge, 9.0, EventSource::Stage(StageId(0)));
        assert!(s.separations_triggered_by(&top).is_empty());
    }

    #[test]
    fn upper_ignition_separation_follows_the_stage_above() {
        let r = presets::three_body();
        let sustainer = r.find(presets::MOTOR_MOUNT).unwrap();
        let cfg = FlightConfiguration::all_stages("all", &r).with_separation(
            StageId(1),
            SeparationEvent::UpperIgnition,
            0.0,
        );
        let s = Scheduler::new(&r, &cfg);
        let lit = at(FlightEventType::Ignition, 3.0, EventSource::Component(sustainer));
        let seps = s.separations_triggered_by(&lit);
        let expected = at(FlightEventType::StageSeparation, 3.0, EventSource::Stage(StageId(1)));
        assert_eq!(seps, vec![expected]);
    }

    #[test]
    fn deployment_rules() {
        let r = presets::single_stage();
        let chute = r.recovery_ids()[0];
        let cfg = FlightConfiguration::all_stages("d", &r);
        let s = Scheduler::new(&r, &cfg);
        let ejection = at(FlightEventType::EjectionCharge, 2.0, EventSource::Stage(StageId(0)));
        assert_eq!(s.deployments_triggered_by(&ejection).len(), 1);

        let cfg = cfg.with_deployment(chute, DeployEvent::Altitude(150.0), 0.5);
        let s = Scheduler::new(&r, &cfg);
        assert!(s.deployments_triggered_by(&ejection).is_empty());
        assert_eq!(s.altitude_triggers(&r.full_group()).get(&chute), Some(&150.0));
        assert_eq!(s.deploy_delay(chute), 0.5);
    }
}
