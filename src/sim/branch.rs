use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::detector::FlightFlags;
use super::event::{EventQueue, FlightEvent, FlightEventType};
use super::integrator::FlightMode;
use crate::dynamics::SimulationState;
use crate::vehicle::{ComponentId, MotorLedger, PhysicsProvider, RocketBodyGroup, StageId};

// ---------------------------------------------------------------------------
// Branch records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchId(pub usize);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BranchStatus {
    Active,
    /// Ended at ground impact.
    Completed,
    /// Stopped at the maximum simulated time.
    TimedOut,
    /// Stopped by a numerical failure.
    Aborted { reason: String },
    /// Stopped because another branch failed.
    Cancelled,
}

impl BranchStatus {
    pub fn is_terminated(&self) -> bool {
        !matches!(self, BranchStatus::Active)
    }
}

/// The recorded flight of one independently moving body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationBranch {
    pub id: BranchId,
    pub parent: Option<BranchId>,
    pub events: Vec<FlightEvent>,
    pub states: Vec<SimulationState>,
    pub group: RocketBodyGroup,
    pub status: BranchStatus,
}

impl SimulationBranch {
    pub fn last_event(&self) -> Option<&FlightEvent> {
        self.events.last()
    }

    /// First occurrence of `kind`.
    pub fn find(&self, kind: FlightEventType) -> Option<&FlightEvent> {
        self.events.iter().find(|e| e.kind == kind)
    }

    pub fn kinds(&self) -> Vec<FlightEventType> {
        self.events.iter().map(|e| e.kind).collect()
    }

    pub fn max_altitude(&self) -> f64 {
        self.states.iter().map(|s| s.pos.z).fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Output of a simulation: every branch, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatedData {
    pub branches: BTreeMap<BranchId, SimulationBranch>,
}

impl SimulatedData {
    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    pub fn branch(&self, id: usize) -> Option<&SimulationBranch> {
        self.branches.get(&BranchId(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimulationBranch> {
        self.branches.values()
    }

    /// Whether any branch stopped on a numerical failure.
    pub fn has_aborts(&self) -> bool {
        self.iter().any(|b| matches!(b.status, BranchStatus::Aborted { .. }))
    }
}

// ---------------------------------------------------------------------------
// Live branch: record plus everything needed to keep stepping it
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FlightBranch {
    pub record: SimulationBranch,
    pub state: SimulationState,
    pub motors: MotorLedger,
    pub deployed: BTreeSet<ComponentId>,
    pub mode: FlightMode,
    pub flags: FlightFlags,
    pub queue: EventQueue,
    /// Stages already separated from this body or its ancestors.
    pub separated: BTreeSet<StageId>,
    /// Devices still waiting for their deployment height.
    pub altitude_triggers: BTreeMap<ComponentId, f64>,
}

impl FlightBranch {
    pub fn id(&self) -> BranchId {
        self.record.id
    }

    pub fn group(&self) -> &RocketBodyGroup {
        &self.record.group
    }

    /// Append `event` to the log. Times never run backwards within a branch.
    pub fn log_event(&mut self, mut event: FlightEvent) -> FlightEvent {
        if let Some(last) = self.record.events.last() {
            event.time = event.time.max(last.time);
        }
        self.record.events.push(event);
        event
    }

    /// Split the stages in `leaving` off into a new body with id `id`.
    ///
    /// The new body starts from the current state. It takes the recorded
    /// events, scheduled events, motors and altitude triggers that belong to
    /// its own stages. Returns `None` when nothing or everything would leave.
    pub fn split_off(
        &mut self,
        provider: &dyn PhysicsProvider,
        leaving: &BTreeSet<StageId>,
        id: BranchId,
    ) -> Option<FlightBranch> {
        let group = self.record.group.split_off(leaving)?;
        let stage_of = |c: ComponentId| provider.component(c).map(|c| c.stage);
        let in_child = |c: ComponentId| stage_of(c).is_some_and(|s| group.contains(s));

        let events = self
            .record
            .events
            .iter()
            .filter(|e| e.source.is_part_of(provider, &group))
            .copied()
            .collect();
        let queue = self.queue.split_off(|e| e.source.is_part_of(provider, &group));
        let motors = self.motors.split_off(in_child);
        let deployed = self.deployed.iter().copied().filter(|&c| in_child(c)).collect();

        let mut altitude_triggers = BTreeMap::new();
        self.altitude_triggers.retain(|&c, &mut h| {
            if in_child(c) {
                altitude_triggers.insert(c, h);
                false
            } else {
                true
            }
        });

        Some(FlightBranch {
            record: SimulationBranch {
                id,
                parent: Some(self.record.id),
                events,
                states: vec![self.state.clone()],
                group,
                status: BranchStatus::Active,
            },
            state: self.state.clone(),
            motors,
            deployed,
            mode: self.mode,
            flags: FlightFlags { discarded: true, ..self.flags.clone() },
            queue,
            separated: self.separated.clone(),
            altitude_triggers,
        })
    }

    pub fn finish(self) -> SimulationBranch {
        self.record
    }
}

// ---------------------------------------------------------------------------
// Branch manager: the registry of finished branches and id allocation
// ---------------------------------------------------------------------------

/// Allocates branch ids and collects finished branches. Owned by the driver
/// and only touched between stepping waves.
#[derive(Debug, Default)]
pub struct BranchManager {
    finished: BTreeMap<BranchId, SimulationBranch>,
    next_id: usize,
}

impl BranchManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> BranchId {
        let id = BranchId(self.next_id);
        self.next_id += 1;
        id
    }

    /// The branch that starts on the launch guide.
    pub fn root(
        &mut self,
        group: RocketBodyGroup,
        state: SimulationState,
        motors: MotorLedger,
        altitude_triggers: BTreeMap<ComponentId, f64>,
    ) -> FlightBranch {
        let id = self.allocate();
        FlightBranch {
            record: SimulationBranch {
                id,
                parent: None,
                events: Vec::new(),
                states: vec![state.clone()],
                group,
                status: BranchStatus::Active,
            },
            state,
            motors,
            deployed: BTreeSet::new(),
            mode: FlightMode::Guided,
            flags: FlightFlags::default(),
            queue: EventQueue::default(),
            separated: BTreeSet::new(),
            altitude_triggers,
        }
    }

    /// Fork `parent` at a separation of `leaving`. The parent keeps its id;
    /// the separated body gets the next free one.
    pub fn fork(
        &mut self,
        provider: &dyn PhysicsProvider,
        parent: &mut FlightBranch,
        leaving: &BTreeSet<StageId>,
    ) -> Option<FlightBranch> {
        let id = BranchId(self.next_id);
        let child = parent.split_off(provider, leaving, id)?;
        self.allocate();
        let stages: Vec<StageId> = child.group().stages().collect();
        let time = parent.state.time;
        info!(parent = %parent.id(), child = %id, time, ?stages, "branch forked");
        Some(child)
    }

    pub fn retire(&mut self, branch: FlightBranch) {
        let record = branch.finish();
        let events = record.events.len();
        info!(branch = %record.id, status = ?record.status, events, "branch finished");
        self.finished.insert(record.id, record);
    }

    pub fn into_data(self) -> SimulatedData {
        SimulatedData { branches: self.finished }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::event::EventSource;
    use crate::vehicle::presets;
    use nalgebra::UnitQuaternion;

    fn root(manager: &mut BranchManager) -> (crate::vehicle::Rocket, FlightBranch) {
        let rocket = presets::three_body();
        let group = rocket.full_group();
        let motors = MotorLedger::armed(&rocket, &group);
        let state = SimulationState::at_rest(UnitQuaternion::identity(), 0.0);
        let branch = manager.root(group, state, motors, BTreeMap::new());
        (rocket, branch)
    }

    #[test]
    fn fork_conserves_the_body_group() {
        let mut m = BranchManager::new();
        let (rocket, mut parent) = root(&mut m);
        let before = parent.group().clone();
        let leaving = rocket.separating_stages(StageId(2));
        let child = m.fork(&rocket, &mut parent, &leaving).unwrap();

        let mut union: Vec<_> = parent.group().stages().chain(child.group().stages()).collect();
        union.sort();
        assert_eq!(union, before.stages().collect::<Vec<_>>());
        assert_eq!(child.id(), BranchId(1));
        assert_eq!(child.record.parent, Some(BranchId(0)));
        assert!(child.flags.discarded && !parent.flags.discarded);
    }

    #[test]
    fn child_takes_its_own_events_and_motors() {
        let mut m = BranchManager::new();
        let (rocket, mut parent) = root(&mut m);
        let side = rocket.find(presets::SIDE_BOOSTER_MOUNT).unwrap();
        let center = rocket.find(presets::BOOSTER_MOUNT).unwrap();
        let (side_src, center_src) = (EventSource::Component(side), EventSource::Component(center));
        parent.log_event(FlightEvent::new(FlightEventType::Launch, 0.0, EventSource::Rocket));
        parent.log_event(FlightEvent::new(FlightEventType::Ignition, 0.0, side_src));
        parent.log_event(FlightEvent::new(FlightEventType::Ignition, 0.0, center_src));
        parent.queue.push(FlightEvent::new(FlightEventType::Burnout, 0.85, side_src));
        parent.queue.push(FlightEvent::new(FlightEventType::Burnout, 2.0, center_src));

        let child = m.fork(&rocket, &mut parent, &rocket.separating_stages(StageId(2))).unwrap();
        assert_eq!(child.record.events.len(), 1);
        assert_eq!(child.record.events[0].source, side_src);
        assert_eq!(parent.record.events.len(), 3);
        assert_eq!(child.queue.len(), 1);
        assert_eq!(parent.queue.len(), 1);
        assert!(child.motors.phase(side).is_some() && parent.motors.phase(side).is_none());
    }

    #[test]
    fn separating_everything_forks_nothing() {
        let mut m = BranchManager::new();
        let (rocket, mut parent) = root(&mut m);
        let all: BTreeSet<_> = rocket.stages.iter().map(|s| s.id).collect();
        assert!(m.fork(&rocket, &mut parent, &all).is_none());
        assert_eq!(parent.group().len(), 3);
        // the failed fork must not consume an id
        let child = m.fork(&rocket, &mut parent, &rocket.separating_stages(StageId(1))).unwrap();
        assert_eq!(child.id(), BranchId(1));
    }

    #[test]
    fn retired_branches_are_keyed_by_id() {
        let mut m = BranchManager::new();
        let (_, mut parent) = root(&mut m);
        parent.record.status = BranchStatus::Completed;
        m.retire(parent);
        let data = m.into_data();
        assert_eq!(data.branch_count(), 1);
        assert_eq!(data.branch(0).unwrap().status, BranchStatus::Completed);
    }
}
