use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::vehicle::{ComponentId, PhysicsProvider, RocketBodyGroup, StageId};

// ---------------------------------------------------------------------------
// Flight events
// ---------------------------------------------------------------------------

/// Kinds of flight events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlightEventType {
    Launch,
    Ignition,
    Liftoff,
    LaunchRod,
    Burnout,
    EjectionCharge,
    StageSeparation,
    RecoveryDeviceDeployment,
    Apogee,
    Tumble,
    GroundHit,
    SimulationAbort,
    SimulationEnd,
}

impl FlightEventType {
    /// Order of events falling on the same instant: causes before their
    /// consequences.
    pub fn priority(self) -> u8 {
        match self {
            FlightEventType::Launch => 0,
            FlightEventType::Burnout => 1,
            FlightEventType::EjectionCharge => 2,
            FlightEventType::StageSeparation => 3,
            FlightEventType::Ignition => 4,
            FlightEventType::RecoveryDeviceDeployment => 5,
            FlightEventType::SimulationAbort => 8,
            FlightEventType::SimulationEnd => 9,
            _ => 6,
        }
    }
}

/// What an event is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EventSource {
    Rocket,
    Stage(StageId),
    Component(ComponentId),
    /// Not attributable to any part of the rocket.
    Ambient,
}

impl EventSource {
    /// Whether the source is a part of `group`. Whole-rocket and ambient
    /// sources belong to no particular body.
    pub fn is_part_of(&self, provider: &dyn PhysicsProvider, group: &RocketBodyGroup) -> bool {
        match *self {
            EventSource::Stage(s) => group.contains(s),
            EventSource::Component(c) => {
                provider.component(c).is_some_and(|c| group.contains(c.stage))
            }
            EventSource::Rocket | EventSource::Ambient => false,
        }
    }
}

/// A discrete event that occurred during flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlightEvent {
    pub kind: FlightEventType,
    pub time: f64,
    pub source: EventSource,
}

impl FlightEvent {
    pub fn new(kind: FlightEventType, time: f64, source: EventSource) -> Self {
        Self { kind, time, source }
    }
}

// ---------------------------------------------------------------------------
// Queue of scheduled (future) events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Queued {
    event: FlightEvent,
    seq: u64,
}

impl Queued {
    fn order(&self, other: &Queued) -> Ordering {
        self.event
            .time
            .total_cmp(&other.event.time)
            .then(self.event.kind.priority().cmp(&other.event.kind.priority()))
            .then(self.seq.cmp(&other.seq))
    }
}

/// Events scheduled for a known future time, popped by (time, priority,
/// insertion order).
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    entries: Vec<Queued>,
    next_seq: u64,
}

impl EventQueue {
    pub fn push(&mut self, event: FlightEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Queued { event, seq });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn first(&self) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.order(b))
            .map(|(i, _)| i)
    }

    pub fn next_time(&self) -> Option<f64> {
        self.first().map(|i| self.entries[i].event.time)
    }

    /// Remove and return the first event due at or before `now + slack`.
    pub fn pop_due(&mut self, now: f64, slack: f64) -> Option<FlightEvent> {
        let i = self.first()?;
        if self.entries[i].event.time <= now + slack {
            Some(self.entries.swap_remove(i).event)
        } else {
            None
        }
    }

    /// Move the events selected by `leaving` into a new queue, keeping their
    /// relative order.
    pub fn split_off(&mut self, mut leaving: impl FnMut(&FlightEvent) -> bool) -> EventQueue {
        let (out, keep): (Vec<Queued>, Vec<Queued>) =
            self.entries.drain(..).partition(|q| leaving(&q.event));
        self.entries = keep;
        EventQueue { entries: out, next_seq: self.next_seq }
    }
}
