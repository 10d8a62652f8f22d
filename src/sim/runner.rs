use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::branch::{BranchManager, BranchStatus, FlightBranch, SimulatedData};
use super::detector::{armed_guards, fired, refine_crossing, should_tumble, Guard};
use super::error::{SimulationError, StepError};
use super::event::{EventSource, FlightEvent, FlightEventType};
use super::integrator::{FlightMode, FlightModel};
use super::options::{InstabilityPolicy, SimulationOptions};
use super::scheduler::Scheduler;
use crate::dynamics::SimulationState;
use crate::vehicle::{ComponentId, FlightConfiguration, MotorLedger, PhysicsProvider, StageId};

/// Scheduled events this close to the current time are due now, s.
const EVENT_SLACK: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Abort horizon
// ---------------------------------------------------------------------------

/// Earliest simulated time at which any branch aborted, shared by every
/// branch of one run. Held as `f64` bits so it can only be lowered.
struct AbortHorizon(AtomicU64);

impl AbortHorizon {
    fn new(time: f64) -> Self {
        Self(AtomicU64::new(time.to_bits()))
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn lower(&self, time: f64) {
        // Err only means an earlier abort is already recorded.
        let _ = self.0.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            (time < f64::from_bits(bits)).then_some(time.to_bits())
        });
    }
}

// ---------------------------------------------------------------------------
// Per-branch state machine
// ---------------------------------------------------------------------------

/// How a stretch of stepping one branch ended.
#[derive(Debug)]
pub enum BranchOutcome {
    /// The branch is sealed with SIMULATION_END.
    Finished(FlightBranch),
    /// A separation would split the body; the driver forks it and resumes.
    Separated { branch: FlightBranch, stages: BTreeSet<StageId> },
}

/// Shared, read-only context for stepping any branch of one simulation.
struct Stepper<'a> {
    provider: &'a dyn PhysicsProvider,
    scheduler: Scheduler<'a>,
    options: &'a SimulationOptions,
    cancel: &'a AtomicBool,
    horizon: &'a AbortHorizon,
}

impl Stepper<'_> {
    fn model<'b>(&'b self, branch: &'b FlightBranch) -> FlightModel<'b> {
        FlightModel {
            provider: self.provider,
            group: branch.group(),
            motors: &branch.motors,
            deployed: &branch.deployed,
            mode: branch.mode,
            atmosphere: &self.options.atmosphere,
            launch_altitude: self.options.launch_altitude,
            guide: self.options.launch_guide.direction(),
        }
    }

    /// Step `branch` until it terminates or has to fork.
    fn run(&self, mut branch: FlightBranch) -> BranchOutcome {
        loop {
            // Past another branch's abort nothing more happens, not even
            // events already due at this boundary.
            if branch.state.time > self.horizon.get() {
                self.end(&mut branch, BranchStatus::Cancelled);
                return BranchOutcome::Finished(branch);
            }

            while let Some(event) = branch.queue.pop_due(branch.state.time, EVENT_SLACK) {
                if let Some(stages) = self.apply(&mut branch, event) {
                    return BranchOutcome::Separated { branch, stages };
                }
            }

            if self.cancel.load(Ordering::Relaxed) {
                self.end(&mut branch, BranchStatus::Cancelled);
                return BranchOutcome::Finished(branch);
            }

            if branch.state.time >= self.options.max_time - EVENT_SLACK {
                self.end(&mut branch, BranchStatus::TimedOut);
                return BranchOutcome::Finished(branch);
            }

            let mut target =
                (branch.state.time + self.options.time_step).min(self.options.max_time);
            if let Some(next) = branch.queue.next_time() {
                target = target.min(next);
            }

            match self.advance(&branch, target - branch.state.time) {
                Ok((state, guards)) => {
                    branch.state = state;
                    branch.record.states.push(branch.state.clone());
                    // a body that tumbles over the top does so before its apogee
                    self.check_tumble(&mut branch);
                    for guard in guards {
                        self.on_guard(&mut branch, guard);
                    }
                    if branch.record.status.is_terminated() {
                        return BranchOutcome::Finished(branch);
                    }
                }
                Err(err) => {
                    self.abort(&mut branch, err);
                    return BranchOutcome::Finished(branch);
                }
            }
        }
    }

    /// Integrate one step of length `dt`, truncated at the earliest guard
    /// crossing. Returns the new state and the guards that fired.
    fn advance(
        &self,
        branch: &FlightBranch,
        dt: f64,
    ) -> Result<(SimulationState, Vec<Guard>), StepError> {
        let model = self.model(branch);
        let guide = &self.options.launch_guide;
        let start = &branch.state;
        let guards = armed_guards(&branch.flags, &branch.altitude_triggers);

        let before = model.sample(start);
        let mut next = model.step(start, dt)?;
        let mut after = model.sample(&next);
        let crossing = fired(&guards, (start, &before), (&next, &after), guide);
        if crossing.is_empty() {
            return Ok((next, crossing));
        }

        let mut h = dt;
        for guard in &crossing {
            let t = refine_crossing(dt, self.options.event_tolerance, |trial| {
                let s = model.step(start, trial)?;
                Ok(guard.value(&s, &model.sample(&s), guide) >= 0.0)
            })?;
            h = h.min(t);
        }
        if h < dt {
            next = model.step(start, h)?;
            after = model.sample(&next);
        }
        let hits = fired(&guards, (start, &before), (&next, &after), guide);
        Ok((next, hits))
    }

    fn log(
        &self,
        branch: &mut FlightBranch,
        kind: FlightEventType,
        source: EventSource,
    ) -> FlightEvent {
        let event = FlightEvent::new(kind, branch.state.time, source);
        self.log_event(branch, event)
    }

    fn log_event(&self, branch: &mut FlightBranch, event: FlightEvent) -> FlightEvent {
        let event = branch.log_event(event);
        debug!(
            branch = %branch.id(),
            kind = ?event.kind,
            time = event.time,
            source = ?event.source,
            "flight event"
        );
        event
    }

    /// Queue whatever `event` triggers on this body.
    fn schedule_consequences(&self, branch: &mut FlightBranch, event: &FlightEvent) {
        for next in self.scheduler.consequences(event) {
            if next.source.is_part_of(self.provider, branch.group()) {
                branch.queue.push(next);
            }
        }
    }

    fn motor_stage(&self, motor: ComponentId) -> Option<StageId> {
        self.provider.component(motor).map(|c| c.stage)
    }

    /// Apply a scheduled event. Returns the separating stages when the event
    /// splits the body.
    fn apply(&self, branch: &mut FlightBranch, event: FlightEvent) -> Option<BTreeSet<StageId>> {
        match (event.kind, event.source) {
            (FlightEventType::Ignition, EventSource::Component(motor)) => {
                let burn_time = self.provider.component(motor)?.motor.as_ref()?.burn_time();
                if !branch.motors.ignite(motor, event.time) {
                    warn!(
                        branch = %branch.id(),
                        motor = motor.0,
                        time = event.time,
                        "ignition skipped: motor is not armed"
                    );
                    return None;
                }
                let event = self.log_event(branch, event);
                branch.queue.push(FlightEvent::new(
                    FlightEventType::Burnout,
                    event.time + burn_time,
                    EventSource::Component(motor),
                ));
                self.schedule_consequences(branch, &event);
            }
            (FlightEventType::Burnout, EventSource::Component(motor)) => {
                if !branch.motors.burn_out(motor) {
                    warn!(
                        branch = %branch.id(),
                        motor = motor.0,
                        time = event.time,
                        "burnout skipped: motor is not burning"
                    );
                    return None;
                }
                let event = self.log_event(branch, event);
                let delay = self
                    .provider
                    .component(motor)
                    .and_then(|c| c.motor.as_ref()?.ejection_delay);
                if let (Some(delay), Some(stage)) = (delay, self.motor_stage(motor)) {
                    branch.queue.push(FlightEvent::new(
                        FlightEventType::EjectionCharge,
                        event.time + delay,
                        EventSource::Stage(stage),
                    ));
                }
                self.schedule_consequences(branch, &event);
            }
            (FlightEventType::StageSeparation, EventSource::Stage(stage)) => {
                if branch.separated.contains(&stage) || !branch.group().contains(stage) {
                    warn!(
                        branch = %branch.id(),
                        stage = stage.0,
                        time = event.time,
                        "separation skipped: stage is not attached"
                    );
                    return None;
                }
                let event = self.log_event(branch, event);
                let leaving = self.provider.separating_stages(stage);
                branch.separated.extend(leaving.iter().copied());
                self.schedule_consequences(branch, &event);

                let attached = leaving.iter().filter(|&&s| branch.group().contains(s)).count();
                if attached > 0 && attached < branch.group().len() {
                    return Some(leaving);
                }
            }
            (FlightEventType::RecoveryDeviceDeployment, EventSource::Component(device)) => {
                if !branch.deployed.insert(device) {
                    warn!(
                        branch = %branch.id(),
                        device = device.0,
                        time = event.time,
                        "deployment skipped: already deployed"
                    );
                    return None;
                }
                branch.altitude_triggers.remove(&device);
                if branch.mode != FlightMode::Guided {
                    branch.mode = FlightMode::Descent;
                }
                let event = self.log_event(branch, event);
                self.schedule_consequences(branch, &event);
            }
            _ => {
                let event = self.log_event(branch, event);
                self.schedule_consequences(branch, &event);
            }
        }
        None
    }

    fn on_guard(&self, branch: &mut FlightBranch, guard: Guard) {
        match guard {
            Guard::Liftoff => {
                branch.flags.liftoff = true;
                self.log(branch, FlightEventType::Liftoff, EventSource::Ambient);
                if self.options.launch_guide.length <= 0.0 {
                    self.clear_rod(branch);
                }
            }
            Guard::LaunchRod => self.clear_rod(branch),
            Guard::Apogee => {
                branch.flags.apogee = true;
                let event = self.log(branch, FlightEventType::Apogee, EventSource::Rocket);
                self.schedule_consequences(branch, &event);
            }
            Guard::Altitude { device, .. } => {
                branch.altitude_triggers.remove(&device);
                let at = branch.state.time + self.scheduler.deploy_delay(device);
                branch.queue.push(FlightEvent::new(
                    FlightEventType::RecoveryDeviceDeployment,
                    at,
                    EventSource::Component(device),
                ));
            }
            Guard::GroundHit => {
                branch.flags.ground_hit = true;
                self.log(branch, FlightEventType::GroundHit, EventSource::Ambient);
                self.end(branch, BranchStatus::Completed);
            }
        }
    }

    fn clear_rod(&self, branch: &mut FlightBranch) {
        branch.flags.rod_cleared = true;
        branch.mode =
            if branch.deployed.is_empty() { FlightMode::Free } else { FlightMode::Descent };
        self.log(branch, FlightEventType::LaunchRod, EventSource::Ambient);
    }

    fn check_tumble(&self, branch: &mut FlightBranch) {
        let sample = self.model(branch).sample(&branch.state);
        if should_tumble(branch.mode, &branch.flags, branch.motors.any_burning(), &sample) {
            branch.flags.tumbling = true;
            branch.mode = FlightMode::Tumbling;
            self.log(branch, FlightEventType::Tumble, EventSource::Ambient);
        }
    }

    fn abort(&self, branch: &mut FlightBranch, err: StepError) {
        warn!(branch = %branch.id(), error = %err, "branch aborted");
        if self.options.instability_policy == InstabilityPolicy::CancelAll {
            self.horizon.lower(branch.state.time);
        }
        self.log(branch, FlightEventType::SimulationAbort, EventSource::Ambient);
        self.end(branch, BranchStatus::Aborted { reason: err.to_string() });
    }

    fn end(&self, branch: &mut FlightBranch, status: BranchStatus) {
        self.log(branch, FlightEventType::SimulationEnd, EventSource::Ambient);
        branch.record.status = status;
    }
}

#[cfg(feature = "parallel")]
fn run_wave(stepper: &Stepper<'_>, branches: Vec<FlightBranch>) -> Vec<BranchOutcome> {
    branches.into_par_iter().map(|b| stepper.run(b)).collect()
}

#[cfg(not(feature = "parallel"))]
fn run_wave(stepper: &Stepper<'_>, branches: Vec<FlightBranch>) -> Vec<BranchOutcome> {
    branches.into_iter().map(|b| stepper.run(b)).collect()
}

// ---------------------------------------------------------------------------
// Simulation driver
// ---------------------------------------------------------------------------

/// Simulate a flight from the launch guide until every body has landed or
/// been stopped.
pub fn simulate(
    provider: &dyn PhysicsProvider,
    config: &FlightConfiguration,
    options: &SimulationOptions,
) -> Result<SimulatedData, SimulationError> {
    let cancel = AtomicBool::new(false);
    simulate_with(provider, config, options, &cancel)
}

/// Like [`simulate`], with a caller-owned cancellation flag. Raising the flag
/// stops every branch at its next step boundary, after the events due there.
///
/// Under [`InstabilityPolicy::CancelAll`] the first abort, in simulated time,
/// stops every other branch at its first step boundary past that time. Branches
/// run concurrently, so a sibling may get further before the abort is known;
/// the flight is then replayed against the final abort time, which makes the
/// result independent of thread timing.
pub fn simulate_with(
    provider: &dyn PhysicsProvider,
    config: &FlightConfiguration,
    options: &SimulationOptions,
    cancel: &AtomicBool,
) -> Result<SimulatedData, SimulationError> {
    options.validate()?;
    config.validate(provider)?;

    info!(configuration = %config.name, time_step = options.time_step, "simulation started");

    let horizon = AbortHorizon::new(f64::INFINITY);
    let mut data = fly(provider, config, options, cancel, &horizon);
    let abort_time = horizon.get();
    if abort_time.is_finite() {
        info!(abort_time, "replaying branches up to the first abort");
        data = fly(provider, config, options, cancel, &AbortHorizon::new(abort_time));
    }

    info!(branches = data.branch_count(), aborted = data.has_aborts(), "simulation finished");
    Ok(data)
}

/// One pass over the whole flight: the root branch, then waves of forked
/// branches until none is left active.
fn fly(
    provider: &dyn PhysicsProvider,
    config: &FlightConfiguration,
    options: &SimulationOptions,
    cancel: &AtomicBool,
    horizon: &AbortHorizon,
) -> SimulatedData {
    let stepper = Stepper {
        provider,
        scheduler: Scheduler::new(provider, config),
        options,
        cancel,
        horizon,
    };

    let mut manager = BranchManager::new();
    let group = config.launch_group();
    let motors = MotorLedger::armed(provider, &group);
    let propellant = provider.mass_properties(&group, &motors, 0.0).propellant;
    let state = SimulationState::at_rest(options.launch_guide.orientation(), propellant);
    let triggers = stepper.scheduler.altitude_triggers(&group);
    let mut root = manager.root(group, state, motors, triggers);
    root.queue.push(FlightEvent::new(FlightEventType::Launch, 0.0, EventSource::Rocket));

    let mut active = vec![root];
    while !active.is_empty() {
        let outcomes = run_wave(&stepper, std::mem::take(&mut active));
        for outcome in outcomes {
            match outcome {
                BranchOutcome::Finished(branch) => manager.retire(branch),
                BranchOutcome::Separated { mut branch, stages } => {
                    let child = manager.fork(provider, &mut branch, &stages);
                    active.push(branch);
                    active.extend(child);
                }
            }
        }
    }
    manager.into_data()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
