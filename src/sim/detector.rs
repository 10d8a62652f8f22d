use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::StepError;
use super::event::FlightEventType;
use super::integrator::{FlightMode, FlightSample};
use super::options::LaunchGuide;
use crate::dynamics::SimulationState;
use crate::vehicle::ComponentId;

/// Bodies with less margin than this (calibers) are considered unstable.
pub const MIN_TUMBLE_MARGIN: f64 = 0.0;

/// Angle of attack beyond which an unstable body starts to tumble, rad (30°).
pub const AOA_TUMBLE_LIMIT: f64 = 0.523_598_775_598_298_9;

// ---------------------------------------------------------------------------
// Per-branch flight flags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightFlags {
    pub liftoff: bool,
    pub rod_cleared: bool,
    pub apogee: bool,
    pub tumbling: bool,
    pub ground_hit: bool,
    /// The body was dropped by another one.
    pub discarded: bool,
}

// ---------------------------------------------------------------------------
// Threshold guards
// ---------------------------------------------------------------------------

/// A continuous condition whose zero crossing is an event. A guard fires when
/// its value goes from negative before a step to non-negative after it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Guard {
    Liftoff,
    LaunchRod,
    Apogee,
    /// Descending through a recovery device's deployment height.
    Altitude { device: ComponentId, height: f64 },
    GroundHit,
}

impl Guard {
    pub fn value(
        &self,
        state: &SimulationState,
        sample: &FlightSample,
        guide: &LaunchGuide,
    ) -> f64 {
        match *self {
            Guard::Liftoff => sample.guide_force,
            Guard::LaunchRod => state.pos.dot(&guide.direction()) - guide.length,
            Guard::Apogee => -state.vel.z,
            Guard::Altitude { height, .. } => height - state.altitude(),
            Guard::GroundHit => -state.altitude(),
        }
    }

    /// The event recorded when this guard fires. Altitude guards only
    /// schedule a deployment and record nothing themselves.
    pub fn event(&self) -> Option<FlightEventType> {
        match self {
            Guard::Liftoff => Some(FlightEventType::Liftoff),
            Guard::LaunchRod => Some(FlightEventType::LaunchRod),
            Guard::Apogee => Some(FlightEventType::Apogee),
            Guard::Altitude { .. } => None,
            Guard::GroundHit => Some(FlightEventType::GroundHit),
        }
    }
}

/// Guards that can fire from the current flags, in firing order.
pub fn armed_guards(
    flags: &FlightFlags,
    altitude_triggers: &BTreeMap<ComponentId, f64>,
) -> Vec<Guard> {
    let mut guards = Vec::new();
    if flags.ground_hit {
        return guards;
    }
    if !flags.liftoff {
        guards.push(Guard::Liftoff);
        return guards;
    }
    if !flags.rod_cleared {
        guards.push(Guard::LaunchRod);
    }
    if !flags.apogee {
        guards.push(Guard::Apogee);
    } else {
        guards.extend(
            altitude_triggers
                .iter()
                .map(|(&device, &height)| Guard::Altitude { device, height }),
        );
    }
    guards.push(Guard::GroundHit);
    guards
}

/// Shortest step length in `(0, dt]` after which `crossed` holds, to within
/// `tolerance` seconds. `crossed(dt)` is assumed true.
///
/// Bisection on the step length, each trial re-integrating from the
/// pre-step state, so the returned length always lands on the far side of
/// the crossing.
pub fn refine_crossing<F>(dt: f64, tolerance: f64, mut crossed: F) -> Result<f64, StepError>
where
    F: FnMut(f64) -> Result<bool, StepError>,
{
    let (mut lo, mut hi) = (0.0, dt);
    while hi - lo > tolerance {
        let mid = 0.5 * (lo + hi);
        if crossed(mid)? {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Ok(hi)
}

/// Guards that fired between two samples, in firing order.
pub fn fired(
    guards: &[Guard],
    before: (&SimulationState, &FlightSample),
    after: (&SimulationState, &FlightSample),
    guide: &LaunchGuide,
) -> Vec<Guard> {
    guards
        .iter()
        .copied()
        .filter(|g| {
            g.value(before.0, before.1, guide) < 0.0 && g.value(after.0, after.1, guide) >= 0.0
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tumble
// ---------------------------------------------------------------------------

/// Whether a freely flying body should switch to tumbling.
///
/// The body must be unpowered, aerodynamically unstable and flying at more
/// than [`AOA_TUMBLE_LIMIT`] to its airflow. On top of that it must either
/// have been dropped by another body or be past apogee.
pub fn should_tumble(
    mode: FlightMode,
    flags: &FlightFlags,
    powered: bool,
    sample: &FlightSample,
) -> bool {
    if mode != FlightMode::Free || flags.tumbling || flags.ground_hit || powered {
        return false;
    }
    let unstable = sample.stability_margin.map_or(true, |m| m < MIN_TUMBLE_MARGIN);
    if !unstable || sample.angle_of_attack <= AOA_TUMBLE_LIMIT {
        return false;
    }
    flags.discarded || flags.apogee
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{UnitQuaternion, Vector3};

    fn sample(margin: Option<f64>, aoa: f64) -> FlightSample {
        FlightSample {
            thrust: 0.0,
            mass: 0.1,
            cg: 0.3,
            guide_force: -1.0,
            angle_of_attack: aoa,
            stability_margin: margin,
            mach: 0.1,
        }
    }

    #[test]
    fn only_liftoff_is_armed_on_the_pad() {
        let flags = FlightFlags::default();
        assert_eq!(armed_guards(&flags, &BTreeMap::new()), vec![Guard::Liftoff]);
    }

    #[test]
    fn altitude_guards_arm_after_apogee() {
        let chute = ComponentId(3);
        let triggers: BTreeMap<_, _> = [(chute, 100.0)].into_iter().collect();
        let mut flags = FlightFlags { liftoff: true, rod_cleared: true, ..FlightFlags::default() };
        assert_eq!(armed_guards(&flags, &triggers), vec![Guard::Apogee, Guard::GroundHit]);
        flags.apogee = true;
        assert_eq!(
            armed_guards(&flags, &triggers),
            vec![Guard::Altitude { device: chute, height: 100.0 }, Guard::GroundHit]
        );
    }

    #[test]
    fn bisection_brackets_crossing() {
        let t = refine_crossing(0.05, 1e-6, |h| Ok(h >= 0.0123)).unwrap();
        assert!(t >= 0.0123 && t - 0.0123 <= 1e-6);
    }

    #[test]
    fn bisection_propagates_errors() {
        let err = StepError::NumericalInstability { time: 0.0, detail: "x".into() };
        let e = err.clone();
        assert_eq!(refine_crossing(1.0, 1e-3, move |_| Err(e.clone())), Err(err));
    }

    #[test]
    fn ground_hit_fires_on_descent_only() {
        let guide = LaunchGuide::default();
        let s = sample(Some(1.0), 0.0);
        let mut above = SimulationState::at_rest(UnitQuaternion::identity(), 0.0);
        above.pos = Vector3::new(0.0, 0.0, 2.0);
        let mut below = above.clone();
        below.pos.z = -0.1;
        let guards = [Guard::GroundHit];
        assert_eq!(fired(&guards, (&above, &s), (&below, &s), &guide), vec![Guard::GroundHit]);
        assert!(fired(&guards, (&below, &s), (&above, &s), &guide).is_empty());
    }

    #[test]
    fn discarded_unstable_body_tumbles_once_it_turns_over() {
        let flags = FlightFlags {
            liftoff: true,
            rod_cleared: true,
            discarded: true,
            ..FlightFlags::default()
        };
        let falling = std::f64::consts::PI;
        assert!(!should_tumble(FlightMode::Free, &flags, false, &sample(Some(-2.0), 0.0)));
        assert!(should_tumble(FlightMode::Free, &flags, false, &sample(Some(-2.0), falling)));
        assert!(!should_tumble(FlightMode::Free, &flags, true, &sample(Some(-2.0), falling)));
        assert!(!should_tumble(FlightMode::Free, &flags, false, &sample(Some(1.5), falling)));
        assert!(!should_tumble(FlightMode::Descent, &flags, false, &sample(None, falling)));
    }

    #[test]
    fn main_body_tumbles_only_after_apogee_at_high_aoa() {
        let mut flags = FlightFlags { liftoff: true, rod_cleared: true, ..FlightFlags::default() };
        assert!(!should_tumble(FlightMode::Free, &flags, false, &sample(Some(-1.0), 1.0)));
        flags.apogee = true;
        assert!(!should_tumble(FlightMode::Free, &flags, false, &sample(Some(-1.0), 0.1)));
        assert!(should_tumble(FlightMode::Free, &flags, false, &sample(Some(-1.0), 1.0)));
        assert!(should_tumble(FlightMode::Free, &flags, false, &sample(None, 1.0)));
    }
}
