use std::env;

use crate::sim::SimulationOptions;

// Environment overrides for the demo binary. Unset or unparsable values fall
// back to the library defaults.

pub fn time_step() -> Option<f64> {
    env::var("FLIGHT_SIM_TIME_STEP")
        .ok()
        .and_then(|v| v.parse().ok())
}

pub fn max_time() -> Option<f64> {
    env::var("FLIGHT_SIM_MAX_TIME")
        .ok()
        .and_then(|v| v.parse().ok())
}

/// Directory for JSON/CSV output; nothing is written when unset.
pub fn output_dir() -> Option<String> {
    env::var("FLIGHT_SIM_OUTPUT_DIR").ok().filter(|v| !v.is_empty())
}

pub fn simulation_options() -> SimulationOptions {
    let defaults = SimulationOptions::default();
    SimulationOptions {
        time_step: time_step().unwrap_or(defaults.time_step),
        max_time: max_time().unwrap_or(defaults.max_time),
        ..defaults
    }
}
