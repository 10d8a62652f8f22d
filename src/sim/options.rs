use nalgebra::{Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::physics::atmosphere::AtmosphereModel;

// ---------------------------------------------------------------------------
// Launch guide
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaunchGuide {
    pub length: f64,      // m of travel before the body is free
    pub angle: f64,       // rad from vertical
    pub azimuth: f64,     // rad clockwise from north
}

impl Default for LaunchGuide {
    fn default() -> Self {
        Self { length: 1.0, angle: 0.0, azimuth: 0.0 }
    }
}

impl LaunchGuide {
    /// Unit vector up the guide (ENU).
    pub fn direction(&self) -> Vector3<f64> {
        let (s, c) = self.angle.sin_cos();
        Vector3::new(s * self.azimuth.sin(), s * self.azimuth.cos(), c)
    }

    /// Attitude of a body sitting on the guide, nose along `direction()`.
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        let axis = Unit::new_normalize(Vector3::new(-self.azimuth.cos(), self.azimuth.sin(), 0.0));
        UnitQuaternion::from_axis_angle(&axis, self.angle)
    }
}

/// What happens to the other branches when one fails numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstabilityPolicy {
    /// Only the failing branch stops.
    #[default]
    TerminateBranch,
    /// The first failure ends the whole flight: every branch is replayed and
    /// stops at its first step boundary past the failure time.
    CancelAll,
}

// ---------------------------------------------------------------------------
// Simulation options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationOptions {
    pub time_step: f64,           // s
    pub max_time: f64,            // s, hard stop per branch
    pub atmosphere: AtmosphereModel,
    pub event_tolerance: f64,     // s, width of the bracket for crossing refinement
    pub launch_guide: LaunchGuide,
    pub launch_altitude: f64,     // m above sea level
    pub instability_policy: InstabilityPolicy,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            time_step: 0.05,
            max_time: 1200.0,
            atmosphere: AtmosphereModel::Isa,
            event_tolerance: 1e-4,
            launch_guide: LaunchGuide::default(),
            launch_altitude: 0.0,
            instability_policy: InstabilityPolicy::TerminateBranch,
        }
    }
}

impl SimulationOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("time step", self.time_step)?;
        positive("maximum time", self.max_time)?;
        positive("event tolerance", self.event_tolerance)?;
        if !(self.launch_guide.length.is_finite() && self.launch_guide.length >= 0.0) {
            let value = self.launch_guide.length;
            return Err(ConfigError::InvalidValue { what: "launch guide length", value });
        }
        let a = self.launch_guide.angle;
        if !(a.is_finite() && a.abs() < std::f64::consts::FRAC_PI_2) {
            return Err(ConfigError::InvalidValue { what: "launch guide angle", value: a });
        }
        if !self.launch_guide.azimuth.is_finite() {
            let value = self.launch_guide.azimuth;
            return Err(ConfigError::InvalidValue { what: "launch guide azimuth", value });
        }
        if !self.launch_altitude.is_finite() {
            let value = self.launch_altitude;
            return Err(ConfigError::InvalidValue { what: "launch altitude", value });
        }
        Ok(())
    }
}

fn positive(what: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue { what, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SimulationOptions::default().validate(), Ok(()));
    }

    #[test]
    fn zero_step_is_rejected() {
        let opts = SimulationOptions { time_step: 0.0, ..Default::default() };
        assert!(matches!(
            opts.validate(),
            Err(ConfigError::InvalidValue { what: "time step", .. })
        ));
    }

    #[test]
    fn orientation_points_nose_up_the_guide() {
        let guide = LaunchGuide { length: 1.0, angle: 0.1, azimuth: 0.7 };
        let nose = guide.orientation() * Vector3::z();
        assert!((nose - guide.direction()).norm() < 1e-12);
    }

    #[test]
    fn partial_options_deserialize_with_defaults() {
        let opts: SimulationOptions = serde_json::from_str(r#"{"time_step": 0.01}"#).unwrap();
        assert_eq!(opts.time_step, 0.01);
        assert_eq!(opts.max_time, 1200.0);
    }
}
