use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Thrust curve: piecewise-linear thrust vs. time since ignition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThrustCurve {
    /// (time since ignition s, thrust N), strictly increasing in time.
    points: Vec<(f64, f64)>,
}

impl ThrustCurve {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// Trapezoidal thrust profile: linear ramp to `peak`, hold, linear tail-off.
    pub fn trapezoid(peak: f64, ramp: f64, burn_time: f64) -> Self {
        let ramp = ramp.min(burn_time * 0.5);
        Self::new(vec![
            (0.0, 0.0),
            (ramp, peak),
            (burn_time - ramp, peak),
            (burn_time, 0.0),
        ])
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Why the curve cannot drive a simulation, if anything.
    pub fn defect(&self) -> Option<&'static str> {
        if self.points.len() < 2 {
            return Some("fewer than two samples");
        }
        if self.points.iter().any(|&(t, f)| !t.is_finite() || !f.is_finite() || f < 0.0) {
            return Some("non-finite or negative sample");
        }
        if self.points[0].0 != 0.0 {
            return Some("first sample is not at ignition");
        }
        if self.points.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Some("sample times not strictly increasing");
        }
        if self.total_impulse() <= 0.0 {
            return Some("zero total impulse");
        }
        None
    }

    /// Time from ignition to the last sample, s.
    pub fn burn_time(&self) -> f64 {
        self.points.last().map_or(0.0, |&(t, _)| t)
    }

    /// Thrust at `t` seconds after ignition, N. Zero outside the curve.
    pub fn thrust_at(&self, t: f64) -> f64 {
        if t < 0.0 || t > self.burn_time() {
            return 0.0;
        }
        for w in self.points.windows(2) {
            let (t0, f0) = w[0];
            let (t1, f1) = w[1];
            if t <= t1 {
                return f0 + (f1 - f0) * (t - t0) / (t1 - t0);
            }
        }
        0.0
    }

    /// Impulse delivered between ignition and `t`, N·s.
    pub fn impulse_until(&self, t: f64) -> f64 {
        if t <= 0.0 {
            return 0.0;
        }
        let mut impulse = 0.0;
        for w in self.points.windows(2) {
            let (t0, f0) = w[0];
            let (t1, f1) = w[1];
            if t >= t1 {
                impulse += 0.5 * (f0 + f1) * (t1 - t0);
            } else {
                let ft = f0 + (f1 - f0) * (t - t0) / (t1 - t0);
                impulse += 0.5 * (f0 + ft) * (t - t0);
                break;
            }
        }
        impulse
    }

    pub fn total_impulse(&self) -> f64 {
        self.impulse_until(self.burn_time())
    }
}

// ---------------------------------------------------------------------------
// Motor definition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motor {
    pub designation: String,
    pub curve: ThrustCurve,
    pub casing_mass: f64,         // kg
    pub propellant_mass: f64,     // kg at ignition
    /// Ejection charge delay after burnout, s. `None` for a plugged motor.
    pub ejection_delay: Option<f64>,
}

impl Motor {
    pub fn burn_time(&self) -> f64 {
        self.curve.burn_time()
    }

    /// Propellant left `elapsed` seconds after ignition, consumed in
    /// proportion to delivered impulse.
    pub fn propellant_remaining(&self, elapsed: f64) -> f64 {
        let total = self.curve.total_impulse();
        if total <= 0.0 {
            return self.propellant_mass;
        }
        let burnt = (self.curve.impulse_until(elapsed) / total).clamp(0.0, 1.0);
        self.propellant_mass * (1.0 - burnt)
    }
}
