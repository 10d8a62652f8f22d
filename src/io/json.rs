use std::io::{self, Write};

use serde::Serialize;

use crate::physics::atmosphere::AtmosphereModel;
use crate::sim::{BranchId, BranchStatus, SimulatedData, SimulationBranch};

/// Summary statistics computed from one branch's state history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlightSummary {
    pub branch: BranchId,
    pub parent: Option<BranchId>,
    pub status: BranchStatus,
    pub apogee_m: f64,
    pub apogee_time: f64,
    pub max_speed: f64,
    pub max_mach: f64,
    pub flight_time: f64,
    pub impact_speed: f64,
}

impl FlightSummary {
    /// `None` for a branch without any recorded state.
    pub fn from_branch(
        branch: &SimulationBranch,
        atmosphere: &AtmosphereModel,
        launch_altitude: f64,
    ) -> Option<Self> {
        let first = branch.states.first()?;
        let last = branch.states.last()?;
        let apogee = branch
            .states
            .iter()
            .max_by(|a, b| a.pos.z.total_cmp(&b.pos.z))?;

        let max_speed = branch
            .states
            .iter()
            .map(|s| s.vel.norm())
            .fold(0.0_f64, f64::max);

        let max_mach = branch
            .states
            .iter()
            .map(|s| {
                let ss = atmosphere.at(launch_altitude + s.pos.z).sound_speed;
                if ss > 0.0 { s.vel.norm() / ss } else { 0.0 }
            })
            .fold(0.0_f64, f64::max);

        Some(FlightSummary {
            branch: branch.id,
            parent: branch.parent,
            status: branch.status.clone(),
            apogee_m: apogee.pos.z,
            apogee_time: apogee.time,
            max_speed,
            max_mach,
            flight_time: last.time - first.time,
            impact_speed: last.vel.norm(),
        })
    }
}

/// Write the complete simulation output (events and state histories of all
/// branches) as pretty-printed JSON.
pub fn write_data<W: Write>(writer: &mut W, data: &SimulatedData) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, data)?;
    writeln!(writer)
}

pub fn write_data_file(path: &str, data: &SimulatedData) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_data(&mut file, data)
}

/// Write one summary per branch as a JSON array.
pub fn write_summaries<W: Write>(
    writer: &mut W,
    data: &SimulatedData,
    atmosphere: &AtmosphereModel,
    launch_altitude: f64,
) -> io::Result<()> {
    let summaries: Vec<FlightSummary> = data
        .iter()
        .filter_map(|b| FlightSummary::from_branch(b, atmosphere, launch_altitude))
        .collect();
    serde_json::to_writer_pretty(&mut *writer, &summaries)?;
    writeln!(writer)
}
