use std::io::{self, Write};

use crate::dynamics::SimulationState;
use crate::physics::aerodynamics::angle_of_attack;
use crate::sim::{EventSource, SimulationBranch};

/// Write a state history to CSV format.
///
/// Columns: time, pos_x, pos_y, pos_z, vel_x, vel_y, vel_z,
///          quat_w, quat_x, quat_y, quat_z, omega_x, omega_y, omega_z,
///          propellant, pitch_deg, alpha_deg
pub fn write_states<W: Write>(writer: &mut W, states: &[SimulationState]) -> io::Result<()> {
    writeln!(
        writer,
        "time,pos_x,pos_y,pos_z,vel_x,vel_y,vel_z,\
         quat_w,quat_x,quat_y,quat_z,omega_x,omega_y,omega_z,\
         propellant,pitch_deg,alpha_deg"
    )?;

    for s in states {
        let q = s.quat.quaternion();
        writeln!(
            writer,
            "{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},{:.4},\
             {:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},\
             {:.5},{:.2},{:.2}",
            s.time,
            s.pos.x, s.pos.y, s.pos.z,
            s.vel.x, s.vel.y, s.vel.z,
            q.w, q.i, q.j, q.k,
            s.omega.x, s.omega.y, s.omega.z,
            s.propellant,
            s.pitch().to_degrees(),
            angle_of_attack(&s.vel_body()).to_degrees(),
        )?;
    }

    Ok(())
}

/// Write a branch's event log to CSV: time, event, source kind, source id.
pub fn write_events<W: Write>(writer: &mut W, branch: &SimulationBranch) -> io::Result<()> {
    writeln!(writer, "time,event,source,source_id")?;
    for e in &branch.events {
        let (kind, id) = match e.source {
            EventSource::Rocket => ("rocket", String::new()),
            EventSource::Stage(s) => ("stage", s.0.to_string()),
            EventSource::Component(c) => ("component", c.0.to_string()),
            EventSource::Ambient => ("", String::new()),
        };
        writeln!(writer, "{:.4},{:?},{},{}", e.time, e.kind, kind, id)?;
    }
    Ok(())
}

/// Write a branch's state history to a CSV file at the given path.
pub fn write_states_file(path: &str, branch: &SimulationBranch) -> io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    write_states(&mut file, &branch.states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{BranchId, BranchStatus, FlightEvent, FlightEventType};
    use crate::vehicle::{ComponentId, RocketBodyGroup, StageId};
    use nalgebra::{UnitQuaternion, Vector3};

    #[test]
    fn csv_output_has_header_and_rows() {
        let mut moving = SimulationState::at_rest(UnitQuaternion::identity(), 0.01);
        moving.time = 0.05;
        moving.pos = Vector3::new(0.0, 0.0, 1.0);
        moving.vel = Vector3::new(0.0, 0.0, 50.0);
        let states = vec![SimulationState::at_rest(UnitQuaternion::identity(), 0.011), moving];

        let mut buf = Vec::new();
        write_states(&mut buf, &states).unwrap();
        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert!(lines[0].starts_with("time,"));
        assert_eq!(lines.len(), 3); // header + 2 data rows
        assert!(lines[1].starts_with("0.0000,"));
        assert!(lines[2].ends_with(",90.00,0.00"));
    }

    #[test]
    fn events_csv_names_sources() {
        let branch = SimulationBranch {
            id: BranchId(1),
            parent: Some(BranchId(0)),
            events: vec![
                FlightEvent::new(
                    FlightEventType::Ignition,
                    0.0,
                    EventSource::Component(ComponentId(8)),
                ),
                FlightEvent::new(
                    FlightEventType::StageSeparation,
                    0.85,
                    EventSource::Stage(StageId(2)),
                ),
            ],
            states: Vec::new(),
            group: RocketBodyGroup::new([StageId(2)]),
            status: BranchStatus::Completed,
        };
        let mut buf = Vec::new();
        write_events(&mut buf, &branch).unwrap();
        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines[1], "0.0000,Ignition,component,8");
        assert_eq!(lines[2], "0.8500,StageSeparation,stage,2");
    }
}
