use std::fs::File;
use std::path::Path;
use std::process::ExitCode;

use flight_sim::config;
use flight_sim::io::{csv, json};
use flight_sim::physics::atmosphere;
use flight_sim::sim::{simulate, EventSource, SimulatedData, SimulationOptions};
use flight_sim::vehicle::{presets, FlightConfiguration, PhysicsProvider, Rocket};

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let options = config::simulation_options();

    let single = presets::single_stage();
    let single_cfg = FlightConfiguration::all_stages("Default", &single);
    let three = presets::three_body();
    let three_cfg = presets::three_body_configuration(&three);

    let mut ok = true;
    for (rocket, cfg) in [(&single, &single_cfg), (&three, &three_cfg)] {
        match simulate(rocket, cfg, &options) {
            Ok(data) => {
                report(rocket, cfg, &options, &data);
                if let Some(dir) = config::output_dir() {
                    if let Err(err) = export(&dir, rocket, &options, &data) {
                        tracing::error!(%err, dir = %dir, "export failed");
                        ok = false;
                    }
                }
            }
            Err(err) => {
                tracing::error!(%err, rocket = %rocket.name, "simulation rejected");
                ok = false;
            }
        }
    }

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn source_name(rocket: &Rocket, source: EventSource) -> String {
    match source {
        EventSource::Rocket => rocket.name.clone(),
        EventSource::Stage(id) => {
            rocket.stage(id).map_or_else(|| format!("stage {}", id.0), |s| s.name.clone())
        }
        EventSource::Component(id) => {
            rocket.component(id).map_or_else(|| format!("component {}", id.0), |c| c.name.clone())
        }
        EventSource::Ambient => String::new(),
    }
}

fn report(
    rocket: &Rocket,
    cfg: &FlightConfiguration,
    options: &SimulationOptions,
    data: &SimulatedData,
) {
    println!();
    println!("====================================================================");
    println!("  FLIGHT SIMULATION — {} ({})", rocket.name, cfg.name);
    println!("====================================================================");
    println!();
    println!(
        "  Stages:        {:>8}       Lift-off mass: {:>7.3} kg",
        rocket.stages.len(),
        rocket.total_mass()
    );
    println!(
        "  Time step:     {:>8.3} s     Max time:      {:>7.0} s",
        options.time_step, options.max_time
    );
    println!("  Branches:      {:>8}", data.branch_count());

    for branch in data.iter() {
        println!();
        let parent = branch.parent.map_or_else(|| "root".to_string(), |p| format!("from {p}"));
        println!("  Branch {} ({parent}) — {:?}", branch.id, branch.status);
        println!("  ──────────────────────────────────────────────────────────────────");
        for e in &branch.events {
            println!(
                "  {:>9.3} s   {:<28} {}",
                e.time,
                format!("{:?}", e.kind),
                source_name(rocket, e.source)
            );
        }
        let summary =
            json::FlightSummary::from_branch(branch, &options.atmosphere, options.launch_altitude);
        if let Some(s) = summary {
            let ap_atm = options.atmosphere.at(options.launch_altitude + s.apogee_m);
            println!(
                "  Apogee {:>8.1} m at {:>6.2} s   max {:>6.1} m/s (Mach {:.2})   rho={:.4}",
                s.apogee_m, s.apogee_time, s.max_speed, s.max_mach, ap_atm.density
            );
        }
    }
    println!();
    println!(
        "  Sea-level speed of sound {:.1} m/s",
        atmosphere::isa(0.0).sound_speed
    );
    println!("====================================================================");
}

fn export(
    dir: &str,
    rocket: &Rocket,
    options: &SimulationOptions,
    data: &SimulatedData,
) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let stem: String = rocket
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let base = Path::new(dir);
    json::write_data_file(&base.join(format!("{stem}.json")).to_string_lossy(), data)?;

    let mut summary = File::create(base.join(format!("{stem}_summary.json")))?;
    json::write_summaries(&mut summary, data, &options.atmosphere, options.launch_altitude)?;

    for branch in data.iter() {
        let id = branch.id.0;
        let path = base.join(format!("{stem}_branch{id}.csv"));
        csv::write_states_file(&path.to_string_lossy(), branch)?;
        let mut events = File::create(base.join(format!("{stem}_branch{id}_events.csv")))?;
        csv::write_events(&mut events, branch)?;
    }
    Ok(())
}
