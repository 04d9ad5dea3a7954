//! scenario-runner: headless driver for the impact scenario viewer.
//!
//! Usage:
//!   scenario-runner --scenario sim.json
//!   scenario-runner --sample --seed 7 --ticks 360 --dt 1.0 --czml-out orbit.czml
//!   scenario-runner --trajectory path.json --model gaspra --size 250 --loop
//!   scenario-runner --ipc-mode

use anyhow::Result;
use chrono::{DateTime, Utc};
use impactviz_core::{
    command::ViewerCommand,
    config::ViewerConfig,
    event::ViewerEvent,
    scene::RecordingEngine,
    simulation::{OfflineSource, SimulationRequest, SimulationSource},
    trajectory,
};
use std::env;
use std::io::{self, BufRead, Write};

type Session = impactviz_core::session::ViewerSession<RecordingEngine>;

/// Serves a simulation document from disk, whatever the request.
struct FileSource {
    path: String,
}

impl SimulationSource for FileSource {
    fn fetch(&mut self, _request: &SimulationRequest) -> Result<serde_json::Value> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", self.path))?;
        Ok(serde_json::from_str(&content)?)
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ticks = parse_arg(&args, "--ticks", 0u64);
    let dt = parse_arg(&args, "--dt", 1.0f64);
    let ipc_mode = has_flag(&args, "--ipc-mode");
    let data_dir = str_arg(&args, "--data-dir").unwrap_or("./data");

    let config = match ViewerConfig::load(data_dir) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("{e}; using built-in viewer config");
            ViewerConfig::default_test()
        }
    };

    let source: Box<dyn SimulationSource> = match str_arg(&args, "--scenario") {
        Some(path) => Box::new(FileSource { path: path.to_string() }),
        None => Box::new(OfflineSource),
    };
    let mut session = Session::new(&config, RecordingEngine::new(), source)?;

    if ipc_mode {
        return run_ipc_loop(&mut session);
    }

    println!("Impact scenario viewer: scenario-runner");
    println!("  data_dir:  {data_dir}");
    println!("  ticks:     {ticks}");
    println!("  dt:        {dt}s");
    println!();

    let mut events: Vec<ViewerEvent> = Vec::new();
    if let Some(key) = str_arg(&args, "--model") {
        events.extend(session.select_model(key));
    }
    if let Some(size) = str_arg(&args, "--size").and_then(|s| s.parse::<f64>().ok()) {
        events.extend(session.set_size(size)?);
    }

    let looping = has_flag(&args, "--loop").then_some(true);
    if let Some(path) = str_arg(&args, "--trajectory") {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let raw: serde_json::Value = serde_json::from_str(&content)?;
        events.extend(session.load_trajectory(&raw, looping)?);
    } else if has_flag(&args, "--sample") {
        let seed = str_arg(&args, "--seed").and_then(|s| s.parse::<u64>().ok());
        events.extend(session.load_sample(seed, parse_epoch(&args)?)?);
    } else {
        events.extend(session.show_scenario(&SimulationRequest::default())?);
    }

    if ticks > 0 {
        events.extend(session.play());
        for _ in 0..ticks {
            events.extend(session.tick(dt));
        }
    }

    if let Some(out) = str_arg(&args, "--czml-out") {
        write_czml(&session, &config, out)?;
    }
    if has_flag(&args, "--events") {
        for e in &events {
            println!("{}", serde_json::to_string(e)?);
        }
        println!();
    }
    print_summary(&session, &events);
    Ok(())
}

fn run_ipc_loop(session: &mut Session) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: ViewerCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };
        if cmd == ViewerCommand::Quit {
            break;
        }

        match session.apply(cmd) {
            Ok(events) => {
                for e in &events {
                    writeln!(stdout, "{}", serde_json::to_string(e)?)?;
                }
            }
            Err(e) => {
                log::warn!("command rejected: {e}");
                writeln!(stdout, "{}", serde_json::json!({ "error": e.to_string() }))?;
            }
        }
        stdout.flush()?;
    }
    session.teardown();
    Ok(())
}

fn write_czml(session: &Session, config: &ViewerConfig, out: &str) -> Result<()> {
    let Some(t) = session.playback().trajectory() else {
        log::warn!("--czml-out ignored: no trajectory loaded");
        return Ok(());
    };
    let doc = trajectory::to_czml(t, "Asteroid Sample", config.playback.multiplier, Some(session.pose()));
    std::fs::write(out, serde_json::to_string_pretty(&doc)?)
        .map_err(|e| anyhow::anyhow!("Cannot write {out}: {e}"))?;
    println!("  czml written to {out}");
    Ok(())
}

fn print_summary(session: &Session, events: &[ViewerEvent]) {
    let status = session.playback().status();
    let engine = session.engine();
    let failures = events
        .iter()
        .filter(|e| matches!(e, ViewerEvent::EngineSyncFailed { .. }))
        .count();
    let frames = events.iter().filter(|e| matches!(e, ViewerEvent::Frame { .. })).count();

    println!("=== RUN SUMMARY ===");
    println!("  view:           {:?}", session.view());
    if let Some(result) = session.scenario() {
        let origin = events.iter().find_map(|e| match e {
            ViewerEvent::ScenarioLoaded { origin, .. } => Some(*origin),
            _ => None,
        });
        println!("  simulation:     {} ({:?})", result.id, origin);
        println!("  rings:          {}", result.rings.len());
        println!("  total deaths:   {}", result.totals.total_estimated_deaths);
    }
    println!("  model:          {} @ scale {}", session.pose().model_key, session.pose().scale);
    println!("  playback:       {:?} at {:.1}s / {:.1}s", status.phase, status.offset_s, status.max_offset);
    println!("  frames:         {frames}");
    println!("  live prims:     {}", engine.live_count());
    println!("  engine adds:    {}", engine.count_adds());
    println!("  engine removes: {}", engine.count_removes());
    println!("  sync failures:  {failures}");
    if let Some((target, _)) = engine.last_fly_to() {
        println!(
            "  camera:         ({:.4}, {:.4}) at {:.0} m",
            target.lat, target.lon, target.alt
        );
    }
}

fn parse_epoch(args: &[String]) -> Result<DateTime<Utc>> {
    match str_arg(args, "--epoch") {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)
            .map_err(|e| anyhow::anyhow!("Bad --epoch {s}: {e}"))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
