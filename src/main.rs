//! grblctl - GRBL controller CLI
//!
//! Jogs, levels, homes and streams G-code to a GRBL controller. Stages run in
//! a fixed order: jog, level, home, laser, G-code, then a final status report
//! once the machine is idle.

use anyhow::Context;
use clap::Parser;
use grblctl_core::cli::{device_path, parse_feed, parse_optional, OutputFormat};
use grblctl_core::core::transport::list_ports;
use grblctl_core::{
    run_job, AppConfig, CliResult, ExitCodes, JobEvent, JobPlan, JogCommand, PinMatchMode,
    PollLimit, SequenceOutcome, Sequencer, SerialTransport, StatusFrame,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// grblctl CLI
#[derive(Parser, Debug)]
#[command(
    name = "grblctl",
    version,
    about = "Leveling CNC router using GRBL commands and a Z axis probe",
    long_about = None
)]
struct Cli {
    /// Do the leveling. Touches the conductive surface with the milling tool.
    #[arg(short = 'l', long)]
    level: bool,

    /// CNC router port (e.g. ttyUSB0, /dev/ttyUSB0, COM3)
    #[arg(short = 'p', long, env = "GRBLCTL_PORT")]
    port: Option<String>,

    /// Move along X axis
    #[arg(short = 'x', long = "x", allow_hyphen_values = true)]
    x: Option<String>,

    /// Move along Y axis
    #[arg(short = 'y', long = "y", allow_hyphen_values = true)]
    y: Option<String>,

    /// Move along Z axis
    #[arg(short = 'z', long = "z", allow_hyphen_values = true)]
    z: Option<String>,

    /// Set feed rate
    #[arg(short = 'f', long = "feed", visible_alias = "f", allow_hyphen_values = true)]
    feed: Option<String>,

    /// Home X and Y against their limit switches
    #[arg(short = '0', long)]
    zero: bool,

    /// Write additional debug messages
    #[arg(short = 'v', long)]
    verbose: bool,

    /// G-code file path. If other commands are included, this is done last.
    #[arg(short = 'g', long)]
    gcode: Option<PathBuf>,

    /// Laser beam intensity (0 switches it off)
    #[arg(short = 'b', long, allow_hyphen_values = true)]
    beam: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Give up waiting for a switch, probe or idle state after this many polls
    #[arg(long, conflicts_with = "deadline_ms")]
    max_polls: Option<u64>,

    /// Give up waiting for a switch, probe or idle state after this many milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Only trust pin letters inside the `Pn:` field
    #[arg(long)]
    strict_pins: bool,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            return ExitCode::from(ExitCodes::CONFIG_ERROR);
        }
    };

    init_tracing(&cli, &config);

    let result = match run(&cli, config) {
        Ok(result) => result,
        Err(e) => CliResult::error(ExitCodes::ERROR, format!("ERROR: {e:#}")),
    };

    if let Some(msg) = result.message() {
        if result.is_success() {
            println!("{msg}");
        } else {
            eprintln!("{msg}");
        }
    }
    result.to_exit_code()
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::load()?,
    };

    if let Some(port) = &cli.port {
        config.serial.port = device_path(port);
    }
    if let Some(max) = cli.max_polls {
        config.sequence.poll_limit = PollLimit::MaxPolls(max);
    }
    if let Some(ms) = cli.deadline_ms {
        config.sequence.poll_limit = PollLimit::DeadlineMs(ms);
    }
    if cli.strict_pins {
        config.protocol.pin_match = PinMatchMode::Structured;
    }

    Ok(config)
}

fn init_tracing(cli: &Cli, config: &AppConfig) {
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        config
            .logging
            .level
            .parse()
            .unwrap_or(tracing::Level::INFO)
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_plan(cli: &Cli, config: &AppConfig) -> JobPlan {
    let feed = parse_feed(
        cli.feed.as_deref(),
        config.motion.feed_rate,
        config.motion.invalid_feed_rate,
    );

    JobPlan {
        jog: JogCommand {
            x: parse_optional("x", cli.x.as_deref()),
            y: parse_optional("y", cli.y.as_deref()),
            z: parse_optional("z", cli.z.as_deref()),
            feed,
        },
        level: cli.level,
        home: cli.zero,
        laser_power: cli
            .beam
            .as_deref()
            .map(|raw| parse_optional("beam", Some(raw)).unwrap_or(0)),
        gcode: cli.gcode.clone(),
    }
}

fn run(cli: &Cli, config: AppConfig) -> anyhow::Result<CliResult> {
    if cli.list_ports {
        for port in list_ports()? {
            println!("{}", port.port_name);
        }
        return Ok(CliResult::success());
    }

    let plan = build_plan(cli, &config);
    tracing::debug!(
        "Accepting following parameters: port = {}, leveling = {}, homing = {}, jog = {:?}, gcode = {:?}, poll limit = {}",
        config.serial.port,
        plan.level,
        plan.home,
        plan.jog,
        plan.gcode,
        config.sequence.poll_limit
    );

    let text = cli.format == OutputFormat::Text;
    if text {
        println!("Initializing communication.");
    }

    let transport = match SerialTransport::open(config.serial_config()) {
        Ok(transport) => transport,
        Err(e) => return Ok(CliResult::from(e)),
    };
    let mut channel = config.channel(transport);
    tracing::info!("Connected to {}", channel.connection_info());

    let sequencer = Sequencer::new(config.sequence_config());
    let result = run_job(
        &mut channel,
        &sequencer,
        &plan,
        &config.job_settings(),
        |event| {
            if text {
                print_event(&event);
            } else if let JobEvent::StreamFailed(e) = event {
                eprintln!("ERROR: {e}");
            }
        },
    );

    if let Err(e) = channel.close() {
        tracing::warn!("Close failed: {}", e);
    }

    let report = match result {
        Ok(report) => report,
        Err(e) => return Ok(CliResult::from(e)),
    };

    if !text {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let complete = report.leveling.map_or(true, |o| o.is_success())
        && report.homing.as_ref().map_or(true, |h| h.is_success())
        && report.final_status.outcome.is_success();

    Ok(if complete {
        CliResult::success()
    } else {
        CliResult::error(ExitCodes::ERROR, "ERROR: poll limit reached before the machine did")
    })
}

fn print_status(frame: &StatusFrame) {
    println!("Status: {}\n\tOffset:{}", frame.text(), frame.position);
}

fn print_event(event: &JobEvent<'_>) {
    match event {
        JobEvent::Banner(banner) => println!("RECEIVED: {banner}"),
        JobEvent::InitialStatus(frame) => print_status(frame),
        JobEvent::Leveled(SequenceOutcome::NotReached { polls }) => {
            println!("Leveling stopped: probe not touched after {polls} polls");
        }
        JobEvent::Homed(report) if !report.is_success() => {
            for axis in report.axes.iter().filter(|a| !a.is_success()) {
                println!("Homing stopped: {} axis in {:?}", axis.axis, axis.phase);
            }
        }
        JobEvent::StreamFailed(e) => println!("ERROR: {e}"),
        JobEvent::FinalStatus(report) => {
            print_status(&report.status);
            if let SequenceOutcome::NotReached { polls } = report.outcome {
                println!("Machine not idle after {polls} polls");
            }
        }
        _ => {}
    }
}
