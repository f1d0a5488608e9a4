//! Run orchestration
//!
//! One run walks a fixed order: read the startup banner, report status,
//! apply the manual jog, level, home, set the laser, stream G-code, then wait
//! for `Idle` and report the final position. Each stage only runs if the plan
//! asks for it. Progress is reported through [`JobEvent`]s as it happens.

use super::channel::CommandChannel;
use super::motion::{jog, laser, JogCommand};
use super::sequence::{HomingReport, IdleReport, SequenceOutcome, Sequencer};
use super::status::StatusFrame;
use super::stream::{stream_file, StreamError, StreamReport};
use super::transport::{Transport, TransportError};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Wait for the startup banner
pub const DEFAULT_BANNER_TIMEOUT: Duration = Duration::from_secs(3);

/// What a run should do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPlan {
    /// Manual relative move; skipped when empty
    pub jog: JogCommand,
    /// Probe touch-off
    pub level: bool,
    /// Limit-switch homing
    pub home: bool,
    /// Laser/spindle power; `Some(0)` switches it off
    pub laser_power: Option<u32>,
    /// G-code file streamed last
    pub gcode: Option<PathBuf>,
}

/// Timing for a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobSettings {
    /// Wait for the startup banner
    pub banner_timeout: Duration,
    /// Per-block reply wait while streaming; `None` blocks
    pub stream_ack_timeout: Option<Duration>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            banner_timeout: DEFAULT_BANNER_TIMEOUT,
            stream_ack_timeout: None,
        }
    }
}

/// Progress notifications
#[derive(Debug)]
pub enum JobEvent<'a> {
    /// Startup banner (possibly empty)
    Banner(&'a str),
    /// Status before any motion
    InitialStatus(&'a StatusFrame),
    /// Leveling finished
    Leveled(SequenceOutcome),
    /// Homing finished
    Homed(&'a HomingReport),
    /// G-code stream finished
    Streamed(&'a StreamReport),
    /// G-code stream failed; the run goes on
    StreamFailed(&'a StreamError),
    /// Controller reached `Idle` (or the poll limit ran out)
    FinalStatus(&'a IdleReport),
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Startup banner
    pub banner: String,
    /// Status before any motion
    pub initial: StatusFrame,
    /// Whether a manual jog was sent
    pub jogged: bool,
    /// Leveling outcome, if requested
    pub leveling: Option<SequenceOutcome>,
    /// Homing outcome, if requested
    pub homing: Option<HomingReport>,
    /// Streaming counters, if a stream completed
    pub stream: Option<StreamReport>,
    /// Streaming failure message, if the stream failed
    pub stream_error: Option<String>,
    /// Final report
    pub final_status: IdleReport,
}

/// Execute `plan` over `channel`. Link failures abort the run; a failed
/// G-code stream does not.
pub fn run_job<T, F>(
    channel: &mut CommandChannel<T>,
    sequencer: &Sequencer,
    plan: &JobPlan,
    settings: &JobSettings,
    mut on_event: F,
) -> Result<JobReport, TransportError>
where
    T: Transport,
    F: FnMut(JobEvent<'_>),
{
    let banner = channel.read_frame(settings.banner_timeout)?;
    on_event(JobEvent::Banner(&banner));

    let initial = channel.status()?;
    on_event(JobEvent::InitialStatus(&initial));

    let jogged = jog(channel, &plan.jog)?.is_some();

    let leveling = if plan.level {
        let outcome = sequencer.level(channel)?;
        on_event(JobEvent::Leveled(outcome));
        Some(outcome)
    } else {
        None
    };

    let homing = if plan.home {
        let report = sequencer.home(channel)?;
        on_event(JobEvent::Homed(&report));
        Some(report)
    } else {
        None
    };

    if let Some(power) = plan.laser_power {
        laser(channel, Some(power))?;
    }

    let mut stream = None;
    let mut stream_error = None;
    if let Some(path) = &plan.gcode {
        match stream_file(channel, path, settings.stream_ack_timeout) {
            Ok(report) => {
                on_event(JobEvent::Streamed(&report));
                stream = Some(report);
            }
            Err(StreamError::Transport(e)) => return Err(e),
            Err(e) => {
                tracing::error!("G-code stream failed: {}", e);
                on_event(JobEvent::StreamFailed(&e));
                stream_error = Some(e.to_string());
            }
        }
    }

    let final_status = sequencer.wait_for_idle(channel)?;
    on_event(JobEvent::FinalStatus(&final_status));

    Ok(JobReport {
        banner,
        initial,
        jogged,
        leveling,
        homing,
        stream,
        stream_error,
        final_status,
    })
}
