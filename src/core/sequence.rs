//! Control sequences
//!
//! Leveling, homing and idle-wait are all the same shape: send a motion,
//! then poll `?` until a pin or state condition shows up in the report.
//! GRBL never pushes status on its own, so each poll is a full
//! query/response round trip and the per-query read deadline is the only
//! pacing between polls.
//!
//! How long to keep polling is a [`PollLimit`]. The default,
//! [`PollLimit::Unbounded`], waits for the hardware forever. A bounded limit
//! turns a silent hang into [`SequenceOutcome::NotReached`].

use super::channel::CommandChannel;
use super::motion::{halt, jog, JogCommand};
use super::status::{Pin, StatusFrame};
use super::transport::{Transport, TransportError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// How long a poll loop may run before giving up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollLimit {
    /// Poll until the condition shows up, however long that takes
    #[default]
    Unbounded,
    /// Give up after this many polls
    MaxPolls(u64),
    /// Give up once this many milliseconds have passed
    DeadlineMs(u64),
}

impl fmt::Display for PollLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::MaxPolls(n) => write!(f, "{n} polls"),
            Self::DeadlineMs(ms) => write!(f, "{ms} ms"),
        }
    }
}

struct PollBudget {
    limit: PollLimit,
    started: Instant,
}

impl PollBudget {
    fn start(limit: PollLimit) -> Self {
        Self {
            limit,
            started: Instant::now(),
        }
    }

    fn exhausted(&self, polls: u64) -> bool {
        match self.limit {
            PollLimit::Unbounded => false,
            PollLimit::MaxPolls(max) => polls >= max,
            PollLimit::DeadlineMs(ms) => self.started.elapsed() >= Duration::from_millis(ms),
        }
    }
}

/// Terminal outcome of a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceOutcome {
    /// Condition already held; no motion was issued
    AlreadySatisfied,
    /// Condition reached after `polls` polls
    Reached {
        /// Polls spent in the loop
        polls: u64,
    },
    /// Poll limit ran out first
    NotReached {
        /// Polls spent in the loop
        polls: u64,
    },
}

impl SequenceOutcome {
    /// True unless the poll limit ran out
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::NotReached { .. })
    }
}

/// Probe touch-off parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelingConfig {
    /// Longest downward travel while seeking the surface
    pub max_z: f64,
    /// Feed rate for the downward seek
    pub probe_feed: u32,
}

impl Default for LevelingConfig {
    fn default() -> Self {
        Self {
            max_z: 20.0,
            probe_feed: 50,
        }
    }
}

/// Limit-switch homing parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    /// Longest travel toward the X switch
    pub max_x: f64,
    /// Longest travel toward the Y switch
    pub max_y: f64,
    /// Feed rate toward the switch
    pub seek_feed: u32,
    /// Back-off distance after the switch trips
    pub release_distance: f64,
    /// Feed rate while backing off
    pub release_feed: u32,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            max_x: 500.0,
            max_y: 500.0,
            seek_feed: 300,
            release_distance: 5.0,
            release_feed: 50,
        }
    }
}

/// Parameters shared by every sequence
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Leveling parameters
    pub leveling: LevelingConfig,
    /// Homing parameters
    pub homing: HomingConfig,
    /// Bound applied to every poll loop
    pub poll_limit: PollLimit,
}

/// Homed axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
}

impl Axis {
    /// Homing order
    pub const HOMING_ORDER: [Axis; 2] = [Axis::X, Axis::Y];

    /// Limit switch that marks the axis home
    pub fn limit_pin(self) -> Pin {
        match self {
            Self::X => Pin::LimitX,
            Self::Y => Pin::LimitY,
        }
    }

    fn jog(self, offset: f64, feed: u32) -> JogCommand {
        match self {
            Self::X => JogCommand::new(feed).x(offset),
            Self::Y => JogCommand::new(feed).y(offset),
        }
    }

    fn max_travel(self, config: &HomingConfig) -> f64 {
        match self {
            Self::X => config.max_x,
            Self::Y => config.max_y,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::Y => write!(f, "Y"),
        }
    }
}

/// Where an axis got to during homing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisPhase {
    /// Moving toward the switch
    Seeking,
    /// Switch tripped, motion held
    AtLimit,
    /// Backing off the switch
    Releasing,
    /// Switch released, motion held
    Released,
}

impl AxisPhase {
    fn advance(self, axis: Axis) -> Self {
        let next = match self {
            Self::Seeking => Self::AtLimit,
            Self::AtLimit => Self::Releasing,
            Self::Releasing | Self::Released => Self::Released,
        };
        tracing::debug!("{} axis: {:?} -> {:?}", axis, self, next);
        next
    }
}

/// Homing result for one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AxisReport {
    /// Axis
    pub axis: Axis,
    /// Last phase reached
    pub phase: AxisPhase,
    /// Seek toward the switch
    pub seek: SequenceOutcome,
    /// Back-off; `None` if the seek never reached the switch
    pub release: Option<SequenceOutcome>,
}

impl AxisReport {
    /// True when the axis ended released from its switch
    pub fn is_success(&self) -> bool {
        self.phase == AxisPhase::Released
    }
}

/// Homing result for all axes, in homing order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HomingReport {
    /// Axes attempted
    pub axes: Vec<AxisReport>,
}

impl HomingReport {
    /// True when every axis was homed
    pub fn is_success(&self) -> bool {
        self.axes.len() == Axis::HOMING_ORDER.len() && self.axes.iter().all(AxisReport::is_success)
    }
}

/// Result of waiting for `Idle`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdleReport {
    /// Last report received
    pub status: StatusFrame,
    /// Loop outcome
    pub outcome: SequenceOutcome,
}

/// Runs the control sequences against a channel
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    config: SequenceConfig,
}

impl Sequencer {
    /// Create a sequencer
    pub fn new(config: SequenceConfig) -> Self {
        Self { config }
    }

    /// Sequence parameters
    pub fn config(&self) -> &SequenceConfig {
        &self.config
    }

    /// Poll until `condition` holds for the latest report. `last` is checked
    /// first, so a condition that already holds costs no poll.
    fn poll_until<T, F>(
        &self,
        channel: &mut CommandChannel<T>,
        mut last: StatusFrame,
        condition: F,
    ) -> Result<(StatusFrame, SequenceOutcome), TransportError>
    where
        T: Transport,
        F: Fn(&StatusFrame) -> bool,
    {
        let budget = PollBudget::start(self.config.poll_limit);
        let mut polls = 0u64;

        while !condition(&last) {
            if budget.exhausted(polls) {
                tracing::warn!(
                    "Condition not reached after {} polls (limit: {})",
                    polls,
                    self.config.poll_limit
                );
                return Ok((last, SequenceOutcome::NotReached { polls }));
            }
            last = channel.status()?;
            polls += 1;
        }

        Ok((last, SequenceOutcome::Reached { polls }))
    }

    /// Poll until the controller reports `Idle` and return the final report.
    pub fn wait_for_idle<T: Transport>(
        &self,
        channel: &mut CommandChannel<T>,
    ) -> Result<IdleReport, TransportError> {
        let first = channel.status()?;
        if first.is_idle() {
            return Ok(IdleReport {
                status: first,
                outcome: SequenceOutcome::AlreadySatisfied,
            });
        }

        let (status, outcome) = self.poll_until(channel, first, StatusFrame::is_idle)?;
        Ok(IdleReport { status, outcome })
    }

    /// Lower Z until the probe touches, then hold.
    pub fn level<T: Transport>(
        &self,
        channel: &mut CommandChannel<T>,
    ) -> Result<SequenceOutcome, TransportError> {
        let leveling = self.config.leveling;
        let status = channel.status()?;

        if status.has_pin(Pin::Probe) {
            tracing::info!("Probe already touching, leveling skipped");
            return Ok(SequenceOutcome::AlreadySatisfied);
        }

        tracing::info!("Seeking surface (max {} mm)", leveling.max_z);
        jog(channel, &JogCommand::new(leveling.probe_feed).z(-leveling.max_z))?;

        let (status, outcome) = self.poll_until(channel, status, |s| s.has_pin(Pin::Probe))?;
        tracing::debug!("Status: {}", status.text());
        halt(channel)?;

        if outcome.is_success() {
            tracing::info!("Surface touched at {}", status.position);
        }
        Ok(outcome)
    }

    /// Home X then Y against their limit switches. Stops at the first axis
    /// whose poll limit runs out.
    pub fn home<T: Transport>(
        &self,
        channel: &mut CommandChannel<T>,
    ) -> Result<HomingReport, TransportError> {
        let mut report = HomingReport::default();

        for axis in Axis::HOMING_ORDER {
            let axis_report = self.home_axis(channel, axis)?;
            report.axes.push(axis_report);
            if !axis_report.is_success() {
                tracing::warn!("Homing stopped at {} axis ({:?})", axis, axis_report.phase);
                break;
            }
        }

        Ok(report)
    }

    /// Seek one axis onto its switch, then back off until it releases.
    pub fn home_axis<T: Transport>(
        &self,
        channel: &mut CommandChannel<T>,
        axis: Axis,
    ) -> Result<AxisReport, TransportError> {
        let homing = self.config.homing;
        let pin = axis.limit_pin();
        let mut phase = AxisPhase::Seeking;
        let mut status = channel.status()?;

        let seek = if status.has_pin(pin) {
            tracing::info!("{} limit already asserted, seek skipped", axis);
            SequenceOutcome::AlreadySatisfied
        } else {
            let travel = axis.max_travel(&homing);
            tracing::info!("Seeking {} limit (max {} mm)", axis, travel);
            jog(channel, &axis.jog(-travel, homing.seek_feed))?;

            let (next, outcome) = self.poll_until(channel, status, |s| s.has_pin(pin))?;
            status = next;
            halt(channel)?;
            tracing::debug!("Status: {}", status.text());

            if !outcome.is_success() {
                return Ok(AxisReport {
                    axis,
                    phase,
                    seek: outcome,
                    release: None,
                });
            }
            outcome
        };
        phase = phase.advance(axis);

        // Back off the switch
        phase = phase.advance(axis);
        jog(channel, &axis.jog(homing.release_distance, homing.release_feed))?;
        let (status, release) = self.poll_until(channel, status, |s| !s.has_pin(pin))?;
        halt(channel)?;
        tracing::debug!("Status: {}", status.text());

        if release.is_success() {
            phase = phase.advance(axis);
            tracing::info!("{} axis homed at {}", axis, status.position);
        }

        Ok(AxisReport {
            axis,
            phase,
            seek,
            release: Some(release),
        })
    }
}
