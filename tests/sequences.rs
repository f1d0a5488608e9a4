//! Leveling, homing and idle-wait against a scripted controller

mod common;

use common::{channel, status, OK};
use grblctl_core::{
    Axis, AxisPhase, PinMatchMode, PollLimit, Position, SequenceConfig, SequenceOutcome,
    Sequencer,
};

fn bounded(max_polls: u64) -> Sequencer {
    Sequencer::new(SequenceConfig {
        poll_limit: PollLimit::MaxPolls(max_polls),
        ..SequenceConfig::default()
    })
}

#[test]
fn idle_wait_returns_immediately_when_idle() {
    let mut channel = channel(["<Idle|MPos:1.00,2.00,3.00|Pn:>"]);

    let report = Sequencer::default().wait_for_idle(&mut channel).unwrap();

    assert_eq!(report.outcome, SequenceOutcome::AlreadySatisfied);
    assert_eq!(report.status.position, Position::new(1.0, 2.0, 3.0));
    assert_eq!(channel.transport().writes(), vec!["?"]);
}

#[test]
fn idle_wait_polls_until_idle() {
    let mut channel = channel([
        status("Run", "0,0,0", ""),
        status("Run", "1,0,0", ""),
        status("Hold:0", "2,0,0", ""),
        status("Idle", "3,0,0", ""),
    ]);

    let report = Sequencer::default().wait_for_idle(&mut channel).unwrap();

    assert_eq!(report.outcome, SequenceOutcome::Reached { polls: 3 });
    assert_eq!(report.status.position, Position::new(3.0, 0.0, 0.0));
    assert_eq!(channel.polls(), 4);
}

#[test]
fn idle_wait_gives_up_at_poll_limit() {
    let mut channel = channel(vec![status("Alarm", "0,0,0", ""); 3]);

    let report = bounded(2).wait_for_idle(&mut channel).unwrap();

    assert_eq!(report.outcome, SequenceOutcome::NotReached { polls: 2 });
    assert_eq!(report.status.state, "Alarm");
}

#[test]
fn leveling_is_noop_when_probe_already_touching() {
    let mut channel = channel([status("Idle", "0,0,-3", "P")]);

    let outcome = Sequencer::default().level(&mut channel).unwrap();

    assert_eq!(outcome, SequenceOutcome::AlreadySatisfied);
    assert_eq!(channel.transport().writes(), vec!["?"]);
}

#[test]
fn leveling_seeks_until_probe_touches_then_holds() {
    let mut channel = channel([
        status("Idle", "0,0,0", ""),
        OK.to_string(),
        status("Jog", "0,0,-1", ""),
        status("Jog", "0,0,-2", ""),
        status("Jog", "0,0,-2.5", "P"),
        OK.to_string(),
    ]);

    let outcome = Sequencer::default().level(&mut channel).unwrap();

    assert_eq!(outcome, SequenceOutcome::Reached { polls: 3 });
    assert_eq!(
        channel.transport().writes(),
        vec!["?", "$j=z-20 f50\n", "?", "?", "?", "!"]
    );
}

#[test]
fn leveling_treats_stray_probe_marker_as_touch() {
    let mut channel = channel([
        status("Idle", "0,0,0", ""),
        OK.to_string(),
        "<Jog|MPos:0,0,-1|Msg:Pn:P|Pn:>".to_string(),
        OK.to_string(),
    ]);

    let outcome = Sequencer::default().level(&mut channel).unwrap();

    assert_eq!(outcome, SequenceOutcome::Reached { polls: 1 });
}

#[test]
fn structured_pins_ignore_stray_probe_marker() {
    let mut channel = channel([
        status("Idle", "0,0,0", ""),
        OK.to_string(),
        "<Jog|MPos:0,0,-1|Msg:Pn:P|Pn:>".to_string(),
        status("Jog", "0,0,-2", "P"),
        OK.to_string(),
    ])
    .with_pin_mode(PinMatchMode::Structured);

    let outcome = Sequencer::default().level(&mut channel).unwrap();

    assert_eq!(outcome, SequenceOutcome::Reached { polls: 2 });
}

#[test]
fn leveling_halts_when_poll_limit_runs_out() {
    let mut replies = vec![status("Idle", "0,0,0", ""), OK.to_string()];
    replies.extend(vec![status("Jog", "0,0,-20", ""); 3]);
    replies.push(OK.to_string());
    let mut channel = channel(replies);

    let outcome = bounded(3).level(&mut channel).unwrap();

    assert_eq!(outcome, SequenceOutcome::NotReached { polls: 3 });
    assert_eq!(channel.transport().writes().last(), Some(&"!"));
    assert_eq!(channel.transport().remaining_replies(), 0);
}

#[test]
fn homing_x_seek_polls_until_limit_then_releases() {
    let mut channel = channel([
        status("Idle", "0,0,0", ""),
        OK.to_string(),
        "<Run|MPos:0,0,0|Pn:>".to_string(),
        "<Run|MPos:0,0,0|Pn:>".to_string(),
        "<Run|MPos:0,0,0|Pn:>".to_string(),
        "<Run|MPos:-500,0,0|Pn:X>".to_string(),
        OK.to_string(),
        OK.to_string(),
        status("Jog", "-499,0,0", ""),
        OK.to_string(),
    ]);

    let report = Sequencer::default().home_axis(&mut channel, Axis::X).unwrap();

    assert_eq!(report.seek, SequenceOutcome::Reached { polls: 4 });
    assert_eq!(report.release, Some(SequenceOutcome::Reached { polls: 1 }));
    assert_eq!(report.phase, AxisPhase::Released);
    assert_eq!(
        channel.transport().writes(),
        vec!["?", "$j=x-500 f300\n", "?", "?", "?", "?", "!", "$j=x5 f50\n", "?", "!"]
    );
}

#[test]
fn homing_release_polls_n_plus_one_times() {
    let held = 3;
    let mut replies = vec![status("Idle", "-500,0,0", "X"), OK.to_string()];
    replies.extend(vec![status("Jog", "-499,0,0", "X"); held]);
    replies.push(status("Jog", "-497,0,0", ""));
    replies.push(OK.to_string());
    let mut channel = channel(replies);

    let report = Sequencer::default().home_axis(&mut channel, Axis::X).unwrap();

    assert_eq!(report.seek, SequenceOutcome::AlreadySatisfied);
    assert_eq!(
        report.release,
        Some(SequenceOutcome::Reached {
            polls: held as u64 + 1
        })
    );
    let writes = channel.transport().writes();
    assert_eq!(writes[1], "$j=x5 f50\n");
    assert_eq!(writes.iter().filter(|w| **w == "?").count(), 1 + held + 1);
    assert_eq!(writes.last(), Some(&"!"));
}

#[test]
fn homing_runs_x_then_y() {
    let mut channel = channel([
        // X: seek
        status("Idle", "0,0,0", ""),
        OK.to_string(),
        status("Jog", "-500,0,0", "X"),
        OK.to_string(),
        // X: release
        OK.to_string(),
        status("Jog", "-495,0,0", ""),
        OK.to_string(),
        // Y: seek
        status("Idle", "-495,0,0", ""),
        OK.to_string(),
        status("Jog", "-495,-500,0", "Y"),
        OK.to_string(),
        // Y: release
        OK.to_string(),
        status("Jog", "-495,-495,0", ""),
        OK.to_string(),
    ]);

    let report = Sequencer::default().home(&mut channel).unwrap();

    assert!(report.is_success());
    assert_eq!(report.axes.len(), 2);
    assert_eq!(report.axes[0].axis, Axis::X);
    assert_eq!(report.axes[1].axis, Axis::Y);
    let transport = channel.transport();
    assert_eq!(transport.count_writes("$j=y-500 f300\n"), 1);
    assert_eq!(transport.count_writes("$j=y5 f50\n"), 1);
    assert_eq!(transport.count_writes("!"), 4);
    assert_eq!(transport.remaining_replies(), 0);
}

#[test]
fn homing_stops_after_axis_that_never_trips() {
    let mut replies = vec![status("Idle", "0,0,0", ""), OK.to_string()];
    replies.extend(vec![status("Jog", "-500,0,0", ""); 5]);
    replies.push(OK.to_string());
    let mut channel = channel(replies);

    let report = bounded(5).home(&mut channel).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.axes.len(), 1);
    assert_eq!(report.axes[0].phase, AxisPhase::Seeking);
    assert_eq!(report.axes[0].seek, SequenceOutcome::NotReached { polls: 5 });
    assert_eq!(report.axes[0].release, None);
    assert_eq!(channel.transport().writes().last(), Some(&"!"));
}
