//! End-to-end tests for the Thermostat → evaluator → arbiter → relay chain.
//!
//! Every test boots a real [`Thermostat`] over mock adapters and drives it
//! one control pass per simulated second.

use super::mock_hw::{Bench, MockClock, MockHardware, MockNvs, settings_json};

use thermonode::adapters::outbound::{Outbound, OutboundQueue};
use thermonode::app::events::AppEvent;
use thermonode::app::service::Thermostat;
use thermonode::drivers::button::ButtonEvent;
use thermonode::fsm::StateId;
use thermonode::fsm::context::{EndTime, Owner};

// ── Scheduled sessions ────────────────────────────────────────

#[test]
fn morning_rule_heats_until_setpoint() {
    let mut b = Bench::with_rules("tw_480#(21)", MockClock::monday(8, 0), 18.0);
    assert_eq!(b.state(), StateId::Off);

    b.run(1);
    assert_eq!(b.state(), StateId::ScheduledOn);
    assert_eq!(b.last_transition(), Some((StateId::Off, StateId::ScheduledOn, "schedule")));
    assert_eq!(b.hw.relay_calls.last(), Some(&true));
    assert_eq!(b.thermostat.heating().setpoint, 21.0);
    assert_eq!(b.thermostat.heating().owner, Owner::Rule(0));
    assert!(b.nvs.get_str("resume").is_some(), "resume record written while heating");

    // The room warms up; the next sample (60 s after the last) ends it.
    b.hw.raw = Some(24.5);
    b.run(58);
    assert_eq!(b.state(), StateId::ScheduledOn);
    b.run(1);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.last_transition(), Some((StateId::ScheduledOn, StateId::Off, "automatic")));
    assert_eq!(b.hw.relay_calls.last(), Some(&false));
    assert!(b.nvs.get_str("resume").is_none(), "resume record deleted once off");

    // Same minute, cooldown holds: no second activation.
    b.run(60);
    assert_eq!(b.state(), StateId::Off);
}

#[test]
fn percent_zero_rule_switches_schedule_off() {
    let mut b = Bench::with_rules("tw_480#(21),tw_481#(0%)", MockClock::monday(8, 0), 18.0);
    b.run(1);
    assert_eq!(b.state(), StateId::ScheduledOn);

    b.run(59);
    assert_eq!(b.state(), StateId::ScheduledOn);
    b.run(1);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.last_transition(), Some((StateId::ScheduledOn, StateId::Off, "schedule")));

    b.run(60);
    assert_eq!(b.state(), StateId::Off);
}

#[test]
fn higher_setpoint_takes_over_running_schedule() {
    let mut b = Bench::with_rules("twh(480;1200)#(20),tw_540#(22)", MockClock::monday(8, 59), 18.0);
    b.run(1);
    assert_eq!(b.thermostat.heating().owner, Owner::Rule(0));
    assert_eq!(b.thermostat.heating().setpoint, 20.0);

    b.run(60);
    assert_eq!(b.state(), StateId::ScheduledOn);
    assert_eq!(b.last_transition(), Some((StateId::ScheduledOn, StateId::ScheduledOn, "takeover")));
    assert_eq!(b.thermostat.heating().owner, Owner::Rule(1));
    assert_eq!(b.thermostat.heating().setpoint, 22.0);

    // The window rule keeps firing but never outranks 22 °C.
    b.run(120);
    assert_eq!(b.thermostat.heating().owner, Owner::Rule(1));
}

#[test]
fn schedule_expires_with_its_window() {
    let mut b = Bench::with_rules("twh(480;540)", MockClock::monday(8, 59), 18.0);
    b.run(1);
    assert_eq!(b.state(), StateId::ScheduledOn);
    assert_eq!(b.thermostat.heating().setpoint, 0.0);

    b.run(59);
    assert_eq!(b.state(), StateId::ScheduledOn);
    b.run(1);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.last_transition(), Some((StateId::ScheduledOn, StateId::Off, "expired")));
}

#[test]
fn plain_on_rule_without_window_runs_for_plustime() {
    let mut b = Bench::with_rules("tw_480", MockClock::monday(8, 0), 18.0);
    b.run(1);
    assert_eq!(b.state(), StateId::ScheduledOn);
    assert_eq!(b.thermostat.heating().setpoint, 0.0);
    let ends = MockClock::monday(8, 10).timestamp().unwrap();
    assert_eq!(b.thermostat.heating().end_time, EndTime::At(ends));

    b.run(599);
    assert_eq!(b.state(), StateId::ScheduledOn);
    b.run(1);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.last_transition(), Some((StateId::ScheduledOn, StateId::Off, "automatic")));

    b.run(3600);
    assert_eq!(b.state(), StateId::Off);
}

#[test]
fn smart_lock_holds_rules_until_sunset() {
    let mut b = Bench::with_rules("twh(960;1200)#(21)", MockClock::monday(16, 28), 18.0);
    b.payload(r#"{"smart_lock":1}"#).unwrap();
    assert!(b.thermostat.settings().smart_lock);
    assert!(b.nvs.get_str("settings").unwrap().contains("\"smart_lock\":true"));
    let report = serde_json::to_string(&b.thermostat.state_report()).unwrap();
    assert!(report.contains("\"smart_lock\":true"));

    // 16:28:00 to 16:29:59: the window rule fires but nothing heats.
    b.run(120);
    assert_eq!(b.state(), StateId::Off);
    assert!(!b.hw.relay_calls.contains(&true));

    // Sunset (16:30) releases the lock.
    b.run(1);
    assert!(!b.thermostat.settings().smart_lock);
    assert!(!b.nvs.get_str("settings").unwrap().contains("smart_lock"));
    b.run(62);
    assert_eq!(b.state(), StateId::ScheduledOn);
}

#[test]
fn rule_on_another_weekday_stays_idle() {
    // 2024-01-14 is a Sunday; "o" is Monday only.
    let mut b = Bench::with_rules("to_480#(21)", MockClock::at(2024, 1, 14, 8, 0), 18.0);
    b.run(120);
    assert_eq!(b.state(), StateId::Off);
    assert!(!b.hw.relay_calls.contains(&true));
}

#[test]
fn replacing_rules_ends_rule_owned_session_and_keeps_lead_time() {
    let mut b = Bench::with_rules("tw_480#(21)", MockClock::monday(8, 0), 18.0);
    let fired_at = b.clock.timestamp().unwrap();
    b.run(1);
    assert_eq!(b.state(), StateId::ScheduledOn);

    b.payload(r#"{"smart":"tw_480#(21),tw_600#(19)"}"#).unwrap();
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.last_transition(), Some((StateId::ScheduledOn, StateId::Off, "rules replaced")));
    assert_eq!(b.thermostat.rules().len(), 2);
    assert_eq!(b.thermostat.rules().rules()[0].runtime.lead_time, fired_at);
    assert_eq!(b.thermostat.rules().rules()[1].runtime.lead_time, 0);
    assert_eq!(b.thermostat.settings().smart, "tw_480#(21),tw_600#(19)");

    let report = b.thermostat.state_report();
    assert_eq!(report.smart, format!("tw_480#(21)e({fired_at}),tw_600#(19)"));
}

// ── Debounce, vacation and failsafe ───────────────────────────

#[test]
fn cancelled_schedule_waits_out_downtime() {
    let mut b = Bench::with_rules("twh(480;1200)#(21)", MockClock::monday(9, 0), 18.0);
    b.payload(r#"{"downtime":120}"#).unwrap();
    b.run(1);
    assert_eq!(b.state(), StateId::ScheduledOn);

    b.press(ButtonEvent::Single);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.thermostat.heating().downtime, 120);

    b.run(100);
    assert_eq!(b.state(), StateId::Off, "window rule suppressed during downtime");
    b.run(30);
    assert_eq!(b.state(), StateId::ScheduledOn);
}

#[test]
fn vacation_suspends_schedules_until_it_expires() {
    let mut b = Bench::with_rules("twh(480;1200)#(21)", MockClock::monday(9, 0), 18.0);
    b.run(1);
    assert_eq!(b.state(), StateId::ScheduledOn);

    let until = b.clock.timestamp().unwrap() + 300;
    b.payload(&format!(r#"{{"vacation":{until}}}"#)).unwrap();
    assert_eq!(b.thermostat.settings().vacation, until);

    b.run(1);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.last_transition(), Some((StateId::ScheduledOn, StateId::Off, "vacation")));

    b.run(250);
    assert_eq!(b.state(), StateId::Off);

    b.run(150);
    assert_eq!(b.thermostat.settings().vacation, 0);
    assert!(b.nvs.get_str("settings").unwrap().contains("\"vacation\":0"));
    assert_eq!(b.state(), StateId::ScheduledOn);
}

#[test]
fn cold_room_forces_failsafe_even_after_cancel() {
    let mut b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(5.0), MockNvs::new());
    b.run(1);
    assert_eq!(b.state(), StateId::FailsafeOn);
    assert_eq!(b.last_transition(), Some((StateId::Off, StateId::FailsafeOn, "failsafe")));
    assert_eq!(b.thermostat.heating().setpoint, 7.0);
    assert_eq!(b.thermostat.heating().owner, Owner::Failsafe);
    assert_ne!(b.thermostat.fault_flags(), 0);

    // Toggling by hand cannot keep a freezing room off.
    b.press(ButtonEvent::Single);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.thermostat.heating().downtime, 0);
    b.run(1);
    assert_eq!(b.state(), StateId::FailsafeOn);

    // Minimum reached at the next sample.
    b.hw.raw = Some(7.0 + 3.5);
    b.run(60);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.thermostat.fault_flags(), 0);
}

#[test]
fn probe_loss_ends_failsafe() {
    let mut b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(5.0), MockNvs::new());
    b.run(1);
    assert_eq!(b.state(), StateId::FailsafeOn);

    b.hw.raw = None;
    b.run(60);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.last_transition(), Some((StateId::FailsafeOn, StateId::Off, "sensor fault")));
    assert_eq!(b.thermostat.sensors().temperature, None);

    // A missing reading never counts as cold.
    b.run(120);
    assert_eq!(b.state(), StateId::Off);
}

// ── Button and remote sessions ────────────────────────────────

#[test]
fn single_press_heats_for_plustime() {
    let mut b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(18.0), MockNvs::new());
    let now = b.clock.timestamp().unwrap();
    b.press(ButtonEvent::Single);
    assert_eq!(b.state(), StateId::ManualOn);
    assert_eq!(b.thermostat.heating().end_time, EndTime::At(now + 600));

    b.run(599);
    assert_eq!(b.state(), StateId::ManualOn);
    b.run(2);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.last_transition(), Some((StateId::ManualOn, StateId::Off, "automatic")));
}

#[test]
fn long_press_boosts_above_current_temperature() {
    let mut b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(18.0), MockNvs::new());
    b.press(ButtonEvent::Long);
    assert_eq!(b.state(), StateId::ManualOn);
    assert_eq!(b.thermostat.heating().setpoint, 19.0);
    assert_eq!(b.thermostat.heating().end_time, EndTime::Unset);
    assert_eq!(b.thermostat.delta().htemp, Some(19.0));
}

#[test]
fn key_lock_ignores_the_button() {
    let mut b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(18.0), MockNvs::new());
    b.payload(r#"{"key_lock":true}"#).unwrap();
    assert!(b.thermostat.heating().key_lock);

    b.press(ButtonEvent::Single);
    b.press(ButtonEvent::Long);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.hw.relay_calls, vec![false], "only the boot-time relay reset");
}

#[test]
fn long_press_on_schedule_suppresses_rules_until_midnight() {
    let mut b = Bench::with_rules("twh(480;1200)#(21)", MockClock::monday(9, 0), 18.0);
    b.run(1);
    assert_eq!(b.state(), StateId::ScheduledOn);

    // Pressed at 09:00:01.
    b.press(ButtonEvent::Long);
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.last_transition(), Some((StateId::ScheduledOn, StateId::Off, "button")));
    assert_eq!(b.thermostat.heating().downtime, 15 * 3600 - 1);
}

#[test]
fn remote_setpoint_then_off() {
    let mut b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(18.0), MockNvs::new());
    b.payload(r#"{"val":"t22"}"#).unwrap();
    assert_eq!(b.state(), StateId::RemoteOn);
    assert_eq!(b.last_transition(), Some((StateId::Off, StateId::RemoteOn, "remote")));
    assert!(b.thermostat.heating().remote);
    assert!(b.nvs.get_str("resume").unwrap().contains("\"remote\":true"));

    b.payload(r#"{"val":"0"}"#).unwrap();
    assert_eq!(b.state(), StateId::Off);
    assert!(b.nvs.get_str("resume").is_none());
    assert_eq!(b.thermostat.heating().downtime, 0);
    assert_eq!(b.nvs.writes_of("settings"), 1, "directives do not touch settings");
}

#[test]
fn remote_off_on_schedule_applies_downtime() {
    let mut b = Bench::with_rules("twh(480;1200)#(21)", MockClock::monday(9, 0), 18.0);
    b.run(1);
    b.payload(r#"{"val":0}"#).unwrap();
    assert_eq!(b.state(), StateId::Off);
    assert_eq!(b.thermostat.heating().downtime, 10_800);
}

// ── Reboot ────────────────────────────────────────────────────

#[test]
fn remote_session_resumes_after_reboot() {
    let mut b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(18.0), MockNvs::new());
    b.payload(r#"{"val":"t22"}"#).unwrap();

    let b = b.reboot();
    assert_eq!(b.state(), StateId::RemoteOn);
    assert_eq!(b.last_transition(), Some((StateId::Off, StateId::RemoteOn, "resume")));
    assert_eq!(b.thermostat.heating().setpoint, 22.0);
    assert_eq!(b.hw.relay_calls, vec![false, true]);
}

#[test]
fn timed_session_resumes_with_remaining_time() {
    let mut b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(18.0), MockNvs::new());
    let start = b.clock.timestamp().unwrap();
    b.payload(r#"{"val":"c600"}"#).unwrap();
    b.run(100);

    let b = b.reboot();
    assert_eq!(b.state(), StateId::RemoteOn);
    assert_eq!(b.thermostat.heating().end_time, EndTime::At(start + 600));
    assert_eq!(b.thermostat.delta().htime, Some(500));
}

#[test]
fn long_countdown_without_clock_keeps_heating_but_drops_end_time() {
    let mut b = Bench::boot(MockClock::stopped(), MockHardware::reading(18.0), MockNvs::new());
    b.payload(r#"{"val":"c5000"}"#).unwrap();
    assert_eq!(b.thermostat.heating().end_time, EndTime::Countdown(5000));

    let b = b.reboot();
    assert_eq!(b.state(), StateId::RemoteOn);
    assert_eq!(b.thermostat.heating().end_time, EndTime::Unset);
}

#[test]
fn short_countdown_without_clock_survives_reboot() {
    let mut b = Bench::boot(MockClock::stopped(), MockHardware::reading(18.0), MockNvs::new());
    b.payload(r#"{"val":"c300"}"#).unwrap();

    let mut b = b.reboot();
    assert_eq!(b.thermostat.heating().end_time, EndTime::Countdown(300));
    b.run(300);
    assert_eq!(b.state(), StateId::Off);
}

#[test]
fn legacy_schedule_is_migrated_at_boot() {
    let mut nvs = MockNvs::new();
    nvs.put_str("settings", r#"{"smart":"ouehr21.5_360-1320","minimum":6}"#);
    let mut b = Bench::boot(MockClock::monday(9, 0), MockHardware::reading(18.0), nvs);

    assert_eq!(b.thermostat.settings().smart, "touehrh(360;1320)#(21.5)");
    assert_eq!(b.thermostat.settings().ver, Some(2));
    assert_eq!(b.thermostat.settings().minimum, 6.0);
    assert!(b.nvs.get_str("settings").unwrap().contains("\"ver\":2"));

    b.run(1);
    assert_eq!(b.state(), StateId::ScheduledOn);
    assert_eq!(b.thermostat.heating().setpoint, 21.5);
}

#[test]
fn every_boot_is_counted() {
    let b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(18.0), MockNvs::new());
    assert_eq!(b.thermostat.settings().uprisings, 1);
    let b = b.reboot();
    let b = b.reboot();
    assert_eq!(b.thermostat.settings().uprisings, 3);
}

#[test]
fn learned_fields_survive_reboot() {
    let mut b = Bench::with_rules("tw_480#(21)", MockClock::monday(8, 0), 18.0);
    let fired_at = b.clock.timestamp().unwrap();
    b.run(1);
    assert_eq!(b.nvs.writes_of("learned"), 1);

    let mut b = b.reboot();
    assert_eq!(b.thermostat.rules().rules()[0].runtime.lead_time, fired_at);
    assert_eq!(b.thermostat.heating().owner, Owner::Rule(0), "scheduled session resumed");

    // Still inside the cooldown: the resumed session is not re-triggered.
    let transitions = b.sink.transitions().len();
    b.run(30);
    assert_eq!(b.sink.transitions().len(), transitions);
}

#[test]
fn storage_failures_keep_in_memory_state() {
    let mut b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(18.0), MockNvs::new());
    b.nvs.fail_writes = true;

    b.payload(r#"{"minimum":10}"#).unwrap();
    assert_eq!(b.thermostat.settings().minimum, 10.0);

    b.payload(r#"{"val":"t22"}"#).unwrap();
    assert_eq!(b.state(), StateId::RemoteOn);
    assert!(b.nvs.get_str("resume").is_none());
}

// ── Clock ─────────────────────────────────────────────────────

#[test]
fn time_payload_starts_and_adjusts_the_clock() {
    let mut b = Bench::boot(MockClock::stopped(), MockHardware::reading(18.0), MockNvs::new());

    // 2024-01-15 08:00 UTC, one hour east.
    b.payload(r#"{"time":1705305600,"offset":3600}"#).unwrap();
    assert_eq!(b.clock.now, MockClock::monday(9, 0).now);
    assert_eq!(b.clock.sets.len(), 1);

    // Small drift is left alone.
    b.payload(r#"{"time":1705305630}"#).unwrap();
    assert_eq!(b.clock.sets.len(), 1);

    // DST shifts a running clock by an hour.
    b.payload(r#"{"dst":1}"#).unwrap();
    assert_eq!(b.clock.now, MockClock::monday(10, 0).now);
    assert_eq!(b.thermostat.settings().utc_shift(), 7200);
}

#[test]
fn summer_time_starts_on_last_sunday_of_march() {
    let mut b = Bench::boot(MockClock::at(2024, 3, 31, 1, 59), MockHardware::reading(18.0), MockNvs::new());
    b.run(60);
    assert!(b.clock.sets.is_empty());

    b.run(1);
    assert_eq!(b.clock.sets, vec![MockClock::at(2024, 3, 31, 3, 0).now.unwrap()]);
    assert!(b.thermostat.settings().dst);
    assert_eq!(b.thermostat.settings().utc_shift(), 3600);
    assert!(b.nvs.get_str("settings").unwrap().contains("\"dst\":true"));

    b.run(3600);
    assert_eq!(b.clock.sets.len(), 1);
}

#[test]
fn summer_time_ends_on_last_sunday_of_october_once() {
    let mut nvs = MockNvs::new();
    nvs.put_str("settings", &settings_json("").replace("\"dst\":false", "\"dst\":true"));
    let mut b = Bench::boot(MockClock::at(2024, 10, 27, 2, 59), MockHardware::reading(18.0), nvs);
    assert!(b.thermostat.settings().dst);

    b.run(61);
    assert_eq!(b.clock.sets, vec![MockClock::at(2024, 10, 27, 2, 0).now.unwrap()]);
    assert!(!b.thermostat.settings().dst);
    assert!(b.nvs.get_str("settings").unwrap().contains("\"dst\":false"));

    // The repeated hour passes 03:00 again without a second switch.
    b.run(3700);
    assert_eq!(b.clock.sets.len(), 1);
    assert!(!b.thermostat.settings().dst);
}

#[test]
fn large_drift_resets_the_clock() {
    let mut b = Bench::boot(MockClock::monday(8, 0), MockHardware::reading(18.0), MockNvs::new());
    b.payload(r#"{"time":1705306200}"#).unwrap();
    assert_eq!(b.clock.now, MockClock::monday(8, 10).now);
}

#[test]
fn vacation_is_stored_in_local_time() {
    let mut b = Bench::boot(MockClock::monday(8, 0), MockHardware::reading(18.0), MockNvs::new());
    b.payload(r#"{"offset":3600,"vacation":1705400000}"#).unwrap();
    assert_eq!(b.thermostat.settings().vacation, 1_705_403_600);
    b.payload(r#"{"vacation":0}"#).unwrap();
    assert_eq!(b.thermostat.settings().vacation, 0);
}

// ── Peer triggers and forwards ────────────────────────────────

#[test]
fn chain_signal_fires_without_a_clock() {
    let mut b = Bench::with_rules("tc(7)#(22)", MockClock::stopped(), 18.0);
    b.run(5);
    assert_eq!(b.state(), StateId::Off);

    b.payload(r#"{"chain":7}"#).unwrap();
    b.run(1);
    assert_eq!(b.state(), StateId::ScheduledOn);
    assert_eq!(b.thermostat.heating().setpoint, 22.0);
    assert!(b.thermostat.sensors().chain.is_empty());
}

#[test]
fn forward_action_sends_value_to_peer() {
    let mut b = Bench::with_rules("tw_480#(@192.168.1.20;40)", MockClock::monday(8, 0), 18.0);
    b.run(1);
    assert_eq!(b.sink.forwards(), vec![("192.168.1.20", r#"{"val":"40"}"#)]);
    assert_eq!(b.state(), StateId::Off, "forwards never heat");

    b.run(120);
    assert_eq!(b.sink.forwards().len(), 1);
}

#[test]
fn sensor_dusk_forwards_once_per_day() {
    let mut b = Bench::with_rules("tw<(s)#(@peer;1)", MockClock::monday(17, 0), 18.0);
    b.run(5);
    assert!(b.sink.forwards().is_empty());

    b.payload(r#"{"light":"5t"}"#).unwrap();
    b.run(1);
    assert_eq!(b.sink.forwards(), vec![("peer", r#"{"val":"1"}"#)]);

    // Light flickers back and goes dark again: no second firing today.
    b.run(120);
    b.payload(r#"{"light":"50"}"#).unwrap();
    b.run(120);
    b.payload(r#"{"light":"5t"}"#).unwrap();
    b.run(120);
    assert_eq!(b.sink.forwards().len(), 1);
}

#[test]
fn sensor_dusk_already_dark_at_boot_does_not_fire() {
    let mut nvs = MockNvs::new();
    let settings = settings_json("tw<(s)#(@peer;1)")
        .replace("\"sensor_twilight\":false", "\"sensor_twilight\":true");
    nvs.put_str("settings", &settings);

    let mut b = Bench::boot(MockClock::monday(18, 0), MockHardware::reading(18.0), nvs);
    assert!(b.thermostat.sensors().sensor_twilight);
    b.run(600);
    assert!(b.sink.forwards().is_empty());

    // Dark across midnight is still no turn.
    b.clock = MockClock::at(2024, 1, 16, 0, 0);
    b.run(300);
    assert!(b.sink.forwards().is_empty());
}

#[test]
fn forwards_and_deltas_reach_the_outbound_queue() {
    let mut nvs = MockNvs::new();
    nvs.put_str("settings", &settings_json("tw_480#(@10.0.0.9)"));
    let mut clock = MockClock::monday(8, 0);
    let mut hw = MockHardware::reading(18.0);
    let mut sink = (super::mock_hw::LogSink::new(), OutboundQueue::new());

    let mut t = Thermostat::boot(&mut nvs, &clock, &mut hw, &mut sink);
    t.tick(&mut clock, &mut hw, &mut nvs, &mut sink);

    assert_eq!(
        sink.1.try_pop(),
        Some(Outbound::Peer { address: "10.0.0.9".into(), body: r#"{"val":"1"}"#.into() })
    );
    assert!(matches!(sink.0.events.first(), Some(AppEvent::Started(StateId::Off))));
}

// ── Reporting ─────────────────────────────────────────────────

#[test]
fn temperature_change_emits_delta_at_next_sample() {
    let mut b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(20.0), MockNvs::new());
    b.sink.clear();
    b.hw.raw = Some(24.0);

    b.run(59);
    assert!(b.sink.deltas().is_empty());
    b.run(1);
    let deltas = b.sink.deltas();
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].temp, Some(20.5));
    assert_eq!(deltas[0].value, 0);
}

#[test]
fn every_transition_emits_one_delta() {
    let mut b = Bench::boot(MockClock::monday(10, 0), MockHardware::reading(18.0), MockNvs::new());
    b.sink.clear();
    b.press(ButtonEvent::Long);
    b.press(ButtonEvent::Single);

    assert_eq!(b.sink.transitions().len(), 2);
    let values: Vec<u8> = b.sink.deltas().iter().map(|d| d.value).collect();
    assert_eq!(values, vec![1, 0]);
}
