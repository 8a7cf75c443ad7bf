//! Trigger evaluator.
//!
//! Runs once per second edge over the owned rule array.  Evaluation is pure
//! with respect to heating: it only decides which rules fire and updates
//! their learned fields (lead time, latches, countdowns).  The arbiter in
//! [`crate::fsm`] decides what a firing means.
//!
//! ```text
//!   enabled? ─▶ day filter ─▶ gates ─▶ triggers ─▶ combine ─▶ cooldown ─▶ fired
//!                                 │
//!                                 └─▶ holds (gates + window) for natural expiry
//! ```

use heapless::Vec as HVec;
use log::debug;

use crate::clock::{self, LocalTime, SunTimes};
use crate::fsm::context::SensorSnapshot;
use crate::rules::{
    Action, Combine, DeviceTrigger, Latch, Rule, RuleRuntime, Twilight, TwilightSource,
};

/// Which configured trigger produced a firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    AtTime,
    Window,
    Sunset,
    Sunrise,
    Dusk,
    Dawn,
    Device,
}

/// Up to one entry per trigger kind.
pub type TriggerList = HVec<Trigger, 7>;

/// Everything the evaluator reads besides the rules themselves.
#[derive(Debug, Clone, Copy)]
pub struct EvalInput<'a> {
    /// `None` while the clock is not running.
    pub now: Option<LocalTime>,
    pub sun: Option<SunTimes>,
    pub sensors: &'a SensorSnapshot,
}

/// Per-rule result of one evaluation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub index: usize,
    pub fired: bool,
    /// Day filter, gates and window are all still satisfied.
    pub holds: bool,
    pub action: Option<Action>,
    pub sources: TriggerList,
}

impl RuleOutcome {
    fn idle(index: usize) -> Self {
        Self { index, fired: false, holds: false, action: None, sources: HVec::new() }
    }
}

/// Evaluate every rule once.  Returns one outcome per rule, in rule order.
pub fn evaluate(input: &EvalInput<'_>, rules: &mut [Rule]) -> Vec<RuleOutcome> {
    clear_sunset_flags_in_the_morning(input, rules);
    let dawn_suppressed = rules.iter().any(|r| r.runtime.sunset_fired);

    rules
        .iter_mut()
        .enumerate()
        .map(|(index, rule)| evaluate_rule(index, rule, input, dawn_suppressed))
        .collect()
}

fn evaluate_rule(
    index: usize,
    rule: &mut Rule,
    input: &EvalInput<'_>,
    dawn_suppressed: bool,
) -> RuleOutcome {
    let mut outcome = RuleOutcome::idle(index);
    if !rule.enabled {
        return outcome;
    }

    let day_ok = match input.now {
        Some(now) => rule.days.contains(now.weekday()),
        None => rule.days.is_every_day(),
    };
    if !day_ok {
        return outcome;
    }

    let gates_ok = gates_pass(rule, input);
    let minute = input.now.map(|t| t.minute_of_day());
    let in_window = rule
        .window
        .is_none_or(|w| minute.is_some_and(|m| w.contains(m)));
    outcome.holds = gates_ok && in_window;
    outcome.action.clone_from(&rule.action);
    if !gates_ok {
        return outcome;
    }

    // Every configured trigger is evaluated, so latches and countdowns
    // advance the same way whatever the combine mode.
    let mut configured = 0usize;
    let mut firing = TriggerList::new();
    let mut note = |kind: Trigger, fired: bool| {
        configured += 1;
        if fired {
            let _ = firing.push(kind);
        }
    };

    if let Some(at) = rule.at_time {
        note(Trigger::AtTime, minute == Some(at));
    }
    if rule.window.is_some() {
        note(Trigger::Window, in_window);
    }
    if let Some(offset) = rule.sunset {
        note(Trigger::Sunset, sun_match(input, offset, |s| s.sunset));
    }
    if let Some(offset) = rule.sunrise {
        note(Trigger::Sunrise, sun_match(input, offset, |s| s.sunrise));
    }
    if let Some(tw) = rule.dusk {
        let fired = twilight(&tw, &mut rule.runtime.dusk, input, Edge::Dusk);
        note(Trigger::Dusk, fired);
    }
    if let Some(tw) = rule.dawn {
        let fired = if dawn_suppressed && matches!(tw.source, TwilightSource::Sensor { .. }) {
            false
        } else {
            twilight(&tw, &mut rule.runtime.dawn, input, Edge::Dawn)
        };
        note(Trigger::Dawn, fired);
    }
    if let Some(device) = &rule.device {
        note(Trigger::Device, device_trigger(device, &mut rule.runtime, input.sensors));
    }

    let triggered = match rule.combine {
        Combine::Any => !firing.is_empty(),
        Combine::All => configured > 0 && firing.len() == configured,
    };
    if !triggered {
        return outcome;
    }

    let now_ts = input.now.map(|t| t.timestamp());
    if let Some(ts) = now_ts {
        if !rule.runtime.cooled_down(ts) {
            debug!("eval: rule {index} blocked by cooldown (lead {})", rule.runtime.lead_time);
            return outcome;
        }
        rule.runtime.lead_time = ts;
    }
    if firing.contains(&Trigger::Sunset) {
        rule.runtime.sunset_fired = true;
    }
    if firing.contains(&Trigger::Device) {
        rule.runtime.countdown = None;
        rule.runtime.consumed = true;
    }

    debug!("eval: rule {index} fired via {:?}", firing.as_slice());
    outcome.fired = true;
    outcome.sources = firing;
    outcome
}

// ---------------------------------------------------------------------------
// Gates
// ---------------------------------------------------------------------------

fn gates_pass(rule: &Rule, input: &EvalInput<'_>) -> bool {
    if let Some(cond) = &rule.must_be {
        if !input.sensors.temperature.is_some_and(|t| cond.holds(t)) {
            return false;
        }
    }
    if let Some(gate) = rule.twilight_must_be {
        let dark = if gate.sensor {
            Some(input.sensors.sensor_twilight)
        } else {
            match (input.now, input.sun) {
                (Some(now), Some(sun)) => Some(sun.is_night(now.minute_of_day())),
                _ => None,
            }
        };
        if dark != Some(gate.dark) {
            return false;
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Time triggers
// ---------------------------------------------------------------------------

fn sun_match(input: &EvalInput<'_>, offset: i16, pick: fn(&SunTimes) -> u16) -> bool {
    match (input.now, input.sun) {
        (Some(now), Some(sun)) => {
            now.minute_of_day() == clock::wrap_minute(i32::from(pick(&sun)), i32::from(offset))
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Dusk,
    Dawn,
}

fn twilight(tw: &Twilight, latch: &mut Latch, input: &EvalInput<'_>, edge: Edge) -> bool {
    let Some(now) = input.now else { return false };
    match tw.source {
        TwilightSource::Calendar => {
            let Some(sun) = input.sun else { return false };
            let base = match edge {
                Edge::Dusk => sun.dusk,
                Edge::Dawn => sun.dawn,
            };
            now.minute_of_day() == clock::wrap_minute(i32::from(base), i32::from(tw.offset))
        }
        TwilightSource::Sensor { threshold } => {
            let light = input.sensors.light;
            let condition = match (edge, threshold) {
                (Edge::Dusk, Some(th)) => light.is_some_and(|l| l < th),
                (Edge::Dawn, Some(th)) => light.is_some_and(|l| l > th),
                (Edge::Dusk, None) => input.sensors.sensor_twilight,
                (Edge::Dawn, None) => !input.sensors.sensor_twilight,
            };
            sensor_latch(latch, condition, tw.offset, now)
        }
    }
}

/// Two-phase, once-per-day latch.
///
/// Phase 1 records the minute the condition turns true, at most once a
/// day.  A condition already true at the first look after boot is not a
/// turn.  Phase 2 fires once `offset` minutes (negative offsets count as
/// zero) after that minute.  After firing, the learned minute is dropped as
/// soon as the condition goes away; `day` keeps blocking a second latch
/// today.
fn sensor_latch(latch: &mut Latch, condition: bool, offset: i16, now: LocalTime) -> bool {
    let today = now.day_key();
    let turned = condition && latch.seen == Some(false);
    latch.seen = Some(condition);
    if !condition {
        if latch.fired && latch.local_time.is_some() {
            latch.unlearn();
        }
        return false;
    }

    if turned && !latch.latched_on(today) {
        latch.latch(now.minute_of_day(), today);
    }
    if latch.fired {
        return false;
    }
    let (Some(local), Some(day)) = (latch.local_time, latch.day) else {
        return false;
    };
    let Some(midnight) = clock::midnight_of(day) else {
        return false;
    };
    let due = midnight + (i64::from(local) + i64::from(offset.max(0))) * 60;
    if now.timestamp() >= due {
        latch.fired = true;
        return true;
    }
    false
}

/// The sunset flag lives for one night: it is dropped between sunrise and
/// solar noon, or whenever sun times are unknown.
fn clear_sunset_flags_in_the_morning(input: &EvalInput<'_>, rules: &mut [Rule]) {
    let morning = match (input.now, input.sun) {
        (Some(now), Some(sun)) => {
            let minute = now.minute_of_day();
            let noon = (sun.sunrise + sun.sunset) / 2;
            minute >= sun.sunrise && minute < noon
        }
        (Some(_), None) => true,
        (None, _) => false,
    };
    if morning {
        for rule in rules.iter_mut() {
            rule.runtime.sunset_fired = false;
        }
    }
}

// ---------------------------------------------------------------------------
// Device triggers
// ---------------------------------------------------------------------------

/// Single-shot countdown shared by every device-trigger kind.  An elapsed
/// countdown, or a satisfied zero-offset trigger, stays true until the rule
/// fires; the firing consumes it.
fn device_trigger(trigger: &DeviceTrigger, rt: &mut RuleRuntime, sensors: &SensorSnapshot) -> bool {
    match rt.countdown {
        Some(0) => return true,
        Some(left) => {
            rt.countdown = Some(left - 1);
            return left == 1;
        }
        None => {}
    }

    if !trigger.kind.satisfied(sensors) {
        rt.consumed = false;
        return false;
    }
    if rt.consumed {
        return false;
    }

    let secs = u32::from(trigger.offset) * 60;
    if secs == 0 {
        return true;
    }
    rt.countdown = Some(secs);
    false
}
