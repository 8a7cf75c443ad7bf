//! One-time migration of the pre-versioned schedule encoding.
//!
//! Older settings stored a plain thermostat schedule per entry:
//!
//! ```text
//!   ["/"] days TEMP ["_" [START] "-" [END]]      e.g.  "ouehr21.5_360-1320"
//! ```
//!
//! Each entry becomes a thermostat rule with the same days and enabled flag,
//! a `#(TEMP)` action and an `h(START;END)` window (`h(;)` when the entry
//! carried no window).  Only called when the stored settings have no version
//! marker.

use log::{info, warn};

use super::{Action, Days, DeviceClass, Rule, RuleError, RuleSet, Window};
use crate::clock::MINUTES_PER_DAY;

/// Convert a legacy schedule string.  Bad entries are logged and dropped.
pub fn migrate(text: &str) -> RuleSet {
    let text = text.trim();
    if text.is_empty() || text == "0" {
        return RuleSet::default();
    }
    let mut rules = Vec::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match migrate_entry(entry) {
            Ok(rule) => rules.push(rule),
            Err(e) => warn!("legacy: dropping entry '{entry}': {e}"),
        }
    }
    info!("legacy: migrated {} schedule entries", rules.len());
    RuleSet::new(rules, Vec::new())
}

fn migrate_entry(entry: &str) -> Result<Rule, RuleError> {
    let (enabled, body) = match entry.strip_prefix('/') {
        Some(rest) => (false, rest),
        None => (true, entry),
    };
    if body.is_empty() {
        return Err(RuleError::Empty);
    }

    let split = body.find(|c: char| !Days::is_day_letter(c)).unwrap_or(body.len());
    let (letters, rest) = body.split_at(split);
    let days = letters
        .chars()
        .filter_map(Days::from_letter)
        .fold(Days::NONE, Days::union);
    let days = if days.is_empty() { Days::EVERY } else { days };

    let (temp, window) = match rest.split_once('_') {
        Some((temp, window)) => (temp, Some(window)),
        None => (rest, None),
    };
    let temp: f32 = temp.trim().parse().map_err(|_| RuleError::BadValue("legacy temperature"))?;
    if !temp.is_finite() {
        return Err(RuleError::BadValue("legacy temperature"));
    }

    let window = match window {
        Some(w) => {
            let (start, end) = w.split_once('-').ok_or(RuleError::BadValue("legacy window"))?;
            Window { start: legacy_minute(start)?, end: legacy_minute(end)? }
        }
        None => Window::default(),
    };

    let mut rule = Rule::new(DeviceClass::Thermostat);
    rule.enabled = enabled;
    rule.days = days;
    rule.action = Some(Action::Setpoint(temp));
    rule.window = Some(window);
    Ok(rule)
}

fn legacy_minute(text: &str) -> Result<Option<u16>, RuleError> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let minute: i64 = text.parse().map_err(|_| RuleError::BadValue("legacy window"))?;
    if !(0..i64::from(MINUTES_PER_DAY)).contains(&minute) {
        return Err(RuleError::MinuteOutOfRange(minute));
    }
    Ok(Some(minute as u16))
}
