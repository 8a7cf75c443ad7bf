//! Automation rules ("smart strings").
//!
//! A rule set is a comma-separated list of rules; each rule is a device-class
//! tag followed by compact tokens.  [`codec`] turns strings into [`Rule`]s and
//! back, [`legacy`] migrates the pre-versioned encoding, and [`runtime`] holds
//! the fields the evaluator learns at run time (lead time, latches,
//! countdowns), kept apart from the user-configured definition.
//!
//! ```text
//!   /tw&_480h(360;540)<(s;15)#(21.5)r(<19)e(1705305600)
//!   │││ │   │         │      │       │     └─ lead time (runtime)
//!   │││ │   │         │      │       └─ must-be gate
//!   │││ │   │         │      └─ action override
//!   │││ │   │         └─ sensor dusk, 15 min offset
//!   │││ │   └─ between 06:00 and 09:00
//!   │││ └─ at 08:00
//!   ││└─ all configured triggers required
//!   │└─ every day
//!   └─ disabled (thermostat rule)
//! ```

pub mod codec;
pub mod legacy;
pub mod runtime;

use chrono::Weekday;
use core::fmt;

use crate::fsm::context::SensorSnapshot;
pub use runtime::{Latch, RuleId, RuleRuntime};

// ---------------------------------------------------------------------------
// Device class
// ---------------------------------------------------------------------------

/// Device-class tag that prefixes every rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceClass {
    Thermostat,
    Switch,
    Blinds,
}

impl DeviceClass {
    pub fn from_tag(tag: char) -> Option<Self> {
        match tag {
            't' => Some(Self::Thermostat),
            's' => Some(Self::Switch),
            'b' => Some(Self::Blinds),
            _ => None,
        }
    }

    pub fn tag(self) -> char {
        match self {
            Self::Thermostat => 't',
            Self::Switch => 's',
            Self::Blinds => 'b',
        }
    }
}

// ---------------------------------------------------------------------------
// Day filter
// ---------------------------------------------------------------------------

/// Letters for Sunday..Saturday, indexed by `Weekday::num_days_from_sunday`.
pub const DAY_LETTERS: [char; 7] = ['s', 'o', 'u', 'e', 'h', 'r', 'a'];

/// Letter for the "every day" wildcard.
pub const EVERY_DAY_LETTER: char = 'w';

/// Weekday bitmask, bit `n` = `Weekday::num_days_from_sunday() == n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Days(u8);

impl Days {
    pub const EVERY: Self = Self(0x7F);
    pub const NONE: Self = Self(0);

    pub fn from_letter(c: char) -> Option<Self> {
        if c == EVERY_DAY_LETTER {
            return Some(Self::EVERY);
        }
        DAY_LETTERS
            .iter()
            .position(|&l| l == c)
            .map(|i| Self(1 << i))
    }

    pub fn is_day_letter(c: char) -> bool {
        c == EVERY_DAY_LETTER || DAY_LETTERS.contains(&c)
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_sunday()) != 0
    }

    pub fn is_every_day(self) -> bool {
        self.0 & Self::EVERY.0 == Self::EVERY.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for Days {
    fn default() -> Self {
        Self::EVERY
    }
}

impl fmt::Display for Days {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_every_day() {
            return write!(f, "{EVERY_DAY_LETTER}");
        }
        for (i, letter) in DAY_LETTERS.iter().enumerate() {
            if self.0 & (1 << i) != 0 {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Triggers, gates and actions
// ---------------------------------------------------------------------------

/// How a rule combines its configured triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combine {
    /// The first configured trigger that fires activates the rule.
    #[default]
    Any,
    /// Every configured trigger must fire in the same evaluation.
    All,
}

/// "Between hours" window; an absent bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub start: Option<u16>,
    pub end: Option<u16>,
}

impl Window {
    pub fn contains(&self, minute: u16) -> bool {
        match (self.start, self.end) {
            (Some(s), Some(e)) if s <= e => minute >= s && minute < e,
            (Some(s), Some(e)) => minute >= s || minute < e,
            (Some(s), None) => minute >= s,
            (None, Some(e)) => minute < e,
            (None, None) => true,
        }
    }
}

/// Where a dusk/dawn trigger takes its notion of "dark" from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TwilightSource {
    /// Computed civil dusk/dawn times.
    Calendar,
    /// The light sensor: a level threshold, or the sensor twilight flag.
    Sensor { threshold: Option<i32> },
}

/// Dusk or dawn trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Twilight {
    pub source: TwilightSource,
    pub offset: i16,
}

/// Comparison operator shared by gates and device triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Equal,
    Less,
    Greater,
}

/// `value <op> threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Condition {
    pub cmp: Cmp,
    pub value: f32,
}

impl Condition {
    pub fn holds(&self, actual: f32) -> bool {
        match self.cmp {
            Cmp::Equal => (actual - self.value).abs() < 0.05,
            Cmp::Less => actual < self.value,
            Cmp::Greater => actual > self.value,
        }
    }
}

/// Twilight gate: the rule may only activate while it is dark (or light).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwilightGate {
    pub sensor: bool,
    pub dark: bool,
}

/// Device-class trigger predicate.  Every kind shares the offset/countdown
/// shape in [`DeviceTrigger`]; only "satisfied now" differs.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerKind {
    /// Room temperature compared against a threshold.
    Temperature(Condition),
    /// A peer switch reports on/off.
    Switch { on: bool },
    /// A peer blind reports a position (percent).
    Blinds(Condition),
    /// A chain signal with this id arrived since the last evaluation.
    Chain { id: u16 },
}

impl TriggerKind {
    pub fn satisfied(&self, sensors: &SensorSnapshot) -> bool {
        match self {
            Self::Temperature(cond) => sensors.temperature.is_some_and(|t| cond.holds(t)),
            Self::Switch { on } => sensors.switch == Some(*on),
            Self::Blinds(cond) => sensors.blinds.is_some_and(|p| cond.holds(f32::from(p))),
            Self::Chain { id } => sensors.chain.contains(id),
        }
    }
}

/// Single-shot device trigger with an optional delay in minutes.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceTrigger {
    pub kind: TriggerKind,
    pub offset: u16,
}

/// Action override carried by a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Heat until this temperature is reached.
    Setpoint(f32),
    /// Output level; 0 means off.
    Percent(u8),
    /// Send `{"val": value}` to another device.
    Forward { address: String, value: Option<String> },
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// One scheduling entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub enabled: bool,
    pub class: DeviceClass,
    pub days: Days,
    pub combine: Combine,
    pub action: Option<Action>,
    pub at_time: Option<u16>,
    pub window: Option<Window>,
    /// Sunset trigger offset in minutes.
    pub sunset: Option<i16>,
    /// Sunrise trigger offset in minutes.
    pub sunrise: Option<i16>,
    pub dusk: Option<Twilight>,
    pub dawn: Option<Twilight>,
    pub device: Option<DeviceTrigger>,
    pub must_be: Option<Condition>,
    pub twilight_must_be: Option<TwilightGate>,
    /// Unrecognised tokens, re-emitted verbatim.
    pub unknown: Vec<String>,
    pub runtime: RuleRuntime,
}

impl Rule {
    pub fn new(class: DeviceClass) -> Self {
        Self {
            enabled: true,
            class,
            days: Days::EVERY,
            combine: Combine::Any,
            action: None,
            at_time: None,
            window: None,
            sunset: None,
            sunrise: None,
            dusk: None,
            dawn: None,
            device: None,
            must_be: None,
            twilight_must_be: None,
            unknown: Vec::new(),
            runtime: RuleRuntime::default(),
        }
    }

    /// Number of triggers this rule configures.
    pub fn trigger_count(&self) -> usize {
        usize::from(self.at_time.is_some())
            + usize::from(self.window.is_some())
            + usize::from(self.sunset.is_some())
            + usize::from(self.sunrise.is_some())
            + usize::from(self.dusk.is_some())
            + usize::from(self.dawn.is_some())
            + usize::from(self.device.is_some())
    }

    /// Stable identity of the user-configured definition.
    pub fn id(&self) -> RuleId {
        RuleId::of_definition(&codec::serialize_definition(self))
    }

    /// Same definition, ignoring learned fields.
    pub fn same_definition(&self, other: &Self) -> bool {
        codec::serialize_definition(self) == codec::serialize_definition(other)
    }
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

/// The single in-memory rule array, replaced wholesale on every accepted
/// rule-set string.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    /// Rules with an unknown device-class tag, kept verbatim.
    foreign: Vec<String>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>, foreign: Vec<String>) -> Self {
        Self { rules, foreign }
    }

    pub fn parse(text: &str) -> Self {
        codec::parse(text)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut [Rule] {
        &mut self.rules
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn foreign(&self) -> &[String] {
        &self.foreign
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.foreign.is_empty()
    }

    /// Definition-only string, as stored in the settings.
    pub fn to_definition_string(&self) -> String {
        self.join(codec::serialize_definition)
    }

    /// Full string including lead-time tokens, as reported to peers.
    pub fn to_rule_string(&self) -> String {
        self.join(codec::serialize)
    }

    fn join(&self, f: fn(&Rule) -> String) -> String {
        let mut parts: Vec<String> = self.rules.iter().map(f).collect();
        parts.extend(self.foreign.iter().cloned());
        parts.join(",")
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a single rule fragment was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// Nothing after the disable marker.
    Empty,
    /// A bracket group was never closed.
    Unclosed(char),
    /// A known token carried an unparseable value.
    BadValue(&'static str),
    /// A minute-of-day outside 0..1440.
    MinuteOutOfRange(i64),
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty rule"),
            Self::Unclosed(c) => write!(f, "unclosed bracket after '{c}'"),
            Self::BadValue(what) => write!(f, "bad value for {what}"),
            Self::MinuteOutOfRange(m) => write!(f, "minute {m} out of range"),
        }
    }
}
