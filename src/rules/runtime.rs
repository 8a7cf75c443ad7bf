//! Learned (runtime) rule fields.
//!
//! These change while the node runs and are never part of the rule's
//! definition string.  They are persisted as one compact postcard record,
//! keyed by [`RuleId`], so a rule that survives a rule-set replacement
//! unchanged keeps its lead time and latches.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Rule;

/// Stable identity of a rule definition: the first eight bytes of the
/// SHA-256 digest over its definition string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub u64);

impl RuleId {
    pub fn of_definition(definition: &str) -> Self {
        let digest = hmac_sha256::Hash::hash(definition.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        Self(u64::from_be_bytes(head))
    }
}

/// Once-per-day latch used by sensor-mode dusk/dawn triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Latch {
    /// Minute of the day the condition was first observed.
    pub local_time: Option<u16>,
    /// Calendar day key of that observation.
    pub day: Option<i32>,
    pub fired: bool,
    /// Condition as of the previous evaluation; unknown after boot.
    #[serde(skip)]
    pub seen: Option<bool>,
}

impl Latch {
    pub fn latch(&mut self, minute: u16, day: i32) {
        self.local_time = Some(minute);
        self.day = Some(day);
        self.fired = false;
    }

    /// Forget the learned minute; `day` keeps blocking a second latch today.
    pub fn unlearn(&mut self) {
        self.local_time = None;
    }

    pub fn latched_on(&self, day: i32) -> bool {
        self.day == Some(day)
    }
}

/// Everything the evaluator learns about one rule.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleRuntime {
    /// Local-epoch seconds of the last firing; 0 = never.
    pub lead_time: i64,
    pub dusk: Latch,
    pub dawn: Latch,
    /// Remaining seconds of an armed device-trigger countdown.  `Some(0)`
    /// has elapsed and waits for the rule to fire.
    pub countdown: Option<u32>,
    /// The device trigger fired and waits for its predicate to go false.
    pub consumed: bool,
    /// The rule fired through its sunset trigger tonight.
    pub sunset_fired: bool,
}

impl RuleRuntime {
    /// Cooldown: at least a minute since the last firing.
    pub fn cooled_down(&self, now: i64) -> bool {
        now > self.lead_time + 60
    }
}

/// Persisted learned fields for the whole rule set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnedRecord {
    entries: BTreeMap<RuleId, RuleRuntime>,
}

impl LearnedRecord {
    pub fn capture(rules: &[Rule]) -> Self {
        let entries = rules
            .iter()
            .filter(|r| r.runtime != RuleRuntime::default())
            .map(|r| (r.id(), r.runtime.clone()))
            .collect();
        Self { entries }
    }

    /// Hand learned fields back to rules with a matching identity.  A lead
    /// time already seeded from an `e(...)` token wins if it is newer.
    pub fn restore(&self, rules: &mut [Rule]) {
        for rule in rules.iter_mut() {
            if let Some(learned) = self.entries.get(&rule.id()) {
                let seeded = rule.runtime.lead_time;
                rule.runtime = learned.clone();
                rule.runtime.lead_time = rule.runtime.lead_time.max(seeded);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
