//! Fuzz target: `RuleSet::parse`
//!
//! Feeds arbitrary text to the rule-string parser, then parses both
//! serialized forms of whatever survived.  Neither pass may panic.
//!
//! cargo fuzz run fuzz_rule_parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use thermonode::rules::RuleSet;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else { return };
    let set = RuleSet::parse(text);

    let _ = RuleSet::parse(&set.to_definition_string());
    let _ = RuleSet::parse(&set.to_rule_string());
});
