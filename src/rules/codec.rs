//! Rule-string parser and serializer.
//!
//! Parsing is lenient at the rule-set level (a malformed rule is logged and
//! skipped, the rest of the set survives) and strict at the token level (a
//! known token with a bad value rejects its whole rule).  Serialization
//! writes tokens in a fixed canonical order so that the definition string,
//! and therefore the [`RuleId`](super::RuleId), does not depend on how the
//! user happened to order the tokens.

use core::fmt::Write as _;

use log::warn;

use super::{
    Action, Cmp, Combine, Condition, Days, DeviceClass, DeviceTrigger, Rule, RuleError, RuleSet,
    TriggerKind, Twilight, TwilightGate, TwilightSource, Window,
};
use crate::clock::MINUTES_PER_DAY;

/// One comma-separated fragment after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Rule(Rule),
    /// Unknown device class; kept verbatim.
    Foreign(String),
}

// ---------------------------------------------------------------------------
// Rule sets
// ---------------------------------------------------------------------------

/// Parse a whole rule-set string.  `""` and `"0"` mean "no rules".
pub fn parse(text: &str) -> RuleSet {
    let text = text.trim();
    if text.is_empty() || text == "0" {
        return RuleSet::default();
    }

    let mut rules = Vec::new();
    let mut foreign = Vec::new();
    for fragment in split_top_level(text) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            continue;
        }
        match parse_rule(fragment) {
            Ok(Fragment::Rule(rule)) => rules.push(rule),
            Ok(Fragment::Foreign(raw)) => foreign.push(raw),
            Err(e) => warn!("rules: skipping malformed rule '{fragment}': {e}"),
        }
    }
    RuleSet::new(rules, foreign)
}

/// Split on commas that are not inside a bracket group.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0u32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

// ---------------------------------------------------------------------------
// Single rules
// ---------------------------------------------------------------------------

/// Parse one rule fragment.
pub fn parse_rule(fragment: &str) -> Result<Fragment, RuleError> {
    let mut cur = Cursor::new(fragment);
    let enabled = !cur.eat('/');
    let tag = cur.bump().ok_or(RuleError::Empty)?;
    let Some(class) = DeviceClass::from_tag(tag) else {
        return Ok(Fragment::Foreign(fragment.to_string()));
    };

    let mut rule = Rule::new(class);
    rule.enabled = enabled;
    let mut days: Option<Days> = None;

    while let Some(c) = cur.peek() {
        if c.is_whitespace() {
            cur.bump();
            continue;
        }
        let opens_group = cur.peek_at(1) == Some('(');

        if c == 'r' && cur.peek_at(1) == Some('2') && cur.peek_at(2) == Some('(') {
            cur.skip(3);
            rule.twilight_must_be = Some(parse_twilight_gate(cur.group('r')?)?);
            continue;
        }

        if !opens_group && Days::is_day_letter(c) {
            while let Some(d) = cur.peek() {
                if cur.peek_at(1) == Some('(') || cur.rest().starts_with("r2(") {
                    break;
                }
                let Some(day) = Days::from_letter(d) else { break };
                days = Some(days.map_or(day, |acc| acc.union(day)));
                cur.bump();
            }
            continue;
        }

        cur.bump();
        match c {
            '&' => rule.combine = Combine::All,
            '_' => {
                let digits = cur.take_while(|d| d.is_ascii_digit());
                rule.at_time = Some(parse_minute(digits, "at-time")?);
            }
            'n' => rule.sunset = Some(optional_offset(&mut cur, 'n')?),
            'd' => rule.sunrise = Some(optional_offset(&mut cur, 'd')?),
            '<' => rule.dusk = Some(parse_twilight(&mut cur, '<')?),
            '>' => rule.dawn = Some(parse_twilight(&mut cur, '>')?),
            '#' => {
                if !cur.eat('(') {
                    return Err(RuleError::BadValue("action"));
                }
                rule.action = Some(parse_action(cur.group('#')?)?);
            }
            '(' => {
                let body = cur.group('(')?;
                rule.unknown.push(format!("({body})"));
            }
            letter if opens_group => {
                cur.bump();
                let body = cur.group(letter)?;
                match letter {
                    'h' => rule.window = Some(parse_window(body)?),
                    't' | 's' | 'b' | 'c' => {
                        if rule.device.is_some() {
                            return Err(RuleError::BadValue("second device trigger"));
                        }
                        rule.device = Some(parse_device(letter, body)?);
                    }
                    'r' => rule.must_be = Some(parse_condition(body, "must-be")?),
                    'e' => {
                        rule.runtime.lead_time = body
                            .parse::<i64>()
                            .map_err(|_| RuleError::BadValue("lead time"))?;
                    }
                    other => rule.unknown.push(format!("{other}({body})")),
                }
            }
            other => rule.unknown.push(other.to_string()),
        }
    }

    rule.days = days.unwrap_or(Days::EVERY);
    Ok(Fragment::Rule(rule))
}

fn parse_minute(text: &str, what: &'static str) -> Result<u16, RuleError> {
    let minute: i64 = text.parse().map_err(|_| RuleError::BadValue(what))?;
    if !(0..i64::from(MINUTES_PER_DAY)).contains(&minute) {
        return Err(RuleError::MinuteOutOfRange(minute));
    }
    Ok(minute as u16)
}

fn parse_offset(text: &str, what: &'static str) -> Result<i16, RuleError> {
    text.trim().parse().map_err(|_| RuleError::BadValue(what))
}

fn optional_offset(cur: &mut Cursor<'_>, owner: char) -> Result<i16, RuleError> {
    if cur.eat('(') {
        parse_offset(cur.group(owner)?, "sun offset")
    } else {
        Ok(0)
    }
}

fn parse_number(text: &str, what: &'static str) -> Result<f32, RuleError> {
    let value: f32 = text.trim().parse().map_err(|_| RuleError::BadValue(what))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RuleError::BadValue(what))
    }
}

fn parse_condition(text: &str, what: &'static str) -> Result<Condition, RuleError> {
    let text = text.trim();
    let (cmp, rest) = match text.chars().next() {
        Some('=') => (Cmp::Equal, &text[1..]),
        Some('<') => (Cmp::Less, &text[1..]),
        Some('>') => (Cmp::Greater, &text[1..]),
        _ => (Cmp::Equal, text),
    };
    Ok(Condition { cmp, value: parse_number(rest, what)? })
}

fn parse_window(body: &str) -> Result<Window, RuleError> {
    let (start, end) = body.split_once(';').ok_or(RuleError::BadValue("window"))?;
    let bound = |s: &str| -> Result<Option<u16>, RuleError> {
        let s = s.trim();
        if s.is_empty() { Ok(None) } else { parse_minute(s, "window").map(Some) }
    };
    Ok(Window { start: bound(start)?, end: bound(end)? })
}

fn parse_twilight(cur: &mut Cursor<'_>, owner: char) -> Result<Twilight, RuleError> {
    if !cur.eat('(') {
        return Ok(Twilight { source: TwilightSource::Calendar, offset: 0 });
    }
    let body = cur.group(owner)?;
    let (head, offset) = match body.split_once(';') {
        Some((head, off)) => (head.trim(), parse_offset(off, "twilight offset")?),
        None => (body.trim(), 0),
    };
    let source = match head {
        "" => TwilightSource::Calendar,
        "s" => TwilightSource::Sensor { threshold: None },
        level => TwilightSource::Sensor {
            threshold: Some(level.parse().map_err(|_| RuleError::BadValue("light threshold"))?),
        },
    };
    Ok(Twilight { source, offset })
}

fn parse_twilight_gate(body: &str) -> Result<TwilightGate, RuleError> {
    let body = body.trim();
    let (sensor, flag) = match body.strip_prefix('s') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    let dark = match flag {
        "1" => true,
        "0" => false,
        _ => return Err(RuleError::BadValue("twilight gate")),
    };
    Ok(TwilightGate { sensor, dark })
}

fn parse_device(letter: char, body: &str) -> Result<DeviceTrigger, RuleError> {
    let (head, offset) = match body.split_once(';') {
        Some((head, off)) => (
            head,
            off.trim().parse::<u16>().map_err(|_| RuleError::BadValue("trigger offset"))?,
        ),
        None => (body, 0),
    };
    let kind = match letter {
        't' => TriggerKind::Temperature(parse_condition(head, "temperature trigger")?),
        'b' => TriggerKind::Blinds(parse_condition(head, "blinds trigger")?),
        's' => match head.trim() {
            "1" => TriggerKind::Switch { on: true },
            "0" => TriggerKind::Switch { on: false },
            _ => return Err(RuleError::BadValue("switch trigger")),
        },
        _ => TriggerKind::Chain {
            id: head.trim().parse().map_err(|_| RuleError::BadValue("chain trigger"))?,
        },
    };
    Ok(DeviceTrigger { kind, offset })
}

fn parse_action(body: &str) -> Result<Action, RuleError> {
    let body = body.trim();
    if let Some(target) = body.strip_prefix('@') {
        let (address, value) = match target.split_once(';') {
            Some((a, v)) => (a, Some(v.to_string())),
            None => (target, None),
        };
        if address.is_empty() {
            return Err(RuleError::BadValue("forward address"));
        }
        return Ok(Action::Forward { address: address.to_string(), value });
    }
    if let Some(level) = body.strip_suffix('%') {
        let pct: u8 = level.trim().parse().map_err(|_| RuleError::BadValue("percentage"))?;
        if pct > 100 {
            return Err(RuleError::BadValue("percentage"));
        }
        return Ok(Action::Percent(pct));
    }
    Ok(Action::Setpoint(parse_number(body, "setpoint")?))
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Full form, including the learned lead time as a single `e(...)` token.
pub fn serialize(rule: &Rule) -> String {
    let mut out = serialize_definition(rule);
    if rule.runtime.lead_time != 0 {
        let _ = write!(out, "e({})", rule.runtime.lead_time);
    }
    out
}

/// Definition form: the user-configured rule without learned fields.
pub fn serialize_definition(rule: &Rule) -> String {
    let mut out = String::new();
    if !rule.enabled {
        out.push('/');
    }
    out.push(rule.class.tag());
    let _ = write!(out, "{}", rule.days);
    if rule.combine == Combine::All {
        out.push('&');
    }
    if let Some(at) = rule.at_time {
        let _ = write!(out, "_{at}");
    }
    if let Some(w) = rule.window {
        out.push_str("h(");
        if let Some(s) = w.start {
            let _ = write!(out, "{s}");
        }
        out.push(';');
        if let Some(e) = w.end {
            let _ = write!(out, "{e}");
        }
        out.push(')');
    }
    write_sun(&mut out, 'n', rule.sunset);
    write_sun(&mut out, 'd', rule.sunrise);
    write_twilight(&mut out, '<', rule.dusk.as_ref());
    write_twilight(&mut out, '>', rule.dawn.as_ref());
    if let Some(dev) = &rule.device {
        write_device(&mut out, dev);
    }
    if let Some(cond) = &rule.must_be {
        out.push_str("r(");
        write_condition(&mut out, cond);
        out.push(')');
    }
    if let Some(gate) = rule.twilight_must_be {
        let _ = write!(
            out,
            "r2({}{})",
            if gate.sensor { "s" } else { "" },
            u8::from(gate.dark)
        );
    }
    if let Some(action) = &rule.action {
        match action {
            Action::Setpoint(t) => {
                let _ = write!(out, "#({t})");
            }
            Action::Percent(p) => {
                let _ = write!(out, "#({p}%)");
            }
            Action::Forward { address, value } => {
                let _ = write!(out, "#(@{address}");
                if let Some(v) = value {
                    let _ = write!(out, ";{v}");
                }
                out.push(')');
            }
        }
    }
    for token in &rule.unknown {
        out.push_str(token);
    }
    out
}

fn write_sun(out: &mut String, letter: char, offset: Option<i16>) {
    match offset {
        Some(0) => out.push(letter),
        Some(off) => {
            let _ = write!(out, "{letter}({off})");
        }
        None => {}
    }
}

fn write_twilight(out: &mut String, letter: char, tw: Option<&Twilight>) {
    let Some(tw) = tw else { return };
    out.push(letter);
    let head = match tw.source {
        TwilightSource::Calendar if tw.offset == 0 => return,
        TwilightSource::Calendar => String::new(),
        TwilightSource::Sensor { threshold: None } => "s".to_string(),
        TwilightSource::Sensor { threshold: Some(level) } => level.to_string(),
    };
    out.push('(');
    out.push_str(&head);
    if tw.offset != 0 {
        let _ = write!(out, ";{}", tw.offset);
    }
    out.push(')');
}

fn write_condition(out: &mut String, cond: &Condition) {
    let op = match cond.cmp {
        Cmp::Equal => '=',
        Cmp::Less => '<',
        Cmp::Greater => '>',
    };
    let _ = write!(out, "{op}{}", cond.value);
}

fn write_device(out: &mut String, dev: &DeviceTrigger) {
    match &dev.kind {
        TriggerKind::Temperature(cond) => {
            out.push_str("t(");
            write_condition(out, cond);
        }
        TriggerKind::Blinds(cond) => {
            out.push_str("b(");
            write_condition(out, cond);
        }
        TriggerKind::Switch { on } => {
            let _ = write!(out, "s({}", u8::from(*on));
        }
        TriggerKind::Chain { id } => {
            let _ = write!(out, "c({id}");
        }
    }
    if dev.offset != 0 {
        let _ = write!(out, ";{}", dev.offset);
    }
    out.push(')');
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn take_while(&mut self, f: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let len = rest.find(|c: char| !f(c)).unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    /// Body of a bracket group whose `(` was already consumed.
    fn group(&mut self, owner: char) -> Result<&'a str, RuleError> {
        let rest = self.rest();
        let end = rest.find(')').ok_or(RuleError::Unclosed(owner))?;
        self.pos += end + 1;
        Ok(&rest[..end])
    }
}
