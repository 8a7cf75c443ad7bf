//! Inbound commands to the thermostat.
//!
//! Button gestures come from the local driver; payloads come from peers,
//! the cloud or the local admin page as a JSON object.  Unknown keys are
//! ignored.  A payload that fails to parse is rejected as a whole, so a
//! malformed command never causes a partial state change.

use core::fmt;

use serde::{Deserialize, Deserializer};

use crate::drivers::button::ButtonEvent;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Button(ButtonEvent),
    Payload(Payload),
}

// ───────────────────────────────────────────────────────────────
// Payload
// ───────────────────────────────────────────────────────────────

/// Parsed command payload.  Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Payload {
    /// Timezone offset from UTC, seconds.
    pub offset: Option<i32>,
    #[serde(deserialize_with = "flag")]
    pub dst: Option<bool>,
    /// UTC epoch seconds.
    pub time: Option<i64>,
    /// Replacement rule-set string.
    pub smart: Option<String>,
    #[serde(deserialize_with = "directive")]
    pub val: Option<Directive>,
    pub minimum: Option<f32>,
    pub plustemp: Option<f32>,
    pub plustime: Option<u32>,
    /// New schedule debounce (`downtime_plus`), seconds.
    pub downtime: Option<u32>,
    /// Vacation end, UTC epoch seconds; 0 clears it.
    pub vacation: Option<i64>,
    #[serde(deserialize_with = "flag")]
    pub key_lock: Option<bool>,
    pub correction: Option<f32>,
    /// Hold rules off until the next sunrise or sunset.
    #[serde(deserialize_with = "flag")]
    pub smart_lock: Option<bool>,
    #[serde(deserialize_with = "light")]
    pub light: Option<LightReport>,
    #[serde(deserialize_with = "flag")]
    pub switch: Option<bool>,
    pub blinds: Option<u8>,
    pub chain: Option<u16>,
}

impl Payload {
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        serde_json::from_str(text).map_err(|_| PayloadError::Malformed)
    }
}

/// Heating directive carried by `val`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Directive {
    /// `t<float>`: heat to this temperature.
    Setpoint(f32),
    /// `t<float>c<int>`: heat to a temperature, for at most this many seconds.
    SetpointFor(f32, u32),
    /// `c<int>`: heat for this many seconds.
    For(u32),
    /// `v<int>`: vacation until this UTC epoch.
    Vacation(i64),
    /// Bare `0`: switch off.
    Off,
}

impl Directive {
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        let text = text.trim();
        let bad = PayloadError::BadDirective;
        if let Some(rest) = text.strip_prefix('t') {
            let (target, limit) = match rest.split_once('c') {
                Some((t, c)) => (t, Some(c)),
                None => (rest, None),
            };
            let target: f32 = target.trim().parse().map_err(|_| bad)?;
            if !target.is_finite() {
                return Err(bad);
            }
            return match limit {
                Some(c) => c.trim().parse().map(|secs| Self::SetpointFor(target, secs)).map_err(|_| bad),
                None => Ok(Self::Setpoint(target)),
            };
        }
        if let Some(rest) = text.strip_prefix('c') {
            return rest.trim().parse().map(Self::For).map_err(|_| bad);
        }
        if let Some(rest) = text.strip_prefix('v') {
            return rest.trim().parse().map(Self::Vacation).map_err(|_| bad);
        }
        if text.starts_with('0') && !text.contains(['t', 'c', 'v']) {
            return Ok(Self::Off);
        }
        Err(bad)
    }
}

/// Peer light-sensor report: `35` or `35t` (trailing `t` = twilight).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightReport {
    pub level: Option<i32>,
    pub twilight: bool,
}

impl LightReport {
    pub fn parse(text: &str) -> Result<Self, PayloadError> {
        let text = text.trim();
        let (level, twilight) = match text.find('t') {
            Some(i) => (&text[..i], true),
            None => (text, false),
        };
        let level = if level.is_empty() {
            None
        } else {
            Some(level.parse().map_err(|_| PayloadError::BadValue("light"))?)
        };
        Ok(Self { level, twilight })
    }
}

// ───────────────────────────────────────────────────────────────
// Lenient field decoders
// ───────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    fn into_text(self) -> String {
        match self {
            Self::Bool(b) => u8::from(b).to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s,
        }
    }
}

/// `true`/`false`, `0`/`1` or a string containing `1`.
fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    Ok(Some(match Loose::deserialize(d)? {
        Loose::Bool(b) => b,
        Loose::Int(i) => i != 0,
        Loose::Float(f) => f != 0.0,
        Loose::Text(s) => s.contains('1') || s.eq_ignore_ascii_case("true"),
    }))
}

fn directive<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Directive>, D::Error> {
    let text = Loose::deserialize(d)?.into_text();
    Directive::parse(&text).map(Some).map_err(serde::de::Error::custom)
}

fn light<'de, D: Deserializer<'de>>(d: D) -> Result<Option<LightReport>, D::Error> {
    let text = Loose::deserialize(d)?.into_text();
    LightReport::parse(&text).map(Some).map_err(serde::de::Error::custom)
}

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Not a JSON object, or a field of the wrong type.
    Malformed,
    /// `val` is none of `t…`, `t…c…`, `c…`, `v…` or `0`.
    BadDirective,
    BadValue(&'static str),
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed payload"),
            Self::BadDirective => write!(f, "unknown heating directive"),
            Self::BadValue(field) => write!(f, "bad value for '{field}'"),
        }
    }
}
