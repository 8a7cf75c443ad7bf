//! Durable records kept by the thermostat.
//!
//! | Key        | Format   | Content                                      |
//! |------------|----------|----------------------------------------------|
//! | `settings` | JSON     | [`Settings`]                                 |
//! | `backup`   | JSON     | copy of `settings`, read if that is damaged  |
//! | `resume`   | JSON     | [`ResumeSnapshot`], present only while heating |
//! | `learned`  | postcard | [`LearnedRecord`]                            |
//!
//! All records live in the `thermo` namespace of a [`StoragePort`].

use log::{info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::clock::EARLIEST_VALID_EPOCH;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::fsm::StateId;
use crate::fsm::context::{EndTime, HeatingState, Owner, SessionRequest};
use crate::rules::runtime::LearnedRecord;

use super::ports::{StorageError, StoragePort};

pub const NAMESPACE: &str = "thermo";
pub const KEY_SETTINGS: &str = "settings";
pub const KEY_BACKUP: &str = "backup";
pub const KEY_RESUME: &str = "resume";
pub const KEY_LEARNED: &str = "learned";

/// Largest record the core reads or writes.
pub const MAX_RECORD_SIZE: usize = 4096;

/// A countdown longer than this cannot be trusted after a reboot without
/// a running clock; the end time is dropped.
pub const MAX_RESUME_COUNTDOWN: i64 = 4000;

// ───────────────────────────────────────────────────────────────
// Raw record helpers
// ───────────────────────────────────────────────────────────────

fn read_record(store: &impl StoragePort, key: &str) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; MAX_RECORD_SIZE];
    let len = store.read(NAMESPACE, key, &mut buf)?;
    buf.truncate(len);
    Ok(buf)
}

fn read_json<T: DeserializeOwned>(store: &impl StoragePort, key: &'static str) -> Result<T> {
    let bytes = read_record(store, key)?;
    serde_json::from_slice(&bytes).map_err(|_| Error::Decode(key))
}

fn write_record(store: &mut impl StoragePort, key: &str, bytes: &[u8]) -> Result<()> {
    if bytes.len() > MAX_RECORD_SIZE {
        return Err(StorageError::Full.into());
    }
    store.write(NAMESPACE, key, bytes)?;
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Settings
// ───────────────────────────────────────────────────────────────

/// Load the settings, falling back to the backup copy when the primary
/// record is missing or damaged.
pub fn load_settings(store: &impl StoragePort) -> Result<Settings> {
    match read_json(store, KEY_SETTINGS) {
        Ok(settings) => Ok(settings),
        Err(primary) => {
            warn!("settings unreadable ({primary}), trying backup");
            let settings = read_json(store, KEY_BACKUP)?;
            info!("settings restored from backup");
            Ok(settings)
        }
    }
}

/// Validate, then write both the primary and the backup record.
pub fn save_settings(store: &mut impl StoragePort, settings: &Settings) -> Result<()> {
    settings.validate()?;
    let json = serde_json::to_vec(settings).map_err(|_| Error::Encode(KEY_SETTINGS))?;
    write_record(store, KEY_SETTINGS, &json)?;
    if let Err(e) = write_record(store, KEY_BACKUP, &json) {
        warn!("settings backup write failed: {e}");
    }
    info!("settings saved ({} bytes)", json.len());
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Resume snapshot
// ───────────────────────────────────────────────────────────────

/// Heating session as written while heating, so a reboot can pick it up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResumeSnapshot {
    pub heating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htemp: Option<f32>,
    /// Absolute local end time, or countdown seconds when written without
    /// a running clock.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub htime: Option<i64>,
    /// Index of the owning rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<usize>,
    pub remote: bool,
}

impl ResumeSnapshot {
    pub fn of(state: &HeatingState) -> Self {
        Self {
            heating: state.heating,
            htemp: (state.setpoint > 0.0).then_some(state.setpoint),
            htime: match state.end_time {
                EndTime::Unset => None,
                EndTime::At(ts) => Some(ts),
                EndTime::Countdown(left) => Some(i64::from(left)),
            },
            rule: match state.owner {
                Owner::Rule(i) => Some(i),
                _ => None,
            },
            remote: state.remote,
        }
    }

    /// Turn the snapshot back into a session.  Returns `None` when there is
    /// nothing left to resume.
    pub fn into_session(self, now: Option<i64>, rule_count: usize) -> Option<(StateId, SessionRequest)> {
        let end_time = match (self.htime, now) {
            (None, _) => EndTime::Unset,
            (Some(t), None) if t > MAX_RESUME_COUNTDOWN => {
                warn!("resume: dropping end time {t}, clock not running");
                EndTime::Unset
            }
            (Some(t), None) => EndTime::Countdown(t.max(0) as u32),
            (Some(t), Some(_)) if t >= EARLIEST_VALID_EPOCH => EndTime::At(t),
            (Some(t), Some(n)) => EndTime::At(n + t),
        };
        let setpoint = self.htemp.unwrap_or(0.0);
        if !self.heating && setpoint <= 0.0 && end_time == EndTime::Unset {
            return None;
        }

        let owner = match self.rule {
            Some(i) if i < rule_count => Owner::Rule(i),
            _ => Owner::None,
        };
        let state = match owner {
            Owner::Rule(_) => StateId::ScheduledOn,
            _ if self.remote => StateId::RemoteOn,
            _ => StateId::ManualOn,
        };
        let request = SessionRequest::Resume { setpoint, end_time, owner, remote: self.remote };
        Some((state, request))
    }
}

pub fn load_resume(store: &impl StoragePort) -> Result<Option<ResumeSnapshot>> {
    match read_json(store, KEY_RESUME) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(Error::Storage(StorageError::NotFound)) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn save_resume(store: &mut impl StoragePort, state: &HeatingState) -> Result<()> {
    let json = serde_json::to_vec(&ResumeSnapshot::of(state)).map_err(|_| Error::Encode(KEY_RESUME))?;
    write_record(store, KEY_RESUME, &json)
}

pub fn clear_resume(store: &mut impl StoragePort) -> Result<()> {
    if store.exists(NAMESPACE, KEY_RESUME) {
        store.delete(NAMESPACE, KEY_RESUME)?;
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Learned rule fields
// ───────────────────────────────────────────────────────────────

pub fn load_learned(store: &impl StoragePort) -> Result<LearnedRecord> {
    let bytes = match read_record(store, KEY_LEARNED) {
        Ok(bytes) => bytes,
        Err(Error::Storage(StorageError::NotFound)) => return Ok(LearnedRecord::default()),
        Err(e) => return Err(e),
    };
    LearnedRecord::from_bytes(&bytes).map_err(|_| Error::Decode(KEY_LEARNED))
}

pub fn save_learned(store: &mut impl StoragePort, record: &LearnedRecord) -> Result<()> {
    let bytes = record.to_bytes().map_err(|_| Error::Encode(KEY_LEARNED))?;
    write_record(store, KEY_LEARNED, &bytes)
}
