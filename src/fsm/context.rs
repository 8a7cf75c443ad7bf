//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to: the authoritative [`HeatingState`], the per-tick arbiter
//! inputs prepared by the service, the pending session request, and the
//! relay command.  Think of it as the "blackboard" in a blackboard
//! architecture.

use heapless::Vec as HVec;

use crate::config::Settings;

// ---------------------------------------------------------------------------
// Sensor snapshot (written by the service; read by evaluator and handlers)
// ---------------------------------------------------------------------------

/// Most chain signals remembered between two ticks.
pub const MAX_CHAIN_SIGNALS: usize = 8;

/// A point-in-time snapshot of local and peer readings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorSnapshot {
    /// Corrected room temperature (°C); `None` when the probe is disconnected.
    pub temperature: Option<f32>,
    /// Light level reported by a peer light sensor.
    pub light: Option<i32>,
    /// Sensor twilight flag (true = dark).
    pub sensor_twilight: bool,
    /// Last reported peer switch state.
    pub switch: Option<bool>,
    /// Last reported peer blinds position (percent).
    pub blinds: Option<u8>,
    /// Chain ids received since the previous tick.
    pub chain: HVec<u16, MAX_CHAIN_SIGNALS>,
}

// ---------------------------------------------------------------------------
// Heating state
// ---------------------------------------------------------------------------

/// When a timed session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndTime {
    #[default]
    Unset,
    /// Local-epoch second.
    At(i64),
    /// Seconds left, counted down per tick while the clock is not running.
    Countdown(u32),
}

/// Who holds the current heating session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Owner {
    #[default]
    None,
    /// Index into the rule array.
    Rule(usize),
    Failsafe,
}

/// The arbiter's authoritative state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeatingState {
    pub heating: bool,
    /// Target temperature; 0 = unset.
    pub setpoint: f32,
    pub end_time: EndTime,
    pub owner: Owner,
    /// Schedule suppression, seconds.
    pub downtime: u32,
    /// Vacation end, local epoch seconds; 0 = inactive.
    pub vacation_until: i64,
    /// The session was started by a peer or the cloud.
    pub remote: bool,
    pub key_lock: bool,
}

impl HeatingState {
    /// True once the setpoint is reached or the end time has passed.
    pub fn session_done(&self, now: Option<i64>, temperature: Option<f32>) -> bool {
        if self.setpoint > 0.0 && temperature.is_some_and(|t| t >= self.setpoint) {
            return true;
        }
        match self.end_time {
            EndTime::Unset => false,
            EndTime::At(ts) => now.is_some_and(|n| n >= ts),
            EndTime::Countdown(left) => left == 0,
        }
    }

    pub fn vacation_active(&self, now: Option<i64>) -> bool {
        match now {
            Some(n) => self.vacation_until > n,
            None => self.vacation_until != 0,
        }
    }

    /// Seconds left of a timed session, if any.
    pub fn remaining_secs(&self, now: Option<i64>) -> Option<u32> {
        match self.end_time {
            EndTime::Unset => None,
            EndTime::At(ts) => now.map(|n| (ts - n).max(0) as u32),
            EndTime::Countdown(left) => Some(left),
        }
    }
}

// ---------------------------------------------------------------------------
// Arbiter inputs (written by the service before each tick)
// ---------------------------------------------------------------------------

/// Best scheduled candidate among this tick's firing rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Activation {
    pub rule: usize,
    /// `None` for a plain "on" with no setpoint.
    pub setpoint: Option<f32>,
    /// The rule has a time window that bounds the session.
    pub windowed: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArbiterInputs {
    /// Local-epoch seconds; `None` while the clock is not running.
    pub now: Option<i64>,
    pub temperature: Option<f32>,
    /// Frost guard verdict.
    pub below_minimum: bool,
    pub activation: Option<Activation>,
    /// A firing rule asked for 0 % output.
    pub off_request: bool,
    /// The owning rule's day, gates and window still hold.
    pub owner_holds: bool,
}

/// How an "on" state should set up its session on entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionRequest {
    /// Single press: heat for `plustime` seconds.
    ManualTimed,
    /// Long press: heat to the current temperature plus `plustemp`.
    ManualBoost,
    RemoteSetpoint(f32),
    RemoteFor(u32),
    /// Setpoint with a time limit; whichever comes first ends it.
    RemoteSetpointFor(f32, u32),
    Scheduled(Activation),
    /// Restore a snapshot after reboot.
    Resume { setpoint: f32, end_time: EndTime, owner: Owner, remote: bool },
}

// ---------------------------------------------------------------------------
// Relay command (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayCommand {
    pub on: bool,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,

    // -- State --
    pub heating: HeatingState,

    // -- Inputs --
    pub inputs: ArbiterInputs,
    /// Consumed by the next "on" state's enter handler.
    pub request: Option<SessionRequest>,

    // -- Outputs --
    pub commands: RelayCommand,
    /// Why the last transition happened.
    pub reason: &'static str,

    // -- Configuration --
    pub config: Settings,
}

impl FsmContext {
    pub fn new(config: Settings) -> Self {
        let heating = HeatingState {
            vacation_until: config.vacation,
            key_lock: config.key_lock,
            ..HeatingState::default()
        };
        Self {
            ticks_in_state: 0,
            total_ticks: 0,
            heating,
            inputs: ArbiterInputs::default(),
            request: None,
            commands: RelayCommand::default(),
            reason: "boot",
            config,
        }
    }

    /// One second passed: run down downtime and clock-less countdowns.
    pub fn advance_second(&mut self) {
        self.heating.downtime = self.heating.downtime.saturating_sub(1);
        if let EndTime::Countdown(left) = self.heating.end_time {
            self.heating.end_time = EndTime::Countdown(left.saturating_sub(1));
        }
    }

    pub fn vacation_active(&self) -> bool {
        self.heating.vacation_active(self.inputs.now)
    }

    pub fn session_done(&self) -> bool {
        self.heating.session_done(self.inputs.now, self.inputs.temperature)
    }
}
