//! Concrete state handler functions and table builder.
//!
//! ```text
//!          ┌──[single/long press]──▶ MANUAL_ON ───┐
//!          ├──[remote t/c]─────────▶ REMOTE_ON ───┤
//!   OFF ───┼──[rule fires, no downtime]─▶ SCHEDULED_ON ──[higher setpoint]──┐
//!    ▲     │                              ▲    └────────────────────────────┘
//!    │     └──[below minimum]─────▶ FAILSAFE_ON ──┤
//!    │                                            │
//!    └──[setpoint reached · end time · vacation · expiry · 0 %]──┘
//! ```
//!
//! Enter handlers set up the session from `ctx.request`; update handlers
//! only decide the next state (recording `ctx.reason`).

use log::{info, warn};

use super::context::{EndTime, FsmContext, Owner, SessionRequest};
use super::{StateDescriptor, StateId};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Off,
            name: "Off",
            on_enter: Some(off_enter),
            on_exit: None,
            on_update: off_update,
        },
        StateDescriptor {
            id: StateId::ManualOn,
            name: "ManualOn",
            on_enter: Some(session_enter),
            on_exit: Some(session_exit),
            on_update: operator_update,
        },
        StateDescriptor {
            id: StateId::RemoteOn,
            name: "RemoteOn",
            on_enter: Some(session_enter),
            on_exit: Some(session_exit),
            on_update: operator_update,
        },
        StateDescriptor {
            id: StateId::ScheduledOn,
            name: "ScheduledOn",
            on_enter: Some(session_enter),
            on_exit: Some(session_exit),
            on_update: scheduled_update,
        },
        StateDescriptor {
            id: StateId::FailsafeOn,
            name: "FailsafeOn",
            on_enter: Some(failsafe_enter),
            on_exit: Some(session_exit),
            on_update: failsafe_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  OFF
// ═══════════════════════════════════════════════════════════════════════════

fn off_enter(ctx: &mut FsmContext) {
    let h = &mut ctx.heating;
    h.heating = false;
    h.setpoint = 0.0;
    h.end_time = EndTime::Unset;
    h.owner = Owner::None;
    h.remote = false;
    ctx.request = None;
    ctx.commands.on = false;
}

fn off_update(ctx: &mut FsmContext) -> Option<StateId> {
    // Frost protection wins over downtime, vacation and schedules.
    if ctx.inputs.below_minimum {
        ctx.reason = "failsafe";
        return Some(StateId::FailsafeOn);
    }
    if ctx.vacation_active() || ctx.heating.downtime > 0 {
        return None;
    }
    let activation = ctx.inputs.activation?;
    ctx.request = Some(SessionRequest::Scheduled(activation));
    ctx.reason = "schedule";
    Some(StateId::ScheduledOn)
}

// ═══════════════════════════════════════════════════════════════════════════
//  MANUAL_ON / REMOTE_ON / SCHEDULED_ON: session setup
// ═══════════════════════════════════════════════════════════════════════════

fn session_enter(ctx: &mut FsmContext) {
    let now = ctx.inputs.now;
    let timed = |secs: u32| match now {
        Some(n) => EndTime::At(n + i64::from(secs)),
        None => EndTime::Countdown(secs),
    };

    let Some(request) = ctx.request.take() else {
        warn!("arbiter: entered a session without a request, keeping current markers");
        ctx.heating.heating = true;
        ctx.commands.on = true;
        return;
    };

    let h = &mut ctx.heating;
    match request {
        SessionRequest::ManualTimed => {
            h.setpoint = 0.0;
            h.end_time = timed(ctx.config.plustime);
            h.owner = Owner::None;
            h.remote = false;
            h.downtime = 0;
        }
        SessionRequest::ManualBoost => {
            h.owner = Owner::None;
            h.remote = false;
            h.downtime = 0;
            match ctx.inputs.temperature {
                Some(t) => {
                    h.setpoint = t + ctx.config.plustemp;
                    h.end_time = EndTime::Unset;
                }
                // No reading to boost from: fall back to a timed session.
                None => {
                    h.setpoint = 0.0;
                    h.end_time = timed(ctx.config.plustime);
                }
            }
        }
        SessionRequest::RemoteSetpoint(target) => {
            h.setpoint = target;
            h.end_time = EndTime::Unset;
            h.owner = Owner::None;
            h.remote = true;
            h.downtime = 0;
        }
        SessionRequest::RemoteFor(secs) => {
            h.setpoint = 0.0;
            h.end_time = timed(secs);
            h.owner = Owner::None;
            h.remote = true;
            h.downtime = 0;
        }
        SessionRequest::RemoteSetpointFor(target, secs) => {
            h.setpoint = target;
            h.end_time = timed(secs);
            h.owner = Owner::None;
            h.remote = true;
            h.downtime = 0;
        }
        SessionRequest::Scheduled(activation) => {
            h.setpoint = activation.setpoint.unwrap_or(0.0);
            // A plain "on" outside any window runs for `plustime`.
            h.end_time = if activation.setpoint.is_none() && !activation.windowed {
                timed(ctx.config.plustime)
            } else {
                EndTime::Unset
            };
            h.owner = Owner::Rule(activation.rule);
            h.remote = false;
        }
        SessionRequest::Resume { setpoint, end_time, owner, remote } => {
            h.setpoint = setpoint;
            h.end_time = end_time;
            h.owner = owner;
            h.remote = remote;
        }
    }
    h.heating = true;
    ctx.commands.on = true;
    info!(
        "heating on: setpoint={:.1} end={:?} owner={:?}",
        ctx.heating.setpoint, ctx.heating.end_time, ctx.heating.owner
    );
}

fn session_exit(ctx: &mut FsmContext) {
    info!("heating session ended after {} ticks", ctx.ticks_in_state);
}

// ═══════════════════════════════════════════════════════════════════════════
//  MANUAL_ON / REMOTE_ON: operator sessions
// ═══════════════════════════════════════════════════════════════════════════

fn operator_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.vacation_active() {
        ctx.reason = "vacation";
        return Some(StateId::Off);
    }
    if ctx.session_done() {
        ctx.reason = "automatic";
        return Some(StateId::Off);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SCHEDULED_ON
// ═══════════════════════════════════════════════════════════════════════════

fn rank(setpoint: Option<f32>) -> f32 {
    setpoint.filter(|s| *s > 0.0).unwrap_or(f32::NEG_INFINITY)
}

fn scheduled_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.vacation_active() {
        ctx.reason = "vacation";
        return Some(StateId::Off);
    }
    if ctx.session_done() {
        ctx.reason = "automatic";
        return Some(StateId::Off);
    }
    if ctx.inputs.off_request {
        ctx.reason = "schedule";
        return Some(StateId::Off);
    }

    if let Some(candidate) = ctx.inputs.activation {
        let current = rank(Some(ctx.heating.setpoint));
        if ctx.heating.owner != Owner::Rule(candidate.rule) && rank(candidate.setpoint) > current {
            ctx.request = Some(SessionRequest::Scheduled(candidate));
            ctx.reason = "takeover";
            return Some(StateId::ScheduledOn);
        }
    }

    if !ctx.inputs.owner_holds {
        ctx.reason = "expired";
        return Some(StateId::Off);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  FAILSAFE_ON
// ═══════════════════════════════════════════════════════════════════════════

fn failsafe_enter(ctx: &mut FsmContext) {
    let h = &mut ctx.heating;
    h.heating = true;
    h.setpoint = ctx.config.minimum;
    h.end_time = EndTime::Unset;
    h.owner = Owner::Failsafe;
    h.remote = false;
    ctx.request = None;
    ctx.commands.on = true;
    warn!(
        "FAILSAFE: {:?} °C below minimum {:.1} °C, heating forced on",
        ctx.inputs.temperature, ctx.config.minimum
    );
}

fn failsafe_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.inputs.temperature.is_none() {
        ctx.reason = "sensor fault";
        return Some(StateId::Off);
    }
    if ctx.session_done() {
        ctx.reason = "automatic";
        return Some(StateId::Off);
    }
    None
}
