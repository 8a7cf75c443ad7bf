//! Function-pointer finite state machine engine for the heating arbiter.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  StateTable                                                 │
//! │  ┌─────────────┬───────────┬──────────┬───────────────────┐ │
//! │  │ StateId     │ on_enter  │ on_exit  │ on_update         │ │
//! │  ├─────────────┼───────────┼──────────┼───────────────────┤ │
//! │  │ Off         │ fn(ctx)   │ —        │ fn(ctx)->Option<> │ │
//! │  │ ManualOn    │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  │ RemoteOn    │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  │ ScheduledOn │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  │ FailsafeOn  │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  └─────────────┴───────────┴──────────┴───────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Once per second the service asks the current state's `on_update` for a
//! verdict.  `Some(next)` means leave: the old state's `on_exit` runs, then
//! `on_enter` of `next` sets the new session up from `ctx.request`.
//! Commands skip the verdict through [`Fsm::force_transition`].  A state
//! may name itself (a higher-setpoint rule taking over a scheduled
//! session); that is still a transition.

pub mod context;
pub mod states;

use context::FsmContext;
use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Arbiter states.
/// Must stay in sync with the state table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Off = 0,
    ManualOn = 1,
    RemoteOn = 2,
    ScheduledOn = 3,
    FailsafeOn = 4,
}

impl StateId {
    /// Number of states; sizes the table array.
    pub const COUNT: usize = 5;

    /// Convert an index back to `StateId`.  Out-of-range indices fall back
    /// to `Off` (asserts in debug builds).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Off,
            1 => Self::ManualOn,
            2 => Self::RemoteOn,
            3 => Self::ScheduledOn,
            4 => Self::FailsafeOn,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Off
            }
        }
    }

    /// Whether the relay is on in this state.
    pub fn is_heating(self) -> bool {
        self != Self::Off
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut FsmContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

/// A completed state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: StateId,
    pub to: StateId,
    pub reason: &'static str,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// One row per [`StateId`], in discriminant order.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    tick_count: u64,
    state_entry_tick: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            state_entry_tick: 0,
        }
    }

    /// Enter the initial state.  Call once, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("arbiter starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.  Returns the transition, if one happened.
    pub fn tick(&mut self, ctx: &mut FsmContext) -> Option<Transition> {
        self.tick_count += 1;
        ctx.ticks_in_state = self.tick_count - self.state_entry_tick;
        ctx.total_ticks = self.tick_count;

        let next = (self.table[self.current].on_update)(ctx)?;
        Some(self.transition(next, ctx))
    }

    /// Transition immediately on behalf of a command.  Always runs the exit
    /// and enter handlers, even when `next` is the current state, so a new
    /// request replaces the running session.
    pub fn force_transition(
        &mut self,
        next: StateId,
        reason: &'static str,
        ctx: &mut FsmContext,
    ) -> Transition {
        ctx.reason = reason;
        self.transition(next, ctx)
    }

    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn ticks_in_current_state(&self) -> u64 {
        self.tick_count - self.state_entry_tick
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut FsmContext) -> Transition {
        let from = self.current_state();
        let next_idx = next_id as usize;

        info!(
            "arbiter: {} -> {} ({})",
            self.table[self.current].name, self.table[next_idx].name, ctx.reason
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_tick = self.tick_count;
        ctx.ticks_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }

        Transition { from, to: next_id, reason: ctx.reason }
    }
}
