//! Application service: the hexagonal core.
//!
//! [`Thermostat`] is the device aggregate.  It owns the rule set, the
//! arbiter FSM with its heating state, the frost guard and the live
//! settings.  All I/O flows through port traits passed in at call sites,
//! so the whole service runs against mock adapters in tests.
//!
//! ```text
//!   SensorPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!     TimePort ──▶ │          Thermostat          │
//! ActuatorPort ◀── │ Rules · Evaluator · Guard ·  │ ◀─▶ StoragePort
//!                  │            Arbiter           │
//!                  └──────────────────────────────┘
//! ```
//!
//! Every handler takes `&mut self`; the run loop calls exactly one of
//! them at a time, which is the only critical section the core needs.

use log::{debug, info, warn};
use serde::Serialize;

use crate::clock::{self, EARLIEST_VALID_EPOCH, LocalTime, SECS_PER_DAY, SunTimes};
use crate::config::{SETTINGS_VERSION, Settings};
use crate::drivers::button::ButtonEvent;
use crate::evaluator::{self, EvalInput, RuleOutcome};
use crate::fsm::context::{
    Activation, FsmContext, HeatingState, Owner, SensorSnapshot, SessionRequest,
};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId, Transition};
use crate::rules::runtime::LearnedRecord;
use crate::rules::{Action, RuleSet, legacy};
use crate::safety::FrostGuard;

use super::commands::{AppCommand, Directive, Payload, PayloadError};
use super::events::{AppEvent, ForwardBody, StateDelta};
use super::persistence;
use super::ports::{
    ActuatorPort, ConfigError, EventSink, PROBE_DISCONNECTED, SensorPort, StoragePort, TimePort,
};

/// Seconds between two temperature samples.
pub const SAMPLE_INTERVAL_SECS: u32 = 60;

/// Value forwarded to a peer when a forward action names none.
const DEFAULT_FORWARD_VALUE: &str = "1";

/// Minute a smart lock is released when no sun table is available (03:01).
const SMART_LOCK_RELEASE_MINUTE: u16 = 181;

/// Reply to a state query: the current delta plus the full rule string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateReport {
    #[serde(flatten)]
    pub delta: StateDelta,
    pub smart: String,
    #[serde(skip_serializing_if = "core::ops::Not::not")]
    pub smart_lock: bool,
}

/// UTC epoch from a payload to a local epoch the clock can represent.
fn local_epoch(utc: i64, shift: i64, field: &'static str) -> Result<i64, PayloadError> {
    utc.checked_add(shift)
        .filter(|t| LocalTime::from_timestamp(*t).is_some())
        .ok_or_else(|| {
            warn!("payload rejected: {field} {utc} out of range");
            PayloadError::BadValue(field)
        })
}

// ───────────────────────────────────────────────────────────────
// Thermostat
// ───────────────────────────────────────────────────────────────

pub struct Thermostat {
    fsm: Fsm,
    ctx: FsmContext,
    guard: FrostGuard,
    rules: RuleSet,
    sensors: SensorSnapshot,
    /// Last raw probe reading, kept so a new correction applies at once.
    raw_temperature: Option<f32>,
    /// Temperature last reported in a delta.
    reported_temperature: Option<f32>,
    /// Ticks until the next temperature sample.
    sample_in: u32,
    /// Learned fields as last written to storage.
    learned: LearnedRecord,
    tick_count: u64,
}

impl Thermostat {
    /// Build the aggregate from settings.  Does not touch storage or
    /// hardware; [`boot`](Self::boot) does the full start-up sequence.
    pub fn new(settings: Settings) -> Self {
        let rules = RuleSet::parse(&settings.smart);
        let guard = FrostGuard::new(settings.minimum);
        let sensors = SensorSnapshot {
            sensor_twilight: settings.sensor_twilight,
            ..SensorSnapshot::default()
        };
        let mut ctx = FsmContext::new(settings);
        let mut fsm = Fsm::new(build_state_table(), StateId::Off);
        fsm.start(&mut ctx);

        Self {
            fsm,
            ctx,
            guard,
            rules,
            sensors,
            raw_temperature: None,
            reported_temperature: None,
            sample_in: 0,
            learned: LearnedRecord::default(),
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start-up: load settings (migrating a legacy schedule), count the
    /// boot, restore learned rule fields and resume an interrupted session.
    pub fn boot(
        store: &mut impl StoragePort,
        time: &impl TimePort,
        hw: &mut (impl SensorPort + ActuatorPort),
        sink: &mut impl EventSink,
    ) -> Self {
        let mut settings = persistence::load_settings(&*store).unwrap_or_else(|e| {
            warn!("no usable settings ({e}), starting from defaults");
            Settings::default()
        });

        if settings.is_legacy() {
            let migrated = legacy::migrate(&settings.smart);
            info!("migrated legacy schedule into {} rules", migrated.len());
            settings.smart = migrated.to_definition_string();
            settings.ver = Some(SETTINGS_VERSION);
        }
        settings.uprisings = settings.uprisings.saturating_add(1);
        if let Err(e) = persistence::save_settings(store, &settings) {
            warn!("boot: settings not saved: {e}");
        }

        let mut this = Self::new(settings);
        match persistence::load_learned(&*store) {
            Ok(record) => {
                record.restore(this.rules.rules_mut());
                this.learned = LearnedRecord::capture(this.rules.rules());
            }
            Err(e) => warn!("learned rule fields dropped: {e}"),
        }

        hw.set_relay(false);
        this.sample(hw);
        this.refresh_inputs(time);

        let now = this.ctx.inputs.now;
        match persistence::load_resume(&*store) {
            Ok(Some(snapshot)) => match snapshot.into_session(now, this.rules.len()) {
                Some((state, request)) => {
                    this.ctx.request = Some(request);
                    let t = this.fsm.force_transition(state, "resume", &mut this.ctx);
                    this.after_transition(t, hw, store, sink);
                }
                None => this.clear_resume(store),
            },
            Ok(None) => {}
            Err(e) => {
                warn!("resume record unreadable: {e}");
                this.clear_resume(store);
            }
        }

        info!(
            "thermostat booted #{} in {:?} with {} rules",
            this.ctx.config.uprisings,
            this.fsm.current_state(),
            this.rules.len()
        );
        sink.emit(&AppEvent::Started(this.fsm.current_state()));
        this
    }

    // ── Per-second orchestration ──────────────────────────────

    /// Run one control pass.  Call exactly once per seconds edge.
    pub fn tick(
        &mut self,
        time: &mut impl TimePort,
        hw: &mut (impl SensorPort + ActuatorPort),
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        self.ctx.advance_second();

        // 1. Sensors and clock
        let temperature_changed = self.sample_if_due(hw);
        let now = self.local_now(&*time);
        let now = self.follow_summer_time(now, time, store);
        let now_ts = now.map(|t| t.timestamp());

        // 2. Vacation expiry
        if self.ctx.heating.vacation_until != 0
            && now_ts.is_some_and(|n| n >= self.ctx.heating.vacation_until)
        {
            info!("vacation over");
            self.set_vacation(0);
            self.save_settings(store);
        }

        // 3. Rules
        let sun = now.and_then(|t| time.sun_times(t.naive().date()));
        let input = EvalInput { now, sun, sensors: &self.sensors };
        let outcomes = evaluator::evaluate(&input, self.rules.rules_mut());
        self.release_smart_lock(now, sun, store);
        // Locked rules still learn; their firings are dropped.
        let fired: &[RuleOutcome] = if self.ctx.config.smart_lock { &[] } else { outcomes.as_slice() };
        self.forward_actions(fired, sink);

        // 4. Guard + arbiter
        self.guard.set_minimum(self.ctx.config.minimum);
        self.guard.evaluate(self.sensors.temperature);
        let owner_holds = match self.ctx.heating.owner {
            Owner::Rule(i) => outcomes.get(i).is_some_and(|o| o.holds),
            _ => false,
        };
        self.ctx.inputs.now = now_ts;
        self.ctx.inputs.temperature = self.sensors.temperature;
        self.ctx.inputs.below_minimum = self.guard.below_minimum();
        self.ctx.inputs.activation = self.choose_activation(fired);
        self.ctx.inputs.off_request = fired
            .iter()
            .any(|o| o.fired && matches!(o.action, Some(Action::Percent(0))));
        self.ctx.inputs.owner_holds = owner_holds;

        match self.fsm.tick(&mut self.ctx) {
            Some(t) => self.after_transition(t, hw, store, sink),
            None if temperature_changed => self.emit_delta(sink),
            None => {}
        }

        // 5. Housekeeping
        self.save_learned_if_changed(store);
        self.sensors.chain.clear();
    }

    // ── Command handling ──────────────────────────────────────

    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        time: &mut impl TimePort,
        hw: &mut impl ActuatorPort,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::Button(event) => self.handle_button(event, &*time, hw, store, sink),
            AppCommand::Payload(payload) => {
                // Rejections are logged where they happen.
                let _ = self.handle_payload(payload, time, hw, store, sink);
            }
        }
    }

    /// Parse and apply a JSON payload.  A malformed payload changes nothing.
    pub fn handle_payload_str(
        &mut self,
        text: &str,
        time: &mut impl TimePort,
        hw: &mut impl ActuatorPort,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> Result<(), PayloadError> {
        let payload = Payload::parse(text).inspect_err(|e| warn!("payload rejected: {e}"))?;
        self.handle_payload(payload, time, hw, store, sink)
    }

    fn handle_button(
        &mut self,
        event: ButtonEvent,
        time: &impl TimePort,
        hw: &mut impl ActuatorPort,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        if self.ctx.heating.key_lock {
            info!("button {event:?} ignored: key lock");
            return;
        }
        self.refresh_inputs(time);

        if self.fsm.current_state().is_heating() {
            if matches!(self.ctx.heating.owner, Owner::Rule(_)) {
                self.ctx.heating.downtime = match event {
                    ButtonEvent::Single => self.ctx.config.downtime_plus,
                    ButtonEvent::Long => self
                        .local_now(time)
                        .map_or(SECS_PER_DAY, |t| t.secs_until_midnight()),
                };
                info!("schedules suppressed for {} s", self.ctx.heating.downtime);
            }
            let t = self.fsm.force_transition(StateId::Off, "button", &mut self.ctx);
            self.after_transition(t, hw, store, sink);
            return;
        }

        self.ctx.request = Some(match event {
            ButtonEvent::Single => SessionRequest::ManualTimed,
            ButtonEvent::Long => SessionRequest::ManualBoost,
        });
        let t = self.fsm.force_transition(StateId::ManualOn, "button", &mut self.ctx);
        self.after_transition(t, hw, store, sink);
    }

    fn handle_payload(
        &mut self,
        p: Payload,
        time: &mut impl TimePort,
        hw: &mut impl ActuatorPort,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> Result<(), PayloadError> {
        let before = self.ctx.config.clone();

        // -- Settings (validated before anything changes) --
        let mut next = before.clone();
        if let Some(v) = p.offset {
            next.offset = v;
        }
        if let Some(v) = p.dst {
            next.dst = v;
        }
        if let Some(v) = p.minimum {
            next.minimum = v;
        }
        if let Some(v) = p.plustemp {
            next.plustemp = v;
        }
        if let Some(v) = p.plustime {
            next.plustime = v;
        }
        if let Some(v) = p.downtime {
            next.downtime_plus = v;
        }
        if let Some(v) = p.key_lock {
            next.key_lock = v;
        }
        if let Some(v) = p.correction {
            next.correction = v;
        }
        if let Some(v) = p.smart_lock {
            next.smart_lock = v;
        }

        // Epochs arrive in UTC; the node keeps local time.
        let shift = next.utc_shift();
        let clock_local = match p.time.filter(|t| *t > EARLIEST_VALID_EPOCH) {
            Some(utc) => Some(local_epoch(utc, shift, "time")?),
            None => None,
        };
        let vacation_utc = match p.val {
            Some(Directive::Vacation(utc)) => Some(utc),
            _ => p.vacation,
        };
        if let Some(utc) = vacation_utc {
            next.vacation = if utc == 0 { 0 } else { local_epoch(utc, shift, "vacation")? };
        }

        if let Err(ConfigError::ValidationFailed(why)) = next.validate() {
            warn!("payload rejected: {why}");
            return Err(PayloadError::BadValue(why));
        }
        self.ctx.config = next;
        self.ctx.heating.key_lock = self.ctx.config.key_lock;
        self.ctx.heating.vacation_until = self.ctx.config.vacation;

        // -- Clock --
        self.sync_clock(before.utc_shift(), clock_local, time);

        if p.correction.is_some() && self.apply_correction() {
            self.emit_delta(sink);
        }

        // -- Peer states --
        if let Some(light) = p.light {
            if light.level.is_some() {
                self.sensors.light = light.level;
            }
            self.sensors.sensor_twilight = light.twilight;
            self.ctx.config.sensor_twilight = light.twilight;
        }
        if let Some(on) = p.switch {
            self.sensors.switch = Some(on);
        }
        if let Some(position) = p.blinds {
            self.sensors.blinds = Some(position);
        }
        if let Some(id) = p.chain {
            if self.sensors.chain.push(id).is_err() {
                warn!("chain signal {id} dropped: too many this second");
            }
        }

        // -- Rules --
        if let Some(text) = p.smart.as_deref() {
            self.replace_rules(text, hw, store, sink);
        }

        // -- Heating directive --
        if let Some(directive) = p.val {
            self.apply_directive(directive, &*time, hw, store, sink);
        }

        if self.ctx.config != before {
            self.save_settings(store);
        }
        Ok(())
    }

    fn apply_directive(
        &mut self,
        directive: Directive,
        time: &impl TimePort,
        hw: &mut impl ActuatorPort,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.refresh_inputs(time);
        let (state, request) = match directive {
            Directive::Setpoint(target) => (StateId::RemoteOn, SessionRequest::RemoteSetpoint(target)),
            Directive::For(secs) => (StateId::RemoteOn, SessionRequest::RemoteFor(secs)),
            Directive::SetpointFor(target, secs) => {
                (StateId::RemoteOn, SessionRequest::RemoteSetpointFor(target, secs))
            }
            // Stored with the settings, before any directive runs.
            Directive::Vacation(_) => return,
            Directive::Off => {
                if !self.fsm.current_state().is_heating() {
                    return;
                }
                if matches!(self.ctx.heating.owner, Owner::Rule(_)) {
                    self.ctx.heating.downtime = self.ctx.config.downtime_plus;
                }
                let t = self.fsm.force_transition(StateId::Off, "remote", &mut self.ctx);
                self.after_transition(t, hw, store, sink);
                return;
            }
        };
        self.ctx.request = Some(request);
        let t = self.fsm.force_transition(state, "remote", &mut self.ctx);
        self.after_transition(t, hw, store, sink);
    }

    /// Replace the whole rule set.  Learned fields follow rules whose
    /// definition did not change.
    pub fn replace_rules(
        &mut self,
        text: &str,
        hw: &mut impl ActuatorPort,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        let mut next = RuleSet::parse(text);
        LearnedRecord::capture(self.rules.rules()).restore(next.rules_mut());
        info!("rule set replaced: {} -> {} rules", self.rules.len(), next.len());
        self.rules = next;
        self.ctx.config.smart = self.rules.to_definition_string();

        if matches!(self.ctx.heating.owner, Owner::Rule(_)) {
            let t = self.fsm.force_transition(StateId::Off, "rules replaced", &mut self.ctx);
            self.after_transition(t, hw, store, sink);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn heating(&self) -> &HeatingState {
        &self.ctx.heating
    }

    pub fn settings(&self) -> &Settings {
        &self.ctx.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn sensors(&self) -> &SensorSnapshot {
        &self.sensors
    }

    pub fn fault_flags(&self) -> u8 {
        self.guard.faults()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn delta(&self) -> StateDelta {
        let h = &self.ctx.heating;
        StateDelta {
            value: u8::from(h.heating),
            htemp: (h.setpoint > 0.0).then_some(h.setpoint),
            htime: h.remaining_secs(self.ctx.inputs.now),
            temp: self.sensors.temperature,
        }
    }

    /// Answer to the transport's state query.
    pub fn state_report(&self) -> StateReport {
        StateReport {
            delta: self.delta(),
            smart: self.rules.to_rule_string(),
            smart_lock: self.ctx.config.smart_lock,
        }
    }

    // ── Internal: time ────────────────────────────────────────

    fn local_now(&self, time: &impl TimePort) -> Option<LocalTime> {
        time.now()
            .map(LocalTime::new)
            .filter(|t| t.timestamp() >= EARLIEST_VALID_EPOCH)
    }

    /// Bring `now` and the temperature up to date before a command runs
    /// an enter handler.
    fn refresh_inputs(&mut self, time: &impl TimePort) {
        self.ctx.inputs.now = self.local_now(time).map(|t| t.timestamp());
        self.ctx.inputs.temperature = self.sensors.temperature;
    }

    /// Apply a `time` payload (already in local time), or shift a running
    /// clock when the timezone offset or DST flag changed without one.
    fn sync_clock(&mut self, old_shift: i64, local: Option<i64>, time: &mut impl TimePort) {
        let shift = self.ctx.config.utc_shift();
        let running = self.local_now(&*time);

        if let Some(local) = local {
            let drift = running.map(|n| (n.timestamp() - local).abs());
            if drift.is_none_or(|d| d > 60) {
                if let Some(t) = LocalTime::from_timestamp(local) {
                    time.set(t.naive());
                    info!("clock set to {} (drift {:?} s)", t.naive(), drift);
                }
            }
        } else if shift != old_shift {
            let shifted = running
                .and_then(|n| LocalTime::from_timestamp(n.timestamp() + shift - old_shift));
            if let Some(t) = shifted {
                time.set(t.naive());
                info!("clock shifted by {} s", shift - old_shift);
            }
        }
    }

    /// Switch summer time at its switch minutes, moving the clock an hour.
    fn follow_summer_time(
        &mut self,
        now: Option<LocalTime>,
        time: &mut impl TimePort,
        store: &mut impl StoragePort,
    ) -> Option<LocalTime> {
        let current = now?;
        let Some(dst) = clock::summer_time_switch(current, self.ctx.config.dst) else {
            return now;
        };
        let step = if dst { 3600 } else { -3600 };
        let Some(moved) = LocalTime::from_timestamp(current.timestamp() + step) else {
            return now;
        };
        time.set(moved.naive());
        self.ctx.config.dst = dst;
        info!("summer time {}, clock moved to {}", if dst { "on" } else { "off" }, moved.naive());
        self.save_settings(store);
        Some(moved)
    }

    /// A smart lock holds until the next sunrise or sunset, or until 03:01
    /// when sun times are unknown.
    fn release_smart_lock(
        &mut self,
        now: Option<LocalTime>,
        sun: Option<SunTimes>,
        store: &mut impl StoragePort,
    ) {
        let Some(minute) = now.map(|t| t.minute_of_day()) else { return };
        if !self.ctx.config.smart_lock {
            return;
        }
        let release = match sun {
            Some(sun) => minute == sun.sunrise || minute == sun.sunset,
            None => minute == SMART_LOCK_RELEASE_MINUTE,
        };
        if release {
            info!("smart lock released");
            self.ctx.config.smart_lock = false;
            self.save_settings(store);
        }
    }

    fn set_vacation(&mut self, local: i64) {
        self.ctx.heating.vacation_until = local;
        self.ctx.config.vacation = local;
    }

    // ── Internal: sensors ─────────────────────────────────────

    fn sample_if_due(&mut self, hw: &mut impl SensorPort) -> bool {
        if self.sample_in > 0 {
            self.sample_in -= 1;
            return false;
        }
        self.sample(hw)
    }

    /// Read the probe now.  Returns whether the reported temperature changed.
    fn sample(&mut self, hw: &mut impl SensorPort) -> bool {
        self.sample_in = SAMPLE_INTERVAL_SECS - 1;
        let raw = hw.read_raw_temperature();
        self.raw_temperature = (raw != PROBE_DISCONNECTED && raw.is_finite()).then_some(raw);
        self.apply_correction()
    }

    fn apply_correction(&mut self) -> bool {
        self.sensors.temperature = self.raw_temperature.map(|r| r + self.ctx.config.correction);
        let changed = match (self.sensors.temperature, self.reported_temperature) {
            (Some(a), Some(b)) => (a - b).abs() >= 0.05,
            (a, b) => a.is_some() != b.is_some(),
        };
        if changed {
            debug!("temperature {:?} °C", self.sensors.temperature);
            self.reported_temperature = self.sensors.temperature;
        }
        changed
    }

    // ── Internal: rules ───────────────────────────────────────

    /// Highest setpoint among firing rules; a plain "on" ranks below any
    /// setpoint and earlier rules win ties.  Setpoints already reached and
    /// non-heating actions are skipped.
    fn choose_activation(&self, outcomes: &[RuleOutcome]) -> Option<Activation> {
        let temperature = self.sensors.temperature;
        let mut best: Option<Activation> = None;
        for outcome in outcomes.iter().filter(|o| o.fired) {
            let setpoint = match &outcome.action {
                Some(Action::Setpoint(s)) if temperature.is_some_and(|t| t >= *s) => continue,
                Some(Action::Setpoint(s)) => Some(*s),
                Some(Action::Percent(0) | Action::Forward { .. }) => continue,
                Some(Action::Percent(_)) | None => None,
            };
            let windowed = self.rules.rules().get(outcome.index).is_some_and(|r| r.window.is_some());
            let candidate = Activation { rule: outcome.index, setpoint, windowed };
            let rank = |a: &Activation| a.setpoint.unwrap_or(f32::NEG_INFINITY);
            if best.is_none_or(|b| rank(&candidate) > rank(&b)) {
                best = Some(candidate);
            }
        }
        best
    }

    fn forward_actions(&self, outcomes: &[RuleOutcome], sink: &mut impl EventSink) {
        for outcome in outcomes.iter().filter(|o| o.fired) {
            if let Some(Action::Forward { address, value }) = &outcome.action {
                let val = value.as_deref().unwrap_or(DEFAULT_FORWARD_VALUE);
                debug!("rule {} forwards {val} to {address}", outcome.index);
                sink.emit(&AppEvent::Forward {
                    address: address.clone(),
                    payload: ForwardBody { val }.to_json(),
                });
            }
        }
    }

    // ── Internal: transitions and persistence ─────────────────

    /// Relay write, resume record and one delta, once per transition.
    fn after_transition(
        &mut self,
        t: Transition,
        hw: &mut impl ActuatorPort,
        store: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        hw.set_relay(self.ctx.commands.on);
        if self.ctx.heating.heating {
            if let Err(e) = persistence::save_resume(store, &self.ctx.heating) {
                warn!("resume record not written: {e}");
            }
        } else {
            self.clear_resume(store);
        }
        self.reported_temperature = self.sensors.temperature;
        self.emit_delta(sink);
        sink.emit(&AppEvent::StateChanged { from: t.from, to: t.to, reason: t.reason });
    }

    fn emit_delta(&self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Delta(self.delta()));
    }

    fn clear_resume(&self, store: &mut impl StoragePort) {
        if let Err(e) = persistence::clear_resume(store) {
            warn!("resume record not deleted: {e}");
        }
    }

    fn save_settings(&self, store: &mut impl StoragePort) {
        if let Err(e) = persistence::save_settings(store, &self.ctx.config) {
            warn!("settings not saved: {e}");
        }
    }

    fn save_learned_if_changed(&mut self, store: &mut impl StoragePort) {
        let record = LearnedRecord::capture(self.rules.rules());
        if record == self.learned {
            return;
        }
        match persistence::save_learned(store, &record) {
            Ok(()) => debug!("learned fields saved ({} rules)", record.len()),
            Err(e) => warn!("learned fields not saved: {e}"),
        }
        self.learned = record;
    }
}
