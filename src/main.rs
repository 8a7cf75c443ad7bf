//! Thermonode host runner.
//!
//! Runs the heating core against simulated hardware, persisting to a
//! directory on disk.  Commands are read from stdin, one per line:
//!
//! ```text
//!   press | long          button gestures
//!   probe <°C> | probe -  set the raw probe reading (- = disconnected)
//!   state                 print the state report
//!   {"val":"t21.5",...}   any JSON command payload
//! ```
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │  SimProbe + RelayActuator   FileStore   SystemClock          │
//! │  LogEventSink + OutboundQueue ──drain──▶ LogTransport        │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  Thermostat: Rules · Evaluator · Guard · Arbiter       │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use thermonode::adapters::log_sink::LogEventSink;
use thermonode::adapters::outbound::{LogTransport, OutboundQueue};
use thermonode::adapters::relay::RelayActuator;
use thermonode::adapters::sim::{SimPin, SimProbe};
use thermonode::adapters::store::FileStore;
use thermonode::adapters::time::SystemClock;
use thermonode::app::commands::AppCommand;
use thermonode::app::ports::{ActuatorPort, SensorPort, TimePort};
use thermonode::app::service::Thermostat;
use thermonode::clock::{SecondEdge, SunTimes};
use thermonode::drivers::button::{ButtonDriver, ButtonEvent};
use thermonode::error::Error;

/// Loop period; the control pass itself runs once per second edge.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Sun table used on the host (mid-latitude winter day).
const HOST_SUN_TIMES: SunTimes = SunTimes { sunrise: 450, sunset: 990, dawn: 415, dusk: 1025 };

// ── Host hardware ─────────────────────────────────────────────

struct HostHardware {
    probe: SimProbe,
    relay: RelayActuator<SimPin>,
}

impl SensorPort for HostHardware {
    fn read_raw_temperature(&mut self) -> f32 {
        self.probe.read_raw_temperature()
    }
}

impl ActuatorPort for HostHardware {
    fn set_relay(&mut self, on: bool) {
        self.relay.set_relay(on);
    }

    fn relay_on(&self) -> bool {
        self.relay.relay_on()
    }
}

// ── Console input ─────────────────────────────────────────────

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("thermonode v{} (host)", env!("CARGO_PKG_VERSION"));

    let data_dir = std::env::args().nth(1).unwrap_or_else(|| "thermonode-data".into());
    let mut store = FileStore::open(&data_dir)
        .map_err(Error::from)
        .with_context(|| format!("opening store at {data_dir}"))?;

    let mut clock = SystemClock::new().with_sun_times(HOST_SUN_TIMES);
    let probe = SimProbe::new(Some(21.0));
    let mut hw = HostHardware { probe: probe.clone(), relay: RelayActuator::new(SimPin::new(false)) };
    let button_line = SimPin::new(true);
    let mut button = ButtonDriver::new(button_line.clone());
    let mut sink = (LogEventSink::new(), OutboundQueue::new());
    let mut transport = LogTransport;

    let mut thermostat = Thermostat::boot(&mut store, &clock, &mut hw, &mut sink);
    let input = spawn_stdin_reader();
    let mut edge = SecondEdge::new();

    loop {
        // -- Inbound --
        let mut commands = Vec::new();
        if let Some(gesture) = button.poll(clock.uptime_ms()) {
            commands.push(AppCommand::Button(gesture));
        }
        loop {
            match input.try_recv() {
                Ok(line) => {
                    let line = line.trim();
                    match line {
                        "" => {}
                        "press" => commands.push(AppCommand::Button(ButtonEvent::Single)),
                        "long" => commands.push(AppCommand::Button(ButtonEvent::Long)),
                        "state" => match serde_json::to_string(&thermostat.state_report()) {
                            Ok(json) => println!("{json}"),
                            Err(e) => warn!("state report: {e}"),
                        },
                        _ if line.starts_with("probe") => {
                            let value = line["probe".len()..].trim();
                            probe.set(value.parse().ok());
                        }
                        _ => {
                            // Malformed payloads are logged by the core.
                            let _ = thermostat.handle_payload_str(
                                line, &mut clock, &mut hw, &mut store, &mut sink,
                            );
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("stdin closed, shutting down");
                    return Ok(());
                }
            }
        }
        for cmd in commands {
            thermostat.handle_command(cmd, &mut clock, &mut hw, &mut store, &mut sink);
        }

        // -- Control pass, once per second --
        let second = clock
            .now()
            .map_or(clock.uptime_secs() as i64, |t| t.and_utc().timestamp());
        if edge.poll(second) {
            thermostat.tick(&mut clock, &mut hw, &mut store, &mut sink);
        }

        // -- Outbound, outside the control pass --
        sink.1.drain(&mut transport);

        thread::sleep(POLL_INTERVAL);
    }
}
