//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements      | Connects to                       |
//! |------------|-----------------|-----------------------------------|
//! | `log_sink` | EventSink       | `log` facade                      |
//! | `outbound` | EventSink       | bounded queue → peer transport    |
//! | `relay`    | ActuatorPort    | `embedded-hal` output pin         |
//! | `sim`      | SensorPort      | simulated probe and GPIO lines    |
//! | `store`    | StoragePort     | in-memory map / files on disk     |
//! | `time`     | TimePort        | host system clock                 |

pub mod log_sink;
pub mod outbound;
pub mod relay;
pub mod sim;
pub mod store;
pub mod time;
