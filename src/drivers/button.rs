//! Polled, debounced push-button driver with single and long press detection.
//!
//! ## Hardware
//!
//! Active-low momentary switch with a pull-up, read through an
//! `embedded-hal` [`InputPin`].  The run loop calls [`ButtonDriver::poll`]
//! as often as it spins; the driver debounces and classifies gestures.
//!
//! ## Gesture detection
//!
//! | Gesture      | Condition                         | Event                 |
//! |--------------|-----------------------------------|-----------------------|
//! | Single press | Released before `LONG_PRESS_MS`   | `ButtonEvent::Single` |
//! | Long press   | Held for `LONG_PRESS_MS`          | `ButtonEvent::Long`   |
//!
//! A long press is reported while the button is still held, once; the
//! release that follows produces nothing.

use embedded_hal::digital::InputPin;

const DEBOUNCE_MS: u32 = 50;
const LONG_PRESS_MS: u32 = 1000;

/// Classified button gestures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Single,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    DebounceWait { since_ms: u32 },
    Pressed { since_ms: u32 },
    /// Long press already reported; wait for the release.
    Held,
}

pub struct ButtonDriver<P: InputPin> {
    pin: P,
    state: GestureState,
}

impl<P: InputPin> ButtonDriver<P> {
    pub fn new(pin: P) -> Self {
        Self { pin, state: GestureState::Idle }
    }

    /// Sample the pin.  `now_ms` is monotonic milliseconds.
    pub fn poll(&mut self, now_ms: u32) -> Option<ButtonEvent> {
        // A pin read error counts as released.
        let pressed = self.pin.is_low().unwrap_or(false);

        match self.state {
            GestureState::Idle => {
                if pressed {
                    self.state = GestureState::DebounceWait { since_ms: now_ms };
                }
                None
            }

            GestureState::DebounceWait { since_ms } => {
                if !pressed {
                    self.state = GestureState::Idle;
                } else if now_ms.wrapping_sub(since_ms) >= DEBOUNCE_MS {
                    self.state = GestureState::Pressed { since_ms };
                }
                None
            }

            GestureState::Pressed { since_ms } => {
                if !pressed {
                    self.state = GestureState::Idle;
                    return Some(ButtonEvent::Single);
                }
                if now_ms.wrapping_sub(since_ms) >= LONG_PRESS_MS {
                    self.state = GestureState::Held;
                    return Some(ButtonEvent::Long);
                }
                None
            }

            GestureState::Held => {
                if !pressed {
                    self.state = GestureState::Idle;
                }
                None
            }
        }
    }

    pub fn release(self) -> P {
        self.pin
    }
}
