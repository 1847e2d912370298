//! Background key state poller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use deck_core::{KeyEvent, Transport};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::consts::{NUM_KEYS, READ_TIMEOUT_MS};
use crate::events::Subscribers;
use crate::keymap;

/// Raw key state report: header byte followed by one byte per physical key
pub type KeyStateSnapshot = [u8; NUM_KEYS + 1];

/// Everything the polling thread needs, moved into it on start
pub(crate) struct KeyPoller<T> {
    pub transport: Arc<T>,
    pub shutdown: Arc<AtomicBool>,
    pub subscribers: Arc<Subscribers>,
    pub failure: Arc<Mutex<Option<String>>>,
}

impl<T: Transport> KeyPoller<T> {
    /// Poll key states until shutdown is requested or the transport fails.
    /// Never restarts; a transport failure is recorded and ends the loop.
    pub fn run(self) {
        debug!("key poller started");
        let mut last: KeyStateSnapshot = [0u8; NUM_KEYS + 1];

        while !self.shutdown.load(Ordering::Acquire) {
            let report = match self.transport.read_timeout(NUM_KEYS + 1, READ_TIMEOUT_MS) {
                Ok(report) => report,
                Err(e) => {
                    warn!("key poller stopped: {e}");
                    *self.failure.lock() = Some(e.to_string());
                    break;
                },
            };

            // Timed out without data
            if report.is_empty() {
                continue;
            }

            let Ok(states) = KeyStateSnapshot::try_from(report.as_slice()) else {
                debug!("ignoring short key state report: {report:02X?}");
                continue;
            };

            for (physical, (new, old)) in states[1..].iter().zip(&last[1..]).enumerate() {
                if new != old {
                    let event = KeyEvent {
                        key: keymap::to_logical(physical),
                        pressed: *new > 0,
                    };
                    debug!("key {} {}", event.key, if event.pressed { "down" } else { "up" });
                    self.subscribers.dispatch(event);
                }
            }
            last = states;
        }

        debug!("key poller exiting");
    }
}
