//! Backspace injection
//!
//! Each request becomes `count` full press/release pairs on the virtual
//! keyboard. Each half is posted as its own report closed by SYN_REPORT,
//! with a fixed pause after every pair. Consumers only see a key transition at a SYN boundary, and
//! input-method state machines need the separate down and up.

use evdev::{EventType, InputEvent, Key};
use log::debug;
use std::time::Duration;

use super::device::EventSink;
use crate::config::InjectorConfig;

/// Emits rate-limited backspace presses
///
/// Holds no device when uinput was unavailable; every request is then
/// accepted and dropped.
pub struct BackspaceInjector<S: EventSink> {
    sink: Option<S>,
    inter_key_delay: Duration,
    max_count: i64,
}

impl<S: EventSink> BackspaceInjector<S> {
    pub fn new(sink: Option<S>, config: &InjectorConfig) -> Self {
        Self {
            sink,
            inter_key_delay: config.inter_key_delay(),
            max_count: config.max_count.max(1),
        }
    }

    /// True when a virtual device backs this injector
    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    /// Number of presses a request for `requested` turns into
    pub fn effective_count(&self, requested: i64) -> usize {
        if requested <= 0 {
            0
        } else {
            requested.min(self.max_count) as usize
        }
    }

    /// Inject up to `max_count` backspace presses
    ///
    /// Write errors are ignored: a dropped event is better than a stalled
    /// server. Returns the number of press/release pairs sent.
    pub fn inject_backspace(&mut self, count: i64) -> usize {
        let count = self.effective_count(count);
        let Some(sink) = self.sink.as_mut() else {
            return 0;
        };
        if count == 0 {
            return 0;
        }

        for _ in 0..count {
            let _ = sink.emit(&[backspace(true)]);
            let _ = sink.emit(&[backspace(false)]);
            std::thread::sleep(self.inter_key_delay);
        }

        debug!("Injected {} backspace(s)", count);
        count
    }
}

/// KEY_BACKSPACE transition (value 1 = down, 0 = up)
fn backspace(pressed: bool) -> InputEvent {
    InputEvent::new(EventType::KEY, Key::KEY_BACKSPACE.code(), pressed as i32)
}
