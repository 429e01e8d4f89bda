//! Pointer input handling
//!
//! Watch physical clicks through libinput and signal them to the input
//! method through a flag file.
//! - `monitor`: background libinput poll loop
//! - `debounce`: time-window filter between accepted clicks
//! - `flag`: the signal file itself

pub mod debounce;
pub mod flag;
pub mod monitor;

pub use flag::SignalFlag;
pub use monitor::{MonitorHandle, PointerMonitor};
