//! Session bootstrap
//!
//! Everything the helper needs from the surrounding user session before the
//! injector, monitor and server can start:
//! - Target user and runtime directory (socket + click flag paths)
//! - Process priority and CPU affinity
//! - Signal-driven shutdown

pub mod runtime;
pub mod signals;
pub mod tuning;

pub use runtime::{resolve_username, RuntimePaths};
pub use signals::{block_shutdown_signals, setup_signal_handlers, shutdown_requested};
pub use tuning::{boost_process_priority, pin_to_cpus};
