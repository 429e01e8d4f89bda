//! Shutdown signal handling
//!
//! SIGTERM (systemd stop), SIGINT (Ctrl+C) and SIGHUP only raise a flag.
//! The handlers are installed without SA_RESTART so a blocking `accept`
//! returns EINTR and the accept loop gets to look at the flag.

use anyhow::{Context, Result};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, Ordering};

/// Signals that request an orderly shutdown
const SHUTDOWN_SIGNALS: [Signal; 3] = [Signal::SIGTERM, Signal::SIGINT, Signal::SIGHUP];

/// Global flag for shutdown requested via signal
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check if shutdown was requested (SIGTERM, SIGINT, or SIGHUP)
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

extern "C" fn shutdown_signal_handler(_signo: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

/// Set up signal handlers for graceful shutdown (call once at startup)
pub fn setup_signal_handlers() -> Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(shutdown_signal_handler),
        SaFlags::empty(),
        SigSet::empty(),
    );
    for signal in SHUTDOWN_SIGNALS {
        unsafe { sigaction(signal, &action) }
            .with_context(|| format!("Failed to install {} handler", signal))?;
    }
    Ok(())
}

/// Block the shutdown signals on the calling thread
///
/// Worker threads call this so the kernel delivers process-directed
/// signals to the main thread, where they interrupt `accept`.
pub fn block_shutdown_signals() -> Result<()> {
    let mut set = SigSet::empty();
    for signal in SHUTDOWN_SIGNALS {
        set.add(signal);
    }
    set.thread_block()
        .context("Failed to block shutdown signals")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_shutdown_signals_only_affects_calling_thread() {
        let worker = std::thread::spawn(|| {
            block_shutdown_signals().unwrap();
            SigSet::thread_get_mask().unwrap()
        });
        let mask = worker.join().unwrap();
        for signal in SHUTDOWN_SIGNALS {
            assert!(mask.contains(signal), "{} not blocked", signal);
        }

        let here = SigSet::thread_get_mask().unwrap();
        assert!(!here.contains(Signal::SIGTERM));
    }
}
