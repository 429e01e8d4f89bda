//! Pointer click monitor
//!
//! Use libinput (udev backend) to watch every pointer device on the seat
//! from a background thread. A button press outside the debounce window
//! rewrites the click flag. Touchpads get tap-to-click enabled as they
//! appear.

use anyhow::{anyhow, Context, Result};
use input::event::pointer::ButtonState;
use input::event::{DeviceEvent, Event, EventTrait, PointerEvent};
use input::{Device, Libinput, LibinputInterface, TapButtonMap};
use log::{debug, info, warn};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::OwnedFd;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use super::debounce::ClickDebouncer;
use super::flag::SignalFlag;
use crate::config::MonitorConfig;
use crate::session;

/// LibinputInterface implementation for libinput
struct InputInterface;

impl LibinputInterface for InputInterface {
    fn open_restricted(&mut self, path: &Path, flags: i32) -> std::result::Result<OwnedFd, i32> {
        let f = OpenOptions::new()
            .read(true)
            .write((flags & libc::O_WRONLY != 0) || (flags & libc::O_RDWR != 0))
            .custom_flags(flags & !libc::O_WRONLY & !libc::O_RDWR & !libc::O_RDONLY)
            .open(path)
            .map_err(|e| {
                warn!("Cannot open device: {:?}: {}", path, e);
                e.raw_os_error().unwrap_or(-libc::ENOENT)
            })?;
        Ok(OwnedFd::from(f))
    }

    fn close_restricted(&mut self, fd: OwnedFd) {
        drop(fd);
    }
}

/// What the monitor loop cares about in the input stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Any pointer button went down
    ButtonPressed,
    /// Any pointer button came up
    ButtonReleased,
    /// New device on the seat (tap already configured if applicable)
    DeviceAdded { name: String },
    /// Everything else
    Other,
}

/// Source of input events polled by the monitor loop
pub trait EventSource {
    /// Read pending kernel events into the queue (non-blocking)
    fn dispatch(&mut self) -> std::io::Result<()>;
    /// Pop the next queued event
    fn next_event(&mut self) -> Option<MonitorEvent>;
}

/// libinput context bound to one seat
pub struct LibinputSource {
    input: Libinput,
    configure_tap: bool,
}

impl LibinputSource {
    pub fn open(seat: &str, configure_tap: bool) -> Result<Self> {
        let mut input = Libinput::new_with_udev(InputInterface);
        input
            .udev_assign_seat(seat)
            .map_err(|_| anyhow!("Failed to assign libinput seat '{}'", seat))?;
        info!("libinput attached to {}", seat);
        Ok(Self {
            input,
            configure_tap,
        })
    }
}

impl EventSource for LibinputSource {
    fn dispatch(&mut self) -> std::io::Result<()> {
        self.input.dispatch()
    }

    fn next_event(&mut self) -> Option<MonitorEvent> {
        let event = self.input.next()?;
        let translated = match event {
            Event::Device(DeviceEvent::Added(added)) => {
                let device = added.device();
                let name = device.name().to_string();
                if self.configure_tap {
                    configure_tap(device);
                }
                MonitorEvent::DeviceAdded { name }
            }
            Event::Pointer(PointerEvent::Button(b)) => match b.button_state() {
                ButtonState::Pressed => MonitorEvent::ButtonPressed,
                ButtonState::Released => MonitorEvent::ButtonReleased,
            },
            _ => MonitorEvent::Other,
        };
        Some(translated)
    }
}

/// Enable tap-to-click with left/right/middle mapping on tap-capable devices
fn configure_tap(mut device: Device) {
    if device.config_tap_finger_count() == 0 {
        return;
    }
    if let Err(e) = device.config_tap_set_enabled(true) {
        warn!("{}: cannot enable tap-to-click: {:?}", device.name(), e);
        return;
    }
    if let Err(e) = device.config_tap_set_button_map(TapButtonMap::LeftRightMiddle) {
        warn!("{}: cannot set tap button map: {:?}", device.name(), e);
        return;
    }
    debug!("{}: tap-to-click enabled (LRM)", device.name());
}

/// Count pointer devices udev currently knows about (diagnostic only)
fn count_pointer_devices() -> Result<usize> {
    let mut enumerator = udev::Enumerator::new().context("Failed to create udev enumerator")?;
    enumerator
        .match_subsystem("input")
        .context("Failed to match input subsystem")?;
    let count = enumerator
        .scan_devices()
        .context("Failed to scan udev devices")?
        .filter(|dev| dev.devnode().is_some())
        .filter(|dev| {
            ["ID_INPUT_MOUSE", "ID_INPUT_TOUCHPAD"]
                .iter()
                .any(|prop| dev.property_value(prop).map(|v| v == "1").unwrap_or(false))
        })
        .count();
    Ok(count)
}

/// Turns accepted button presses into flag writes
pub struct ClickSignaller {
    debouncer: ClickDebouncer,
    flag: SignalFlag,
}

impl ClickSignaller {
    pub fn new(debouncer: ClickDebouncer, flag: SignalFlag) -> Self {
        Self { debouncer, flag }
    }

    /// Handle a press at `now`; true if the flag was written
    ///
    /// The debounce time only advances after a successful write.
    pub fn on_button_pressed(&mut self, now: Instant) -> bool {
        if !self.debouncer.is_due(now) {
            debug!("Click debounced");
            return false;
        }
        match self.flag.raise() {
            Ok(()) => {
                self.debouncer.record(now);
                debug!("Click signalled: {}", self.flag.path().display());
                true
            }
            Err(e) => {
                warn!("Failed to write {}: {}", self.flag.path().display(), e);
                false
            }
        }
    }
}

/// Background click monitor, consumed when spawned
pub struct PointerMonitor {
    config: MonitorConfig,
    flag: SignalFlag,
}

impl PointerMonitor {
    pub fn new(config: MonitorConfig, flag: SignalFlag) -> Self {
        Self { config, flag }
    }

    /// Start the libinput monitor thread
    pub fn spawn(self) -> Result<MonitorHandle> {
        match count_pointer_devices() {
            Ok(0) => warn!("No pointer devices found (waiting for hotplug)"),
            Ok(n) => info!("{} pointer device(s) present", n),
            Err(e) => debug!("udev scan failed: {:#}", e),
        }
        self.spawn_with(|config| LibinputSource::open(&config.seat, config.configure_tap))
    }

    /// Start the monitor thread over a custom event source
    ///
    /// `open_source` runs on the monitor thread, so the source itself need
    /// not be `Send`. If it fails the thread logs and exits. The thread
    /// blocks the shutdown signals before anything else.
    pub fn spawn_with<E, F>(self, open_source: F) -> Result<MonitorHandle>
    where
        E: EventSource,
        F: FnOnce(&MonitorConfig) -> Result<E> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let thread = std::thread::Builder::new()
            .name("pointer-monitor".to_string())
            .spawn(move || {
                if let Err(e) = session::block_shutdown_signals() {
                    warn!("{:#}", e);
                }
                let mut source = match open_source(&self.config) {
                    Ok(source) => source,
                    Err(e) => {
                        warn!("Pointer monitor unavailable (click flag disabled): {:#}", e);
                        return;
                    }
                };
                self.run(&mut source, &thread_stop);
            })
            .context("Failed to spawn pointer monitor thread")?;

        Ok(MonitorHandle {
            stop,
            thread: Some(thread),
        })
    }

    /// Poll loop: drain all pending events, then sleep one interval
    fn run<E: EventSource>(self, source: &mut E, stop: &AtomicBool) {
        let poll_interval = self.config.poll_interval();
        let debouncer = ClickDebouncer::new(self.config.debounce_window(), Instant::now());
        let mut signaller = ClickSignaller::new(debouncer, self.flag);

        info!(
            "Pointer monitor started (debounce={}ms, poll={}ms)",
            self.config.debounce_ms, self.config.poll_interval_ms
        );

        while !stop.load(Ordering::Relaxed) {
            if let Err(e) = source.dispatch() {
                warn!("libinput dispatch error: {}", e);
            }

            while let Some(event) = source.next_event() {
                match event {
                    MonitorEvent::ButtonPressed => {
                        signaller.on_button_pressed(Instant::now());
                    }
                    MonitorEvent::DeviceAdded { name } => {
                        debug!("Input device added: {}", name);
                    }
                    MonitorEvent::ButtonReleased | MonitorEvent::Other => {}
                }
            }

            std::thread::sleep(poll_interval);
        }

        info!("Pointer monitor stopped");
    }
}

/// Handle to the running monitor thread
pub struct MonitorHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Ask the thread to exit after its current poll iteration
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// True once the thread has exited (stopped or failed to start)
    #[cfg(test)]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop the thread and wait for it
    pub fn shutdown(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Pointer monitor thread panicked");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
