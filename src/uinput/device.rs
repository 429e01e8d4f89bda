//! uinput virtual keyboard
//!
//! Creates a kernel virtual keyboard that advertises only KEY_BACKSPACE,
//! and posts key events to it.
//!
//! Requirements:
//! - /dev/uinput must be writable (root or the 'input' group)
//! - The uinput module must be loaded (`modprobe uinput`)

use anyhow::{Context, Result};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, BusType, InputEvent, InputId, Key};
use log::{info, warn};

/// Destination for input events
pub trait EventSink {
    /// Post one report; the sink terminates it with SYN_REPORT
    fn emit(&mut self, events: &[InputEvent]) -> std::io::Result<()>;
}

/// Kernel virtual keyboard handle
///
/// Created once per process. The kernel device goes away with the fd.
pub struct VirtualKeyboard {
    device: VirtualDevice,
}

impl VirtualKeyboard {
    /// Create the virtual keyboard on /dev/uinput
    pub fn create(name: &str) -> Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        keys.insert(Key::KEY_BACKSPACE);

        let device = VirtualDeviceBuilder::new()
            .context("Cannot open /dev/uinput")?
            .name(name)
            .input_id(InputId::new(BusType::BUS_VIRTUAL, 0, 0, 1))
            .with_keys(&keys)
            .context("Failed to register KEY_BACKSPACE")?
            .build()
            .context("Failed to create uinput device")?;

        info!("Virtual keyboard created: {}", name);
        Ok(Self { device })
    }

    /// Create the virtual keyboard, or None when uinput is unusable
    ///
    /// The caller keeps running without injection in that case.
    pub fn try_create(name: &str) -> Option<Self> {
        match Self::create(name) {
            Ok(kb) => Some(kb),
            Err(e) => {
                warn!("Virtual keyboard unavailable (injection disabled): {:#}", e);
                None
            }
        }
    }
}

impl EventSink for VirtualKeyboard {
    fn emit(&mut self, events: &[InputEvent]) -> std::io::Result<()> {
        // VirtualDevice::emit appends the SYN_REPORT itself
        self.device.emit(events)
    }
}
