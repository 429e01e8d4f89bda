//! Virtual keyboard via uinput
//!
//! - `device`: creates the kernel virtual keyboard and posts events
//! - `injector`: turns a backspace request into timed press/release pairs

pub mod device;
pub mod injector;

pub use device::{EventSink, VirtualKeyboard};
pub use injector::BackspaceInjector;
