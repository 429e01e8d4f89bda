//! Global constants for vmk-helper
//!
//! Consolidates timing, protocol, and path constants
//! to eliminate magic numbers throughout the codebase.

// ============================================================================
// Timing Constants
// ============================================================================

/// Delay between two injected backspace presses in microseconds
pub const INTER_KEY_DELAY_US: u64 = 1200;

/// Minimum interval between two accepted clicks in milliseconds
pub const CLICK_DEBOUNCE_MS: u64 = 1000;

/// Sleep between libinput polls when no events are pending
pub const MONITOR_POLL_INTERVAL_MS: u64 = 5;

// ============================================================================
// Protocol Constants
// ============================================================================

/// Command prefix for backspace injection requests
pub const BACKSPACE_PREFIX: &str = "BACKSPACE_";

/// Receive buffer size (one byte is kept free, as with a C string buffer)
pub const COMMAND_BUFFER_SIZE: usize = 256;

/// Upper bound for a single injection request
pub const MAX_BACKSPACE_COUNT: i64 = 10;

/// Pending connection backlog for the command socket
pub const LISTEN_BACKLOG: usize = 5;

// ============================================================================
// Paths & Names
// ============================================================================

/// Environment variable overriding the runtime directory
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Runtime directory prefix, completed with the target user name
pub const RUNTIME_DIR_PREFIX: &str = "/run/vmksocket-";

/// Command socket file name inside the runtime directory
pub const SOCKET_FILE_NAME: &str = "kb_socket";

/// Click signal file name inside the runtime directory
pub const MOUSE_FLAG_FILE_NAME: &str = ".mouse_flag";

/// Content written to the click signal file
pub const MOUSE_FLAG_MARKER: &str = "Y=1\n";

/// Permission bits for the socket and the click signal file
pub const WORLD_RW_MODE: u32 = 0o666;

/// Permission bits for a freshly created runtime directory
pub const WORLD_RWX_MODE: u32 = 0o777;

/// Name advertised by the virtual keyboard
pub const VIRTUAL_KEYBOARD_NAME: &str = "Fcitx5_Uinput_Server";

/// libinput seat the pointer monitor attaches to
pub const DEFAULT_SEAT: &str = "seat0";

// ============================================================================
// Scheduling
// ============================================================================

/// Nice value applied at startup
pub const DEFAULT_NICE: i32 = -10;

/// CPUs the process is pinned to at startup
pub const DEFAULT_CPU_AFFINITY: [usize; 4] = [0, 1, 2, 3];
