//! vmk-helper - privileged input helper for the VMK input method
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  main thread                                 │
//! │  kb_socket  →  CommandServer  →  uinput      │
//! │  (BACKSPACE_n)                 (virtual kbd) │
//! ├──────────────────────────────────────────────┤
//! │  pointer-monitor thread                      │
//! │  libinput  →  debounce  →  .mouse_flag       │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The two threads share no mutable state; the monitor owns the debounce
//! time and the flag path, the main thread owns the virtual keyboard.

mod config;
mod constants;
mod input;
mod server;
mod session;
mod uinput;

use anyhow::{Context, Result};
use log::{error, info, warn};
use std::path::PathBuf;

use crate::input::{MonitorHandle, PointerMonitor, SignalFlag};
use crate::server::CommandServer;
use crate::session::RuntimePaths;
use crate::uinput::{BackspaceInjector, VirtualKeyboard};

/// Parsed command line
#[derive(Debug, Default, PartialEq, Eq)]
struct Args {
    /// Target user (`-u`)
    user: Option<String>,
    /// Config file (`-c`)
    config: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
enum Action {
    Run(Args),
    Help,
    Version,
}

/// Parse arguments (without argv[0])
fn parse_args(args: &[String]) -> std::result::Result<Action, String> {
    let mut parsed = Args::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Action::Help),
            "-V" | "--version" => return Ok(Action::Version),
            "-u" | "--user" => {
                let user = iter.next().ok_or_else(|| format!("{} requires a username", arg))?;
                parsed.user = Some(user.clone());
            }
            "-c" | "--config" => {
                let path = iter.next().ok_or_else(|| format!("{} requires a path", arg))?;
                parsed.config = Some(PathBuf::from(path));
            }
            other => return Err(format!("Unknown argument: {}", other)),
        }
    }

    Ok(Action::Run(parsed))
}

/// Print help message
fn print_help() {
    println!(
        r#"vmk-helper {} - uinput backspace injection and click signalling for VMK

USAGE:
    vmk-helper [OPTIONS]

OPTIONS:
    -u, --user <NAME>       Serve this user's session (default: current user)
    -c, --config <PATH>     Config file (default: ~/.config/vmk-helper/config.toml,
                            then /etc/vmk-helper/config.toml)
    -h, --help              Print this help message
    -V, --version           Print version information

ENVIRONMENT:
    DATA_DIR                Runtime directory (default: /run/vmksocket-<user>)
    VMK_HELPER_CONFIG       Config file path
    RUST_LOG                Log level (default: info)

FILES:
    <runtime>/kb_socket     Command socket, accepts BACKSPACE_<n>
    <runtime>/.mouse_flag   Rewritten on every accepted mouse click
"#,
        env!("CARGO_PKG_VERSION")
    );
}

/// Start the click monitor unless disabled; failure is not fatal
fn start_monitor(cfg: &config::MonitorConfig, flag: SignalFlag) -> Option<MonitorHandle> {
    if !cfg.enabled {
        info!("Pointer monitor disabled by config");
        return None;
    }
    match PointerMonitor::new(cfg.clone(), flag).spawn() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Pointer monitor not started: {:#}", e);
            None
        }
    }
}

fn run(args: Args) -> Result<()> {
    let cfg = config::Config::load(args.config.as_deref());

    session::boost_process_priority(cfg.tuning.nice);
    session::pin_to_cpus(&cfg.tuning.cpu_affinity);

    let user = session::resolve_username(args.user.as_deref());
    let root = RuntimePaths::root_for(&user);
    let paths = RuntimePaths::provision(&root).context("Failed to set up runtime environment")?;
    info!("Target user: {} (runtime dir {})", user, paths.root.display());

    let flag = SignalFlag::new(&paths.mouse_flag);
    flag.clear()
        .with_context(|| format!("Failed to remove stale flag: {}", paths.mouse_flag.display()))?;

    session::setup_signal_handlers()?;

    let keyboard = VirtualKeyboard::try_create(&cfg.injector.device_name);
    let injector = BackspaceInjector::new(keyboard, &cfg.injector);

    let mut server = CommandServer::bind(&paths.socket, injector, &cfg.server)
        .context("Command server unavailable")?;

    let monitor = start_monitor(&cfg.monitor, flag);

    // Notify systemd that we're ready
    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Ready]);

    server.serve(session::shutdown_requested);

    let _ = sd_notify::notify(true, &[sd_notify::NotifyState::Stopping]);
    info!("Shutting down");

    if let Some(monitor) = monitor {
        monitor.shutdown();
    }
    drop(server);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args = match parse_args(&args) {
        Ok(Action::Run(args)) => args,
        Ok(Action::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Action::Version) => {
            println!("vmk-helper {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Err(msg) => {
            eprintln!("{}\n", msg);
            print_help();
            std::process::exit(2);
        }
    };

    info!("vmk-helper starting...");

    if let Err(e) = run(args) {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_args_runs_for_current_user() {
        assert_eq!(parse_args(&[]), Ok(Action::Run(Args::default())));
    }

    #[test]
    fn test_user_override() {
        let action = parse_args(&args(&["-u", "alice"])).unwrap();
        assert_eq!(
            action,
            Action::Run(Args {
                user: Some("alice".to_string()),
                config: None,
            })
        );
    }

    #[test]
    fn test_config_and_user_together() {
        let action = parse_args(&args(&["--config", "/tmp/c.toml", "--user", "bob"])).unwrap();
        assert_eq!(
            action,
            Action::Run(Args {
                user: Some("bob".to_string()),
                config: Some(PathBuf::from("/tmp/c.toml")),
            })
        );
    }

    #[test]
    fn test_missing_value_is_error() {
        assert!(parse_args(&args(&["-u"])).is_err());
        assert!(parse_args(&args(&["-c"])).is_err());
    }

    #[test]
    fn test_unknown_argument_is_error() {
        assert!(parse_args(&args(&["--frobnicate"])).is_err());
    }

    #[test]
    fn test_help_and_version() {
        assert_eq!(parse_args(&args(&["-h"])), Ok(Action::Help));
        assert_eq!(parse_args(&args(&["-u", "x", "--version"])), Ok(Action::Version));
    }
}
