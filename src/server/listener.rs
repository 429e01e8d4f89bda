//! Command socket listener
//!
//! Bound once at startup (stale socket file removed first), made
//! world read/write, listened on with a small backlog. Each accepted
//! connection gets exactly one read; the reply is always silence.

use anyhow::{Context, Result};
use log::{debug, info};
use nix::errno::Errno;
use nix::sys::socket::{
    accept4, bind, listen, socket, AddressFamily, SockFlag, SockType, UnixAddr,
};
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::command::{parse_command, Command};
use crate::config::ServerConfig;
use crate::constants::{COMMAND_BUFFER_SIZE, LISTEN_BACKLOG, WORLD_RW_MODE};
use crate::uinput::{BackspaceInjector, EventSink};

/// Sequential command server owning the injector
pub struct CommandServer<S: EventSink> {
    listener: UnixListener,
    path: PathBuf,
    injector: BackspaceInjector<S>,
    read_timeout: Option<Duration>,
}

impl<S: EventSink> CommandServer<S> {
    /// Bind the command socket at `path`
    ///
    /// Any failure here means the helper cannot serve requests at all.
    pub fn bind(path: &Path, injector: BackspaceInjector<S>, config: &ServerConfig) -> Result<Self> {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed stale socket: {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to remove stale socket: {}", path.display()))
            }
        }

        let fd = socket(
            AddressFamily::Unix,
            SockType::Stream,
            SockFlag::SOCK_CLOEXEC,
            None,
        )
        .context("Failed to create unix socket")?;

        let addr = UnixAddr::new(path)
            .with_context(|| format!("Invalid socket path: {}", path.display()))?;
        bind(fd.as_raw_fd(), &addr)
            .with_context(|| format!("Failed to bind {}", path.display()))?;

        std::fs::set_permissions(path, std::fs::Permissions::from_mode(WORLD_RW_MODE))
            .with_context(|| format!("Failed to chmod {}", path.display()))?;

        listen(&fd, LISTEN_BACKLOG)
            .with_context(|| format!("Failed to listen on {}", path.display()))?;

        info!(
            "Command socket listening: {} (injection {})",
            path.display(),
            if injector.is_active() { "enabled" } else { "disabled" }
        );

        Ok(Self {
            listener: UnixListener::from(fd),
            path: path.to_path_buf(),
            injector,
            read_timeout: config.read_timeout(),
        })
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept and serve connections until `shutdown` returns true
    ///
    /// `shutdown` is checked before every accept and whenever accept is
    /// interrupted by a signal.
    pub fn serve(&mut self, shutdown: impl Fn() -> bool) {
        while !shutdown() {
            match self.accept_one() {
                Ok(()) | Err(Errno::EINTR) => {}
                Err(e) => debug!("accept failed: {}", e),
            }
        }
        info!("Command server stopped");
    }

    /// Block for one connection and serve it
    ///
    /// EINTR is returned to the caller rather than retried.
    pub fn accept_one(&mut self) -> std::result::Result<(), Errno> {
        let fd = accept4(self.listener.as_raw_fd(), SockFlag::SOCK_CLOEXEC)?;
        let stream = unsafe { UnixStream::from_raw_fd(fd) };
        self.handle_connection(stream);
        Ok(())
    }

    /// Read a single command and dispatch it; the stream closes on return
    fn handle_connection(&mut self, mut stream: UnixStream) {
        if let Err(e) = stream.set_read_timeout(self.read_timeout) {
            debug!("set_read_timeout failed: {}", e);
        }

        let mut buf = [0u8; COMMAND_BUFFER_SIZE];
        let n = match stream.read(&mut buf[..COMMAND_BUFFER_SIZE - 1]) {
            Ok(0) => return,
            Ok(n) => n,
            Err(e) => {
                debug!("Command read failed: {}", e);
                return;
            }
        };

        match parse_command(&buf[..n]) {
            Ok(Command::Backspace(count)) => {
                debug!("BACKSPACE request: {}", count);
                self.injector.inject_backspace(count);
            }
            Err(e) => debug!("Ignored payload: {}", e),
        }
    }
}

impl<S: EventSink> Drop for CommandServer<S> {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InjectorConfig;
    use evdev::{EventType, InputEvent, Key};
    use nix::sys::pthread::{pthread_kill, pthread_self};
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Shares recorded key values (1 = down, 0 = up) with the test body
    #[derive(Clone, Default)]
    struct SharedSink(Arc<Mutex<Vec<i32>>>);

    impl EventSink for SharedSink {
        fn emit(&mut self, events: &[InputEvent]) -> std::io::Result<()> {
            let mut recorded = self.0.lock().unwrap();
            for event in events {
                assert_eq!(event.event_type(), EventType::KEY);
                assert_eq!(event.code(), Key::KEY_BACKSPACE.code());
                recorded.push(event.value());
            }
            Ok(())
        }
    }

    impl SharedSink {
        fn presses(&self) -> usize {
            self.0.lock().unwrap().iter().filter(|v| **v == 1).count()
        }

        fn len(&self) -> usize {
            self.0.lock().unwrap().len()
        }
    }

    fn server(dir: &Path, sink: Option<SharedSink>) -> CommandServer<SharedSink> {
        let config = InjectorConfig {
            inter_key_delay_us: 0,
            ..InjectorConfig::default()
        };
        let injector = BackspaceInjector::new(sink, &config);
        CommandServer::bind(&dir.join("kb_socket"), injector, &ServerConfig::default()).unwrap()
    }

    /// Connect, send `payload`, let the server handle it, return the reply
    fn round_trip(server: &mut CommandServer<SharedSink>, payload: &[u8]) -> Vec<u8> {
        let mut client = UnixStream::connect(server.path()).unwrap();
        client.write_all(payload).unwrap();
        server.accept_one().unwrap();
        let mut reply = Vec::new();
        client.read_to_end(&mut reply).unwrap();
        reply
    }

    #[test]
    fn test_backspace_command_injects_and_closes_silently() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SharedSink::default();
        let mut server = server(tmp.path(), Some(sink.clone()));

        let reply = round_trip(&mut server, b"BACKSPACE_3");
        assert!(reply.is_empty());
        assert_eq!(sink.presses(), 3);
        assert_eq!(sink.len(), 6);
    }

    #[test]
    fn test_large_request_is_clamped() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SharedSink::default();
        let mut server = server(tmp.path(), Some(sink.clone()));

        assert!(round_trip(&mut server, b"BACKSPACE_999").is_empty());
        assert_eq!(sink.presses(), 10);
    }

    #[test]
    fn test_unknown_and_invalid_payloads_do_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SharedSink::default();
        let mut server = server(tmp.path(), Some(sink.clone()));

        let payloads: [&[u8]; 4] = [b"PING", b"BACKSPACE_abc", b"BACKSPACE_0", b"BACKSPACE_-4"];
        for payload in payloads {
            assert!(round_trip(&mut server, payload).is_empty());
        }
        assert_eq!(sink.len(), 0);
    }

    #[test]
    fn test_connections_are_independent() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SharedSink::default();
        let mut server = server(tmp.path(), Some(sink.clone()));

        round_trip(&mut server, b"BACKSPACE_2");
        round_trip(&mut server, b"garbage");
        round_trip(&mut server, b"BACKSPACE_1\n");
        assert_eq!(sink.presses(), 3);
    }

    #[test]
    fn test_client_closing_without_data() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SharedSink::default();
        let mut server = server(tmp.path(), Some(sink.clone()));

        drop(UnixStream::connect(server.path()).unwrap());
        server.accept_one().unwrap();
        assert_eq!(sink.len(), 0);
    }

    #[test]
    fn test_inert_injector_still_serves() {
        let tmp = tempfile::tempdir().unwrap();
        let mut server = server(tmp.path(), None);
        assert!(round_trip(&mut server, b"BACKSPACE_3").is_empty());
    }

    #[test]
    fn test_socket_is_world_rw_and_replaces_stale_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("kb_socket");
        std::fs::write(&path, b"stale").unwrap();

        let server = server(tmp.path(), None);
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o666);

        drop(server);
        assert!(!path.exists());
    }

    #[test]
    fn test_bind_fails_without_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing").join("kb_socket");
        let injector: BackspaceInjector<SharedSink> =
            BackspaceInjector::new(None, &InjectorConfig::default());
        assert!(CommandServer::bind(&path, injector, &ServerConfig::default()).is_err());
    }

    #[test]
    fn test_read_timeout_unblocks_silent_client() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SharedSink::default();
        let injector = BackspaceInjector::new(Some(sink.clone()), &InjectorConfig::default());
        let config = ServerConfig { read_timeout_ms: 20 };
        let mut server =
            CommandServer::bind(&tmp.path().join("kb_socket"), injector, &config).unwrap();

        let _client = UnixStream::connect(server.path()).unwrap();
        server.accept_one().unwrap();
        assert_eq!(sink.len(), 0);
    }

    #[test]
    fn test_serve_stops_on_shutdown() {
        let tmp = tempfile::tempdir().unwrap();
        let mut server = server(tmp.path(), None);
        server.serve(|| true);
    }

    #[test]
    fn test_serve_rechecks_flag_after_each_connection() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = SharedSink::default();
        let mut server = server(tmp.path(), Some(sink.clone()));

        let mut client = UnixStream::connect(server.path()).unwrap();
        client.write_all(b"BACKSPACE_2").unwrap();

        let checks = std::cell::Cell::new(0);
        server.serve(|| {
            checks.set(checks.get() + 1);
            checks.get() > 1
        });
        assert_eq!(checks.get(), 2);
        assert_eq!(sink.presses(), 2);
    }

    static INTERRUPTS: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn count_interrupt(_signo: libc::c_int) {
        INTERRUPTS.fetch_add(1, Ordering::Relaxed);
    }

    #[test]
    fn test_interrupted_accept_returns_to_flag_check() {
        let tmp = tempfile::tempdir().unwrap();
        let mut server = server(tmp.path(), None);

        let action = SigAction::new(
            SigHandler::Handler(count_interrupt),
            SaFlags::empty(),
            SigSet::empty(),
        );
        unsafe { sigaction(Signal::SIGUSR1, &action) }.unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let served = Arc::new(AtomicBool::new(false));
        let target = pthread_self();
        let interrupter = {
            let stop = stop.clone();
            let served = served.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                stop.store(true, Ordering::Relaxed);
                // Keep interrupting until the loop notices
                while !served.load(Ordering::Relaxed) {
                    pthread_kill(target, Signal::SIGUSR1).unwrap();
                    std::thread::sleep(Duration::from_millis(10));
                }
            })
        };

        server.serve(|| stop.load(Ordering::Relaxed));
        served.store(true, Ordering::Relaxed);
        interrupter.join().unwrap();
        assert!(INTERRUPTS.load(Ordering::Relaxed) >= 1);
    }
}
