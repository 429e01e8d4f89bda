//! Click signal file
//!
//! The external consumer polls this file; every accepted click rewrites it
//! with a fixed marker. This process never reads it back.

use log::{debug, warn};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::constants::{MOUSE_FLAG_MARKER, WORLD_RW_MODE};

/// Signal file at a fixed path
#[derive(Debug, Clone)]
pub struct SignalFlag {
    path: PathBuf,
}

impl SignalFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove a flag left over from a previous run
    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Removed stale flag: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Overwrite the flag with the marker and make it world read/write
    ///
    /// Only the content write decides success; a failed chmod is logged.
    pub fn raise(&self) -> io::Result<()> {
        std::fs::write(&self.path, MOUSE_FLAG_MARKER)?;
        if let Err(e) =
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(WORLD_RW_MODE))
        {
            warn!("Failed to chmod {}: {}", self.path.display(), e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_overwrites_instead_of_appending() {
        let tmp = tempfile::tempdir().unwrap();
        let flag = SignalFlag::new(tmp.path().join(".mouse_flag"));
        std::fs::write(flag.path(), "stale content from before\n").unwrap();
        flag.raise().unwrap();
        flag.raise().unwrap();
        assert_eq!(std::fs::read_to_string(flag.path()).unwrap(), "Y=1\n");
    }

    #[test]
    fn test_raise_sets_world_rw() {
        let tmp = tempfile::tempdir().unwrap();
        let flag = SignalFlag::new(tmp.path().join(".mouse_flag"));
        flag.raise().unwrap();
        let mode = std::fs::metadata(flag.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o666);
    }

    #[test]
    fn test_clear_removes_and_tolerates_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let flag = SignalFlag::new(tmp.path().join(".mouse_flag"));
        flag.raise().unwrap();
        flag.clear().unwrap();
        assert!(!flag.path().exists());
        flag.clear().unwrap();
    }

    #[test]
    fn test_raise_fails_without_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let flag = SignalFlag::new(tmp.path().join("missing").join(".mouse_flag"));
        assert!(flag.raise().is_err());
    }
}
