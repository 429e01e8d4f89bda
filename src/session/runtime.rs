//! Runtime directory management
//!
//! The socket and the click flag live in one per-user directory,
//! `/run/vmksocket-<user>` unless `DATA_DIR` points elsewhere.
//! Paths are derived once at startup and never change afterwards.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::ffi::OsString;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::constants::{
    DATA_DIR_ENV, MOUSE_FLAG_FILE_NAME, RUNTIME_DIR_PREFIX, SOCKET_FILE_NAME, WORLD_RWX_MODE,
};

/// Resolve the user whose session the helper serves
///
/// An explicit `-u` value wins; otherwise the real uid is looked up in the
/// password database.
pub fn resolve_username(override_user: Option<&str>) -> String {
    if let Some(name) = override_user {
        return name.to_string();
    }

    match nix::unistd::User::from_uid(nix::unistd::getuid()) {
        Ok(Some(user)) => user.name,
        Ok(None) => {
            warn!("No passwd entry for uid {}", nix::unistd::getuid());
            "unknown".to_string()
        }
        Err(e) => {
            warn!("getpwuid failed: {}", e);
            "unknown".to_string()
        }
    }
}

/// Paths derived from the runtime directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Runtime directory root
    pub root: PathBuf,
    /// Command socket (`<root>/kb_socket`)
    pub socket: PathBuf,
    /// Click signal file (`<root>/.mouse_flag`)
    pub mouse_flag: PathBuf,
}

impl RuntimePaths {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            socket: root.join(SOCKET_FILE_NAME),
            mouse_flag: root.join(MOUSE_FLAG_FILE_NAME),
            root,
        }
    }

    /// Runtime directory for `user`, honouring the `DATA_DIR` override
    pub fn root_for(user: &str) -> PathBuf {
        Self::root_from_env(user, std::env::var_os(DATA_DIR_ENV))
    }

    fn root_from_env(user: &str, data_dir: Option<OsString>) -> PathBuf {
        match data_dir {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => PathBuf::from(format!("{}{}", RUNTIME_DIR_PREFIX, user)),
        }
    }

    /// Create the runtime directory if needed and return the derived paths
    ///
    /// A freshly created directory is made world-accessible so the
    /// unprivileged input method can reach the socket. An existing directory
    /// is used as-is.
    pub fn provision(root: &Path) -> Result<Self> {
        if !root.exists() {
            std::fs::create_dir_all(root)
                .with_context(|| format!("Failed to create runtime dir: {}", root.display()))?;
            std::fs::set_permissions(root, std::fs::Permissions::from_mode(WORLD_RWX_MODE))
                .with_context(|| format!("Failed to chmod runtime dir: {}", root.display()))?;
            info!("Runtime dir created: {}", root.display());
        } else if !root.is_dir() {
            anyhow::bail!("Runtime path is not a directory: {}", root.display());
        } else {
            debug!("Runtime dir exists: {}", root.display());
        }

        Ok(Self::from_root(root))
    }
}
