//! Connectivity checks.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Reports whether the host currently has a network connection.
///
/// A `true` answer is only a hint; delivery can still fail.
pub trait Connectivity: Send + Sync + std::fmt::Debug {
    /// Whether the host looks online.
    fn is_online(&self) -> bool;
}

/// A shared on/off switch.
#[derive(Debug, Clone)]
pub struct ConnectivityFlag(Arc<AtomicBool>);

impl ConnectivityFlag {
    /// Create a flag in the given state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self(Arc::new(AtomicBool::new(online)))
    }

    /// Flip the flag. Every clone sees the change.
    pub fn set_online(&self, online: bool) {
        self.0.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for ConnectivityFlag {
    fn is_online(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reads interface state from sysfs.
///
/// The host is online when any interface other than loopback reports an
/// `operstate` of `up` or `unknown`. Where sysfs is missing the host is
/// assumed online.
#[derive(Debug, Clone)]
pub struct InterfaceConnectivity {
    root: PathBuf,
}

impl Default for InterfaceConnectivity {
    fn default() -> Self {
        Self::with_root("/sys/class/net")
    }
}

impl InterfaceConnectivity {
    /// Read interfaces from `root` instead of `/sys/class/net`.
    #[must_use]
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl Connectivity for InterfaceConnectivity {
    fn is_online(&self) -> bool {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return true;
        };

        entries.flatten().any(|entry| {
            if entry.file_name() == "lo" {
                return false;
            }
            std::fs::read_to_string(entry.path().join("operstate"))
                .is_ok_and(|state| matches!(state.trim(), "up" | "unknown"))
        })
    }
}
