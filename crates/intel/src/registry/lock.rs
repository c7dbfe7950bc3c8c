use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use tracing::warn;

use crate::registry::store::RegistryError;

/// Mutual exclusion over the registry. File-backed in production so the
/// guarantee holds across process boundaries; swappable for an in-memory
/// variant in single-process test runs.
pub trait LockService: Send + Sync {
    /// Records the caller as the exclusive owner, reclaiming stale
    /// markers left by dead processes. Fails with
    /// [`RegistryError::LockHeld`] when a live process owns the lock.
    fn try_acquire(&self) -> Result<(), RegistryError>;

    /// Idempotent; safe to call without a prior acquire.
    fn release(&self) -> Result<(), RegistryError>;

    fn is_owner_alive(&self, pid: i32) -> bool;
}

/// Lock marker file holding the owner's PID.
pub struct FileLock {
    marker: PathBuf,
}

impl FileLock {
    pub fn new(marker: impl Into<PathBuf>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    fn current_pid() -> i32 {
        std::process::id() as i32
    }
}

impl LockService for FileLock {
    fn try_acquire(&self) -> Result<(), RegistryError> {
        if let Some(parent) = self.marker.parent() {
            fs::create_dir_all(parent)?;
        }

        if self.marker.exists() {
            let owner = fs::read_to_string(&self.marker)
                .ok()
                .and_then(|raw| raw.trim().parse::<i32>().ok());

            match owner {
                Some(pid) if pid != Self::current_pid() && self.is_owner_alive(pid) => {
                    return Err(RegistryError::LockHeld { pid });
                }
                Some(pid) if pid != Self::current_pid() => {
                    warn!(pid, "reclaiming stale registry lock from dead process");
                    fs::remove_file(&self.marker)?;
                }
                // Unreadable marker or our own PID: overwrite below.
                _ => {}
            }
        }

        fs::write(&self.marker, Self::current_pid().to_string())?;
        Ok(())
    }

    fn release(&self) -> Result<(), RegistryError> {
        match fs::remove_file(&self.marker) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn is_owner_alive(&self, pid: i32) -> bool {
        // Signal 0 probes for existence. EPERM still means the process
        // exists, just under another user.
        match kill(Pid::from_raw(pid), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

/// Process-local lock for tests and embedded use.
#[derive(Default)]
pub struct MemoryLock {
    held: Mutex<bool>,
}

impl MemoryLock {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, bool> {
        self.held.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl LockService for MemoryLock {
    fn try_acquire(&self) -> Result<(), RegistryError> {
        let mut held = self.slot();
        if *held {
            return Err(RegistryError::LockHeld {
                pid: std::process::id() as i32,
            });
        }
        *held = true;
        Ok(())
    }

    fn release(&self) -> Result<(), RegistryError> {
        *self.slot() = false;
        Ok(())
    }

    fn is_owner_alive(&self, _pid: i32) -> bool {
        true
    }
}
