//! Host-local guard that keeps a second fetch process from starting.
//!
//! The marker file holds the owner's PID as decimal text. It is staged in a
//! temporary file and linked into place, so it never exists without its PID.
//! A marker naming a process that is gone is stale and gets reclaimed, so a
//! crashed fetcher does not need manual cleanup. A marker without a readable
//! PID was not written by us and is left alone.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::{Error, Result};

const LOCK_OWNER: &str = "fetch process";

/// Markers held by this process. A marker naming our own PID is only live
/// if it is listed here; otherwise it was left by an earlier process that
/// happened to get the same PID.
static HELD_MARKERS: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

fn held_markers() -> std::sync::MutexGuard<'static, Vec<PathBuf>> {
    HELD_MARKERS.lock().unwrap_or_else(|e| e.into_inner())
}

enum Marker {
    Missing,
    Live(u32),
    Stale(u32),
    Unreadable,
}

/// Single-instance lock backed by a PID marker file
#[derive(Debug)]
pub struct SingletonLock {
    path: PathBuf,
    held: bool,
}

impl Default for SingletonLock {
    fn default() -> Self {
        Self::new(Self::default_path())
    }
}

impl SingletonLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            held: false,
        }
    }

    /// Well-known marker location shared by every feedhub process on the host
    pub fn default_path() -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("feedhub")
            .join("fetch.lock")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Take the lock, writing the current PID into the marker.
    ///
    /// Fails with [`Error::AlreadyRunning`] while another live process owns
    /// the marker, or when the marker has no readable PID.
    pub fn acquire(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // One retry after reclaiming a stale marker
        for _ in 0..2 {
            match self.publish_marker() {
                Ok(()) => {
                    held_markers().push(self.path.clone());
                    self.held = true;
                    debug!(path = %self.path.display(), pid = std::process::id(), "Lock acquired");
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            match self.inspect() {
                Marker::Live(pid) => {
                    return Err(Error::AlreadyRunning(format!("{} (PID {})", LOCK_OWNER, pid)));
                }
                Marker::Unreadable => {
                    return Err(Error::AlreadyRunning(format!(
                        "{} (lock file {} has no PID; remove it if no fetch process is running)",
                        LOCK_OWNER,
                        self.path.display()
                    )));
                }
                Marker::Stale(pid) => {
                    warn!(path = %self.path.display(), pid, "Reclaiming stale lock file");
                    // Only remove the marker we judged stale, not a fresh one
                    if self.holder() == Some(pid) {
                        remove_if_present(&self.path)?;
                    }
                }
                Marker::Missing => {}
            }
        }

        Err(Error::AlreadyRunning(LOCK_OWNER.to_string()))
    }

    /// Delete the marker. No ownership check is made; a missing marker is fine.
    pub fn release(&mut self) -> Result<()> {
        remove_if_present(&self.path)?;
        self.forget();
        debug!(path = %self.path.display(), "Lock released");
        Ok(())
    }

    /// PID recorded in the marker, if it exists and is readable
    pub fn holder(&self) -> Option<u32> {
        let contents = fs::read_to_string(&self.path).ok()?;
        contents.trim().parse().ok()
    }

    /// PID recorded in the marker, if that process is still alive
    pub fn live_holder(&self) -> Option<u32> {
        match self.inspect() {
            Marker::Live(pid) => Some(pid),
            _ => None,
        }
    }

    fn inspect(&self) -> Marker {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Marker::Missing,
            Err(_) => return Marker::Unreadable,
        };

        let Ok(pid) = contents.trim().parse::<u32>() else {
            return Marker::Unreadable;
        };

        let alive = if pid == std::process::id() {
            held_markers().contains(&self.path)
        } else {
            is_process_alive(pid)
        };

        if alive {
            Marker::Live(pid)
        } else {
            Marker::Stale(pid)
        }
    }

    fn publish_marker(&self) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut staged = NamedTempFile::new_in(dir)?;
        write!(staged, "{}", std::process::id())?;
        staged.as_file().sync_all()?;

        staged
            .persist_noclobber(&self.path)
            .map(|_| ())
            .map_err(|e| e.error)
    }

    fn forget(&mut self) {
        held_markers().retain(|p| p != &self.path);
        self.held = false;
    }
}

impl Drop for SingletonLock {
    fn drop(&mut self) {
        if self.held {
            let _ = fs::remove_file(&self.path);
            self.forget();
        }
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn is_process_alive(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    // 0 and negative values address process groups, never a single owner
    let raw = match i32::try_from(pid) {
        Ok(raw) if raw > 0 => raw,
        _ => return false,
    };

    // Signal 0 only checks for existence; EPERM means it exists but is not ours
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_process_alive(_pid: u32) -> bool {
    true
}
