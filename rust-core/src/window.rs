// Attendance windows and the single shared "current window" cell.
// A window is replaced wholesale on rotation; the submission set lives inside
// the window so it can never outlive or predate its secret.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Placeholder printed instead of a secret in `Debug` output.
pub const REDACTED: &str = "<redacted>";

/// Length of one window in seconds.
pub const WINDOW_SECS: u64 = 60;

/// Whole-minute index since the Unix epoch.
pub fn window_id_at(now_secs: u64) -> u64 {
    now_secs / WINDOW_SECS
}

/// First second at which `window_id` is no longer current.
pub fn expires_at(window_id: u64) -> u64 {
    (window_id + 1) * WINDOW_SECS
}

/// Source of wall-clock seconds. Injected so rotation is testable.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(secs),
        }
    }

    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}

/// Public view of a window. Never carries the secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDescriptor {
    pub window_id: u64,
    pub expires_at: u64,
}

/// One rotating secret epoch.
pub struct AttendanceWindow {
    window_id: u64,
    secret: String,
    expires_at: u64,
    source_id: String,
    submitted_rolls: Mutex<HashSet<String>>,
}

impl AttendanceWindow {
    pub fn new(window_id: u64, secret: String, source_id: String) -> Self {
        Self {
            window_id,
            secret,
            expires_at: expires_at(window_id),
            source_id,
            submitted_rolls: Mutex::new(HashSet::new()),
        }
    }

    pub fn window_id(&self) -> u64 {
        self.window_id
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }

    pub fn descriptor(&self) -> WindowDescriptor {
        WindowDescriptor {
            window_id: self.window_id,
            expires_at: self.expires_at,
        }
    }

    pub fn has_submitted(&self, roll_no: &str) -> bool {
        self.rolls().contains(roll_no)
    }

    /// Record `roll_no` as accepted. Returns false if another submission got
    /// there first.
    pub(crate) fn try_commit(&self, roll_no: &str) -> bool {
        self.rolls().insert(roll_no.to_string())
    }

    pub fn submitted_count(&self) -> usize {
        self.rolls().len()
    }

    fn rolls(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A panicking holder cannot leave the set half-written.
        self.submitted_rolls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// Hand-written so the secret never reaches a log line.
impl fmt::Debug for AttendanceWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttendanceWindow")
            .field("window_id", &self.window_id)
            .field("secret", &REDACTED)
            .field("expires_at", &self.expires_at)
            .field("source_id", &self.source_id)
            .field("submitted", &self.submitted_count())
            .finish()
    }
}

/// Shared handle to the current window. Cloning shares the same cell.
#[derive(Clone, Debug, Default)]
pub struct WindowState {
    current: Arc<RwLock<Option<Arc<AttendanceWindow>>>>,
}

impl WindowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current window. Returns the window that was discarded.
    pub fn publish(&self, window: AttendanceWindow) -> Option<Arc<AttendanceWindow>> {
        let mut slot = self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        slot.replace(Arc::new(window))
    }

    /// Point-in-time snapshot; later rotations do not affect it.
    pub fn current(&self) -> Option<Arc<AttendanceWindow>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn descriptor(&self) -> Option<WindowDescriptor> {
        self.current().map(|w| w.descriptor())
    }
}
