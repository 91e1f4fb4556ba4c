// Time-windowed attendance verification: rotating per-minute secrets,
// server-recomputed tickets, first-writer-wins dedup per window.

pub mod audit;
pub mod error;
pub mod rotator;
pub mod seed;
#[cfg(feature = "service")]
pub mod service;
pub mod ticket;
pub mod verifier;
pub mod window;

pub use audit::{AuditLog, JsonlAuditLog, MemoryAuditLog, SubmissionRecord};
pub use error::{AuditError, SeedError, ServiceError};
pub use rotator::{RotatorHandle, WindowRotator, DEFAULT_ROTATION_PERIOD};
pub use seed::{OsEntropySource, SeedDraw, SeedSource};
pub use ticket::derive_ticket;
pub use verifier::{Outcome, Receipt, TicketVerifier};
pub use window::{AttendanceWindow, Clock, ManualClock, SystemClock, WindowDescriptor, WindowState};

/*
State rules:
- one current window, replaced wholesale on rotation
- seed source is only called by the rotator, outside the state lock
- audit writes happen after the accept decision, outside every lock
*/
