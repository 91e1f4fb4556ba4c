// Ticket verification against a single point-in-time window snapshot.
//
// Order of checks: normalize -> snapshot -> duplicate -> recompute -> commit.
// The commit targets the snapshot that was matched, so a rotation in between
// can never move a roll into the wrong window's set.

use crate::audit::{AuditLog, SubmissionRecord};
use crate::ticket::{derive_ticket, normalize, secret_fingerprint};
use crate::window::WindowState;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Client address recorded when the transport does not supply one.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Returned with an accepted submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub roll_no: String,
    pub window_id: u64,
    pub timestamp: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Accepted(Receipt),
    /// Roll already accepted in this window.
    Duplicate,
    /// Ticket does not match.
    Rejected,
    /// No window has been published yet.
    NotReady,
    /// Roll number or ticket missing after trimming.
    Malformed(&'static str),
}

impl Outcome {
    /// Conventional HTTP status for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Outcome::Accepted(_) => 200,
            Outcome::Duplicate => 409,
            Outcome::Rejected | Outcome::Malformed(_) => 400,
            Outcome::NotReady => 503,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    pub fn message(&self) -> &'static str {
        match self {
            Outcome::Accepted(_) => "Attendance recorded successfully",
            Outcome::Duplicate => "Attendance already recorded for this window",
            Outcome::Rejected => "Invalid or expired ticket",
            Outcome::NotReady => "No attendance window is open yet",
            Outcome::Malformed(reason) => *reason,
        }
    }
}

#[derive(Clone)]
pub struct TicketVerifier {
    state: WindowState,
    audit: Arc<dyn AuditLog>,
}

impl TicketVerifier {
    pub fn new(state: WindowState, audit: Arc<dyn AuditLog>) -> Self {
        Self { state, audit }
    }

    pub fn verify(&self, roll_no: &str, ticket: &str) -> Outcome {
        self.verify_from(roll_no, ticket, UNKNOWN_CLIENT)
    }

    pub fn verify_from(&self, roll_no: &str, ticket: &str, client_address: &str) -> Outcome {
        let roll_no = normalize(roll_no);
        let ticket = normalize(ticket);
        if roll_no.is_empty() || ticket.is_empty() {
            return Outcome::Malformed("Missing required fields: roll_no and ticket are required");
        }

        let Some(window) = self.state.current() else {
            return Outcome::NotReady;
        };
        let window_id = window.window_id();

        if window.has_submitted(&roll_no) {
            debug!(window_id, roll_no = %roll_no, "duplicate submission");
            return Outcome::Duplicate;
        }

        if ticket != derive_ticket(window.secret(), &roll_no, window_id) {
            debug!(window_id, roll_no = %roll_no, "ticket rejected");
            return Outcome::Rejected;
        }

        // First writer wins; concurrent losers see a duplicate.
        if !window.try_commit(&roll_no) {
            debug!(window_id, roll_no = %roll_no, "lost commit race");
            return Outcome::Duplicate;
        }

        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let record = SubmissionRecord {
            timestamp: timestamp.clone(),
            roll_no: roll_no.clone(),
            ticket,
            window_id,
            secret_fingerprint: secret_fingerprint(window.secret()),
            client_address: client_address.to_string(),
        };
        drop(window);

        if let Err(e) = self.audit.record(&record) {
            warn!(window_id, roll_no = %roll_no, error = %e, "audit log write failed; acceptance stands");
        }
        debug!(window_id, roll_no = %roll_no, "submission accepted");

        Outcome::Accepted(Receipt {
            roll_no,
            window_id,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::error::AuditError;
    use crate::window::AttendanceWindow;
    use std::sync::Barrier;
    use std::thread;

    struct FailingLog;

    impl AuditLog for FailingLog {
        fn record(&self, _entry: &SubmissionRecord) -> Result<(), AuditError> {
            Err(AuditError::Rejected {
                reason: "sheet not shared".into(),
            })
        }
    }

    fn setup(secret: &str, window_id: u64) -> (TicketVerifier, WindowState, Arc<MemoryAuditLog>) {
        let state = WindowState::new();
        state.publish(AttendanceWindow::new(window_id, secret.into(), "test".into()));
        let log = Arc::new(MemoryAuditLog::new());
        let verifier = TicketVerifier::new(state.clone(), log.clone());
        (verifier, state, log)
    }

    #[test]
    fn not_ready_before_first_window() {
        let verifier = TicketVerifier::new(WindowState::new(), Arc::new(MemoryAuditLog::new()));
        assert_eq!(verifier.verify("S1", "ABCDEF123"), Outcome::NotReady);
        assert_eq!(Outcome::NotReady.status_code(), 503);
    }

    #[test]
    fn malformed_when_fields_blank() {
        let (verifier, _, log) = setup("ABC123", 1);
        assert!(matches!(verifier.verify("  ", "ABC"), Outcome::Malformed(_)));
        assert!(matches!(verifier.verify("S1", ""), Outcome::Malformed(_)));
        assert!(log.is_empty());
    }

    #[test]
    fn accepts_once_then_duplicate() {
        let (verifier, _, log) = setup("ABC123", 29_123_456);
        let ticket = derive_ticket("ABC123", "S1", 29_123_456);

        let first = verifier.verify_from("s1", &ticket.to_lowercase(), "10.0.0.7:4242");
        let receipt = match first {
            Outcome::Accepted(receipt) => receipt,
            other => panic!("expected acceptance, got {other:?}"),
        };
        assert_eq!(receipt.roll_no, "S1");
        assert_eq!(receipt.window_id, 29_123_456);

        assert_eq!(verifier.verify(" S1 ", &ticket), Outcome::Duplicate);
        // Duplicates short-circuit before the ticket is checked.
        assert_eq!(verifier.verify("S1", "WRONG"), Outcome::Duplicate);

        let records = log.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].roll_no, "S1");
        assert_eq!(records[0].ticket, ticket);
        assert_eq!(records[0].client_address, "10.0.0.7:4242");
        assert_eq!(records[0].secret_fingerprint, secret_fingerprint("ABC123"));
        assert_ne!(records[0].secret_fingerprint, "ABC123");
    }

    #[test]
    fn wrong_ticket_rejected_without_commit() {
        let (verifier, state, log) = setup("ABC123", 5);
        let other_roll = derive_ticket("ABC123", "S2", 5);
        assert_eq!(verifier.verify("S1", &other_roll), Outcome::Rejected);
        assert_eq!(Outcome::Rejected.status_code(), 400);
        assert_eq!(state.current().expect("window").submitted_count(), 0);
        assert!(log.is_empty());

        // A rejection does not burn the roll for the rest of the window.
        let good = derive_ticket("ABC123", "S1", 5);
        assert!(verifier.verify("S1", &good).is_accepted());
    }

    #[test]
    fn ticket_from_previous_window_rejected() {
        let (verifier, state, _) = setup("AAA111", 100);
        let old = derive_ticket("AAA111", "S1", 100);

        state.publish(AttendanceWindow::new(101, "BBB222".into(), "test".into()));
        assert_eq!(verifier.verify("S1", &old), Outcome::Rejected);

        let fresh = derive_ticket("BBB222", "S1", 101);
        assert!(verifier.verify("S1", &fresh).is_accepted());
    }

    #[test]
    fn audit_failure_keeps_acceptance() {
        let state = WindowState::new();
        state.publish(AttendanceWindow::new(9, "ABC123".into(), "test".into()));
        let verifier = TicketVerifier::new(state, Arc::new(FailingLog));

        let ticket = derive_ticket("ABC123", "S9", 9);
        assert!(verifier.verify("S9", &ticket).is_accepted());
        assert_eq!(verifier.verify("S9", &ticket), Outcome::Duplicate);
    }

    #[test]
    fn concurrent_submissions_single_winner() {
        const N: usize = 16;
        let (verifier, _, log) = setup("RACE01", 42);
        let ticket = derive_ticket("RACE01", "S7", 42);
        let barrier = Arc::new(Barrier::new(N));

        let handles: Vec<_> = (0..N)
            .map(|_| {
                let verifier = verifier.clone();
                let ticket = ticket.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    verifier.verify("S7", &ticket)
                })
            })
            .collect();

        let outcomes: Vec<Outcome> = handles
            .into_iter()
            .map(|h| h.join().expect("verifier thread"))
            .collect();

        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        let duplicate = outcomes.iter().filter(|o| **o == Outcome::Duplicate).count();
        assert_eq!(accepted, 1);
        assert_eq!(duplicate, N - 1);
        assert_eq!(log.len(), 1);
    }
}
