// Ticket derivation: UppercaseHex(SHA256(secret || roll || window_id))[..9].
// Inputs are expected to be normalized already; see `normalize`.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
pub const TICKET_LEN: usize = 9;

/// Trim surrounding whitespace and uppercase. Used for roll numbers and
/// submitted tickets alike.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Expected ticket for `roll_no` in window `window_id` under `secret`.
///
/// The hash input is the plain concatenation of the secret, the roll number
/// and the decimal window id, with no separators.
pub fn derive_ticket(secret: &str, roll_no: &str, window_id: u64) -> String {
    let mut h = Sha256::new();
    h.update(secret.as_bytes());
    h.update(roll_no.as_bytes());
    h.update(window_id.to_string().as_bytes());
    let digest = hex::encode_upper(h.finalize());
    digest[..TICKET_LEN].to_string()
}

/// One-way fingerprint of a window secret, safe to hand to the audit log.
pub fn secret_fingerprint(secret: &str) -> String {
    let mut h = Sha256::new();
    h.update(secret.as_bytes());
    hex::encode(h.finalize())
}
