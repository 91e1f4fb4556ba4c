//! Seed sources for window secrets.
//!
//! A seed source is asked for a new secret once per rotation. Secrets have
//! the shape of a short mnemonic: the first nine uppercase hex characters of
//! a SHA-256 digest over raw entropy.

use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::SeedError;
use crate::window::REDACTED;

/// Characters kept from the entropy digest.
pub const SECRET_LEN: usize = 9;

/// Provenance tag for secrets minted by [`fallback_secret`].
pub const FALLBACK_SOURCE_ID: &str = "fallback-error";

/// A secret together with where it came from.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedDraw {
    pub secret: String,
    /// Free-form provenance, e.g. a remote job id or `os-entropy`.
    pub source_id: String,
}

impl fmt::Debug for SeedDraw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedDraw")
            .field("secret", &REDACTED)
            .field("source_id", &self.source_id)
            .finish()
    }
}

/// Produces an unpredictable secret on demand. May be slow or fail.
pub trait SeedSource: Send + Sync {
    fn obtain_secret(&self) -> Result<SeedDraw, SeedError>;
}

/// Draws 32 bytes from the operating system RNG.
#[derive(Clone, Copy, Debug, Default)]
pub struct OsEntropySource;

impl SeedSource for OsEntropySource {
    fn obtain_secret(&self) -> Result<SeedDraw, SeedError> {
        let mut buf = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| SeedError::Unavailable {
                reason: e.to_string(),
            })?;
        Ok(SeedDraw {
            secret: mnemonic_from_entropy(&buf),
            source_id: "os-entropy".to_string(),
        })
    }
}

/// Local replacement used when the configured source fails.
pub fn fallback_secret() -> SeedDraw {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    SeedDraw {
        secret: mnemonic_from_entropy(&buf),
        source_id: FALLBACK_SOURCE_ID.to_string(),
    }
}

/// Hash raw entropy down to a secret of [`SECRET_LEN`] uppercase hex chars.
pub fn mnemonic_from_entropy(entropy: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(entropy);
    hex::encode_upper(h.finalize())[..SECRET_LEN].to_string()
}

/// Rejects empty or whitespace-only secrets coming back from a source.
pub(crate) fn check_draw(draw: SeedDraw) -> Result<SeedDraw, SeedError> {
    if draw.secret.trim().is_empty() {
        return Err(SeedError::Unusable {
            reason: format!("empty secret from {}", draw.source_id),
        });
    }
    Ok(draw)
}
