use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

/// Verification tokens ride in a 24-hour email link.
pub const VERIFY_EMAIL_TTL: Duration = Duration::hours(24);
/// Reset tokens are short-lived.
pub const RESET_PASSWORD_TTL: Duration = Duration::minutes(15);

const TOKEN_BYTES: usize = 20;

/// A freshly issued opaque token. `plaintext` goes into the outbound email
/// link and is never stored; only `hash` is persisted.
pub struct IssuedToken {
    pub plaintext: String,
    pub hash: String,
    pub expires_at: OffsetDateTime,
}

pub fn issue(ttl: Duration) -> IssuedToken {
    let mut buf = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut buf);
    let plaintext = hex::encode(buf);
    let hash = hash_token(&plaintext);
    IssuedToken {
        plaintext,
        hash,
        expires_at: OffsetDateTime::now_utc() + ttl,
    }
}

/// Deterministic one-way digest of the plaintext token, hex-encoded.
pub fn hash_token(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}

/// True when the presented token matches the stored hash and has not expired.
pub fn verify(
    presented: &str,
    stored_hash: &str,
    expires_at: OffsetDateTime,
    now: OffsetDateTime,
) -> bool {
    now < expires_at && eq_constant_time(hash_token(presented).as_bytes(), stored_hash.as_bytes())
}

// Fixed-time comparison over equal-length inputs; digests are fixed-length,
// so the early length check leaks nothing about the token value.
fn eq_constant_time(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
