/// Single-use account tokens (email verification, password reset).
///
/// The plaintext token only ever leaves the server inside an email link. The
/// database stores its SHA-256 digest, so a leaked `users` table cannot be used
/// to verify accounts or reset passwords.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Random characters per token.
const TOKEN_LENGTH: usize = 43;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// A freshly minted token and the digest to persist.
#[derive(Debug, Clone)]
pub struct OneTimeToken {
    pub plaintext: String,
    pub digest: String,
}

impl OneTimeToken {
    /// Draws a URL-safe alphanumeric token from the thread RNG.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let plaintext: String = (0..TOKEN_LENGTH)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect();
        let digest = digest_token(&plaintext);

        Self { plaintext, digest }
    }
}

/// Hex SHA-256 of a presented token, for lookup against the stored digest.
pub fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
