/// Password hashing with Argon2id.
///
/// Hashes are PHC strings (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`), so the
/// cost parameters and the per-password salt travel with the digest and
/// verification needs nothing but the stored string. Raising [`HashCost`]
/// affects new hashes only; existing ones keep verifying with the cost they
/// were created with.
///
/// Argon2 is deliberately slow. Request handlers should call the `_blocking`
/// wrappers, which move the work onto tokio's blocking pool.
///
/// # Example
///
/// ```
/// use crm_shared::auth::password::{hash_password_with, verify_password, HashCost};
///
/// let cost = HashCost { memory_kib: 1024, iterations: 1, parallelism: 1 };
/// let hash = hash_password_with("hunter2!", &cost).unwrap();
/// assert!(verify_password("hunter2!", &hash).unwrap());
/// assert!(!verify_password("hunter3!", &hash).unwrap());
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Output length of the raw Argon2 digest in bytes.
const DIGEST_LEN: usize = 32;

/// Errors from hashing or verifying a password.
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(String),

    #[error("Failed to verify password: {0}")]
    Verify(String),

    #[error("Password worker failed: {0}")]
    Worker(String),
}

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory per hash in KiB
    pub memory_kib: u32,
    /// Passes over memory
    pub iterations: u32,
    /// Parallel lanes
    pub parallelism: u32,
}

impl Default for HashCost {
    /// 64 MiB, 3 passes, 4 lanes.
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl HashCost {
    fn hasher(&self) -> Result<Argon2<'static>, PasswordError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(DIGEST_LEN),
        )
        .map_err(|e| PasswordError::Hash(format!("invalid cost parameters: {}", e)))?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// Hashes `password` with the default [`HashCost`] and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    hash_password_with(password, &HashCost::default())
}

/// Hashes `password` with an explicit cost and a fresh random salt.
pub fn hash_password_with(password: &str, cost: &HashCost) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    cost.hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Checks `password` against a stored PHC string.
///
/// Returns `Ok(false)` for a wrong password. The comparison inside argon2 is
/// constant-time.
///
/// # Errors
///
/// Returns [`PasswordError::MalformedHash`] if `hash` is not a PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::MalformedHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::Verify(e.to_string())),
    }
}

/// [`hash_password_with`] on the blocking thread pool.
pub async fn hash_password_blocking(password: String, cost: HashCost) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password_with(&password, &cost))
        .await
        .map_err(|e| PasswordError::Worker(e.to_string()))?
}

/// [`verify_password`] on the blocking thread pool.
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::Worker(e.to_string()))?
}
