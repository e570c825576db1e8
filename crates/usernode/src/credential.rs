//! Password securing.

use rand::{Rng, distr::Alphanumeric};
use sha2::{Digest, Sha256};

/// Length of passwords minted by [`generate_password`].
pub const GENERATED_PASSWORD_LEN: usize = 32;

/// Computes the stored form of `password`: SHA-256 over the password followed
/// by the service secret, as 64 lowercase hex characters.
///
/// # Example
/// ```
/// use usernode::secure;
///
/// let digest = secure("hunter2", "pepper");
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, secure("hunter2", "pepper"));
/// ```
#[inline]
pub fn secure(password: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns a random alphanumeric password for users created without one.
pub fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect()
}
