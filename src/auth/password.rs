//! Salted PBKDF2-HMAC-SHA256 password hashes in PHC string format.
//!
//! Stored form: `$pbkdf2-sha256$i=<rounds>,l=32$<salt>$<hash>`. The round
//! count travels with each hash, so changing `auth.hash_iterations` only
//! affects newly registered users.

use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};

use super::AuthError;

pub fn hash_password(password: &str, iterations: u32) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let params = Params {
        rounds: iterations,
        output_length: 32,
    };
    let hash = Pbkdf2
        .hash_password_customized(password.as_bytes(), None, None, params, &salt)
        .map_err(|e| AuthError::Storage(format!("password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

/// Check `password` against a stored hash. Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Pbkdf2.verify_password(password.as_bytes(), &parsed).is_ok()
}
