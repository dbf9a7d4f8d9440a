//! Password hashing for staff users
//!
//! Argon2id with a random 16-byte salt. Stored as
//! `argon2id$<base64 salt>$<base64 hash>`.

use base64::Engine;
use rand::Rng;

use crate::domain::result::{Error, Result};

const SCHEME: &str = "argon2id";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Argon2 cost parameters (OWASP minimums for interactive logins)
const MEMORY_COST_KIB: u32 = 19456;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

fn derive(password: &str, salt: &[u8]) -> Result<Vec<u8>> {
    let params = argon2::Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(HASH_LEN))
        .map_err(|e| Error::Other(format!("Failed to create argon2 params: {:?}", e)))?;
    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut hash = vec![0u8; HASH_LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut hash)
        .map_err(|e| Error::Other(format!("Failed to hash password: {:?}", e)))?;
    Ok(hash)
}

/// Hash a password with a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    if password.is_empty() {
        return Err(Error::validation("password cannot be empty"));
    }
    let salt: [u8; SALT_LEN] = rand::thread_rng().gen();
    let hash = derive(password, &salt)?;

    let engine = base64::engine::general_purpose::STANDARD;
    Ok(format!("{}${}${}", SCHEME, engine.encode(salt), engine.encode(hash)))
}

/// Check a password against a stored hash
///
/// Malformed stored values never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(SCHEME), Some(salt), Some(expected), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let engine = base64::engine::general_purpose::STANDARD;
    let (Ok(salt), Ok(expected)) = (engine.decode(salt), engine.decode(expected)) else {
        return false;
    };

    match derive(password, &salt) {
        Ok(actual) => constant_time_eq(&actual, &expected),
        Err(_) => false,
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let stored = hash_password("s3cret!").unwrap();
        assert!(stored.starts_with("argon2id$"));
        assert!(verify_password("s3cret!", &stored));
        assert!(!verify_password("s3cret", &stored));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "argon2id$notbase64$"));
        assert!(!verify_password("x", "bcrypt$AAAA$AAAA"));
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(hash_password(""), Err(Error::Validation(_))));
    }
}
