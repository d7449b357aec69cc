//! Argon2id credential hashing.
//!
//! Parameters follow OWASP guidance (memory: 19 MiB, iterations: 2,
//! parallelism: 1). A fresh salt is drawn for every hash. The optional
//! pepper is prepended to the password on both hash and verify.

use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

use crate::error::DbError;

fn peppered<'a>(password: &'a str, pepper: Option<&str>, buf: &'a mut String) -> &'a [u8] {
    match pepper {
        Some(p) => {
            *buf = format!("{p}{password}");
            buf.as_bytes()
        }
        None => password.as_bytes(),
    }
}

fn hasher() -> Result<Argon2<'static>, DbError> {
    let params = Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Hash(format!("argon2 params: {e}")))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash `password` into a PHC string.
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = hasher()?
        .hash_password(input, &salt)
        .map_err(|e| DbError::Hash(e.to_string()))?;

    Ok(hash.to_string())
}

/// Check `password` against a PHC string produced by [`hash_password`].
///
/// A mismatch is `Ok(false)`; only a malformed hash is an error.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> Result<bool, DbError> {
    let mut buf = String::new();
    let input = peppered(password, pepper, &mut buf);

    let parsed = PasswordHash::new(hash).map_err(|e| DbError::Hash(format!("invalid hash: {e}")))?;

    match hasher()?.verify_password(input, &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(DbError::Hash(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_argon2id_phc() {
        let hash = hash_password("s3cret", None).unwrap();
        assert!(hash.starts_with("$argon2id$v=19$m=19456,t=2,p=1$"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let a = hash_password("same", None).unwrap();
        let b = hash_password("same", None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn verify_accepts_correct_password_only() {
        let hash = hash_password("correct horse", None).unwrap();
        assert!(verify_password("correct horse", &hash, None).unwrap());
        assert!(!verify_password("battery staple", &hash, None).unwrap());
    }

    #[test]
    fn pepper_must_match() {
        let hash = hash_password("pw", Some("pepper")).unwrap();
        assert!(verify_password("pw", &hash, Some("pepper")).unwrap());
        assert!(!verify_password("pw", &hash, None).unwrap());
        assert!(!verify_password("pw", &hash, Some("other")).unwrap());
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(matches!(
            verify_password("pw", "not-a-hash", None),
            Err(DbError::Hash(_))
        ));
    }
}
