//! One-way password hashing.
//!
//! The stores only ever see the opaque PHC string produced here. Argon2 is
//! CPU-bound, so async callers go through [`hash_blocking`] and
//! [`verify_blocking`], which move the work onto the blocking pool.

use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use rand::Rng;
use std::sync::Arc;
use tokio::task;

use crate::config::SecurityConfig;

pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;

    /// `false` for a mismatch and for a hash that cannot be parsed.
    fn verify(&self, password: &str, hash: &str) -> bool;
}

pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(config: &SecurityConfig) -> Result<Self> {
        let params = Params::new(
            config.argon2_memory_cost_kib,
            config.argon2_time_cost,
            config.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        // Parameters travel inside the PHC string, so hashes made with older
        // settings still verify.
        let Ok(parsed) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

pub async fn hash_blocking(hasher: Arc<dyn CredentialHasher>, password: &str) -> Result<String> {
    let password = password.to_string();
    task::spawn_blocking(move || hasher.hash(&password))
        .await
        .context("Password hashing task panicked")?
}

pub async fn verify_blocking(
    hasher: Arc<dyn CredentialHasher>,
    password: &str,
    hash: &str,
) -> Result<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    task::spawn_blocking(move || hasher.verify(&password, &hash))
        .await
        .context("Password verification task panicked")
}

/// Random initial password without look-alike characters.
#[must_use]
pub fn generate_password(length: usize) -> String {
    const ALPHABET: &[u8] = b"abcdefghjkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> Argon2Hasher {
        Argon2Hasher::new(&SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..SecurityConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn hash_then_verify() {
        let hasher = fast_hasher();
        let hash = hasher.hash("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify("correct horse", &hash));
        assert!(!hasher.verify("wrong horse", &hash));
        assert!(!hasher.verify("correct horse", "not-a-phc-string"));
    }

    #[test]
    fn salts_differ() {
        let hasher = fast_hasher();
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[tokio::test]
    async fn blocking_wrappers() {
        let hasher: Arc<dyn CredentialHasher> = Arc::new(fast_hasher());
        let hash = hash_blocking(hasher.clone(), "pw").await.unwrap();
        assert!(verify_blocking(hasher, "pw", &hash).await.unwrap());
    }

    #[test]
    fn generated_passwords() {
        let pw = generate_password(12);
        assert_eq!(pw.chars().count(), 12);
        assert!(pw.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(!pw.contains(['0', 'O', 'l', '1', 'I']));
    }
}
