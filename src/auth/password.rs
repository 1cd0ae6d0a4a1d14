use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::PasswordConfig;

/// Argon2id hashing with a configured cost.
#[derive(Clone)]
pub struct Passwords {
    params: Params,
    /// Hash of a throwaway string, verified against when no user matches so
    /// that failed lookups cost the same as failed verifications.
    dummy_hash: String,
}

impl Passwords {
    pub fn new(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 params: {e}"))?;
        let dummy_hash = hash_with(&params, "timing-equalizer")?;
        Ok(Self { params, dummy_hash })
    }

    fn argon2(&self) -> Argon2<'static> {
        argon2_for(&self.params)
    }

    pub fn hash_blocking(&self, plain: &str) -> anyhow::Result<String> {
        hash_with(&self.params, plain)
    }

    pub fn verify_blocking(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Hash on the blocking pool.
    pub async fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let this = self.clone();
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || this.hash_blocking(&plain))
            .await
            .context("password hashing task failed")?
    }

    /// Verify on the blocking pool.
    pub async fn verify(&self, plain: &str, hash: &str) -> anyhow::Result<bool> {
        let this = self.clone();
        let plain = plain.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || this.verify_blocking(&plain, &hash))
            .await
            .context("password verification task failed")?
    }

    /// Burn one verification against the dummy hash. Always `false`.
    pub async fn verify_dummy(&self, plain: &str) -> anyhow::Result<bool> {
        let hash = self.dummy_hash.clone();
        self.verify(plain, &hash).await.map(|_| false)
    }
}

fn argon2_for(params: &Params) -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
}

fn hash_with(params: &Params, plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2_for(params)
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passwords() -> Passwords {
        Passwords::new(&PasswordConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .expect("params should be valid")
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let pw = passwords();
        let password = "Secur3P@ssw0rd!";
        let hash = pw.hash_blocking(password).expect("hashing should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(pw.verify_blocking(password, &hash).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let pw = passwords();
        let hash = pw
            .hash_blocking("correct-horse-battery-staple")
            .expect("hashing should succeed");
        assert!(!pw
            .verify_blocking("wrong-password", &hash)
            .expect("verify should not error"));
    }

    #[test]
    fn same_password_gets_different_salts() {
        let pw = passwords();
        let a = pw.hash_blocking("password123").unwrap();
        let b = pw.hash_blocking("password123").unwrap();
        assert_ne!(a, b);
        assert!(pw.verify_blocking("password123", &a).unwrap());
        assert!(pw.verify_blocking("password123", &b).unwrap());
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = passwords()
            .verify_blocking("anything", "not-a-valid-hash")
            .unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn rejects_invalid_params() {
        let res = Passwords::new(&PasswordConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn async_wrappers_run_on_blocking_pool() {
        let pw = passwords();
        let hash = pw.hash("password123").await.unwrap();
        assert!(pw.verify("password123", &hash).await.unwrap());
        assert!(!pw.verify("password124", &hash).await.unwrap());
        assert!(!pw.verify_dummy("password123").await.unwrap());
    }
}
