use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2 cost parameters. Defaults match `argon2::Params::DEFAULT`.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub ttl_minutes: i64,
    /// Return the reset token in the API response. Development only.
    pub token_in_response: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
    pub reset: ResetConfig,
}

/// Upper bound for token lifetimes, in minutes.
pub const MAX_TTL_MINUTES: i64 = 24 * 60;

fn ttl_minutes(key: &str, default: i64) -> anyhow::Result<i64> {
    let minutes = env_or(key, default);
    anyhow::ensure!(
        (1..=MAX_TTL_MINUTES).contains(&minutes),
        "{key} must be between 1 and {MAX_TTL_MINUTES} minutes"
    );
    Ok(minutes)
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;

        let secret = std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET must not be empty");

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "expense-tracker".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "expense-tracker-users".into()),
            ttl_minutes: ttl_minutes("JWT_TTL_MINUTES", 3)?,
        };

        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_or("ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("ARGON2_ITERATIONS", defaults.iterations),
            parallelism: env_or("ARGON2_PARALLELISM", defaults.parallelism),
        };

        let reset = ResetConfig {
            ttl_minutes: ttl_minutes("RESET_TOKEN_TTL_MINUTES", 30)?,
            token_in_response: env_or("RESET_TOKEN_IN_RESPONSE", false),
        };

        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("APP_PORT", 8080),
            jwt,
            password,
            reset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_on_missing_or_unparsable_values() {
        assert_eq!(env_or("EXPENSE_TRACKER_TEST_UNSET_VAR", 42u16), 42);

        std::env::set_var("EXPENSE_TRACKER_TEST_BAD_PORT", "not-a-number");
        assert_eq!(env_or("EXPENSE_TRACKER_TEST_BAD_PORT", 8080u16), 8080);

        std::env::set_var("EXPENSE_TRACKER_TEST_FLAG", "true");
        assert!(env_or("EXPENSE_TRACKER_TEST_FLAG", false));
    }

    #[test]
    fn ttl_must_be_within_bounds() {
        assert_eq!(ttl_minutes("EXPENSE_TRACKER_TEST_UNSET_TTL", 3).unwrap(), 3);

        for bad in ["0", "-5", "1441", "9223372036854775807"] {
            std::env::set_var("EXPENSE_TRACKER_TEST_BAD_TTL", bad);
            let err = ttl_minutes("EXPENSE_TRACKER_TEST_BAD_TTL", 3).unwrap_err();
            assert!(err.to_string().contains("EXPENSE_TRACKER_TEST_BAD_TTL"));
        }

        std::env::set_var("EXPENSE_TRACKER_TEST_GOOD_TTL", "1440");
        assert_eq!(ttl_minutes("EXPENSE_TRACKER_TEST_GOOD_TTL", 3).unwrap(), 1440);
    }

    #[test]
    fn password_defaults_follow_argon2() {
        let cfg = PasswordConfig::default();
        assert_eq!(cfg.memory_kib, argon2::Params::DEFAULT_M_COST);
        assert_eq!(cfg.iterations, argon2::Params::DEFAULT_T_COST);
        assert_eq!(cfg.parallelism, argon2::Params::DEFAULT_P_COST);
    }
}
