// src/repositories/postgres/mod.rs

use std::future::Future;
use tracing::warn;
use crate::Error;

pub mod activities;
pub mod rewards;
pub mod user_rewards;

pub use activities::PostgresRewardActivityRepository;
pub use rewards::PostgresRewardTemplateRepository;
pub use user_rewards::PostgresUserRewardsRepository;

/// Attempts per write before a serialization conflict is surfaced.
pub const MAX_ATTEMPTS: u32 = 3;

/// SQLSTATE serialization_failure / deadlock_detected.
const RETRYABLE_CODES: [&str; 2] = ["40001", "40P01"];

/// Maps retryable Postgres conflicts to `Error::Transient`; everything else
/// passes through.
pub fn classify(err: Error) -> Error {
    if let Error::Database(sqlx::Error::Database(db_err)) = &err {
        if let Some(code) = db_err.code() {
            let code: &str = &code;
            if RETRYABLE_CODES.contains(&code) {
                return Error::Transient(format!("{} (SQLSTATE {})", db_err.message(), code));
            }
        }
    }
    err
}

/// Runs `op` up to `MAX_ATTEMPTS` times while it fails with a transient error.
pub async fn with_retry<T, F, Fut>(label: &str, mut op: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 1;
    loop {
        match op().await.map_err(classify) {
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                warn!("{} hit a write conflict (attempt {}/{}): {}", label, attempt, MAX_ATTEMPTS, e);
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let res: Result<(), Error> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Transient("conflict".into())) }
        })
        .await;
        assert!(matches!(res, Err(Error::Transient(_))));
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_non_transient_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let res: Result<(), Error> = with_retry("test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::NotFound("x".into())) }
        })
        .await;
        assert!(matches!(res, Err(Error::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_conflict() -> Result<(), Error> {
        let calls = AtomicU32::new(0);
        let value = with_retry("test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(Error::Transient("conflict".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await?;
        assert_eq!(value, 7);
        Ok(())
    }
}
