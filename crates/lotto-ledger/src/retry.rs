//! Transactional retry idiom shared by every ledger-mutating operation.
//! Grounded in the prediction-engine `lmsr_api`'s SQLSTATE-based retry
//! helper: classify the error, retry retryable ones with jittered
//! exponential backoff, surface everything else immediately.

use std::time::Duration;

/// SQLSTATE codes worth retrying automatically.
pub mod pg_error_codes {
    pub const SERIALIZATION_FAILURE: &str = "40001";
    pub const DEADLOCK_DETECTED: &str = "40P01";
    pub const UNIQUE_VIOLATION: &str = "23505";
}

pub const MAX_RETRY_ATTEMPTS: u32 = 5;
const BASE_RETRY_DELAY_MS: u64 = 20;

/// Inspects a `sqlx::Error`'s database code against the retryable set.
/// Unique violations are included because a concurrent sale can race
/// the unique `tx_hash` constraint; the caller treats a unique
/// violation as a `Conflict`, not silently swallowed, but it is safe to
/// retry the surrounding read-modify-write once to get a clean
/// `Conflict` error off the freshest row state.
pub fn is_retryable(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            let code = code.as_ref();
            return code == pg_error_codes::SERIALIZATION_FAILURE
                || code == pg_error_codes::DEADLOCK_DETECTED;
        }
    }
    false
}

/// Exponential backoff with jitter, bounded by `MAX_RETRY_ATTEMPTS`.
pub fn backoff_delay(attempt: u32) -> Duration {
    let jitter = rand::random::<u64>() % 10;
    Duration::from_millis(BASE_RETRY_DELAY_MS * (1u64 << attempt.min(6)) + jitter)
}

/// Runs `$body`, a closure producing `Result<T, sqlx::Error>` given a
/// fresh `&mut sqlx::Transaction<'_, sqlx::Postgres>`, inside a
/// `SERIALIZABLE` transaction, retrying on a retryable SQLSTATE up to
/// `MAX_RETRY_ATTEMPTS` times.
#[macro_export]
macro_rules! with_serializable_tx {
    ($pool:expr, |$tx:ident| $body:expr) => {{
        let mut attempt: u32 = 0;
        loop {
            let mut $tx = $pool.begin().await?;
            sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
                .execute(&mut *$tx)
                .await?;
            let result: Result<_, sqlx::Error> = async { $body }.await;
            match result {
                Ok(value) => {
                    $tx.commit().await?;
                    break Ok(value);
                }
                Err(err) => {
                    $tx.rollback().await.ok();
                    attempt += 1;
                    if attempt >= $crate::retry::MAX_RETRY_ATTEMPTS || !$crate::retry::is_retryable(&err) {
                        break Err(err);
                    }
                    tokio::time::sleep($crate::retry::backoff_delay(attempt)).await;
                    continue;
                }
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_with_attempt() {
        let d1 = backoff_delay(1).as_millis();
        let d4 = backoff_delay(4).as_millis();
        assert!(d4 > d1);
    }
}
