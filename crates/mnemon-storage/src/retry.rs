//! Transient-error retry: SQLITE_BUSY / locked surfaces only after three
//! backed-off attempts (50, 200, 800 ms).

use std::thread;
use std::time::Duration;

use mnemon_core::constants::RETRY_BACKOFF_MS;
use mnemon_core::errors::{MnemonError, StorageError};

/// Run `f`, retrying on transient storage errors. `f` must be safe to rerun
/// whole (every caller wraps a self-contained transaction).
pub fn with_retry<T>(mut f: impl FnMut() -> Result<T, MnemonError>) -> Result<T, MnemonError> {
    let mut attempt = 0;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if is_transient(&e) && attempt < RETRY_BACKOFF_MS.len() => {
                tracing::debug!(attempt, error = %e, "transient storage error, retrying");
                thread::sleep(Duration::from_millis(RETRY_BACKOFF_MS[attempt]));
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_transient(err: &MnemonError) -> bool {
    match err {
        MnemonError::Storage(StorageError::Sqlite { message }) => {
            let m = message.to_lowercase();
            m.contains("database is locked") || m.contains("database table is locked") || m.contains("busy")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_transient_then_succeeds() {
        let mut calls = 0;
        let result: Result<u32, MnemonError> = with_retry(|| {
            calls += 1;
            if calls < 3 {
                Err(MnemonError::Storage(StorageError::Sqlite {
                    message: "database is locked".into(),
                }))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 3);
    }

    #[test]
    fn non_transient_surfaces_immediately() {
        let mut calls = 0;
        let result: Result<(), MnemonError> = with_retry(|| {
            calls += 1;
            Err(MnemonError::Storage(StorageError::KeyMismatch))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
