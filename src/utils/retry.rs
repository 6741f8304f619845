//! 文件操作重试机制
//!
//! Archive files and temporary directories are sometimes still held open by
//! another process (virus scanner, indexer) right after we close them. Such
//! failures are retried with exponential backoff; anything else fails at once.

use std::io;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Backoff schedule for one kind of filesystem call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Removing a temporary directory after a save.
    pub const TEMP_CLEANUP: RetryPolicy = RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_millis(1000),
    };

    /// Renaming the new archive over the original.
    pub const ARCHIVE_SWAP: RetryPolicy = RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
    };

    /// Delay before retry number `attempt` (0-based), capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Whether `error` is worth another attempt.
pub fn is_transient(error: &io::Error) -> bool {
    // Windows ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION
    if cfg!(windows) && matches!(error.raw_os_error(), Some(32) | Some(33)) {
        return true;
    }
    matches!(
        error.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

/**
 * 带重试的文件操作
 *
 * Runs `operation` until it succeeds, fails with a non-transient error, or
 * `policy.max_retries` retries are used up. Sleeps the calling thread between
 * attempts, so only call it from blocking code.
 */
pub fn retry_file_operation<T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: impl FnMut() -> io::Result<T>,
) -> io::Result<T> {
    let mut attempt = 0;

    loop {
        let e = match operation() {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation = %operation_name, retries = attempt, "Succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        // First-attempt failures that are not transient belong to the caller.
        if !is_transient(&e) && attempt == 0 {
            debug!(operation = %operation_name, error = %e, "File operation failed");
            return Err(e);
        }
        if !is_transient(&e) || attempt >= policy.max_retries {
            error!(
                operation = %operation_name,
                attempts = attempt + 1,
                error = %e,
                "Giving up on file operation"
            );
            return Err(e);
        }

        let delay = policy.delay_for(attempt);
        warn!(
            operation = %operation_name,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %e,
            "Transient file error, retrying"
        );
        std::thread::sleep(delay);
        attempt += 1;
    }
}
