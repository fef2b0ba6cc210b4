//! Transient-retry wrapper around graph-store writes. Distinct from the
//! embedding crate's retry policy: base 100ms doubled per attempt plus 0-50ms
//! jitter, capped at 2s, 3 attempts.

use crate::connection::DbError;
use std::future::Future;
use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_millis(2000);
const BASE_MILLIS: u64 = 100;

/// Backoff delay before retry attempt `attempt` (0-indexed), including jitter.
fn backoff_for_attempt(attempt: u32, jitter_millis: u64) -> Duration {
  let exponential = BASE_MILLIS.saturating_mul(1u64 << attempt.min(16));
  Duration::from_millis(exponential.saturating_add(jitter_millis)).min(MAX_BACKOFF)
}

/// Cheap deterministic jitter source so tests don't need to pull in `rand`.
fn jitter_millis(attempt: u32) -> u64 {
  let nanos = std::time::SystemTime::now()
    .duration_since(std::time::UNIX_EPOCH)
    .map(|d| d.subsec_nanos())
    .unwrap_or(0);
  ((nanos ^ attempt.wrapping_mul(2654435761)) % 51) as u64
}

/// Is this error transient (deadlock, lock timeout, connection reset) and
/// therefore worth retrying, as opposed to a schema/validation error?
pub fn is_transient(error: &DbError) -> bool {
  match error {
    DbError::Lance(e) => {
      let msg = e.to_string().to_lowercase();
      msg.contains("deadlock")
        || msg.contains("lock") && msg.contains("timeout")
        || msg.contains("conflict")
        || msg.contains("connection reset")
        || msg.contains("commit")
    }
    DbError::Io(e) => matches!(
      e.kind(),
      std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut | std::io::ErrorKind::ConnectionReset
    ),
    _ => false,
  }
}

/// Run `op` up to `max_retries + 1` times, retrying only on transient errors
/// with exponential backoff and jitter. Non-transient errors propagate
/// immediately without consuming a retry.
pub async fn with_retry<T, F, Fut>(max_retries: u32, mut op: F) -> Result<T, DbError>
where
  F: FnMut() -> Fut,
  Fut: Future<Output = Result<T, DbError>>,
{
  let mut attempt = 0;
  loop {
    match op().await {
      Ok(value) => return Ok(value),
      Err(error) if attempt < max_retries && is_transient(&error) => {
        let delay = backoff_for_attempt(attempt, jitter_millis(attempt));
        tracing::warn!(attempt, ?delay, "retrying transient graph-store error: {}", error);
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      Err(error) if attempt >= max_retries && is_transient(&error) => {
        return Err(DbError::RetriesExhausted {
          attempts: attempt + 1,
          source: Box::new(error),
        });
      }
      Err(error) => return Err(error),
    }
  }
}
