//! Fixed-delay polling for outputs that take a moment to show up.

use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::*;

use crate::{
    cancel::CancelToken,
    errors::{ChainError, MintError, MintResult},
};

/// Linear backoff: the same delay between every try, a bounded number of
/// tries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay between tries, in milliseconds.
    pub delay_ms: u64,

    /// Total tries, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay_ms: 3_000,
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// Gets the delay.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Calls `fetch` until it yields a value.
    ///
    /// Both `Ok(None)` and errors count as a miss. After the last miss this
    /// fails with [`ChainError::PollExhausted`].
    pub async fn poll<T, F, Fut>(&self, what: &str, cancel: &CancelToken, mut fetch: F) -> MintResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, ChainError>>,
    {
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(MintError::Cancelled);
            }

            match fetch().await {
                Ok(Some(v)) => return Ok(v),
                Ok(None) => debug!(%what, %attempt, "not visible yet"),
                Err(e) => warn!(%e, %what, %attempt, "poll failed"),
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(MintError::Cancelled),
                    _ = tokio::time::sleep(self.delay()) => {}
                }
            }
        }

        Err(ChainError::PollExhausted {
            what: what.to_owned(),
            attempts: self.max_attempts,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::errors::MintErrorKind;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            delay_ms: 1,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_misses() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let res = fast(10)
            .poll("utxo", &CancelToken::new(), move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                match n {
                    1 => Err(ChainError::Transport("reset".into())),
                    2 | 3 => Ok(None),
                    _ => Ok(Some(n)),
                }
            })
            .await
            .unwrap();
        assert_eq!(res, 4);
    }

    #[tokio::test]
    async fn test_exhausts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let err = fast(10)
            .poll::<(), _, _>("utxo", &CancelToken::new(), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            })
            .await
            .unwrap_err();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        assert_eq!(err.kind(), MintErrorKind::Network);
        assert!(matches!(
            err,
            MintError::Network(ChainError::PollExhausted { attempts: 10, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = fast(10)
            .poll::<(), _, _>("utxo", &cancel, || async { Ok(None) })
            .await
            .unwrap_err();
        assert!(matches!(err, MintError::Cancelled));
    }

    #[test]
    fn test_config_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"delay_ms": 500}"#).unwrap();
        assert_eq!(policy.delay(), Duration::from_millis(500));
        assert_eq!(policy.max_attempts, 10);
    }
}
