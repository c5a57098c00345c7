//! Retry transient provider failures with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::LlmError;

const BASE_DELAY: Duration = Duration::from_millis(500);

/// Run `attempt` until it succeeds, fails permanently, or `retries` extra
/// attempts are spent.
pub(crate) async fn with_retries<F, Fut>(provider: &str, retries: u32, mut attempt: F) -> Result<String, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, LlmError>>,
{
    let mut tries = 0;
    loop {
        match attempt().await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() && tries < retries => {
                let delay = BASE_DELAY * 2u32.pow(tries);
                warn!("{}: {} (retrying in {:?})", provider, e, delay);
                tokio::time::sleep(delay).await;
                tries += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retries("test", 2, move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(LlmError::Connection("reset".into()))
            } else {
                Ok("ok".to_string())
            }
        })
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retries("test", 2, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<String, _>(LlmError::Api { status: 401, message: "denied".into() })
        })
        .await;
        assert!(matches!(result, Err(LlmError::Api { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retries("test", 0, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<String, _>(LlmError::Connection("down".into()))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
