//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::ChatError;

/// Wrap a fallible future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, ChatError>>,
) -> Result<T, ChatError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ChatError::Timeout(duration.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_future_maps_to_timeout_error() {
        let result: Result<(), ChatError> = with_timeout(Duration::from_millis(50), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ChatError::Timeout(50))));
    }

    #[tokio::test]
    async fn inner_error_passes_through() {
        let result: Result<(), ChatError> = with_timeout(Duration::from_secs(1), async {
            Err(ChatError::Mcp("boom".into()))
        })
        .await;
        assert!(matches!(result, Err(ChatError::Mcp(_))));
    }
}
