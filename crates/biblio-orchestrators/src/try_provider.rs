//! The shared `try_provider` skeleton every orchestrator calls once per
//! candidate provider: race the
//! call against a timer, always cancel the token on exit, and return a
//! structured `Attempt<T>` rather than propagating the error.

use std::future::Future;
use std::time::{Duration, Instant};

use biblio_common::{Attempt, EnrichmentError};
use biblio_registry::ProviderContext;

/// Cancels the token on every exit path (success, error, or timeout),
/// mirroring a `scopeguard::defer!` without pulling in that dependency —
/// `CancellationToken::cancel()` is idempotent, so a cancel that races a
/// cooperating provider's own cleanup is harmless.
struct CancelOnDrop<'a>(&'a ProviderContext);

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        self.0.cancellation.cancel();
    }
}

pub async fn try_provider<F, T>(
    provider_name: &str,
    timeout: Duration,
    ctx: &ProviderContext,
    call: F,
) -> Attempt<T>
where
    F: Future<Output = Result<T, EnrichmentError>>,
{
    let _guard = CancelOnDrop(ctx);
    let started = Instant::now();

    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(data)) => Attempt::success(data, started.elapsed().as_millis() as u64),
        Ok(Err(_cancelled)) if ctx.cancellation.is_cancelled() => {
            // A provider that observed cancellation and surfaced it as an
            // error is reporting the same thing a timeout would: treat it
            // as one, per "provider errors classified as cancelled by the
            // caller are reported as timeouts rather than generic failures."
            Attempt::timeout(started.elapsed().as_millis() as u64)
        }
        Ok(Err(reason)) => Attempt::failed(reason.to_string(), started.elapsed().as_millis() as u64),
        Err(_elapsed) => {
            let _ = provider_name;
            Attempt::timeout(started.elapsed().as_millis() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn success_within_timeout_yields_success_attempt() {
        let ctx = ProviderContext::new();
        let attempt = try_provider("p", Duration::from_millis(100), &ctx, async { Ok::<_, EnrichmentError>(42) }).await;
        assert!(matches!(attempt, Attempt::Success { data: 42, .. }));
    }

    #[tokio::test]
    async fn slow_call_is_reported_as_timeout() {
        let ctx = ProviderContext::new();
        let attempt = try_provider("p", Duration::from_millis(10), &ctx, async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, EnrichmentError>(1)
        })
        .await;
        assert!(matches!(attempt, Attempt::Timeout { .. }));
        assert!(ctx.cancellation.is_cancelled());
    }

    #[tokio::test]
    async fn token_is_always_cancelled_on_exit() {
        let ctx = ProviderContext::new();
        let _ = try_provider("p", Duration::from_millis(100), &ctx, async {
            Err::<i32, _>(EnrichmentError::Internal("boom".to_string()))
        })
        .await;
        assert!(ctx.cancellation.is_cancelled());
    }
}
