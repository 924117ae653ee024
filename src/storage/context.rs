use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::StoreError;

/// Caller-supplied limits for one unit of work: a cancellation signal and an
/// optional deadline.
#[derive(Debug, Clone, Default)]
pub struct TxContext {
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl TxContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// A handle that cancels every unit of work running under this context.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Instant at which the timeout expires, counted from now.
    pub(crate) fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|limit| Instant::now() + limit)
    }

    /// Drive `work` until it finishes, the token fires or `deadline` passes.
    /// On cancellation `work` is dropped before this returns. Several steps
    /// can share one deadline.
    pub(crate) async fn run_until<T, F>(
        &self,
        deadline: Option<Instant>,
        work: F,
    ) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(StoreError::Cancelled),
            _ = expired => Err(StoreError::TimedOut(self.timeout.unwrap_or_default())),
            result = work => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_returns_work_result() {
        let ctx = TxContext::new();
        let result = ctx.run_until(ctx.deadline(), async { Ok::<_, StoreError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_run_reports_timeout() {
        let ctx = TxContext::new().with_timeout(Duration::from_millis(10));
        let result: Result<(), _> = ctx
            .run_until(ctx.deadline(), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(StoreError::TimedOut(d)) if d == Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_run_reports_cancellation() {
        let ctx = TxContext::new();
        let token = ctx.cancellation_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });

        let result: Result<(), _> = ctx
            .run_until(ctx.deadline(), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(StoreError::Cancelled)));
        assert!(ctx.is_cancelled());
    }
}
