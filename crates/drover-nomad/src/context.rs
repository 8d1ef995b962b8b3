use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{NomadError, NomadResult};

/// Cancellable scope shared by every scheduler call of one invocation.
///
/// Clones share the same token. Once cancelled it stays cancelled: every
/// later [`ExecutionContext::run`] fails with [`NomadError::Cancelled`]
/// without polling the wrapped future.
#[derive(Clone, Debug, Default)]
pub struct ExecutionContext {
    token: CancellationToken,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the scope. Returns `true` only for the call that flipped it.
    pub fn cancel(&self) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Drive `fut` unless the scope is, or becomes, cancelled.
    pub async fn run<F, T>(&self, fut: F) -> NomadResult<T>
    where
        F: Future<Output = NomadResult<T>>,
    {
        if self.token.is_cancelled() {
            return Err(NomadError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(NomadError::Cancelled),
            res = fut => res,
        }
    }

    /// Sleep for `period`, waking early with `Cancelled`.
    pub async fn sleep(&self, period: std::time::Duration) -> NomadResult<()> {
        self.run(async {
            tokio::time::sleep(period).await;
            Ok(())
        })
        .await
    }
}
