//! Termination signal handling.
//!
//! One listener task per invocation turns SIGTERM/SIGINT into a cancellation
//! of the shared [`ExecutionContext`], or swallows them while `cleanup` runs.

use tokio::{
    signal::unix::{SignalKind, signal},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::context::ExecutionContext;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignalPolicy {
    /// Cancel the context on the first signal.
    Honor,
    /// Log and ignore every signal.
    Ignore,
}

/// Owns the background signal listener; dropping it stops listening.
pub struct CancelCoordinator {
    listener: JoinHandle<()>,
}

impl CancelCoordinator {
    /// Spawn the listener. Must be called from within a tokio runtime.
    pub fn install(ctx: ExecutionContext, policy: SignalPolicy) -> std::io::Result<Self> {
        let mut term = signal(SignalKind::terminate())?;
        let mut int = signal(SignalKind::interrupt())?;

        let listener = tokio::spawn(async move {
            loop {
                let name = tokio::select! {
                    _ = term.recv() => "SIGTERM",
                    _ = int.recv() => "SIGINT",
                    _ = ctx.cancelled() => return,
                };
                if on_signal(&ctx, policy, name) {
                    return;
                }
            }
        });
        Ok(Self { listener })
    }
}

impl Drop for CancelCoordinator {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Apply `policy` to one received signal. Returns `true` when the listener
/// is done.
fn on_signal(ctx: &ExecutionContext, policy: SignalPolicy, name: &'static str) -> bool {
    match policy {
        SignalPolicy::Honor => {
            if ctx.cancel() {
                warn!(signal = name, "termination requested, cancelling");
            }
            true
        }
        SignalPolicy::Ignore => {
            info!(signal = name, "ignoring signal until cleanup finishes");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn honor_cancels_once_and_stops() {
        let ctx = ExecutionContext::new();
        assert!(on_signal(&ctx, SignalPolicy::Honor, "SIGTERM"));
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn ignore_keeps_context_alive() {
        let ctx = ExecutionContext::new();
        for _ in 0..3 {
            assert!(!on_signal(&ctx, SignalPolicy::Ignore, "SIGTERM"));
        }
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn listener_exits_when_context_cancelled_elsewhere() {
        let ctx = ExecutionContext::new();
        let coordinator = CancelCoordinator::install(ctx.clone(), SignalPolicy::Honor).unwrap();
        ctx.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while !coordinator.listener.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
