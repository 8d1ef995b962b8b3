use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use drover_model::nomad::Allocation;

use crate::{
    api::{LogStream, SchedulerApi},
    error::{NomadError, NomadResult},
    orchestrator::Orchestrator,
};

impl<A: SchedulerApi> Orchestrator<A> {
    /// Read the interpreter the task entrypoint printed on stdout.
    ///
    /// Polls every `shell_interval` until the log is non-empty. Without a
    /// `shell_timeout` this waits until the context is cancelled.
    #[instrument(level = "debug", skip(self, alloc), fields(alloc_id = %alloc.id))]
    pub async fn discover_shell(&self, alloc: &Allocation, task: &str) -> NomadResult<String> {
        let started = Instant::now();
        loop {
            self.context().sleep(self.policy.shell_interval).await?;

            let logs = self.task_logs(alloc, task, LogStream::Stdout).await?;
            let shell = logs.trim();
            if !shell.is_empty() {
                debug!(shell, "task shell discovered");
                return Ok(shell.to_string());
            }

            if let Some(limit) = self.policy.shell_timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    return Err(NomadError::ShellDiscoveryTimeout {
                        task: task.to_string(),
                        waited,
                    });
                }
            }
            trace!("task has not reported a shell yet");
        }
    }
}
