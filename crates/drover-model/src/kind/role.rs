use std::fmt;

use serde::{Deserialize, Serialize};

/// Role a task plays inside the job group.
///
/// Every role has its own template; `Job` and `Helper` also have fixed task
/// names, while `Service` tasks are named after the CI service.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskRole {
    /// Leader task running the CI image; executes the user's script stages.
    Job,
    /// Runner helper image; executes sources/cache/artifact stages.
    Helper,
    /// One per CI service dependency.
    Service,
}

impl TaskRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskRole::Job => "job",
            TaskRole::Helper => "helper",
            TaskRole::Service => "service",
        }
    }

    /// Nomad task name for roles that only ever produce one task.
    pub fn fixed_task_name(&self) -> Option<&'static str> {
        match self {
            TaskRole::Job => Some("job"),
            TaskRole::Helper => Some("helper"),
            TaskRole::Service => None,
        }
    }
}

impl fmt::Display for TaskRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
