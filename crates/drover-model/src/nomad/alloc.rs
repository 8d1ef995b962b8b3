use std::collections::BTreeMap;

use serde::Deserialize;

use crate::nomad::null_as_default;

pub const ALLOC_CLIENT_PENDING: &str = "pending";
pub const ALLOC_CLIENT_RUNNING: &str = "running";
pub const ALLOC_CLIENT_COMPLETE: &str = "complete";
const ALLOC_CLIENT_FAILED: &str = "failed";
const ALLOC_CLIENT_LOST: &str = "lost";

const ALLOC_DESIRED_STOP: &str = "stop";
const ALLOC_DESIRED_EVICT: &str = "evict";

pub const TASK_STATE_RUNNING: &str = "running";

/// Per-task state reported on allocations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskState {
    #[serde(default)]
    pub state: String,
}

/// Entry of `GET /v1/job/:id/allocations`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllocationListStub {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default)]
    pub client_status: String,
    #[serde(default)]
    pub desired_status: String,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub task_states: BTreeMap<String, TaskState>,
}

impl AllocationListStub {
    /// Whether every reported task is `running`. False for an empty map.
    pub fn all_tasks_running(&self) -> bool {
        !self.task_states.is_empty()
            && self
                .task_states
                .values()
                .all(|t| t.state == TASK_STATE_RUNNING)
    }
}

/// Full allocation record from `GET /v1/allocation/:id`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Allocation {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "JobID", default)]
    pub job_id: String,
    #[serde(rename = "NodeID", default)]
    pub node_id: String,
    #[serde(default)]
    pub client_status: String,
    #[serde(default)]
    pub desired_status: String,
    #[serde(default)]
    pub create_index: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub task_states: BTreeMap<String, TaskState>,
}

impl Allocation {
    /// The server wants this allocation gone.
    pub fn server_terminal(&self) -> bool {
        matches!(
            self.desired_status.as_str(),
            ALLOC_DESIRED_STOP | ALLOC_DESIRED_EVICT
        )
    }

    /// The client has finished running this allocation.
    pub fn client_terminal(&self) -> bool {
        matches!(
            self.client_status.as_str(),
            ALLOC_CLIENT_COMPLETE | ALLOC_CLIENT_FAILED | ALLOC_CLIENT_LOST
        )
    }

    /// Nothing can be exec'd into this allocation anymore.
    pub fn terminated(&self) -> bool {
        self.server_terminal() || self.client_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_decodes_null_task_states() {
        let stub: AllocationListStub = serde_json::from_str(
            r#"{"ID":"a1","ClientStatus":"pending","CreateIndex":9,"TaskStates":null}"#,
        )
        .unwrap();
        assert_eq!(stub.id, "a1");
        assert_eq!(stub.create_index, 9);
        assert!(stub.task_states.is_empty());
        assert!(!stub.all_tasks_running());
    }

    #[test]
    fn all_tasks_running_requires_every_task() {
        let stub: AllocationListStub = serde_json::from_str(
            r#"{"ID":"a1","ClientStatus":"running","CreateIndex":1,
                "TaskStates":{"job":{"State":"running"},"helper":{"State":"pending"}}}"#,
        )
        .unwrap();
        assert!(!stub.all_tasks_running());
    }

    #[test]
    fn terminal_predicates() {
        let live = Allocation {
            id: "a".into(),
            client_status: "running".into(),
            desired_status: "run".into(),
            ..Default::default()
        };
        assert!(!live.terminated());

        let stopping = Allocation {
            desired_status: "stop".into(),
            ..live.clone()
        };
        assert!(stopping.server_terminal());
        assert!(stopping.terminated());

        let done = Allocation {
            client_status: "complete".into(),
            ..live
        };
        assert!(!done.server_terminal());
        assert!(done.client_terminal());
        assert!(done.terminated());
    }
}
