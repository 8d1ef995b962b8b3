use drover_model::nomad::{
    ALLOC_CLIENT_COMPLETE, ALLOC_CLIENT_PENDING, ALLOC_CLIENT_RUNNING, AllocationListStub,
};

/// Convergence state of the authoritative allocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AllocPhase {
    /// Pending, or no task has reported yet. Poll again soon.
    Starting,
    /// Running, but some task is not running yet.
    Waiting,
    /// Running with every task running.
    Ready,
    /// Finished.
    Done,
    /// Any other client status.
    Failed(String),
}

pub fn classify(stub: &AllocationListStub) -> AllocPhase {
    let status = stub.client_status.as_str();
    if status == ALLOC_CLIENT_COMPLETE {
        return AllocPhase::Done;
    }
    if status == ALLOC_CLIENT_PENDING || stub.task_states.is_empty() {
        return AllocPhase::Starting;
    }
    if status != ALLOC_CLIENT_RUNNING {
        return AllocPhase::Failed(status.to_string());
    }
    if stub.all_tasks_running() {
        AllocPhase::Ready
    } else {
        AllocPhase::Waiting
    }
}

/// Most recently created allocation; older ones are ignored.
pub fn latest_allocation(stubs: &[AllocationListStub]) -> Option<&AllocationListStub> {
    stubs.iter().max_by_key(|s| s.create_index)
}
