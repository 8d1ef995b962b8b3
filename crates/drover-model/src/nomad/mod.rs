//! Nomad HTTP API wire types.
//!
//! Job-side types serialize with Nomad's PascalCase field names. The ones that
//! also appear in the drover config file (constraints, affinities, resources,
//! upstreams) deserialize from snake_case keys instead.

mod alloc;
pub use alloc::{
    ALLOC_CLIENT_COMPLETE, ALLOC_CLIENT_PENDING, ALLOC_CLIENT_RUNNING, Allocation,
    AllocationListStub, TASK_STATE_RUNNING, TaskState,
};

mod eval;
pub use eval::{EVAL_STATUS_COMPLETE, EVAL_STATUS_PENDING, Evaluation};

mod job;
pub use job::{
    Affinity, ConsulConnect, ConsulProxy, ConsulSidecarService, ConsulUpstream, Constraint, Job,
    NetworkResource, ReschedulePolicy, Resources, RestartPolicy, Service, Task, TaskGroup,
    Template,
};

mod response;
pub use response::{JobRegisterResponse, JobValidateResponse};

use serde::{Deserialize, Deserializer};

/// Nomad encodes empty collections as `null`; read those as the default.
pub(crate) fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}
