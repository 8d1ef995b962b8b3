use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::Meta;

/// Nomad job submitted by `prepare`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub job_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub datacenters: Vec<String>,
    pub task_groups: Vec<TaskGroup>,
}

impl Job {
    /// All tasks across groups, in declaration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.task_groups.iter().flat_map(|g| g.tasks.iter())
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks().find(|t| t.name == name)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskGroup {
    pub name: String,
    pub count: u32,
    pub restart_policy: RestartPolicy,
    pub reschedule_policy: ReschedulePolicy,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub networks: Vec<NetworkResource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
    pub tasks: Vec<Task>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartPolicy {
    pub attempts: u32,
    pub mode: String,
}

impl RestartPolicy {
    /// Fail the allocation on the first task failure.
    pub fn never() -> Self {
        Self {
            attempts: 0,
            mode: "fail".into(),
        }
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self::never()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReschedulePolicy {
    pub attempts: u32,
    pub unlimited: bool,
}

impl ReschedulePolicy {
    pub fn never() -> Self {
        Self {
            attempts: 0,
            unlimited: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkResource {
    pub mode: String,
}

impl NetworkResource {
    pub fn bridge() -> Self {
        Self {
            mode: "bridge".into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Service {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect: Option<ConsulConnect>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsulConnect {
    pub sidecar_service: ConsulSidecarService,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsulSidecarService {
    pub proxy: ConsulProxy,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConsulProxy {
    pub upstreams: Vec<ConsulUpstream>,
}

/// Service-mesh upstream binding, configured under `[[job.upstreams]]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "PascalCase", deserialize = "snake_case"))]
pub struct ConsulUpstream {
    pub destination_name: String,
    pub local_bind_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datacenter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_bind_address: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Task {
    pub name: String,
    pub driver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub config: Map<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub affinities: Vec<Affinity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
    #[serde(skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
    pub leader: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<Template>,
}

/// File rendered by Nomad into the task directory before start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    pub embedded_tmpl: String,
    pub dest_path: String,
    pub perms: String,
}

/// Placement constraint. Config keys follow Nomad's HCL names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(rename(serialize = "LTarget", deserialize = "attribute"), default)]
    pub attribute: String,
    #[serde(rename(serialize = "RTarget", deserialize = "value"), default)]
    pub value: String,
    #[serde(rename(serialize = "Operand", deserialize = "operator"), default = "default_operator")]
    pub operator: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affinity {
    #[serde(rename(serialize = "LTarget", deserialize = "attribute"), default)]
    pub attribute: String,
    #[serde(rename(serialize = "RTarget", deserialize = "value"), default)]
    pub value: String,
    #[serde(rename(serialize = "Operand", deserialize = "operator"), default = "default_operator")]
    pub operator: String,
    #[serde(rename(serialize = "Weight", deserialize = "weight"), default = "default_weight")]
    pub weight: i8,
}

fn default_operator() -> String {
    "=".to_string()
}

fn default_weight() -> i8 {
    50
}

/// Resource request. Config keys follow Nomad's HCL names.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resources {
    #[serde(
        rename(serialize = "CPU", deserialize = "cpu"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cpu: Option<u32>,
    #[serde(
        rename(serialize = "Cores", deserialize = "cores"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cores: Option<u32>,
    #[serde(
        rename(serialize = "MemoryMB", deserialize = "memory"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub memory_mb: Option<u32>,
    #[serde(
        rename(serialize = "MemoryMaxMB", deserialize = "memory_max"),
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub memory_max_mb: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_keys_map_to_nomad_field_names() {
        let res: Resources = serde_json::from_str(r#"{"cpu":500,"memory":256}"#).unwrap();
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["CPU"], 500);
        assert_eq!(json["MemoryMB"], 256);
        assert!(json.get("MemoryMaxMB").is_none());

        let c: Constraint =
            serde_json::from_str(r#"{"attribute":"${attr.kernel.name}","value":"linux"}"#).unwrap();
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["LTarget"], "${attr.kernel.name}");
        assert_eq!(json["RTarget"], "linux");
        assert_eq!(json["Operand"], "=");

        let up: ConsulUpstream =
            serde_json::from_str(r#"{"destination_name":"cache","local_bind_port":6379}"#).unwrap();
        let json = serde_json::to_value(&up).unwrap();
        assert_eq!(json["DestinationName"], "cache");
        assert_eq!(json["LocalBindPort"], 6379);
    }

    #[test]
    fn job_serializes_id_and_type() {
        let job = Job {
            id: "runner-1-project-2-job-3".into(),
            name: "runner-1-project-2-job-3".into(),
            job_type: "batch".into(),
            datacenters: vec!["dc1".into()],
            ..Default::default()
        };
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["ID"], "runner-1-project-2-job-3");
        assert_eq!(json["Type"], "batch");
        assert!(json.get("Region").is_none());
    }
}
