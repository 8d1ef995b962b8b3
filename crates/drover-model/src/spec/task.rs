use serde::{Deserialize, Serialize};

use crate::{
    domain::Meta,
    kind::TaskRole,
    nomad::{Affinity, Constraint, Resources},
};

/// Environment-supplied blueprint for one task role.
///
/// `config` is a Handlebars template producing the TOML body of the driver
/// configuration; everything else is copied verbatim into the Nomad task.
///
/// ```toml
/// driver = "docker"
/// config = '''
/// image = {{toml Image}}
/// entrypoint = [{{toml ExecScript}}]
/// '''
///
/// [resources]
/// cpu = 500
/// memory = 256
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskDefinition {
    /// Nomad task driver (e.g. `docker`, `podman`).
    pub driver: String,
    /// User the task runs as, if the driver supports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Driver configuration template.
    pub config: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affinities: Vec<Affinity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
}

/// One optional definition per [`TaskRole`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskTemplates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<TaskDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helper: Option<TaskDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<TaskDefinition>,
}

impl TaskTemplates {
    pub fn get(&self, role: TaskRole) -> Option<&TaskDefinition> {
        match role {
            TaskRole::Job => self.job.as_ref(),
            TaskRole::Helper => self.helper.as_ref(),
            TaskRole::Service => self.service.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(driver: &str) -> TaskDefinition {
        TaskDefinition {
            driver: driver.into(),
            config: "image = {{toml Image}}".into(),
            ..Default::default()
        }
    }

    #[test]
    fn lookup_by_role() {
        let templates = TaskTemplates {
            job: Some(definition("docker")),
            helper: Some(definition("podman")),
            service: None,
        };

        assert_eq!(templates.get(TaskRole::Job).unwrap().driver, "docker");
        assert_eq!(templates.get(TaskRole::Helper).unwrap().driver, "podman");
        assert!(templates.get(TaskRole::Service).is_none());
    }

    #[test]
    fn definition_rejects_unknown_keys() {
        let json = r#"{"driver":"docker","config":"","privileged":true}"#;
        assert!(serde_json::from_str::<TaskDefinition>(json).is_err());
    }
}
