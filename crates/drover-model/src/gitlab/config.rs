use std::collections::BTreeMap;

use serde::Serialize;

/// Document printed on stdout by the `config` stage.
///
/// Field names follow the runner's `ConfigExecOutput` contract; unset fields
/// are omitted so the runner keeps its own defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConfigExecOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<DriverInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builds_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builds_dir_is_shared: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_env: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DriverInfo {
    pub name: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_are_omitted() {
        let out = ConfigExecOutput {
            builds_dir: Some("/alloc/data/builds/group/project".into()),
            builds_dir_is_shared: Some(false),
            ..Default::default()
        };
        let json = serde_json::to_string(&out).unwrap();
        assert_eq!(
            json,
            r#"{"builds_dir":"/alloc/data/builds/group/project","builds_dir_is_shared":false}"#
        );
    }
}
