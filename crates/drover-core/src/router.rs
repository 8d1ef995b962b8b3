//! Stage router: picks which task runs a given CI stage.
//!
//! User script stages (`step_*`, `*_script`) run in the `job` task with the
//! CI image; runner-internal stages (sources, cache, artifacts) run in the
//! `helper` task.
use drover_model::TaskRole;
use tracing::trace;

pub fn route_stage(stage: &str) -> TaskRole {
    let role = if stage.starts_with("step_") || stage.ends_with("_script") {
        TaskRole::Job
    } else {
        TaskRole::Helper
    };
    trace!(stage, role = %role, "stage routed");
    role
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_stages_go_to_job() {
        assert_eq!(route_stage("build_script"), TaskRole::Job);
        assert_eq!(route_stage("after_script"), TaskRole::Job);
        assert_eq!(route_stage("step_script"), TaskRole::Job);
        assert_eq!(route_stage("step_release"), TaskRole::Job);
    }

    #[test]
    fn runner_stages_go_to_helper() {
        for stage in [
            "prepare_script_x",
            "get_sources",
            "restore_cache",
            "download_artifacts",
            "archive_cache",
            "upload_artifacts_on_success",
            "cleanup_file_variables",
        ] {
            assert_eq!(route_stage(stage), TaskRole::Helper, "stage {stage}");
        }
    }
}
