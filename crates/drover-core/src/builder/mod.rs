//! Job Specification Builder.
//!
//! One batch job, one group named `job`, holding:
//! - the `job` leader task running the CI image;
//! - the `helper` task running the runner helper image;
//! - one task per CI service.
//!
//! Restart and reschedule attempts are pinned to zero so a failing task
//! surfaces to the CI host instead of being retried by Nomad.

mod request;
pub use request::BuildRequest;

use std::collections::BTreeSet;

use drover_model::{
    Credentials, TaskRole,
    gitlab::JobService,
    nomad::{
        ConsulConnect, ConsulProxy, ConsulSidecarService, Job, NetworkResource, ReschedulePolicy,
        RestartPolicy, Service, Task, TaskGroup,
    },
};
use serde_json::{Value, json};
use tracing::{debug, instrument, trace};

use crate::{config::Config, error::CoreError, shell, template::TemplateEngine};

pub const JOB_GROUP: &str = "job";
const JOB_TYPE: &str = "batch";

/// Turns a [`BuildRequest`] into a Nomad [`Job`] using the task templates of
/// a [`Config`].
pub struct JobBuilder<'a> {
    config: &'a Config,
    engine: TemplateEngine,
}

impl<'a> JobBuilder<'a> {
    /// Create a builder over `config` with a fresh template engine.
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            engine: TemplateEngine::new(),
        }
    }

    /// Render every task and assemble the batch job.
    ///
    /// Fails when no image is configured, a role template is missing or
    /// renders badly, or two tasks end up with the same name.
    #[instrument(level = "debug", skip(self, req), fields(job_id = %req.job_id, services = req.services.len()))]
    pub fn build(&self, req: &BuildRequest) -> Result<Job, CoreError> {
        let image = match req.image.as_deref().map(str::trim) {
            Some(image) if !image.is_empty() => image,
            _ => self.config.image.as_str(),
        };
        if image.is_empty() {
            return Err(CoreError::MissingSetting("image"));
        }
        let helper_image = self.config.helper_image.as_str();
        if helper_image.is_empty() {
            return Err(CoreError::MissingSetting("helper_image"));
        }

        let mut job_task = self.render_task(
            TaskRole::Job,
            "job",
            json!({
                "Image": image,
                "Entrypoint": req.entrypoint,
                "ExecScript": shell::EXEC_SCRIPT,
                "Auth": auth_value(&req.credentials, image)?,
            }),
        )?;
        job_task.leader = true;
        job_task.templates = vec![shell::entrypoint_template()];

        let mut helper_task = self.render_task(
            TaskRole::Helper,
            "helper",
            json!({
                "Image": helper_image,
                "ExecScript": shell::EXEC_SCRIPT,
                "Auth": auth_value(&req.credentials, helper_image)?,
            }),
        )?;
        helper_task.templates = vec![shell::entrypoint_template()];

        let mut tasks = vec![job_task, helper_task];
        tasks.extend(self.service_tasks(&req.services, &req.credentials)?);

        let mut group = TaskGroup {
            name: JOB_GROUP.to_string(),
            count: 1,
            restart_policy: RestartPolicy::never(),
            reschedule_policy: ReschedulePolicy::never(),
            tasks,
            ..Default::default()
        };

        let upstreams = &self.config.job.upstreams;
        if !upstreams.is_empty() {
            trace!(count = upstreams.len(), "attaching mesh upstreams");
            group.networks = vec![NetworkResource::bridge()];
            group.services = vec![Service {
                name: Some(req.job_id.clone()),
                connect: Some(ConsulConnect {
                    sidecar_service: ConsulSidecarService {
                        proxy: ConsulProxy {
                            upstreams: upstreams.clone(),
                        },
                    },
                }),
            }];
        }

        let job = Job {
            id: req.job_id.clone(),
            name: req.job_id.clone(),
            job_type: JOB_TYPE.to_string(),
            region: self.config.nomad.region.clone(),
            namespace: self.config.nomad.namespace.clone(),
            datacenters: self.config.job.datacenters.clone(),
            task_groups: vec![group],
        };
        debug!(tasks = job.tasks().count(), "job spec built");
        Ok(job)
    }

    fn service_tasks(
        &self,
        services: &[JobService],
        credentials: &Credentials,
    ) -> Result<Vec<Task>, CoreError> {
        if services.is_empty() {
            return Ok(Vec::new());
        }
        // The service template is only required when services exist.
        self.definition(TaskRole::Service)?;

        let mut names: BTreeSet<String> = [TaskRole::Job, TaskRole::Helper]
            .iter()
            .filter_map(|r| r.fixed_task_name())
            .map(str::to_string)
            .collect();

        let mut tasks = Vec::with_capacity(services.len());
        for svc in services {
            let name = svc.task_name()?;
            if !names.insert(name.clone()) {
                return Err(CoreError::DuplicateTaskName(name));
            }
            let values = json!({
                "Service": {
                    "Name": svc.name,
                    "Alias": svc.alias,
                    "Entrypoint": svc.entrypoint,
                    "Command": svc.command,
                },
                "Auth": auth_value(credentials, &svc.name)?,
            });
            tasks.push(self.render_task(TaskRole::Service, &name, values)?);
        }
        Ok(tasks)
    }

    fn definition(&self, role: TaskRole) -> Result<&drover_model::TaskDefinition, CoreError> {
        self.config
            .job
            .task
            .get(role)
            .ok_or(CoreError::MissingTaskRole(role))
    }

    fn render_task(&self, role: TaskRole, name: &str, values: Value) -> Result<Task, CoreError> {
        let def = self.definition(role)?;
        let config = self
            .engine
            .render(&def.config, &values)
            .map_err(|source| CoreError::Template {
                task: name.to_string(),
                source,
            })?;
        trace!(task = name, role = %role, "task rendered");

        Ok(Task {
            name: name.to_string(),
            driver: def.driver.clone(),
            user: def.user.clone(),
            config,
            constraints: def.constraints.clone(),
            affinities: def.affinities.clone(),
            resources: def.resources.clone(),
            meta: def.meta.clone(),
            leader: false,
            templates: Vec::new(),
        })
    }
}

/// `{Username, Password}` of the credential matching the image domain, or `null`.
fn auth_value(credentials: &Credentials, image: &str) -> Result<Value, CoreError> {
    Ok(match credentials.for_image(image)? {
        Some(auth) => json!({ "Username": auth.username, "Password": auth.password }),
        None => Value::Null,
    })
}
