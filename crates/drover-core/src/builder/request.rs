use drover_model::{Credentials, gitlab::JobService};

/// Runtime inputs for one job build, extracted from the CI environment.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Nomad job ID (`runner-<r>-project-<p>-job-<j>`).
    pub job_id: String,
    /// CI job image; the configured default applies when `None` or empty.
    pub image: Option<String>,
    /// Image entrypoint override from the job response file.
    pub entrypoint: Option<Vec<String>>,
    pub services: Vec<JobService>,
    pub credentials: Credentials,
}

impl BuildRequest {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_entrypoint(mut self, entrypoint: Option<Vec<String>>) -> Self {
        self.entrypoint = entrypoint;
        self
    }

    pub fn with_services(mut self, services: Vec<JobService>) -> Self {
        self.services = services;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
}
