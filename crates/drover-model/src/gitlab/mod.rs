//! GitLab Runner custom executor types.

mod config;
pub use config::{ConfigExecOutput, DriverInfo};

mod job;
pub use job::{JobResponse, JobResponseImage, JobService};
