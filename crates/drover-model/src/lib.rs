mod domain;
pub use domain::{Credentials, Meta, RegistryAuth, image_domain, image_task_name, normalize_registry};

mod error;
pub use error::{ModelError, ModelResult};

mod kind;
pub use kind::TaskRole;

mod spec;
pub use spec::{TaskDefinition, TaskTemplates};

pub mod gitlab;
pub mod nomad;
