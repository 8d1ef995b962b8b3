pub mod builder;
pub mod config;
pub mod error;
pub mod router;
pub mod shell;
pub mod template;

pub mod prelude {
    pub use crate::builder::{BuildRequest, JobBuilder};
    pub use crate::config::{Config, ConfigError};
    pub use crate::error::CoreError;
    pub use crate::router::route_stage;
    pub use crate::template::{TemplateEngine, TemplateError};
}
