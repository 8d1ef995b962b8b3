mod task;
pub use task::{TaskDefinition, TaskTemplates};
