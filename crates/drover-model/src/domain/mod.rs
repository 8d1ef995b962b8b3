mod meta;
pub use meta::Meta;

mod image;
pub use image::{image_domain, image_task_name};

mod credentials;
pub use credentials::{Credentials, RegistryAuth, normalize_registry};
