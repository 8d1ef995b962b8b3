use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template syntax error: {0}")]
    Syntax(String),

    #[error("template render error: {0}")]
    Render(String),

    #[error("rendered config is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("rendered config cannot be converted: {0}")]
    Convert(String),
}
