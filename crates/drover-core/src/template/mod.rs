//! Task Template Engine.
//!
//! A task's driver configuration is a Handlebars template whose output must be
//! a TOML document. Rendering then parsing catches malformed configuration at
//! build time instead of at the scheduler.
//!
//! Templates target TOML, not HCL. Driver configs written for HCL-based
//! executors have to be converted: `key = value` lines carry over, but HCL
//! blocks (`mount { ... }`) become tables or inline tables
//! (`mount = [{ type = "bind" }]`).
//!
//! Helpers available inside templates:
//! - `{{toml X}}` encodes any value as a TOML literal;
//! - `{{head X}}` / `{{tail X}}` split an array into its first element and the rest.
//!
//! ```
//! use drover_core::template::TemplateEngine;
//! use serde_json::json;
//!
//! let engine = TemplateEngine::new();
//! let config = engine
//!     .render(
//!         "image = {{toml Image}}\nargs = {{toml (tail Cmd)}}",
//!         &json!({"Image": "debian:latest", "Cmd": ["sh", "-c", "true"]}),
//!     )
//!     .unwrap();
//! assert_eq!(config["image"], "debian:latest");
//! assert_eq!(config["args"], json!(["-c", "true"]));
//! ```

mod error;
mod helpers;

pub use error::TemplateError;

use handlebars::Handlebars;
use serde_json::{Map, Value};
use tracing::trace;

pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper("toml", Box::new(helpers::toml_literal));
        registry.register_helper("head", Box::new(helpers::head));
        registry.register_helper("tail", Box::new(helpers::tail));
        Self { registry }
    }

    /// Render `template` against `values` and parse the result into a driver
    /// configuration object.
    pub fn render(&self, template: &str, values: &Value) -> Result<Map<String, Value>, TemplateError> {
        handlebars::Template::compile(template)
            .map_err(|e| TemplateError::Syntax(e.to_string()))?;

        let text = self
            .registry
            .render_template(template, values)
            .map_err(|e| TemplateError::Render(e.to_string()))?;
        trace!(rendered = %text, "driver config rendered");

        let table: toml::Table = toml::from_str(&text)?;
        match serde_json::to_value(table) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(TemplateError::Convert(format!("expected a table, got {other}"))),
            Err(e) => Err(TemplateError::Convert(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOCKER: &str = r#"
image = {{toml Image}}
entrypoint = [{{toml ExecScript}}]
{{#if Auth}}
[auth]
username = {{toml Auth.Username}}
password = {{toml Auth.Password}}
{{/if}}
"#;

    fn job_values(auth: Value) -> Value {
        json!({
            "Image": "registry.example.com/foo:tag",
            "Entrypoint": null,
            "ExecScript": "${NOMAD_TASK_DIR}/exec_script.sh",
            "Auth": auth,
        })
    }

    #[test]
    fn renders_and_parses_driver_config() {
        let engine = TemplateEngine::new();
        let config = engine
            .render(DOCKER, &job_values(json!({"Username": "u", "Password": "p\"w"})))
            .unwrap();

        assert_eq!(config["image"], "registry.example.com/foo:tag");
        assert_eq!(config["entrypoint"], json!(["${NOMAD_TASK_DIR}/exec_script.sh"]));
        assert_eq!(config["auth"], json!({"username": "u", "password": "p\"w"}));
    }

    #[test]
    fn null_auth_renders_no_block() {
        let engine = TemplateEngine::new();
        let config = engine.render(DOCKER, &job_values(Value::Null)).unwrap();
        assert!(config.get("auth").is_none());
    }

    #[test]
    fn rendering_is_deterministic() {
        let engine = TemplateEngine::new();
        let values = job_values(json!({"Username": "u", "Password": "p"}));

        let a = serde_json::to_string(&engine.render(DOCKER, &values).unwrap()).unwrap();
        let b = serde_json::to_string(&TemplateEngine::new().render(DOCKER, &values).unwrap()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn head_and_tail_split_commands() {
        let engine = TemplateEngine::new();
        let config = engine
            .render(
                "command = {{toml (head Cmd)}}\nargs = {{toml (tail Cmd)}}",
                &json!({"Cmd": ["docker-entrypoint.sh", "postgres"]}),
            )
            .unwrap();
        assert_eq!(config["command"], "docker-entrypoint.sh");
        assert_eq!(config["args"], json!(["postgres"]));
    }

    #[test]
    fn undefined_value_is_a_render_error() {
        let engine = TemplateEngine::new();
        match engine.render("image = {{toml Missing}}", &json!({"Image": "x"})) {
            Err(TemplateError::Render(_)) => {}
            other => panic!("expected Render error, got {other:?}"),
        }
    }

    #[test]
    fn malformed_template_is_a_syntax_error() {
        let engine = TemplateEngine::new();
        match engine.render("image = {{#if Image}}", &json!({"Image": "x"})) {
            Err(TemplateError::Syntax(_)) => {}
            other => panic!("expected Syntax error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_toml_output_is_a_parse_error() {
        let engine = TemplateEngine::new();
        match engine.render("image = {{Image}}", &json!({"Image": "not quoted"})) {
            Err(TemplateError::Parse(_)) => {}
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn hcl_block_syntax_is_rejected() {
        let engine = TemplateEngine::new();
        let hcl = "image = {{toml Image}}\nmount {\n  type = \"bind\"\n}\n";
        match engine.render(hcl, &json!({"Image": "alpine"})) {
            Err(TemplateError::Parse(_)) => {}
            other => panic!("expected Parse error, got {other:?}"),
        }

        let toml = "image = {{toml Image}}\nmount = [{ type = \"bind\" }]\n";
        let out = engine.render(toml, &json!({"Image": "alpine"})).unwrap();
        assert_eq!(out["mount"][0]["type"], "bind");
    }
}
