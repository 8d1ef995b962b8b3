use crate::error::{ModelError, ModelResult};

const DEFAULT_DOMAIN: &str = "docker.io";
const LEGACY_DEFAULT_DOMAIN: &str = "index.docker.io";

/// Registry domain of an image reference, following Docker's normalised-name rules.
///
/// The first path component is a domain only if it contains `.` or `:` or is
/// `localhost`; any other reference lives on Docker Hub.
///
/// ```
/// use drover_model::image_domain;
///
/// assert_eq!(image_domain("registry.example.com/foo:tag").unwrap(), "registry.example.com");
/// assert_eq!(image_domain("ubuntu:latest").unwrap(), "docker.io");
/// ```
pub fn image_domain(image: &str) -> ModelResult<&str> {
    let image = validate(image)?;
    let Some((first, _rest)) = image.split_once('/') else {
        return Ok(DEFAULT_DOMAIN);
    };
    if first == LEGACY_DEFAULT_DOMAIN {
        return Ok(DEFAULT_DOMAIN);
    }
    if first.contains('.') || first.contains(':') || first == "localhost" {
        Ok(first)
    } else {
        Ok(DEFAULT_DOMAIN)
    }
}

/// Short name derived from an image: last path segment without tag or digest.
///
/// `registry.example.com:5000/team/redis:7` becomes `redis`.
pub fn image_task_name(image: &str) -> ModelResult<&str> {
    let image = validate(image)?;
    let without_digest = image.split_once('@').map_or(image, |(name, _)| name);
    let last = without_digest
        .rsplit_once('/')
        .map_or(without_digest, |(_, last)| last);
    let name = last.split_once(':').map_or(last, |(name, _tag)| name);
    if name.is_empty() {
        return Err(ModelError::InvalidImage(image.to_string()));
    }
    Ok(name)
}

fn validate(image: &str) -> ModelResult<&str> {
    let trimmed = image.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return Err(ModelError::InvalidImage(image.to_string()));
    }
    Ok(trimmed)
}
