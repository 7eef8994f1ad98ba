//! OpenAPI document loading.
//!
//! Thin wrapper over `openapiv3` that accepts JSON or YAML from a file, a
//! string or a URL.

use crate::error::{OpenApiError, Result};
use openapiv3::OpenAPI;
use std::path::Path;
use tracing::debug;

/// Load a spec from a file. `.json` files are parsed as JSON, everything else as YAML.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<OpenAPI> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), bytes = content.len(), "Loaded spec file");

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let spec = if is_json {
        serde_json::from_str(&content)?
    } else {
        serde_yaml::from_str(&content)?
    };
    check_version(&spec)?;
    Ok(spec)
}

/// Parse a spec from a string, trying JSON first and YAML second.
pub fn load_from_str(content: &str) -> Result<OpenAPI> {
    let spec = serde_json::from_str(content)
        .or_else(|_| serde_yaml::from_str(content))
        .map_err(|e| OpenApiError::ParseError(e.to_string()))?;
    check_version(&spec)?;
    Ok(spec)
}

/// Fetch and parse a spec over HTTP.
pub async fn load_from_url(url: &str) -> Result<OpenAPI> {
    let response = reqwest::get(url).await?.error_for_status()?;
    let content = response.text().await?;
    debug!(url, bytes = content.len(), "Fetched spec");
    load_from_str(&content)
}

/// Load from a URL when the location looks like one, otherwise from disk.
pub async fn load(location: &str) -> Result<OpenAPI> {
    if location.starts_with("http://") || location.starts_with("https://") {
        load_from_url(location).await
    } else {
        load_from_file(location)
    }
}

fn check_version(spec: &OpenAPI) -> Result<()> {
    if spec.openapi.starts_with("3.") {
        Ok(())
    } else {
        Err(OpenApiError::ParseError(format!(
            "unsupported OpenAPI version '{}', expected 3.x",
            spec.openapi
        )))
    }
}
