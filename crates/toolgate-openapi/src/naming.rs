//! Tool name formatting.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How operation ids are turned into tool names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolNameFormat {
    /// Keep the operation id unchanged
    #[default]
    AsIs,
    Snake,
    Lower,
    Upper,
}

impl FromStr for ToolNameFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "as-is" | "asis" | "none" => Ok(ToolNameFormat::AsIs),
            "snake" | "snake_case" => Ok(ToolNameFormat::Snake),
            "lower" | "lowercase" => Ok(ToolNameFormat::Lower),
            "upper" | "uppercase" => Ok(ToolNameFormat::Upper),
            other => Err(format!(
                "unknown tool name format '{other}' (expected as-is, snake, lower or upper)"
            )),
        }
    }
}

impl ToolNameFormat {
    pub fn apply(&self, operation_id: &str, prefix: Option<&str>) -> String {
        let name = match self {
            ToolNameFormat::AsIs => operation_id.to_string(),
            ToolNameFormat::Snake => to_snake_case(operation_id),
            ToolNameFormat::Lower => operation_id.to_lowercase(),
            ToolNameFormat::Upper => operation_id.to_uppercase(),
        };
        match prefix.filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{prefix}{name}"),
            None => name,
        }
    }
}

/// Convert a string to snake_case.
pub fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    let mut prev_upper = false;

    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 && !prev_upper && !result.ends_with('_') {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
            prev_upper = true;
        } else {
            if c == '-' || c == ' ' || c == '.' {
                result.push('_');
            } else {
                result.push(c);
            }
            prev_upper = false;
        }
    }

    result
}
