//! Upstream credentials.
//!
//! Credentials are plain strings handed to the engine by whoever owns the
//! configuration. Which of them actually reach an endpoint is decided by the
//! operation's security requirements, not here.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Username/password pair for HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credentials available for injection into outgoing requests.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// API key, placed where the spec's `apiKey` scheme says
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Token sent as `Authorization: Bearer <token>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,

    /// Credentials sent as `Authorization: Basic <base64(user:pass)>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic: Option<BasicCredentials>,

    /// Operator-supplied static headers, merged in after auth injection
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .field("basic", &self.basic)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Credentials {
    /// No credentials at all.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            basic: Some(BasicCredentials {
                username: username.into(),
                password: password.into(),
            }),
            ..Self::default()
        }
    }

    /// Add a static header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_none()
            && self.bearer_token.is_none()
            && self.basic.is_none()
            && self.headers.is_empty()
    }

    /// Layer `over` on top of `self`, field by field.
    ///
    /// Fields set in `over` win; static headers are merged with `over`
    /// replacing same-named entries (names compared case-insensitively).
    pub fn overlay(&self, over: &Credentials) -> Credentials {
        let mut headers = self.headers.clone();
        for (name, value) in &over.headers {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
            headers.insert(name.clone(), value.clone());
        }

        Credentials {
            api_key: over.api_key.clone().or_else(|| self.api_key.clone()),
            bearer_token: over.bearer_token.clone().or_else(|| self.bearer_token.clone()),
            basic: over.basic.clone().or_else(|| self.basic.clone()),
            headers,
        }
    }

    /// Parse a `user:pass` string. The password may itself contain colons.
    pub fn parse_basic(raw: &str) -> Result<BasicCredentials> {
        let (username, password) = raw
            .split_once(':')
            .ok_or_else(|| Error::auth_error("basic credentials must look like user:pass"))?;

        if username.is_empty() {
            return Err(Error::auth_error("basic credentials have an empty username"));
        }

        Ok(BasicCredentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Parse a header list of the form `Name: value; Other-Name: value`.
    pub fn parse_header_list(raw: &str) -> Result<BTreeMap<String, String>> {
        let mut headers = BTreeMap::new();
        for entry in raw.split([';', '\n']).map(str::trim).filter(|e| !e.is_empty()) {
            let (name, value) = entry.split_once(':').ok_or_else(|| {
                Error::config_error(format!("header '{entry}' must look like Name: value"))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::config_error(format!("header '{entry}' has no name")));
            }
            headers.insert(name.to_string(), value.trim().to_string());
        }
        Ok(headers)
    }
}
