//! Authentication injection.
//!
//! Credentials are placed where the operation's security schemes say:
//! - API key (header, query parameter or cookie)
//! - Bearer token (`Authorization: Bearer <token>`, also used for OAuth2/OIDC)
//! - Basic auth (`Authorization: Basic <base64>`)
//!
//! Only schemes the operation references are applied. Operator-supplied
//! static headers are merged last.

use crate::marshal::RequestDescriptor;
use crate::types::Operation;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use toolgate_core::Credentials;
use tracing::{debug, warn};

/// Header used for API keys when the scheme declares no name.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Location where an API key is provided.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthLocation {
    /// In HTTP header
    Header,
    /// In URL query parameter
    Query,
    /// In a cookie
    Cookie,
}

/// Security scheme declared by the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecurityScheme {
    ApiKey { location: AuthLocation, name: String },
    Bearer,
    Basic,
    /// An HTTP scheme other than bearer/basic (e.g. digest)
    HttpUnsupported { scheme: String },
    OAuth2,
    OpenIdConnect,
}

impl SecurityScheme {
    pub fn from_openapi(scheme: &openapiv3::SecurityScheme) -> Self {
        match scheme {
            openapiv3::SecurityScheme::APIKey { location, name, .. } => SecurityScheme::ApiKey {
                location: match location {
                    openapiv3::APIKeyLocation::Header => AuthLocation::Header,
                    openapiv3::APIKeyLocation::Query => AuthLocation::Query,
                    openapiv3::APIKeyLocation::Cookie => AuthLocation::Cookie,
                },
                name: name.clone(),
            },
            openapiv3::SecurityScheme::HTTP { scheme, .. } => {
                match scheme.to_ascii_lowercase().as_str() {
                    "bearer" => SecurityScheme::Bearer,
                    "basic" => SecurityScheme::Basic,
                    _ => SecurityScheme::HttpUnsupported {
                        scheme: scheme.clone(),
                    },
                }
            }
            openapiv3::SecurityScheme::OAuth2 { .. } => SecurityScheme::OAuth2,
            openapiv3::SecurityScheme::OpenIDConnect { .. } => SecurityScheme::OpenIdConnect,
        }
    }
}

/// Applies configured credentials to outgoing requests.
#[derive(Clone)]
pub struct AuthInjector {
    schemes: BTreeMap<String, SecurityScheme>,
    credentials: Credentials,
}

impl std::fmt::Debug for AuthInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInjector")
            .field("schemes", &self.schemes)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl AuthInjector {
    pub fn new(schemes: BTreeMap<String, SecurityScheme>, credentials: Credentials) -> Self {
        Self {
            schemes,
            credentials,
        }
    }

    pub fn schemes(&self) -> &BTreeMap<String, SecurityScheme> {
        &self.schemes
    }

    /// Decorate `request` for `operation`. `per_call` overrides the configured
    /// credentials field by field.
    pub fn apply(
        &self,
        request: &mut RequestDescriptor,
        operation: &Operation,
        per_call: Option<&Credentials>,
    ) {
        let credentials = match per_call {
            Some(over) => self.credentials.overlay(over),
            None => self.credentials.clone(),
        };

        let mut authorization_set = false;
        let mut applied = Vec::new();

        for requirement in &operation.security {
            if applied.contains(&requirement.scheme_name.as_str()) {
                continue;
            }
            let Some(scheme) = self.schemes.get(&requirement.scheme_name) else {
                warn!(
                    scheme = %requirement.scheme_name,
                    operation = %operation.id,
                    "Operation references an undeclared security scheme"
                );
                continue;
            };

            let used = match scheme {
                SecurityScheme::ApiKey { location, name } => match &credentials.api_key {
                    Some(key) => {
                        let name = if name.trim().is_empty() {
                            DEFAULT_API_KEY_HEADER
                        } else {
                            name.as_str()
                        };
                        match location {
                            AuthLocation::Header => request.set_header(name, key.clone()),
                            AuthLocation::Query => request.set_query(name, key.clone()),
                            AuthLocation::Cookie => request.set_cookie(name, key.clone()),
                        }
                        true
                    }
                    None => false,
                },
                SecurityScheme::Bearer | SecurityScheme::OAuth2 | SecurityScheme::OpenIdConnect => {
                    match &credentials.bearer_token {
                        Some(token) if !authorization_set => {
                            request.set_header("Authorization", format!("Bearer {token}"));
                            authorization_set = true;
                            true
                        }
                        _ => false,
                    }
                }
                SecurityScheme::Basic => match &credentials.basic {
                    Some(basic) if !authorization_set => {
                        let encoded =
                            STANDARD.encode(format!("{}:{}", basic.username, basic.password));
                        request.set_header("Authorization", format!("Basic {encoded}"));
                        authorization_set = true;
                        true
                    }
                    _ => false,
                },
                SecurityScheme::HttpUnsupported { scheme } => {
                    warn!(scheme = %scheme, "Unsupported HTTP auth scheme; no credentials sent");
                    false
                }
            };

            if used {
                applied.push(requirement.scheme_name.as_str());
            }
        }

        for (name, value) in &credentials.headers {
            request.set_header(name.clone(), value.clone());
        }

        debug!(
            operation = %operation.id,
            schemes = ?applied,
            static_headers = credentials.headers.len(),
            "Applied authentication"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HttpMethod, SecurityRequirement};

    fn operation(schemes: &[&str]) -> Operation {
        Operation {
            id: "op".to_string(),
            method: HttpMethod::Get,
            path: "/x".to_string(),
            parameters: vec![],
            request_body: None,
            summary: None,
            description: None,
            tags: vec![],
            deprecated: false,
            security: schemes
                .iter()
                .map(|name| SecurityRequirement {
                    scheme_name: name.to_string(),
                    scopes: vec![],
                })
                .collect(),
        }
    }

    fn schemes() -> BTreeMap<String, SecurityScheme> {
        BTreeMap::from([
            (
                "queryKey".to_string(),
                SecurityScheme::ApiKey {
                    location: AuthLocation::Query,
                    name: "api_key".to_string(),
                },
            ),
            (
                "cookieKey".to_string(),
                SecurityScheme::ApiKey {
                    location: AuthLocation::Cookie,
                    name: "sid".to_string(),
                },
            ),
            (
                "unnamed".to_string(),
                SecurityScheme::ApiKey {
                    location: AuthLocation::Header,
                    name: String::new(),
                },
            ),
            ("bearer".to_string(), SecurityScheme::Bearer),
            ("basic".to_string(), SecurityScheme::Basic),
        ])
    }

    #[test]
    fn test_api_key_locations() {
        let injector = AuthInjector::new(schemes(), Credentials::api_key("secret"));

        let mut request = RequestDescriptor::new(HttpMethod::Get, "/x");
        injector.apply(&mut request, &operation(&["queryKey"]), None);
        assert_eq!(request.query, vec![("api_key".to_string(), "secret".to_string())]);

        let mut request = RequestDescriptor::new(HttpMethod::Get, "/x");
        injector.apply(&mut request, &operation(&["cookieKey"]), None);
        assert_eq!(request.cookie_header().as_deref(), Some("sid=secret"));

        let mut request = RequestDescriptor::new(HttpMethod::Get, "/x");
        injector.apply(&mut request, &operation(&["unnamed"]), None);
        assert_eq!(request.header(DEFAULT_API_KEY_HEADER), Some("secret"));
    }

    #[test]
    fn test_bearer_and_basic() {
        let injector = AuthInjector::new(schemes(), Credentials::bearer("tok"));
        let mut request = RequestDescriptor::new(HttpMethod::Get, "/x");
        injector.apply(&mut request, &operation(&["bearer"]), None);
        assert_eq!(request.header("authorization"), Some("Bearer tok"));

        let injector = AuthInjector::new(schemes(), Credentials::basic("user", "pass"));
        let mut request = RequestDescriptor::new(HttpMethod::Get, "/x");
        injector.apply(&mut request, &operation(&["basic"]), None);
        assert_eq!(request.header("Authorization"), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn test_unreferenced_credentials_are_not_sent() {
        let injector = AuthInjector::new(schemes(), Credentials::bearer("tok"));
        let mut request = RequestDescriptor::new(HttpMethod::Get, "/x");
        injector.apply(&mut request, &operation(&[]), None);
        assert!(request.header("Authorization").is_none());
    }

    #[test]
    fn test_per_call_override_and_static_headers() {
        let configured = Credentials::bearer("configured").with_header("X-Tenant", "acme");
        let injector = AuthInjector::new(schemes(), configured);

        let mut request = RequestDescriptor::new(HttpMethod::Get, "/x");
        request.set_header("Authorization", "from-argument");
        injector.apply(
            &mut request,
            &operation(&["bearer"]),
            Some(&Credentials::bearer("per-call")),
        );
        assert_eq!(request.header("Authorization"), Some("Bearer per-call"));
        assert_eq!(request.header("x-tenant"), Some("acme"));
    }

    #[test]
    fn test_static_headers_win_over_auth() {
        let configured = Credentials::bearer("tok").with_header("Authorization", "Custom abc");
        let injector = AuthInjector::new(schemes(), configured);
        let mut request = RequestDescriptor::new(HttpMethod::Get, "/x");
        injector.apply(&mut request, &operation(&["bearer"]), None);
        assert_eq!(request.header("Authorization"), Some("Custom abc"));
    }
}
