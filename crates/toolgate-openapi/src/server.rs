//! Base URL selection.
//!
//! An explicit override always wins. Otherwise one of the declared servers is
//! picked uniformly at random on every call, spreading load across replicas.

use crate::error::SelectionError;
use openapiv3::OpenAPI;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Source of the per-call server choice.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `0..upper`. `upper` is never zero.
    fn pick(&self, upper: usize) -> usize;
}

/// Thread-local RNG; the production default.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn pick(&self, upper: usize) -> usize {
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Deterministic generator for tests and reproducible runs.
#[derive(Debug)]
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn pick(&self, upper: usize) -> usize {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(0..upper),
            Err(poisoned) => poisoned.into_inner().gen_range(0..upper),
        }
    }
}

/// Chooses the base URL for each call.
#[derive(Clone)]
pub struct ServerSelector {
    override_url: Option<String>,
    servers: Vec<String>,
    random: Arc<dyn RandomSource>,
}

impl std::fmt::Debug for ServerSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSelector")
            .field("override_url", &self.override_url)
            .field("servers", &self.servers)
            .finish()
    }
}

impl ServerSelector {
    pub fn new(servers: Vec<String>, override_url: Option<String>) -> Self {
        Self {
            override_url: override_url.filter(|url| !url.trim().is_empty()),
            servers,
            random: Arc::new(ThreadRandom),
        }
    }

    /// Servers declared at the top level of the document, with `{variable}`
    /// placeholders replaced by their defaults.
    pub fn from_spec(spec: &OpenAPI, override_url: Option<String>) -> Self {
        let servers = spec
            .servers
            .iter()
            .map(|server| {
                let mut url = server.url.clone();
                if let Some(variables) = &server.variables {
                    for (name, variable) in variables {
                        url = url.replace(&format!("{{{name}}}"), &variable.default);
                    }
                }
                url
            })
            .collect();
        Self::new(servers, override_url)
    }

    pub fn with_random(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn override_url(&self) -> Option<&str> {
        self.override_url.as_deref()
    }

    /// Base URL for one call.
    pub fn select(&self) -> Result<String, SelectionError> {
        if let Some(url) = &self.override_url {
            return Ok(url.clone());
        }

        let url = match self.servers.len() {
            0 => return Err(SelectionError::NoServers),
            1 => &self.servers[0],
            n => &self.servers[self.random.pick(n)],
        };

        if !is_absolute(url) {
            return Err(SelectionError::RelativeServer(url.clone()));
        }

        debug!(server = %url, "Selected server");
        Ok(url.clone())
    }
}

fn is_absolute(url: &str) -> bool {
    url::Url::parse(url).is_ok_and(|u| u.has_host())
}
