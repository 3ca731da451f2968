use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::handlers::{Handler, HandlerRegistry};
use crate::module::ModuleDescriptor;
use crate::types::RouteVerb;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Invalid route pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Route '{pattern}' points to unknown handler '{dest}'")]
    UnknownHandler { pattern: String, dest: String },

    #[error("Failed to read route file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse route file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// One entry of the route file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEntry {
    pub pattern: String,
    pub verb: RouteVerb,
    pub dest: String,
}

/// Parsed route file: module descriptors plus routes in declaration order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteTable {
    #[serde(default)]
    pub modules: Vec<ModuleDescriptor>,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn from_yaml(source: &str) -> Result<Self, RouteError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RouteError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| RouteError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&source)
    }
}

/// Resolved destination of a route
#[derive(Clone)]
pub struct RouteTarget {
    pub id: String,
    pub handler: Arc<dyn Handler>,
}

impl fmt::Debug for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTarget").field("id", &self.id).finish()
    }
}

#[derive(Debug, Clone)]
pub struct Route {
    pattern: String,
    regex: Regex,
    verb: RouteVerb,
    target: RouteTarget,
}

impl Route {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn verb(&self) -> RouteVerb {
        self.verb
    }

    pub fn target(&self) -> &RouteTarget {
        &self.target
    }

    fn matches(&self, verb: RouteVerb, path: &str) -> bool {
        self.verb.matches(verb) && self.regex.is_match(path)
    }
}

/// Ordered route table; immutable once the application is built
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every entry of `table` against `registry`; any bad entry fails the whole load
    pub fn from_table(table: &RouteTable, registry: &HandlerRegistry) -> Result<Self, RouteError> {
        let mut router = Self::new();

        for entry in &table.routes {
            let handler = registry.get(&entry.dest).ok_or_else(|| RouteError::UnknownHandler {
                pattern: entry.pattern.clone(),
                dest: entry.dest.clone(),
            })?;

            router.add(
                &entry.pattern,
                entry.verb,
                RouteTarget {
                    id: entry.dest.clone(),
                    handler,
                },
            )?;
        }

        info!("Loaded {} routes", router.len());
        Ok(router)
    }

    /// Append a route; patterns always match the whole path
    pub fn add(&mut self, pattern: &str, verb: RouteVerb, target: RouteTarget) -> Result<(), RouteError> {
        let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|source| RouteError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;

        self.routes.push(Route {
            pattern: pattern.to_string(),
            regex,
            verb,
            target,
        });
        Ok(())
    }

    /// First route in registration order whose verb and pattern both match
    pub fn route(&self, verb: RouteVerb, path: &str) -> Option<&RouteTarget> {
        let found = self.routes.iter().find(|r| r.matches(verb, path));

        match found {
            Some(route) => debug!("{} {} matched '{}' -> {}", verb, path, route.pattern, route.target.id),
            None => debug!("{} {} matched no route", verb, path),
        }

        found.map(|r| &r.target)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
