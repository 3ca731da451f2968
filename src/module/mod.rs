use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::Request;

/// A module and the URI prefix that pulls it in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    pub load: String,
}

/// Modules initialized for the current request
#[derive(Debug, Clone, Default)]
pub struct ActiveModules {
    names: Vec<String>,
}

impl ActiveModules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn activate(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }
}

/// Process-wide module registry built from the route file
#[derive(Debug, Clone, Default)]
pub struct ModuleManager {
    modules: Vec<ModuleDescriptor>,
}

impl ModuleManager {
    pub fn new(modules: Vec<ModuleDescriptor>) -> Self {
        Self { modules }
    }

    pub fn descriptors(&self) -> &[ModuleDescriptor] {
        &self.modules
    }

    /// Modules whose load prefix occurs in the request path, language segment excluded
    pub fn modules_for(&self, request: &Request) -> Vec<&ModuleDescriptor> {
        let path = request.path_without_language();
        self.modules
            .iter()
            .filter(|m| !m.load.is_empty() && path.contains(m.load.as_str()))
            .collect()
    }

    /// Initialize the modules `request` needs; returns the names that were not active yet
    pub fn initialize_for(&self, request: &Request, active: &mut ActiveModules) -> Vec<String> {
        let mut initialized = Vec::new();

        for module in self.modules_for(request) {
            if active.activate(&module.name) {
                debug!("Initialized module {} for {}", module.name, request.path());
                initialized.push(module.name.clone());
            }
        }

        initialized
    }
}
