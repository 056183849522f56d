//! Name → constructor table for pluggable attestors.
//!
//! Built once at startup and passed to the set builder; there is no global
//! registry.

use std::collections::BTreeMap;
use std::fmt;

use super::environment::EnvironmentAttestor;
use super::git::GitAttestor;
use super::Attestor;

type Factory = Box<dyn Fn() -> Box<dyn Attestor> + Send + Sync>;

#[derive(Default)]
pub struct AttestorRegistry {
    factories: BTreeMap<String, Factory>,
}

impl AttestorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled pluggable attestors.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(super::environment::TYPE, || {
            Box::new(EnvironmentAttestor::new())
        });
        registry.register(super::git::TYPE, || Box::new(GitAttestor::new()));
        registry
    }

    /// Register (or replace) a constructor under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Attestor> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    /// Fresh instance for `name`, if registered.
    pub fn create(&self, name: &str) -> Option<Box<dyn Attestor>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for AttestorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestorRegistry")
            .field("names", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
