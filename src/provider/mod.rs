//! # Collaborators
//!
//! The expression core talks to the outside world only through the traits in
//! this module: a graph transaction, a permission engine, an inheritance
//! resolver and a plugin registry. [`in_memory`] implements all of them over
//! a fixed snapshot, for tests and the command line tool.

pub mod capabilities;
pub mod in_memory;

use std::sync::Arc;

pub use capabilities::{
    GraphTransaction, InheritanceResolver, Permission, PermissionObject, PermissionProvider,
    PluginFunction, PluginRegistry, Subject,
};
pub use capabilities::{
    MockGraphTransaction, MockInheritanceResolver, MockPermissionProvider, MockPluginRegistry,
};

/// Handles to every collaborator a context needs.
#[derive(Clone)]
pub struct Providers {
    pub transaction: Arc<dyn GraphTransaction>,
    pub permissions: Arc<dyn PermissionProvider>,
    pub inheritance: Arc<dyn InheritanceResolver>,
    pub plugins: Arc<dyn PluginRegistry>,
}

impl Providers {
    /// Uses one backend for all four roles.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: GraphTransaction + PermissionProvider + InheritanceResolver + PluginRegistry + 'static,
    {
        Self {
            transaction: backend.clone(),
            permissions: backend.clone(),
            inheritance: backend.clone(),
            plugins: backend,
        }
    }
}
