use lazy_static::lazy_static;
use std::collections::BTreeMap;
use std::sync::Arc;
use strum_macros::{Display, EnumString};
use tracing::warn;

use super::BuiltinFunction;
use crate::ast::{FunctionRef, Signature};
use crate::provider::PluginFunction;

lazy_static! {
    static ref BUILTINS: BTreeMap<String, BuiltinFunction> = BuiltinFunction::all()
        .map(|function| (function.to_string(), function))
        .collect();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum FunctionOrigin {
    Builtin,
    Plugin,
}

/// One line of [`FunctionRegistry::describe`].
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDescription {
    pub name: String,
    pub signature: Signature,
    pub origin: FunctionOrigin,
    pub description: String,
}

/// The functions a parser may resolve: every built-in plus the plugin
/// functions of one site, snapshotted when the registry is built.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    plugins: BTreeMap<String, Arc<dyn PluginFunction>>,
}

impl FunctionRegistry {
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Adds plugin functions. A plugin whose name matches a built-in is ignored.
    pub fn with_plugins(plugins: Vec<Arc<dyn PluginFunction>>) -> Self {
        let mut registry = Self::default();
        for plugin in plugins {
            let name = plugin.name().to_string();
            if BUILTINS.contains_key(&name) {
                warn!("plugin function {}() would shadow a built-in; ignored", name);
                continue;
            }
            registry.plugins.insert(name, plugin);
        }
        registry
    }

    pub fn resolve(&self, name: &str) -> Option<FunctionRef> {
        BUILTINS
            .get(name)
            .map(|builtin| FunctionRef::Builtin(*builtin))
            .or_else(|| self.plugins.get(name).cloned().map(FunctionRef::Plugin))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTINS
            .keys()
            .chain(self.plugins.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Every available function with its calling convention, sorted by name.
    pub fn describe(&self) -> Vec<FunctionDescription> {
        let builtins = BUILTINS.values().map(|builtin| FunctionDescription {
            name: builtin.to_string(),
            signature: builtin.signature(),
            origin: FunctionOrigin::Builtin,
            description: builtin.description().to_string(),
        });
        let plugins = self.plugins.values().map(|plugin| FunctionDescription {
            name: plugin.name().to_string(),
            signature: plugin.signature(),
            origin: FunctionOrigin::Plugin,
            description: String::new(),
        });
        let mut all: Vec<_> = builtins.chain(plugins).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}
