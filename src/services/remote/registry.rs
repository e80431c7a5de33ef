//! Command Registry
//!
//! Stores every registrable command by name. Registration happens once at
//! startup; afterwards the registry is frozen behind an `Arc` and only read
//! (help lookups, plugin listing, router construction).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::command_router::CommandRouter;
use super::types::CommandSpec;
use crate::utils::error::AppResult;

/// Registry of available commands.
///
/// Provides O(1) lookup by name and deterministic iteration in
/// registration order.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<CommandSpec>>,
    /// Insertion order for deterministic iteration
    order: Vec<String>,
    /// Module name -> command whose help answers for the whole module
    module_keys: HashMap<String, String>,
}

impl CommandRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. A command with the same name is replaced; its
    /// position in registration order is kept.
    pub fn register(&mut self, spec: CommandSpec) {
        let name = spec.name.clone();
        if !self.commands.contains_key(&name) {
            self.order.push(name.clone());
        }
        if !spec.module.is_empty() && spec.help_text.is_some() {
            self.module_keys
                .entry(spec.module.clone())
                .or_insert_with(|| name.clone());
        }
        tracing::debug!("[Registry] Registered command '{}' ({})", name, spec.match_mode);
        self.commands.insert(name, Arc::new(spec));
    }

    /// Look up a command by name.
    pub fn get(&self, name: &str) -> Option<Arc<CommandSpec>> {
        self.commands.get(name).cloned()
    }

    /// Help text for a command name, or for a module name (answered by the
    /// first command registered with help in that module).
    pub fn help_for(&self, name: &str) -> Option<&str> {
        if let Some(spec) = self.commands.get(name) {
            return spec.help_text.as_deref();
        }
        self.module_keys
            .get(name)
            .and_then(|cmd| self.commands.get(cmd))
            .and_then(|spec| spec.help_text.as_deref())
    }

    /// All registered names, sorted for display.
    pub fn list(&self) -> Vec<String> {
        let mut names = self.order.clone();
        names.sort();
        names
    }

    /// Registered commands in registration order.
    pub fn specs(&self) -> impl Iterator<Item = Arc<CommandSpec>> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.commands.get(name).cloned())
    }

    /// Commands grouped by module, modules sorted by name.
    pub fn modules(&self) -> BTreeMap<String, Vec<Arc<CommandSpec>>> {
        let mut modules: BTreeMap<String, Vec<Arc<CommandSpec>>> = BTreeMap::new();
        for spec in self.specs() {
            modules.entry(spec.module.clone()).or_default().push(spec);
        }
        modules
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Compile the immutable routing table for the given prefix symbols.
    pub fn build_router(&self, prefixes: &[char]) -> AppResult<CommandRouter> {
        CommandRouter::build(self, prefixes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::remote::types::{CommandContext, CommandFuture};
    use chat_companion_core::InboundEvent;

    fn noop(_: CommandContext, _: InboundEvent) -> CommandFuture {
        Box::pin(async { Ok(()) })
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandSpec::new("ping", noop).with_help("Ping"));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("ping").is_some());
        assert!(registry.get("pong").is_none());
    }

    #[test]
    fn test_reregister_keeps_single_entry_last_help_wins() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandSpec::new("ping", noop).with_help("first"));
        registry.register(CommandSpec::new("ping", noop).with_help("second"));

        let names = registry.list();
        assert_eq!(names.iter().filter(|n| *n == "ping").count(), 1);
        assert_eq!(registry.help_for("ping"), Some("second"));
    }

    #[test]
    fn test_help_for_is_stable() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandSpec::new("term", noop).with_help("Run a command"));
        assert_eq!(registry.help_for("term"), registry.help_for("term"));
        assert_eq!(registry.help_for("missing"), None);
    }

    #[test]
    fn test_list_is_sorted() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandSpec::new("version", noop));
        registry.register(CommandSpec::new("afk", noop));
        registry.register(CommandSpec::new("ping", noop));
        assert_eq!(registry.list(), vec!["afk", "ping", "version"]);

        let order: Vec<String> = registry.specs().map(|s| s.name.clone()).collect();
        assert_eq!(order, vec!["version", "afk", "ping"]);
    }

    #[test]
    fn test_module_default_help_key_is_first_command() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandSpec::new("plugins", noop).in_module("plugins"));
        registry.register(
            CommandSpec::new("term", noop)
                .with_help("Run a local command")
                .in_module("terminals"),
        );
        registry.register(
            CommandSpec::new("upload", noop)
                .with_help("Upload a file")
                .in_module("terminals"),
        );

        assert_eq!(registry.help_for("terminals"), Some("Run a local command"));
        // A module without any help text has no default key.
        assert_eq!(registry.help_for("plugins"), None);
        // Explicit command names take precedence.
        assert_eq!(registry.help_for("upload"), Some("Upload a file"));
    }

    #[test]
    fn test_modules_grouping() {
        let mut registry = CommandRegistry::new();
        registry.register(CommandSpec::new("term", noop).in_module("terminals"));
        registry.register(CommandSpec::new("afk", noop).in_module("afk"));
        registry.register(CommandSpec::new("upload", noop).in_module("terminals"));

        let modules = registry.modules();
        let keys: Vec<&String> = modules.keys().collect();
        assert_eq!(keys, vec!["afk", "terminals"]);
        let terminals: Vec<&str> = modules["terminals"].iter().map(|s| s.name.as_str()).collect();
        assert_eq!(terminals, vec!["term", "upload"]);
    }
}
