//! Command Router
//!
//! Resolves an inbound message to at most one registered command.
//!
//! Prefixed commands match `<prefix><name>` followed by end of text or
//! whitespace; everything after the whitespace is captured as group 0.
//! Free-form commands match their own pattern from the start of the text.
//! Matching is case-sensitive for both forms; a free-form pattern can opt in
//! to case-insensitivity with `(?i)`.
//!
//! When several commands match, prefixed commands win over free-form ones,
//! then the longer command name / pattern wins, then registration order.

use std::sync::Arc;

use chat_companion_core::InboundEvent;
use regex::Regex;

use super::registry::CommandRegistry;
use super::types::{CommandSpec, MatchMode};
use crate::utils::error::{AppError, AppResult};

struct Route {
    spec: Arc<CommandSpec>,
    pattern: Regex,
    rank: (u8, usize),
}

/// A resolved command and the captures of its pattern.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub spec: Arc<CommandSpec>,
    pub groups: Vec<String>,
}

/// Immutable routing table built from a frozen registry.
pub struct CommandRouter {
    routes: Vec<Route>,
}

impl CommandRouter {
    /// Compile one pattern per registered command.
    pub fn build(registry: &CommandRegistry, prefixes: &[char]) -> AppResult<Self> {
        if prefixes.is_empty() {
            return Err(AppError::config("At least one command prefix is required"));
        }
        let class: String = prefixes
            .iter()
            .map(|c| regex::escape(&c.to_string()))
            .collect();

        let mut routes = Vec::new();
        for spec in registry.specs() {
            let (source, rank) = match &spec.match_mode {
                MatchMode::ExactPrefixedWord => (
                    format!(
                        r"^[{}]{}(?:\s+(?s:(.*)))?$",
                        class,
                        regex::escape(&spec.name)
                    ),
                    (1, spec.name.len()),
                ),
                MatchMode::FreeformPattern(pattern) => {
                    (format!("^(?:{})", pattern), (0, pattern.len()))
                }
            };
            let pattern = Regex::new(&source)?;
            routes.push(Route {
                spec,
                pattern,
                rank,
            });
        }

        Ok(Self { routes })
    }

    /// Resolve text to the most specific matching command.
    pub fn resolve_text(&self, text: &str) -> Option<RouteMatch> {
        let mut best: Option<(&Route, regex::Captures<'_>)> = None;
        for route in &self.routes {
            let Some(caps) = route.pattern.captures(text) else {
                continue;
            };
            let better = match &best {
                Some((current, _)) => route.rank > current.rank,
                None => true,
            };
            if better {
                best = Some((route, caps));
            }
        }

        best.map(|(route, caps)| RouteMatch {
            spec: route.spec.clone(),
            groups: caps
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        })
    }

    /// Resolve an event. Only operator messages are eligible; edits resolve
    /// only to commands that react to edits.
    pub fn resolve(&self, event: &InboundEvent) -> Option<RouteMatch> {
        if !event.is_outgoing {
            return None;
        }
        let found = self.resolve_text(&event.raw_text)?;
        if event.is_edit && !found.spec.react_to_edits {
            return None;
        }
        Some(found)
    }

    /// Number of compiled routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
