// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity listener registrations.
//!
//! Listeners live in four independent tables keyed by exact entity ID,
//! compiled pattern, domain and substring. Registration never checks for
//! duplicates: registering the same key twice yields two listeners.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use regex::Regex;

use super::FilterOptions;
use crate::error::Error;
use crate::state::StateChangeEvent;
use crate::types::domain_of;

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener({})", self.0)
    }
}

/// Selects the entities a listener receives.
///
/// # Examples
///
/// ```
/// use hubsocket::subscription::Matcher;
///
/// assert!(Matcher::entity("light.kitchen").matches("light.kitchen"));
/// assert!(Matcher::pattern(r"^light\..*$").unwrap().matches("light.kitchen"));
/// assert!(Matcher::domain("light").matches("light.kitchen"));
/// assert!(Matcher::substring("kitchen").matches("light.kitchen"));
///
/// assert!(!Matcher::domain("light").matches("switch.light"));
/// ```
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Exactly one entity ID.
    Entity(String),
    /// Entity IDs matching a regular expression.
    Pattern(Regex),
    /// Entity IDs in a domain.
    Domain(String),
    /// Entity IDs containing a substring.
    Substring(String),
}

impl Matcher {
    /// Matches one entity ID.
    #[must_use]
    pub fn entity(entity_id: impl Into<String>) -> Self {
        Self::Entity(entity_id.into())
    }

    /// Compiles a regular expression matcher.
    ///
    /// # Errors
    ///
    /// Returns `Error::Pattern` if the expression is invalid.
    pub fn pattern(pattern: &str) -> Result<Self, Error> {
        Ok(Self::Pattern(Regex::new(pattern)?))
    }

    /// Matches every entity of a domain.
    #[must_use]
    pub fn domain(domain: impl Into<String>) -> Self {
        Self::Domain(domain.into())
    }

    /// Matches entity IDs containing `needle`.
    #[must_use]
    pub fn substring(needle: impl Into<String>) -> Self {
        Self::Substring(needle.into())
    }

    /// Returns true if this matcher selects `entity_id`.
    #[must_use]
    pub fn matches(&self, entity_id: &str) -> bool {
        match self {
            Self::Entity(id) => id == entity_id,
            Self::Pattern(re) => re.is_match(entity_id),
            Self::Domain(domain) => domain_of(entity_id) == domain,
            Self::Substring(needle) => entity_id.contains(needle.as_str()),
        }
    }
}

/// Callback invoked for each state change a listener accepts.
pub type ListenerCallback = Arc<dyn Fn(&StateChangeEvent) + Send + Sync>;

/// A registered listener.
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    filter: FilterOptions,
    callback: ListenerCallback,
}

impl Listener {
    /// Evaluates the filter and invokes the callback if it passes.
    ///
    /// Returns true if the callback ran.
    pub(crate) fn fire(&self, event: &StateChangeEvent) -> bool {
        if !self.filter.should_fire(event) {
            tracing::trace!(listener = %self.id, entity_id = %event.entity_id, "Listener filtered out");
            return false;
        }
        tracing::debug!(listener = %self.id, entity_id = %event.entity_id, "Triggering listener");
        (self.callback)(event);
        true
    }
}

#[derive(Default)]
struct Tables {
    exact: HashMap<String, Vec<Arc<Listener>>>,
    patterns: Vec<(Regex, Vec<Arc<Listener>>)>,
    domains: HashMap<String, Vec<Arc<Listener>>>,
    substrings: Vec<(String, Vec<Arc<Listener>>)>,
}

/// The four listener tables.
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    tables: RwLock<Tables>,
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish_non_exhaustive()
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            tables: RwLock::new(Tables::default()),
        }
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Registers a listener under the given matcher.
    pub(crate) fn register(
        &self,
        matcher: Matcher,
        filter: FilterOptions,
        callback: ListenerCallback,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let listener = Arc::new(Listener {
            id,
            filter,
            callback,
        });

        let mut tables = self.tables.write();
        match matcher {
            Matcher::Entity(entity_id) => {
                tracing::debug!(%id, entity_id = %entity_id, "Registered entity listener");
                tables.exact.entry(entity_id).or_default().push(listener);
            }
            Matcher::Pattern(re) => {
                tracing::debug!(%id, pattern = %re, "Registered pattern listener");
                match tables
                    .patterns
                    .iter_mut()
                    .find(|(existing, _)| existing.as_str() == re.as_str())
                {
                    Some((_, listeners)) => listeners.push(listener),
                    None => tables.patterns.push((re, vec![listener])),
                }
            }
            Matcher::Domain(domain) => {
                tracing::debug!(%id, domain = %domain, "Registered domain listener");
                tables.domains.entry(domain).or_default().push(listener);
            }
            Matcher::Substring(needle) => {
                tracing::debug!(%id, substring = %needle, "Registered substring listener");
                match tables.substrings.iter_mut().find(|(n, _)| *n == needle) {
                    Some((_, listeners)) => listeners.push(listener),
                    None => tables.substrings.push((needle, vec![listener])),
                }
            }
        }
        id
    }

    /// Removes a listener. Returns true if it was registered.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        fn strip(listeners: &mut Vec<Arc<Listener>>, id: ListenerId) -> bool {
            let before = listeners.len();
            listeners.retain(|l| l.id != id);
            listeners.len() != before
        }

        let mut tables = self.tables.write();
        let Tables {
            exact,
            patterns,
            domains,
            substrings,
        } = &mut *tables;

        let removed = exact.values_mut().any(|l| strip(l, id))
            || patterns.iter_mut().any(|(_, l)| strip(l, id))
            || domains.values_mut().any(|l| strip(l, id))
            || substrings.iter_mut().any(|(_, l)| strip(l, id));

        exact.retain(|_, l| !l.is_empty());
        patterns.retain(|(_, l)| !l.is_empty());
        domains.retain(|_, l| !l.is_empty());
        substrings.retain(|(_, l)| !l.is_empty());
        removed
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Returns the listeners selecting `entity_id`.
    ///
    /// Order: exact, pattern, domain, substring.
    pub(crate) fn matching(&self, entity_id: &str) -> Vec<Arc<Listener>> {
        let tables = self.tables.read();
        let mut matched = Vec::new();

        if let Some(listeners) = tables.exact.get(entity_id) {
            matched.extend(listeners.iter().cloned());
        }
        for (re, listeners) in &tables.patterns {
            if re.is_match(entity_id) {
                matched.extend(listeners.iter().cloned());
            }
        }
        if let Some(listeners) = tables.domains.get(domain_of(entity_id)) {
            matched.extend(listeners.iter().cloned());
        }
        for (needle, listeners) in &tables.substrings {
            if entity_id.contains(needle.as_str()) {
                matched.extend(listeners.iter().cloned());
            }
        }
        matched
    }

    /// Returns the total number of listeners.
    pub(crate) fn len(&self) -> usize {
        let tables = self.tables.read();
        tables.exact.values().map(Vec::len).sum::<usize>()
            + tables.patterns.iter().map(|(_, l)| l.len()).sum::<usize>()
            + tables.domains.values().map(Vec::len).sum::<usize>()
            + tables.substrings.iter().map(|(_, l)| l.len()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> ListenerCallback {
        Arc::new(|_: &StateChangeEvent| {})
    }

    fn ids(listeners: &[Arc<Listener>]) -> Vec<ListenerId> {
        listeners.iter().map(|l| l.id).collect()
    }

    #[test]
    fn all_four_matchers_select_the_same_entity() {
        let registry = ListenerRegistry::new();
        let exact = registry.register(Matcher::entity("light.kitchen"), FilterOptions::new(), noop());
        let pattern = registry.register(
            Matcher::pattern(r"^light\..*$").unwrap(),
            FilterOptions::new(),
            noop(),
        );
        let domain = registry.register(Matcher::domain("light"), FilterOptions::new(), noop());
        let sub = registry.register(Matcher::substring("kitchen"), FilterOptions::new(), noop());

        let matched = registry.matching("light.kitchen");
        assert_eq!(ids(&matched), vec![exact, pattern, domain, sub]);

        assert!(registry.matching("switch.garage").is_empty());
    }

    #[test]
    fn duplicates_are_kept() {
        let registry = ListenerRegistry::new();
        let a = registry.register(Matcher::entity("light.a"), FilterOptions::new(), noop());
        let b = registry.register(Matcher::entity("light.a"), FilterOptions::new(), noop());
        let c = registry.register(
            Matcher::pattern("^light").unwrap(),
            FilterOptions::new(),
            noop(),
        );
        let d = registry.register(
            Matcher::pattern("^light").unwrap(),
            FilterOptions::new(),
            noop(),
        );

        assert_ne!(a, b);
        assert_eq!(ids(&registry.matching("light.a")), vec![a, b, c, d]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn domain_matcher_uses_prefix_before_separator() {
        let registry = ListenerRegistry::new();
        registry.register(Matcher::domain("light"), FilterOptions::new(), noop());

        assert_eq!(registry.matching("light.den").len(), 1);
        assert!(registry.matching("lights.den").is_empty());
        assert!(registry.matching("switch.light").is_empty());
    }

    #[test]
    fn remove_detaches_one_listener() {
        let registry = ListenerRegistry::new();
        let a = registry.register(Matcher::substring("porch"), FilterOptions::new(), noop());
        let b = registry.register(Matcher::substring("porch"), FilterOptions::new(), noop());

        assert!(registry.remove(a));
        assert!(!registry.remove(a));
        assert_eq!(ids(&registry.matching("switch.porch")), vec![b]);

        assert!(registry.remove(b));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        assert!(matches!(Matcher::pattern("(unclosed"), Err(Error::Pattern(_))));
    }

    #[test]
    fn fire_respects_filter() {
        use crate::state::EntitySnapshot;
        use std::sync::atomic::AtomicUsize;

        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let registry = ListenerRegistry::new();
        registry.register(
            Matcher::entity("light.a"),
            FilterOptions::new().ignore_unavailable(),
            Arc::new(move |_: &StateChangeEvent| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let listener = registry.matching("light.a").remove(0);
        let ok = StateChangeEvent::new("light.a", None, Some(EntitySnapshot::new("light.a", "on")));
        let gone = StateChangeEvent::new(
            "light.a",
            None,
            Some(EntitySnapshot::new("light.a", "unavailable")),
        );

        assert!(listener.fire(&ok));
        assert!(!listener.fire(&gone));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
