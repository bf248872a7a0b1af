//! # Link Index
//!
//! Bidirectional storage of association links.
//!
//! Every link is recorded twice: forward under `(association, source)` and
//! backward under `(association, target)`. Both sides keep insertion order,
//! so traversal in either direction is a keyed lookup returning a stable
//! sequence. The two maps are only ever mutated together.

use crate::ElementId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A directed edge realizing an association.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub association: String,
    pub source: ElementId,
    pub target: ElementId,
}

impl Link {
    #[must_use]
    pub fn new(association: impl Into<String>, source: ElementId, target: ElementId) -> Self {
        Self {
            association: association.into(),
            source,
            target,
        }
    }
}

type Adjacency = BTreeMap<String, BTreeMap<ElementId, Vec<ElementId>>>;

/// Forward and backward link indices.
#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    /// association -> source -> targets
    forward: Adjacency,
    /// association -> target -> sources
    backward: Adjacency,
    /// Total number of stored links
    len: usize,
}

impl LinkIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a link. Returns `false` if the identical link already exists.
    pub fn insert(&mut self, association: &str, source: ElementId, target: ElementId) -> bool {
        if self.contains(association, source, target) {
            return false;
        }
        self.forward
            .entry(association.to_string())
            .or_default()
            .entry(source)
            .or_default()
            .push(target);
        self.backward
            .entry(association.to_string())
            .or_default()
            .entry(target)
            .or_default()
            .push(source);
        self.len = self.len.saturating_add(1);
        true
    }

    /// Remove a link. Returns `false` if it was not present.
    pub fn remove(&mut self, association: &str, source: ElementId, target: ElementId) -> bool {
        if !self.contains(association, source, target) {
            return false;
        }
        detach(&mut self.forward, association, source, target);
        detach(&mut self.backward, association, target, source);
        self.len = self.len.saturating_sub(1);
        true
    }

    /// Targets linked from `source`, in insertion order.
    #[must_use]
    pub fn targets(&self, association: &str, source: ElementId) -> &[ElementId] {
        lookup(&self.forward, association, source)
    }

    /// Sources linked to `target`, in insertion order.
    #[must_use]
    pub fn sources(&self, association: &str, target: ElementId) -> &[ElementId] {
        lookup(&self.backward, association, target)
    }

    /// Check whether the exact link exists.
    #[must_use]
    pub fn contains(&self, association: &str, source: ElementId, target: ElementId) -> bool {
        self.targets(association, source).contains(&target)
    }

    /// Total number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no links are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Every stored link, sorted by association, source, then target.
    #[must_use]
    pub fn links(&self) -> Vec<Link> {
        let mut links: Vec<Link> = self
            .forward
            .iter()
            .flat_map(|(association, by_source)| {
                by_source.iter().flat_map(move |(source, targets)| {
                    targets
                        .iter()
                        .map(move |target| Link::new(association.as_str(), *source, *target))
                })
            })
            .collect();
        links.sort_by(|a, b| {
            (&a.association, a.source, a.target).cmp(&(&b.association, b.source, b.target))
        });
        links
    }
}

fn lookup<'a>(map: &'a Adjacency, association: &str, key: ElementId) -> &'a [ElementId] {
    map.get(association)
        .and_then(|by_key| by_key.get(&key))
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn detach(map: &mut Adjacency, association: &str, key: ElementId, value: ElementId) {
    let Some(by_key) = map.get_mut(association) else {
        return;
    };
    if let Some(values) = by_key.get_mut(&key) {
        values.retain(|v| *v != value);
        if values.is_empty() {
            by_key.remove(&key);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
