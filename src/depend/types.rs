//! The dependency graph's data model: relation kinds, per-service buckets,
//! and the keyed mapping the rest of `depend` operates over.
//!
//! Cross-references are by *name*, never by pointer (see the design note on
//! cyclic structures), which is what makes serialization in [`super::cache`]
//! trivial and lets [`super::parser`]'s `iprovide` rewrite simply replace
//! strings in place.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A dependency relation, as emitted by an init script's `depend` output
/// (the first six) or computed by walking the forward edges once (the
/// trailing five `*me` duals).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::AsRefStr, strum::EnumString,
)]
pub enum Relation {
    /// Hard dependency: the named services must be started/stopped with me.
    #[strum(serialize = "ineed")]
    INeed,
    /// Soft dependency: use the named services if they're available.
    #[strum(serialize = "iuse")]
    IUse,
    /// Like `iuse` but also pulls the named services into the start set.
    #[strum(serialize = "iwant")]
    IWant,
    /// Ordering only: start after the named services if they're also
    /// starting, no hard requirement either way.
    #[strum(serialize = "iafter")]
    IAfter,
    /// Ordering only: start before the named services.
    #[strum(serialize = "ibefore")]
    IBefore,
    /// Declares this service as a provider of the named virtual facility.
    #[strum(serialize = "iprovide")]
    IProvide,
    /// Reverse of `ineed`: the named services need me.
    #[strum(serialize = "needsme")]
    NeedsMe,
    /// Reverse of `iuse`: the named services use me.
    #[strum(serialize = "usesme")]
    UsesMe,
    /// Reverse of `iwant`: the named services want me.
    #[strum(serialize = "wantsme")]
    WantsMe,
    /// Reverse of `ibefore`: the named services are before me.
    #[strum(serialize = "beforeme")]
    BeforeMe,
    /// Reverse of `iafter`: the named services are after me.
    #[strum(serialize = "afterme")]
    AfterMe,
}

/// Fixed, canonical order buckets are stored and serialized in, so that two
/// graphs built from the same input round-trip to structurally equal values
/// regardless of parse/materialization order.
const CANONICAL_ORDER: [Relation; 11] = [
    Relation::INeed,
    Relation::IUse,
    Relation::IWant,
    Relation::IAfter,
    Relation::IBefore,
    Relation::IProvide,
    Relation::NeedsMe,
    Relation::UsesMe,
    Relation::WantsMe,
    Relation::BeforeMe,
    Relation::AfterMe,
];

impl Relation {
    /// The six relations an init script may emit directly from its `depend`
    /// verb. Anything else appearing in `depend` output is an unknown
    /// relation and is ignored by the parser.
    pub const FORWARD: [Relation; 6] = [
        Relation::INeed,
        Relation::IUse,
        Relation::IWant,
        Relation::IAfter,
        Relation::IBefore,
        Relation::IProvide,
    ];

    /// The reverse relation materialized for this one by walking the
    /// forward edges, or `None` for relations with no reverse (`iprovide`
    /// and the `*me` relations themselves).
    pub fn reverse(self) -> Option<Relation> {
        match self {
            Relation::INeed => Some(Relation::NeedsMe),
            Relation::IUse => Some(Relation::UsesMe),
            Relation::IWant => Some(Relation::WantsMe),
            Relation::IBefore => Some(Relation::BeforeMe),
            Relation::IAfter => Some(Relation::AfterMe),
            _ => None,
        }
    }

    fn canonical_rank(self) -> usize {
        CANONICAL_ORDER
            .iter()
            .position(|r| *r == self)
            .unwrap_or(CANONICAL_ORDER.len())
    }
}

/// A `(relation, [service names])` pair — one row of a service's dependency
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepBucket {
    /// Which relation these names participate in.
    pub relation: Relation,
    /// Canonical service names, sorted and de-duplicated.
    pub services: Vec<String>,
}

/// Sorts buckets into canonical relation order and each bucket's service
/// list lexicographically, so two builds of the same underlying input
/// compare equal regardless of the order lines were parsed or reverse edges
/// were walked.
pub fn canonicalize(buckets: &mut Vec<DepBucket>) {
    for bucket in buckets.iter_mut() {
        bucket.services.sort();
        bucket.services.dedup();
    }
    buckets.retain(|b| !b.services.is_empty());
    buckets.sort_by_key(|b| b.relation.canonical_rank());
}

/// The parsed and rewritten dependency graph: a mapping from canonical
/// service name to its dependency buckets, forward and reverse alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    buckets: BTreeMap<String, Vec<DepBucket>>,
}

impl DependencyGraph {
    /// An empty graph, useful as a starting point for callers that build one
    /// up incrementally (tests, mostly — [`super::parser::build_graph`] is
    /// the production entry point).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph directly from a forward-edge map, canonicalizing every
    /// bucket list. Reverse relations are not computed here; call
    /// [`DependencyGraph::materialize_reverse`] once the forward map is
    /// final (after `iprovide` aliases have been rewritten).
    pub fn from_forward(mut forward: BTreeMap<String, Vec<DepBucket>>) -> Self {
        for buckets in forward.values_mut() {
            canonicalize(buckets);
        }
        Self { buckets: forward }
    }

    /// Walks every forward edge once and inserts the corresponding reverse
    /// bucket entry on the target service.
    pub fn materialize_reverse(&mut self) {
        let mut reverse: BTreeMap<String, BTreeMap<Relation, Vec<String>>> = BTreeMap::new();
        for (service, buckets) in &self.buckets {
            for bucket in buckets {
                let Some(rev) = bucket.relation.reverse() else {
                    continue;
                };
                for target in &bucket.services {
                    reverse
                        .entry(target.clone())
                        .or_default()
                        .entry(rev)
                        .or_default()
                        .push(service.clone());
                }
            }
        }

        for (service, by_relation) in reverse {
            let entry = self.buckets.entry(service).or_default();
            for (relation, services) in by_relation {
                entry.push(DepBucket { relation, services });
            }
            canonicalize(entry);
        }
    }

    /// Every known service name, in sorted order.
    pub fn services(&self) -> Vec<String> {
        self.buckets.keys().cloned().collect()
    }

    /// Whether the graph has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Direct lookup of a service's dependency buckets (`get_depinfo`).
    pub fn depinfo(&self, service: &str) -> Option<&[DepBucket]> {
        self.buckets.get(service).map(|v| v.as_slice())
    }

    /// Direct lookup of one relation's service list within a bucket list
    /// (`get_deptype`). Empty if the relation has no bucket.
    pub fn deptype(&self, service: &str, relation: Relation) -> Vec<String> {
        self.depinfo(service)
            .and_then(|buckets| buckets.iter().find(|b| b.relation == relation))
            .map(|b| b.services.clone())
            .unwrap_or_default()
    }

    /// Inserts (or replaces) a service's bucket list, canonicalizing it.
    /// Exposed for tests and for callers assembling a graph by hand rather
    /// than through [`super::parser::build_graph`].
    pub fn set_buckets(&mut self, service: &str, mut buckets: Vec<DepBucket>) {
        canonicalize(&mut buckets);
        self.buckets.insert(service.to_string(), buckets);
    }
}

/// Free-standing form of [`DependencyGraph::depinfo`], named
/// `get_depinfo(graph, s)` for callers that prefer functions over methods.
pub fn get_depinfo<'g>(graph: &'g DependencyGraph, service: &str) -> Option<&'g [DepBucket]> {
    graph.depinfo(service)
}

/// Free-standing form of [`DependencyGraph::deptype`], named
/// `get_deptype(depinfo, t)`.
pub fn get_deptype(depinfo: &[DepBucket], relation: Relation) -> Vec<String> {
    depinfo
        .iter()
        .find(|b| b.relation == relation)
        .map(|b| b.services.clone())
        .unwrap_or_default()
}
