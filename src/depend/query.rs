//! Transitive dependency expansion and runlevel activation ordering.
//!
//! `order_services` is the heart of the dependency engine: it turns a
//! graph, a target runlevel, and the current service states into the
//! stop-then-start sequence a driver feeds to [`crate::process`]. Ordering
//! is computed with a lexicographically tie-broken Kahn's algorithm so two
//! runs over the same inputs always agree, and a cycle among only the
//! weaker relations is repaired by dropping edges instead of failing the
//! whole call (`iafter` is weaker than `iuse`, so it's dropped first).
use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::{
    constants::{BOOT_RUNLEVEL, SYSINIT_RUNLEVEL},
    error::RcError,
    paths::Paths,
    runlevel,
    state::StateStore,
};

use super::types::{DependencyGraph, Relation};

pub use super::types::{get_depinfo, get_deptype};

/// Flags controlling [`get_depends`] and [`order_services`], corresponding
/// to the `RC_DEP_*` option bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepOptions {
    /// `RC_DEP_TRACE` — traverse transitively rather than one level deep.
    pub trace: bool,
    /// `RC_DEP_STRICT` — only include services that are members of the
    /// queried runlevel (plus `sysinit`/`boot` when starting).
    pub strict: bool,
    /// `RC_DEP_START` — the closure is being computed for a start.
    pub start: bool,
    /// `RC_DEP_STOP` — the closure is being computed for a stop.
    pub stop: bool,
}

impl DepOptions {
    /// `{TRACE, STRICT, START}` — the flags a driver typically passes when
    /// expanding what to bring up for a runlevel.
    pub fn for_start() -> Self {
        Self {
            trace: true,
            strict: true,
            start: true,
            stop: false,
        }
    }

    /// `{TRACE, STRICT, STOP}` — the flags a driver typically passes when
    /// expanding what to bring down.
    pub fn for_stop() -> Self {
        Self {
            trace: true,
            strict: true,
            start: false,
            stop: true,
        }
    }
}

/// Computes the transitive closure of `seeds` under `relations`, subject to
/// `options`. Traversal is depth-first with a lexicographic tie-break
/// within each relation's service list; each service appears at most once,
/// in visitation order.
pub fn get_depends(
    graph: &DependencyGraph,
    relations: &[Relation],
    seeds: &[String],
    paths: &Paths,
    store: &StateStore,
    runlevel: &str,
    options: DepOptions,
) -> Vec<String> {
    let start_set = if options.start {
        compute_start_set(paths, store, runlevel)
    } else {
        BTreeSet::new()
    };

    let is_member = |name: &str| -> bool {
        runlevel::is_member(paths, runlevel, name)
            || (options.start
                && (runlevel::is_member(paths, SYSINIT_RUNLEVEL, name)
                    || runlevel::is_member(paths, BOOT_RUNLEVEL, name)))
    };

    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut result = Vec::new();
    for seed in seeds {
        visit(graph, relations, seed, options, &start_set, &is_member, &mut visited, &mut result);
    }
    result
}

fn visit(
    graph: &DependencyGraph,
    relations: &[Relation],
    service: &str,
    options: DepOptions,
    start_set: &BTreeSet<String>,
    is_member: &dyn Fn(&str) -> bool,
    visited: &mut BTreeSet<String>,
    result: &mut Vec<String>,
) {
    let Some(depinfo) = graph.depinfo(service) else {
        return;
    };

    for relation in relations {
        let mut names = get_deptype(depinfo, *relation);
        names.sort();
        for neighbor in names {
            if options.strict && !is_member(&neighbor) {
                continue;
            }
            if options.start && *relation == Relation::IUse && !start_set.contains(&neighbor) {
                continue;
            }
            if visited.insert(neighbor.clone()) {
                result.push(neighbor.clone());
                if options.trace {
                    visit(graph, relations, &neighbor, options, start_set, is_member, visited, result);
                }
            }
        }
    }
}

fn compute_start_set(paths: &Paths, store: &StateStore, level: &str) -> BTreeSet<String> {
    let mut set: BTreeSet<String> = BTreeSet::new();
    for lvl in [SYSINIT_RUNLEVEL, BOOT_RUNLEVEL, level] {
        set.extend(runlevel::members(paths, lvl));
    }
    set.extend(store.coldplugged_services());
    set
}

/// Computes the full, deduplicated activation sequence for `level`: every
/// service currently running that should no longer be (in reverse
/// dependency order), followed by every service that should now be running
/// (in forward dependency order).
pub fn order_services(
    graph: &DependencyGraph,
    paths: &Paths,
    store: &StateStore,
    level: &str,
    options: DepOptions,
) -> Result<Vec<String>, RcError> {
    let to_start = compute_start_set(paths, store, level);

    let mut to_stop: BTreeSet<String> = store.started_services().into_iter().collect();
    to_stop.retain(|s| !to_start.contains(s));
    if options.stop {
        to_stop.extend(store.inactive_services());
    }

    let stop_order = order_stop_set(graph, &to_stop)?;
    let start_order = order_start_set(graph, &to_start)?;

    let mut result = stop_order;
    result.extend(start_order);
    Ok(result)
}

/// Topologically sorts `nodes` for a stop: `X` precedes `Y` whenever `X`
/// `ineed`s or `iuse`s `Y`, so every dependent stops before what it depends
/// on. `ineed`-derived edges are load-bearing; `iuse`-derived edges are the
/// weaker of the two and are dropped first if they form a cycle.
fn order_stop_set(graph: &DependencyGraph, nodes: &BTreeSet<String>) -> Result<Vec<String>, RcError> {
    let mut hard = Vec::new();
    let mut soft_iuse = Vec::new();
    for service in nodes {
        let Some(depinfo) = graph.depinfo(service) else {
            continue;
        };
        for dep in get_deptype(depinfo, Relation::INeed) {
            if nodes.contains(&dep) {
                hard.push((service.clone(), dep));
            }
        }
        for dep in get_deptype(depinfo, Relation::IUse) {
            if nodes.contains(&dep) {
                soft_iuse.push((service.clone(), dep));
            }
        }
    }
    order_with_cycle_breaking(nodes, hard, vec![soft_iuse])
}

/// Topologically sorts `nodes` for a start: a service starts only after its
/// `ineed` and `iafter` dependencies. `ineed`-derived edges are load-bearing;
/// `iafter`-derived edges are the weakest relation overall and are dropped
/// first if they form a cycle.
fn order_start_set(graph: &DependencyGraph, nodes: &BTreeSet<String>) -> Result<Vec<String>, RcError> {
    let mut hard = Vec::new();
    let mut soft_iafter = Vec::new();
    for service in nodes {
        let Some(depinfo) = graph.depinfo(service) else {
            continue;
        };
        for dep in get_deptype(depinfo, Relation::INeed) {
            if nodes.contains(&dep) {
                hard.push((dep, service.clone()));
            }
        }
        for dep in get_deptype(depinfo, Relation::IAfter) {
            if nodes.contains(&dep) {
                soft_iafter.push((dep, service.clone()));
            }
        }
    }
    order_with_cycle_breaking(nodes, hard, vec![soft_iafter])
}

/// Runs Kahn's algorithm over `hard` edges plus, in order, each entry of
/// `droppable` (weakest-first). If the full edge set has a cycle, the
/// weakest droppable layer is discarded and the caller is warned; this
/// repeats until either a sort succeeds or only `hard` edges remain, at
/// which point a remaining cycle is fatal.
fn order_with_cycle_breaking(
    nodes: &BTreeSet<String>,
    hard: Vec<(String, String)>,
    droppable: Vec<Vec<(String, String)>>,
) -> Result<Vec<String>, RcError> {
    let mut active = droppable.len();
    loop {
        let mut edges = hard.clone();
        for layer in &droppable[..active] {
            edges.extend(layer.iter().cloned());
        }

        match kahn(nodes, &edges) {
            Ok(order) => return Ok(order),
            Err(remaining) => {
                if active == 0 {
                    return Err(RcError::DependencyCycle { services: remaining });
                }
                active -= 1;
                warn!(
                    dropped_layer = active,
                    services = remaining.join(", "),
                    "dependency cycle broken by dropping the weakest edge"
                );
            }
        }
    }
}

/// Kahn's algorithm with a lexicographically-ordered ready queue, so the
/// output is deterministic across runs over the same input (Testable
/// Property 4). `Err` carries the sorted set of nodes that never reached
/// zero in-degree — the cycle's participants.
fn kahn(nodes: &BTreeSet<String>, edges: &[(String, String)]) -> Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<&str, u32> = nodes.iter().map(|n| (n.as_str(), 0)).collect();
    let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = nodes.iter().map(|n| (n.as_str(), BTreeSet::new())).collect();

    for (from, to) in edges {
        if from == to || !nodes.contains(from) || !nodes.contains(to) {
            continue;
        }
        if adjacency.get_mut(from.as_str()).unwrap().insert(to.as_str()) {
            *indegree.get_mut(to.as_str()).unwrap() += 1;
        }
    }

    let mut ready: BTreeSet<&str> = indegree.iter().filter(|(_, &d)| d == 0).map(|(&n, _)| n).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(&node) = ready.iter().next() {
        ready.remove(node);
        order.push(node.to_string());
        for &succ in &adjacency[node] {
            let degree = indegree.get_mut(succ).unwrap();
            *degree -= 1;
            if *degree == 0 {
                ready.insert(succ);
            }
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        let done: BTreeSet<&str> = order.iter().map(String::as_str).collect();
        Err(nodes.iter().filter(|n| !done.contains(n.as_str())).cloned().collect())
    }
}
