//! Runs every init script's `depend` verb, parses the `<relation>
//! <names...>` lines it emits on stdout, and resolves `iprovide` aliases.
//!
//! Spawning uses the same `Command::new(path).arg(verb)` pattern as
//! [`crate::process`], captured synchronously here since `depend` is
//! documented as non-side-effecting and expected to return promptly.
use std::{
    collections::BTreeMap,
    process::Command,
};

use tracing::{instrument, warn};

use crate::{
    error::RcError,
    paths::Paths,
    resolver,
    runlevel,
};

use super::types::{DepBucket, DependencyGraph, Relation};

/// Builds a complete dependency graph: runs `depend` against every
/// resolvable service, resolves `iprovide` aliases, and materializes the
/// reverse relations.
#[instrument(skip(paths))]
pub fn build_graph(paths: &Paths) -> Result<DependencyGraph, RcError> {
    let mut forward: BTreeMap<String, Vec<DepBucket>> = BTreeMap::new();
    for name in resolver::all_services(paths) {
        let buckets = run_depend(paths, &name)?;
        forward.insert(name, buckets);
    }

    resolve_provides(paths, &mut forward);

    let mut graph = DependencyGraph::from_forward(forward);
    graph.materialize_reverse();
    Ok(graph)
}

/// Spawns `service`'s init script with the `depend` verb and parses its
/// stdout. Returns an empty bucket list for a service that no longer
/// resolves (e.g. removed between enumeration and this call).
fn run_depend(paths: &Paths, service: &str) -> Result<Vec<DepBucket>, RcError> {
    let Some(script) = resolver::resolve(paths, service) else {
        return Ok(Vec::new());
    };
    let output = Command::new(&script).arg("depend").output()?;
    Ok(parse_depend_output(service, &String::from_utf8_lossy(&output.stdout)))
}

/// Parses `depend`-verb stdout into dependency buckets. Unknown relation
/// tokens are ignored; a recognized relation with no service names is
/// malformed and is skipped with a warning rather than failing the whole
/// parse.
pub fn parse_depend_output(service: &str, stdout: &str) -> Vec<DepBucket> {
    let mut grouped: BTreeMap<Relation, Vec<String>> = BTreeMap::new();

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let Some(relation_token) = tokens.next() else {
            continue;
        };
        let Ok(relation) = relation_token.parse::<Relation>() else {
            continue;
        };
        if !Relation::FORWARD.contains(&relation) {
            // A script can only ever emit the forward relations; a `*me`
            // token is either a bug in the script or hostile input, either
            // way it's not a relation this service is entitled to declare.
            continue;
        }

        let names: Vec<String> = tokens.map(str::to_string).collect();
        if names.is_empty() {
            warn!(service, line, "malformed dependency line: relation with no service names");
            continue;
        }
        grouped.entry(relation).or_default().extend(names);
    }

    let mut buckets: Vec<DepBucket> = grouped
        .into_iter()
        .map(|(relation, services)| DepBucket { relation, services })
        .collect();
    super::types::canonicalize(&mut buckets);
    buckets
}

/// Rewrites every occurrence of an `iprovide` alias, in any service's
/// non-`iprovide` buckets, to the providing service's canonical name. When
/// more than one service provides the same alias, the provider that is a
/// member of the currently active runlevel wins; otherwise the first
/// one encountered lexicographically.
#[instrument(skip(paths, forward))]
fn resolve_provides(paths: &Paths, forward: &mut BTreeMap<String, Vec<DepBucket>>) {
    let mut providers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (service, buckets) in forward.iter() {
        if let Some(bucket) = buckets.iter().find(|b| b.relation == Relation::IProvide) {
            for alias in &bucket.services {
                providers.entry(alias.clone()).or_default().push(service.clone());
            }
        }
    }
    if providers.is_empty() {
        return;
    }

    let active_runlevel = runlevel::get_runlevel(paths);
    let mut resolved: BTreeMap<String, String> = BTreeMap::new();
    for (alias, mut candidates) in providers {
        candidates.sort();
        candidates.dedup();
        let winner = candidates
            .iter()
            .find(|name| runlevel::is_member(paths, &active_runlevel, name))
            .cloned()
            .unwrap_or_else(|| candidates[0].clone());
        resolved.insert(alias, winner);
    }

    for buckets in forward.values_mut() {
        for bucket in buckets.iter_mut() {
            if bucket.relation == Relation::IProvide {
                continue;
            }
            for name in bucket.services.iter_mut() {
                if let Some(target) = resolved.get(name) {
                    *name = target.clone();
                }
            }
        }
        super::types::canonicalize(buckets);
    }
}
