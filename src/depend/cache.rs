//! Persists the dependency graph to a single file and stale-checks it
//! against init-script mtimes before trusting it.
//!
//! Serialized with `serde_json` — machine-written, machine-read state,
//! as opposed to the human-authored root config (`serde_yaml`, see
//! [`crate::config`]) — and written with the same temp-file-then-rename
//! idiom every other mutable piece of state in this crate uses (see
//! [`crate::atomic`]).
use std::fs;

use tracing::instrument;

use crate::{atomic::write_atomic, error::RcError, paths::Paths, resolver};

use super::{parser, types::DependencyGraph};

/// Loads the cached graph, rebuilding and persisting it first if `force` is
/// set or the cache is older than any resolvable init script.
#[instrument(skip(paths))]
pub fn update_deptree(paths: &Paths, force: bool) -> Result<DependencyGraph, RcError> {
    if !force {
        if let Ok(false) = is_stale(paths) {
            if let Ok(graph) = load(paths) {
                return Ok(graph);
            }
        }
    }

    let graph = parser::build_graph(paths)?;
    save(paths, &graph)?;
    Ok(graph)
}

/// Loads the cache file as-is, without any staleness check.
pub fn load(paths: &Paths) -> Result<DependencyGraph, RcError> {
    let bytes = fs::read(paths.deptree_file())?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Serializes `graph` to the cache file atomically.
pub fn save(paths: &Paths, graph: &DependencyGraph) -> Result<(), RcError> {
    let bytes = serde_json::to_vec_pretty(graph)?;
    write_atomic(&paths.deptree_file(), &bytes)
}

/// Whether the cache is missing or older than any resolvable init script.
fn is_stale(paths: &Paths) -> Result<bool, RcError> {
    let cache_mtime = match fs::metadata(paths.deptree_file()) {
        Ok(meta) => meta.modified()?,
        Err(_) => return Ok(true),
    };

    for name in resolver::all_services(paths) {
        let Some(script) = resolver::resolve(paths, &name) else {
            continue;
        };
        let script_mtime = fs::metadata(&script)?.modified()?;
        if script_mtime > cache_mtime {
            return Ok(true);
        }
    }
    Ok(false)
}
