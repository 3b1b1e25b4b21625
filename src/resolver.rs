//! Maps a bare service name to a canonical init-script path.
use std::path::PathBuf;

use crate::paths::Paths;

/// Resolves `name` to an absolute init-script path, searching
/// [`Paths::init_dirs`] in order so a user-local override shadows the
/// system one when both exist.
pub fn resolve(paths: &Paths, name: &str) -> Option<PathBuf> {
    for dir in paths.init_dirs() {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Whether `name` resolves to an init script.
pub fn exists(paths: &Paths, name: &str) -> bool {
    resolve(paths, name).is_some()
}

/// Enumerates every service name resolvable across all init directories,
/// de-duplicated and sorted, the way a dependency rebuild needs to iterate
/// "every known service" without a caller having to enumerate it itself.
pub fn all_services(paths: &Paths) -> Vec<String> {
    let mut names = std::collections::BTreeSet::new();
    for dir in paths.init_dirs() {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            if entry.path().is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.insert(name.to_string());
                }
            }
        }
    }
    names.into_iter().collect()
}
