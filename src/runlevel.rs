//! Runlevel enumeration, active-runlevel storage and membership tests.
use std::fs;

use crate::{
    atomic::write_atomic,
    constants::{DEFAULT_RUNLEVEL, RUNLEVEL_STARTING_FILE, RUNLEVEL_STOPPING_FILE},
    error::RcError,
    paths::Paths,
    resolver,
};

/// Which transient mid-transition flag a caller is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// The runlevel driver is currently bringing services up.
    Starting,
    /// The runlevel driver is currently bringing services down.
    Stopping,
}

impl TransitionKind {
    fn marker_file_name(self) -> &'static str {
        match self {
            TransitionKind::Starting => RUNLEVEL_STARTING_FILE,
            TransitionKind::Stopping => RUNLEVEL_STOPPING_FILE,
        }
    }
}

/// Reads the currently active runlevel, defaulting to `sysinit` when the
/// marker file has never been written (e.g. a completely fresh root).
pub fn get_runlevel(paths: &Paths) -> String {
    match fs::read_to_string(paths.active_runlevel_file()) {
        Ok(contents) => {
            let trimmed = contents.trim();
            if trimmed.is_empty() {
                DEFAULT_RUNLEVEL.to_string()
            } else {
                trimmed.to_string()
            }
        }
        Err(_) => DEFAULT_RUNLEVEL.to_string(),
    }
}

/// Atomically sets the active runlevel.
pub fn set_runlevel(paths: &Paths, level: &str) -> Result<(), RcError> {
    write_atomic(&paths.active_runlevel_file(), level.as_bytes())
}

/// Whether `level` has a runlevel directory on disk.
pub fn runlevel_exists(paths: &Paths, level: &str) -> bool {
    paths.runlevel_dir(level).is_dir()
}

/// Enumerates every runlevel with an on-disk directory, sorted.
pub fn runlevels(paths: &Paths) -> Vec<String> {
    let mut names = std::collections::BTreeSet::new();
    if let Ok(entries) = fs::read_dir(paths.runlevels_dir()) {
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.insert(name.to_string());
                }
            }
        }
    }
    names.into_iter().collect()
}

/// Whether `service` is a member of `level`.
pub fn is_member(paths: &Paths, level: &str, service: &str) -> bool {
    paths.runlevel_dir(level).join(service).exists()
}

/// Enumerates the services that are members of `level`, sorted.
pub fn members(paths: &Paths, level: &str) -> Vec<String> {
    let mut names = std::collections::BTreeSet::new();
    if let Ok(entries) = fs::read_dir(paths.runlevel_dir(level)) {
        for entry in entries.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                names.insert(name.to_string());
            }
        }
    }
    names.into_iter().collect()
}

/// Adds `service` to `level`'s membership set. A thin counterpart to
/// `is_member`/`members`: the registry that stores membership has to be
/// able to mutate it too, even though the runlevel-change *driver* that
/// decides when to call this is outside this crate's scope.
pub fn add_member(paths: &Paths, level: &str, service: &str) -> Result<(), RcError> {
    let dir = paths.runlevel_dir(level);
    fs::create_dir_all(&dir)?;
    let link = dir.join(service);
    if !link.exists() {
        let target = resolver::resolve(paths, service)
            .unwrap_or_else(|| paths.init_dirs()[0].join(service));
        std::os::unix::fs::symlink(&target, &link).or_else(|_| fs::write(&link, b""))?;
    }
    Ok(())
}

/// Removes `service` from `level`'s membership set. No-op if absent.
pub fn remove_member(paths: &Paths, level: &str, service: &str) -> Result<(), RcError> {
    let link = paths.runlevel_dir(level).join(service);
    match fs::remove_file(&link) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Sets the transient flag marking the system as mid-start or mid-stop of
/// a runlevel transition.
pub fn begin_transition(paths: &Paths, kind: TransitionKind) -> Result<(), RcError> {
    write_atomic(&paths.transition_marker_file(kind.marker_file_name()), b"")
}

/// Clears the transient transition flag.
pub fn end_transition(paths: &Paths, kind: TransitionKind) -> Result<(), RcError> {
    let marker = paths.transition_marker_file(kind.marker_file_name());
    match fs::remove_file(&marker) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Whether the system is currently mid-start or mid-stop.
pub fn is_transitioning(paths: &Paths, kind: TransitionKind) -> bool {
    paths.transition_marker_file(kind.marker_file_name()).exists()
}
