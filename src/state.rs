//! Per-service state symlinks, atomic transitions, options, daemon
//! bookkeeping and scheduled-start relations.
//!
//! The transition lock uses `fs2`'s advisory `flock`: its "released when
//! the fd is closed" semantics are exactly what cross-process
//! synchronization across abnormal exits requires. `wait_service` polls
//! with a doubling backoff rather than a tight spin.
use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    sync::{Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::{
    atomic::write_atomic,
    constants::{
        EXIT_STATUS_OPTION_KEY, SERVICE_POLL_INTERVAL, SERVICE_POLL_INTERVAL_MAX,
        STARTER_UID_OPTION_KEY,
    },
    error::RcError,
    hooks::{HookKind, Hooks, NoopHooks},
    paths::Paths,
};

/// The five mutually exclusive states a service may hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
pub enum ExclusiveState {
    /// Terminal "off" state.
    #[strum(serialize = "stopped")]
    Stopped,
    /// Transitional; start script running; holds the transition lock.
    #[strum(serialize = "starting")]
    Starting,
    /// Terminal "on" state.
    #[strum(serialize = "started")]
    Started,
    /// Transitional; stop script running; holds the transition lock.
    #[strum(serialize = "stopping")]
    Stopping,
    /// Declared inactive by the script itself.
    #[strum(serialize = "inactive")]
    Inactive,
}

/// All five exclusive states, in a fixed order used when scanning for
/// "which one is currently set".
pub const ALL_EXCLUSIVE_STATES: [ExclusiveState; 5] = [
    ExclusiveState::Stopped,
    ExclusiveState::Starting,
    ExclusiveState::Started,
    ExclusiveState::Stopping,
    ExclusiveState::Inactive,
];

/// The four orthogonal markers, which may coexist with an exclusive state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
pub enum Marker {
    /// Activated outside any runlevel (hot/cold plug).
    #[strum(serialize = "coldplugged")]
    ColdPlugged,
    /// Last transition ended in non-zero exit.
    #[strum(serialize = "failed")]
    Failed,
    /// Placeholder while the service waits for a trigger service.
    #[strum(serialize = "scheduled")]
    Scheduled,
    /// Historical marker: this service was `inactive` before the current
    /// transition.
    #[strum(serialize = "wasinactive")]
    WasInactive,
}

/// All four markers, in a fixed order.
pub const ALL_MARKERS: [Marker; 4] = [
    Marker::ColdPlugged,
    Marker::Failed,
    Marker::Scheduled,
    Marker::WasInactive,
];

/// Result of a `mark_service` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// The exclusive state actually changed.
    Changed,
    /// The service was already in the requested state; a no-op.
    AlreadyInState,
}

/// A single daemon record: the argument tuple identifying one long-running
/// child process a service spawned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonRecord {
    /// Path or name of the executable.
    pub exec: String,
    /// Optional process-name filter (as reported by the OS).
    pub name: Option<String>,
    /// Optional pidfile path narrowing matches to a single pid.
    pub pidfile: Option<String>,
    /// 1-based ordinal, assigned in insertion order, preserved through
    /// deletions.
    pub index: u32,
}

/// Filesystem-backed service state machine. Owns no in-memory state of its
/// own beyond the open lockfiles of transitions it is actively mediating —
/// the filesystem remains the single source of truth, consistent with
/// "shared resources" in the concurrency model.
pub struct StateStore {
    paths: Paths,
    hooks: Arc<dyn Hooks>,
    locks: Mutex<HashMap<String, File>>,
}

impl StateStore {
    /// Builds a store with no-op hooks.
    pub fn new(paths: Paths) -> Self {
        Self::with_hooks(paths, Arc::new(NoopHooks))
    }

    /// Builds a store that dispatches through the given hook object.
    pub fn with_hooks(paths: Paths, hooks: Arc<dyn Hooks>) -> Self {
        Self {
            paths,
            hooks,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The filesystem layout this store operates on.
    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// Returns the currently-set exclusive state, if any.
    pub fn exclusive_state(&self, service: &str) -> Option<ExclusiveState> {
        ALL_EXCLUSIVE_STATES
            .into_iter()
            .find(|state| self.paths.state_link(state.as_ref(), service).exists())
    }

    /// Whether a single marker is currently set for `service`.
    pub fn has_marker(&self, service: &str, marker: Marker) -> bool {
        self.paths.state_link(marker.as_ref(), service).exists()
    }

    /// Transitions `service` to `state`.
    ///
    /// Entering `starting`/`stopping` acquires the per-service transition
    /// lock (failing with [`RcError::TransitionBusy`] if another
    /// transition already holds it) and fires the matching `_in` hook;
    /// reaching a terminal state releases any lock this call or an earlier
    /// one on the same service is holding and fires the matching `_out`
    /// hook. Transitioning out of `inactive` sets `wasinactive`, except
    /// that transitioning directly into `started` clears it instead.
    pub fn mark_service(&self, service: &str, state: ExclusiveState) -> Result<MarkOutcome, RcError> {
        let current = self.exclusive_state(service);
        if current == Some(state) {
            return Ok(MarkOutcome::AlreadyInState);
        }

        let acquiring = matches!(state, ExclusiveState::Starting | ExclusiveState::Stopping);
        if acquiring {
            self.acquire_lock(service)?;
        }

        self.swap_exclusive_link(service, current, state)?;

        if current == Some(ExclusiveState::Inactive) && state != ExclusiveState::Inactive {
            if state == ExclusiveState::Started {
                self.set_marker(service, Marker::WasInactive, false)?;
            } else {
                self.set_marker(service, Marker::WasInactive, true)?;
            }
        }

        match state {
            ExclusiveState::Starting => {
                self.hooks.call(HookKind::ServiceStartIn, service);
            }
            ExclusiveState::Stopping => {
                self.hooks.call(HookKind::ServiceStopIn, service);
            }
            _ => {}
        }

        let releasing = matches!(
            state,
            ExclusiveState::Stopped | ExclusiveState::Started | ExclusiveState::Inactive
        );
        if releasing {
            if let Some(file) = self.locks.lock()?.remove(service) {
                drop(file);
            }
        }

        Ok(MarkOutcome::Changed)
    }

    fn acquire_lock(&self, service: &str) -> Result<(), RcError> {
        let lock_path = self.paths.lock_file(service);
        fs::create_dir_all(lock_path.parent().unwrap_or(&lock_path))?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                self.locks.lock()?.insert(service.to_string(), file);
                Ok(())
            }
            Err(_) => Err(RcError::TransitionBusy(service.to_string())),
        }
    }

    /// Always creates the new exclusive-state link before unlinking the old
    /// one. The transition lock only excludes concurrent *writers* — a
    /// reader just `stat`s the state symlink without taking it — so
    /// delete-then-create would open a window where such a reader sees
    /// neither link. Create-before-delete closes that window regardless of
    /// whether this call holds the lock.
    fn swap_exclusive_link(
        &self,
        service: &str,
        current: Option<ExclusiveState>,
        new: ExclusiveState,
    ) -> Result<(), RcError> {
        let new_link = self.paths.state_link(new.as_ref(), service);
        fs::create_dir_all(new_link.parent().unwrap_or(&new_link))?;
        self.create_link(&new_link)?;

        if let Some(cur) = current {
            let old_link = self.paths.state_link(cur.as_ref(), service);
            match fs::remove_file(&old_link) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn create_link(&self, link_path: &std::path::Path) -> Result<(), RcError> {
        let _ = fs::remove_file(link_path);
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink("rc-core-state", link_path)?;
        }
        #[cfg(not(unix))]
        {
            fs::write(link_path, b"")?;
        }
        Ok(())
    }

    /// Sets or clears an orthogonal marker without touching the exclusive
    /// state.
    pub fn set_marker(&self, service: &str, marker: Marker, present: bool) -> Result<(), RcError> {
        let link = self.paths.state_link(marker.as_ref(), service);
        if present {
            fs::create_dir_all(link.parent().unwrap_or(&link))?;
            self.create_link(&link)?;
            if marker == Marker::Scheduled {
                // nothing further: scheduled/<trigger>/<target> bookkeeping
                // is owned by schedule_start_service/schedule_clear.
            }
        } else {
            match fs::remove_file(&link) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            if marker == Marker::Scheduled {
                self.remove_from_all_schedules(service)?;
            }
        }
        Ok(())
    }

    fn remove_from_all_schedules(&self, service: &str) -> Result<(), RcError> {
        let Ok(entries) = fs::read_dir(self.paths.scheduled_root()) else {
            return Ok(());
        };
        for entry in entries.flatten() {
            if entry.path().is_dir() {
                let link = entry.path().join(service);
                let _ = fs::remove_file(link);
            }
        }
        Ok(())
    }

    /// Blocks until `service`'s transition lock is free or `timeout`
    /// elapses. Polls with doubling backoff rather than a tight spin.
    pub fn wait_service(&self, service: &str, timeout: Duration) -> bool {
        wait_service(&self.paths, service, timeout)
    }

    /// Reads an option's value, or `None` if unset.
    pub fn get_service_option(&self, service: &str, key: &str) -> Option<String> {
        fs::read_to_string(self.paths.option_file(service, key)).ok()
    }

    /// Atomically writes an option's value.
    pub fn set_service_option(&self, service: &str, key: &str, value: &str) -> Result<(), RcError> {
        write_atomic(&self.paths.option_file(service, key), value.as_bytes())
    }

    /// Persisted exit status of the service's last start/stop attempt.
    ///
    /// Supplemented: stored as an ordinary option under a reserved key, so
    /// `failed` carries a diagnostic payload instead of being a bare flag.
    pub fn last_exit_status(&self, service: &str) -> Option<i32> {
        self.get_service_option(service, EXIT_STATUS_OPTION_KEY)
            .and_then(|s| s.trim().parse().ok())
    }

    /// Persists the exit status of the service's last start/stop attempt.
    pub fn set_last_exit_status(&self, service: &str, code: i32) -> Result<(), RcError> {
        self.set_service_option(service, EXIT_STATUS_OPTION_KEY, &code.to_string())
    }

    /// Records the uid that started `service`, consulted by
    /// `service_daemons_crashed` when scanning the process table.
    pub fn set_starter_uid(&self, service: &str, uid: u32) -> Result<(), RcError> {
        self.set_service_option(service, STARTER_UID_OPTION_KEY, &uid.to_string())
    }

    /// Reads back the uid that started `service`, if recorded.
    pub fn starter_uid(&self, service: &str) -> Option<u32> {
        self.get_service_option(service, STARTER_UID_OPTION_KEY)
            .and_then(|s| s.trim().parse().ok())
    }

    /// Lists every daemon record for `service`, sorted by index.
    pub fn daemons(&self, service: &str) -> Vec<DaemonRecord> {
        let mut records = Vec::new();
        let Ok(entries) = fs::read_dir(self.paths.daemons_dir(service)) else {
            return records;
        };
        for entry in entries.flatten() {
            if let Ok(contents) = fs::read_to_string(entry.path()) {
                if let Ok(record) = serde_json::from_str::<DaemonRecord>(&contents) {
                    records.push(record);
                }
            }
        }
        records.sort_by_key(|r| r.index);
        records
    }

    /// Creates or removes a daemon record.
    ///
    /// When `started` is `true`, allocates the lowest free index ≥ 1 and
    /// persists a new record. When `false`, deletes the first existing
    /// record whose supplied fields all match (fields left unset act as a
    /// wildcard).
    pub fn set_service_daemon(
        &self,
        service: &str,
        exec: &str,
        name: Option<&str>,
        pidfile: Option<&str>,
        started: bool,
    ) -> Result<(), RcError> {
        if started {
            let existing = self.daemons(service);
            let mut index = 1u32;
            while existing.iter().any(|r| r.index == index) {
                index += 1;
            }
            let record = DaemonRecord {
                exec: exec.to_string(),
                name: name.map(str::to_string),
                pidfile: pidfile.map(str::to_string),
                index,
            };
            let contents = serde_json::to_vec(&record)?;
            write_atomic(&self.paths.daemon_file(service, index), &contents)
        } else {
            let existing = self.daemons(service);
            if let Some(record) = existing.into_iter().find(|r| {
                r.exec == exec
                    && name.is_none_or(|n| r.name.as_deref() == Some(n))
                    && pidfile.is_none_or(|p| r.pidfile.as_deref() == Some(p))
            }) {
                let path = self.paths.daemon_file(service, record.index);
                match fs::remove_file(path) {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(e.into()),
                }
            } else {
                Ok(())
            }
        }
    }

    /// Whether any daemon record (or, if `idx` is given, specifically the
    /// `idx`-th) matches `exec`.
    pub fn service_started_daemon(&self, service: &str, exec: &str, idx: Option<u32>) -> bool {
        let records = self.daemons(service);
        match idx {
            Some(idx) => records.iter().any(|r| r.index == idx && r.exec == exec),
            None => records.iter().any(|r| r.exec == exec),
        }
    }

    /// Schedules `target` to be started whenever `trigger` enters
    /// `started`, and marks `target` as `scheduled`.
    pub fn schedule_start_service(&self, trigger: &str, target: &str) -> Result<(), RcError> {
        let link = self.paths.scheduled_link(trigger, target);
        write_atomic(&link, target.as_bytes())?;
        self.set_marker(target, Marker::Scheduled, true)
    }

    /// Enumerates the targets scheduled by `trigger`, sorted.
    pub fn services_scheduled_by(&self, trigger: &str) -> Vec<String> {
        let mut names = std::collections::BTreeSet::new();
        if let Ok(entries) = fs::read_dir(self.paths.scheduled_dir(trigger)) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    names.insert(name.to_string());
                }
            }
        }
        names.into_iter().collect()
    }

    /// Clears every target scheduled by `trigger`, clearing the `scheduled`
    /// marker on any target no longer scheduled by any trigger.
    pub fn schedule_clear(&self, trigger: &str) -> Result<(), RcError> {
        let targets = self.services_scheduled_by(trigger);
        for target in &targets {
            let link = self.paths.scheduled_link(trigger, target);
            match fs::remove_file(&link) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            if !self.is_scheduled_anywhere(target) {
                self.set_marker(target, Marker::Scheduled, false)?;
            }
        }
        Ok(())
    }

    fn is_scheduled_anywhere(&self, target: &str) -> bool {
        let Ok(entries) = fs::read_dir(self.paths.scheduled_root()) else {
            return false;
        };
        entries
            .flatten()
            .any(|entry| entry.path().is_dir() && entry.path().join(target).exists())
    }

    /// Services currently in the `started` exclusive state, sorted.
    pub fn started_services(&self) -> Vec<String> {
        self.services_in_state(ExclusiveState::Started.as_ref())
    }

    /// Services currently in the `inactive` exclusive state, sorted.
    pub fn inactive_services(&self) -> Vec<String> {
        self.services_in_state(ExclusiveState::Inactive.as_ref())
    }

    /// Services currently marked `coldplugged`, sorted.
    pub fn coldplugged_services(&self) -> Vec<String> {
        self.services_in_state(Marker::ColdPlugged.as_ref())
    }

    fn services_in_state(&self, state_name: &str) -> Vec<String> {
        let mut names = std::collections::BTreeSet::new();
        if let Ok(entries) = fs::read_dir(self.paths.state_dir().join(state_name)) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    names.insert(name.to_string());
                }
            }
        }
        names.into_iter().collect()
    }
}

/// Free-standing form of [`StateStore::wait_service`], usable by a process
/// that never constructed a `StateStore` of its own — e.g. a short-lived
/// CLI invocation that only wants to wait.
pub fn wait_service(paths: &Paths, service: &str, timeout: Duration) -> bool {
    let lock_path = paths.lock_file(service);
    let Ok(file) = OpenOptions::new().create(true).write(true).open(&lock_path) else {
        return true;
    };

    let start = Instant::now();
    let mut interval = SERVICE_POLL_INTERVAL;
    loop {
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                return true;
            }
            Err(_) => {
                let elapsed = start.elapsed();
                if elapsed >= timeout {
                    return false;
                }
                let remaining = timeout - elapsed;
                thread::sleep(interval.min(remaining));
                interval = (interval * 2).min(SERVICE_POLL_INTERVAL_MAX);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RcRoot;

    #[test]
    fn exclusive_states_are_mutually_exclusive() {
        let root = RcRoot::new();
        let store = StateStore::new(root.paths().clone());
        store.mark_service("a", ExclusiveState::Stopped).unwrap();
        assert_eq!(store.exclusive_state("a"), Some(ExclusiveState::Stopped));
        store.mark_service("a", ExclusiveState::Starting).unwrap();
        assert_eq!(store.exclusive_state("a"), Some(ExclusiveState::Starting));
        assert!(!root.paths().state_link("stopped", "a").exists());
    }

    #[test]
    fn marking_current_state_is_a_noop() {
        let root = RcRoot::new();
        let store = StateStore::new(root.paths().clone());
        store.mark_service("a", ExclusiveState::Stopped).unwrap();
        let outcome = store.mark_service("a", ExclusiveState::Stopped).unwrap();
        assert_eq!(outcome, MarkOutcome::AlreadyInState);
    }

    #[test]
    fn entering_starting_acquires_lock_and_blocks_second_transition() {
        let root = RcRoot::new();
        let store = StateStore::new(root.paths().clone());
        store.mark_service("a", ExclusiveState::Starting).unwrap();
        let err = store.mark_service("a", ExclusiveState::Stopping).unwrap_err();
        assert!(matches!(err, RcError::TransitionBusy(_)));
    }

    #[test]
    fn reaching_terminal_state_releases_lock() {
        let root = RcRoot::new();
        let store = StateStore::new(root.paths().clone());
        store.mark_service("a", ExclusiveState::Starting).unwrap();
        store.mark_service("a", ExclusiveState::Started).unwrap();
        assert!(wait_service(root.paths(), "a", Duration::from_millis(200)));
    }

    #[test]
    fn wasinactive_set_on_exit_from_inactive_unless_entering_started() {
        let root = RcRoot::new();
        let store = StateStore::new(root.paths().clone());
        store.mark_service("a", ExclusiveState::Inactive).unwrap();
        store.mark_service("a", ExclusiveState::Starting).unwrap();
        assert!(store.has_marker("a", Marker::WasInactive));

        store.mark_service("b", ExclusiveState::Inactive).unwrap();
        store.mark_service("b", ExclusiveState::Started).unwrap();
        assert!(!store.has_marker("b", Marker::WasInactive));
    }

    #[test]
    fn option_round_trips() {
        let root = RcRoot::new();
        let store = StateStore::new(root.paths().clone());
        assert_eq!(store.get_service_option("a", "k"), None);
        store.set_service_option("a", "k", "v").unwrap();
        assert_eq!(store.get_service_option("a", "k"), Some("v".to_string()));
    }

    #[test]
    fn daemon_bookkeeping_preserves_indices_through_deletion() {
        let root = RcRoot::new();
        let store = StateStore::new(root.paths().clone());
        store.set_service_daemon("d", "/bin/a", None, None, true).unwrap();
        store.set_service_daemon("d", "/bin/b", None, None, true).unwrap();
        store.set_service_daemon("d", "/bin/c", None, None, true).unwrap();

        store.set_service_daemon("d", "/bin/b", None, None, false).unwrap();

        let records = store.daemons("d");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].index, 1);
        assert_eq!(records[0].exec, "/bin/a");
        assert_eq!(records[1].index, 3);
        assert_eq!(records[1].exec, "/bin/c");

        store.set_service_daemon("d", "/bin/d", None, None, true).unwrap();
        let records = store.daemons("d");
        assert!(records.iter().any(|r| r.index == 2 && r.exec == "/bin/d"));
    }

    #[test]
    fn schedule_start_and_clear_round_trip() {
        let root = RcRoot::new();
        let store = StateStore::new(root.paths().clone());
        store.schedule_start_service("net", "dhcp").unwrap();
        assert_eq!(store.services_scheduled_by("net"), vec!["dhcp".to_string()]);
        assert!(store.has_marker("dhcp", Marker::Scheduled));

        store.schedule_clear("net").unwrap();
        assert!(store.services_scheduled_by("net").is_empty());
        assert!(!store.has_marker("dhcp", Marker::Scheduled));
    }

    #[test]
    fn exit_status_round_trips() {
        let root = RcRoot::new();
        let store = StateStore::new(root.paths().clone());
        assert_eq!(store.last_exit_status("a"), None);
        store.set_last_exit_status("a", 17).unwrap();
        assert_eq!(store.last_exit_status("a"), Some(17));
    }
}
