//! Spawns service start/stop scripts, waits for their completion, and
//! scans the process table for a service's tracked daemons.
//!
//! `start_service`/`stop_service` spawn the init script with
//! `Command::new(path).arg(verb)`; `wait_pid` is a `waitpid`/`WNOHANG`
//! polling loop with no per-caller timeout baked in; `find_pids` is a
//! `sysinfo`-backed process table scan.
use std::{process::Command, thread, time::{Duration, Instant}};

use nix::{
    sys::wait::{waitpid, WaitPidFlag, WaitStatus},
    unistd::Pid,
};
use sysinfo::{Pid as SysPid, ProcessesToUpdate, System};
use tracing::{debug, instrument, warn};

use crate::{
    constants::WAITPID_POLL_INTERVAL,
    error::RcError,
    hooks::{HookKind, Hooks},
    paths::Paths,
    resolver,
    state::{ExclusiveState, StateStore},
};

/// Verb passed to the init script to request a non-side-effecting
/// dependency dump, a start, or a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// `depend` — see [`crate::depend::parser`].
    Depend,
    /// `start`.
    Start,
    /// `stop`.
    Stop,
}

impl Verb {
    fn as_arg(self) -> &'static str {
        match self {
            Verb::Depend => "depend",
            Verb::Start => "start",
            Verb::Stop => "stop",
        }
    }
}

/// Outcome of [`start_service`]/[`stop_service`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnOutcome {
    /// A child process was spawned with this pid.
    Spawned(u32),
    /// The service was already in the requested transitional/terminal
    /// state; no child was spawned.
    AlreadyDone,
}

/// Starts `service`: marks it `starting`, fires `service_start_now`, and
/// spawns its init script with the `start` verb. A no-op
/// ([`SpawnOutcome::AlreadyDone`]) if the service is already `starting` or
/// `started`.
#[instrument(skip(paths, store, hooks))]
pub fn start_service(
    paths: &Paths,
    store: &StateStore,
    hooks: &dyn Hooks,
    service: &str,
) -> Result<SpawnOutcome, RcError> {
    if matches!(
        store.exclusive_state(service),
        Some(ExclusiveState::Starting) | Some(ExclusiveState::Started)
    ) {
        return Ok(SpawnOutcome::AlreadyDone);
    }

    store.mark_service(service, ExclusiveState::Starting)?;
    store.set_starter_uid(service, current_uid())?;
    hooks.call(HookKind::ServiceStartNow, service);
    let pid = spawn_script(paths, service, Verb::Start)?;
    Ok(SpawnOutcome::Spawned(pid))
}

/// Stops `service`: marks it `stopping`, fires `service_stop_now`, and
/// spawns its init script with the `stop` verb. A no-op
/// ([`SpawnOutcome::AlreadyDone`]) if the service is already `stopping` or
/// `stopped`.
#[instrument(skip(paths, store, hooks))]
pub fn stop_service(
    paths: &Paths,
    store: &StateStore,
    hooks: &dyn Hooks,
    service: &str,
) -> Result<SpawnOutcome, RcError> {
    if matches!(
        store.exclusive_state(service),
        Some(ExclusiveState::Stopping) | Some(ExclusiveState::Stopped) | None
    ) {
        return Ok(SpawnOutcome::AlreadyDone);
    }

    store.mark_service(service, ExclusiveState::Stopping)?;
    hooks.call(HookKind::ServiceStopNow, service);
    let pid = spawn_script(paths, service, Verb::Stop)?;
    Ok(SpawnOutcome::Spawned(pid))
}

fn spawn_script(paths: &Paths, service: &str, verb: Verb) -> Result<u32, RcError> {
    let script = resolver::resolve(paths, service)
        .ok_or_else(|| RcError::ServiceNotFound(service.to_string()))?;
    let child = Command::new(script).arg(verb.as_arg()).spawn()?;
    Ok(child.id())
}

/// Records the exit status of a just-finished start/stop attempt, fires
/// `service_*_done` and `service_*_out`, and moves the service to its
/// terminal state (`started`/`stopped` on success, `stopped` +
/// [`crate::state::Marker::Failed`] on failure).
#[instrument(skip(store, hooks))]
pub fn complete_transition(
    store: &StateStore,
    hooks: &dyn Hooks,
    service: &str,
    was_start: bool,
    exit_code: i32,
) -> Result<(), RcError> {
    store.set_last_exit_status(service, exit_code)?;
    hooks.call(
        if was_start {
            HookKind::ServiceStartDone
        } else {
            HookKind::ServiceStopDone
        },
        service,
    );

    let success = exit_code == 0;
    store.set_marker(service, crate::state::Marker::Failed, !success)?;

    let terminal = if was_start && success {
        ExclusiveState::Started
    } else {
        ExclusiveState::Stopped
    };
    store.mark_service(service, terminal)?;

    hooks.call(
        if was_start {
            HookKind::ServiceStartOut
        } else {
            HookKind::ServiceStopOut
        },
        service,
    );
    Ok(())
}

/// Blocks until `pid` exits, reaping it, and returns its exit code (or a
/// negative signal number if it was killed by a signal). Polls with
/// `WNOHANG`; no per-caller timeout is baked in.
pub fn wait_pid(pid: u32) -> Result<i32, RcError> {
    let target = Pid::from_raw(pid as i32);
    loop {
        match waitpid(target, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => {
                thread::sleep(WAITPID_POLL_INTERVAL);
            }
            Ok(WaitStatus::Exited(_, code)) => return Ok(code),
            Ok(WaitStatus::Signaled(_, signal, _)) => return Ok(-(signal as i32)),
            Ok(_) => {
                thread::sleep(WAITPID_POLL_INTERVAL);
            }
            Err(nix::errno::Errno::ECHILD) => return Ok(0),
            Err(e) => return Err(RcError::Errno(e)),
        }
    }
}

/// Predicate used by [`find_pids`]. `pid`, when given, overrides every
/// other field. If both `exec` and `cmd` are given, `cmd` wins and `exec`
/// is ignored.
#[derive(Debug, Clone, Default)]
pub struct FindPidsQuery<'a> {
    /// Matches the process's executable path.
    pub exec: Option<&'a str>,
    /// Matches the process's reported name.
    pub cmd: Option<&'a str>,
    /// Matches the process's real uid.
    pub uid: Option<u32>,
    /// Matches this exact pid, overriding every other field.
    pub pid: Option<u32>,
}

/// Scans the OS process table for processes matching `query`, conjunctively
/// across every field supplied.
pub fn find_pids(query: &FindPidsQuery<'_>) -> Vec<u32> {
    if let Some(pid) = query.pid {
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[SysPid::from_u32(pid)]), true);
        return if system.process(SysPid::from_u32(pid)).is_some() {
            vec![pid]
        } else {
            Vec::new()
        };
    }

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut matches = Vec::new();
    for (sys_pid, process) in system.processes() {
        if let Some(cmd) = query.cmd {
            if process.name().to_string_lossy() != cmd {
                continue;
            }
        } else if let Some(exec) = query.exec {
            let exe_matches = process
                .exe()
                .map(|p| p.to_string_lossy() == exec)
                .unwrap_or(false);
            if !exe_matches {
                continue;
            }
        }

        if let Some(uid) = query.uid {
            let uid_matches = process.user_id().map(|u| **u == uid).unwrap_or(false);
            if !uid_matches {
                continue;
            }
        }

        matches.push(sys_pid.as_u32());
    }
    matches
}

/// Whether `service` has crashed: its exclusive state is `started` but
/// none of its tracked daemon records have a live match in the process
/// table.
pub fn is_crashed(store: &StateStore, service: &str) -> bool {
    if store.exclusive_state(service) != Some(ExclusiveState::Started) {
        return false;
    }
    daemons_crashed(store, service)
}

/// Iterates `service`'s daemon records, invoking [`find_pids`] with each
/// record's `(exec, name)` and the service's starter uid; a pidfile, if
/// present, additionally narrows the match to that one pid. Returns `true`
/// iff any record has zero live matches.
#[instrument(skip(store))]
pub fn daemons_crashed(store: &StateStore, service: &str) -> bool {
    let uid = store.starter_uid(service);
    for record in store.daemons(service) {
        let pidfile_pid = record
            .pidfile
            .as_deref()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| s.trim().parse::<u32>().ok());

        let query = FindPidsQuery {
            exec: Some(record.exec.as_str()),
            cmd: record.name.as_deref(),
            uid,
            pid: pidfile_pid,
        };
        if find_pids(&query).is_empty() {
            debug!(service, exec = record.exec.as_str(), "daemon record has no live match");
            return true;
        }
    }
    false
}

/// Sends `SIGTERM` to `pid`, waiting up to `grace` for it to exit, then
/// escalates to `SIGKILL`. A `start-stop-daemon`-style helper for callers
/// that need graceful termination outside the start/stop script protocol.
pub fn terminate_daemon(pid: u32, grace: Duration) -> Result<(), RcError> {
    let target = Pid::from_raw(pid as i32);
    if nix::sys::signal::kill(target, nix::sys::signal::Signal::SIGTERM).is_err() {
        return Ok(());
    }

    let start = Instant::now();
    while start.elapsed() < grace {
        match waitpid(target, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => thread::sleep(WAITPID_POLL_INTERVAL),
            Ok(_) | Err(nix::errno::Errno::ECHILD) => return Ok(()),
            Err(e) => return Err(RcError::Errno(e)),
        }
    }

    warn!(pid, "daemon did not exit within grace period, escalating to SIGKILL");
    let _ = nix::sys::signal::kill(target, nix::sys::signal::Signal::SIGKILL);
    Ok(())
}

fn current_uid() -> u32 {
    nix::unistd::getuid().as_raw()
}
