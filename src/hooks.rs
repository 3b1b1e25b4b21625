//! Host-provided hook callback, invoked at defined transition points.
//!
//! Callers accept a `Fn(HookKind, &str) -> i32` at construction rather than
//! resolving a plugin entry point at link time: an owned capability object
//! instead of a global function pointer.
use std::fmt;

/// Identifies a single hook invocation point. Ordering within a
/// transition is `_in` ≺ `_now` ≺ `_done` ≺ `_out`, enforced by the state
/// machine's own call sequence rather than by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    /// A runlevel stop is beginning.
    RunlevelStopIn,
    /// A runlevel stop has completed.
    RunlevelStopOut,
    /// A runlevel start is beginning.
    RunlevelStartIn,
    /// A runlevel start has completed.
    RunlevelStartOut,
    /// A service stop has been requested.
    ServiceStopIn,
    /// The service's stop script is about to be spawned.
    ServiceStopNow,
    /// The service's stop script has exited.
    ServiceStopDone,
    /// The service has reached a terminal stopped state.
    ServiceStopOut,
    /// A service start has been requested.
    ServiceStartIn,
    /// The service's start script is about to be spawned.
    ServiceStartNow,
    /// The service's start script has exited.
    ServiceStartDone,
    /// The service has reached a terminal started state.
    ServiceStartOut,
    /// A transition has been aborted.
    Abort,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::RunlevelStopIn => "runlevel_stop_in",
            HookKind::RunlevelStopOut => "runlevel_stop_out",
            HookKind::RunlevelStartIn => "runlevel_start_in",
            HookKind::RunlevelStartOut => "runlevel_start_out",
            HookKind::ServiceStopIn => "service_stop_in",
            HookKind::ServiceStopNow => "service_stop_now",
            HookKind::ServiceStopDone => "service_stop_done",
            HookKind::ServiceStopOut => "service_stop_out",
            HookKind::ServiceStartIn => "service_start_in",
            HookKind::ServiceStartNow => "service_start_now",
            HookKind::ServiceStartDone => "service_start_done",
            HookKind::ServiceStartOut => "service_start_out",
            HookKind::Abort => "abort",
        };
        f.write_str(name)
    }
}

/// Host-provided hook callback. The return value is not consulted by the
/// core; a failing hook is the host's concern (logged by the host, not by
/// this crate).
pub trait Hooks: Send + Sync {
    /// Invoked at a defined transition point with the hook identifier and
    /// the subject's name (a runlevel name or a service name).
    fn call(&self, kind: HookKind, name: &str) -> i32;
}

impl<F> Hooks for F
where
    F: Fn(HookKind, &str) -> i32 + Send + Sync,
{
    fn call(&self, kind: HookKind, name: &str) -> i32 {
        self(kind, name)
    }
}

/// A zero-cost `Hooks` implementation for callers who don't need plugin
/// behavior, so a host works with zero hooks installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl Hooks for NoopHooks {
    fn call(&self, _kind: HookKind, _name: &str) -> i32 {
        0
    }
}
