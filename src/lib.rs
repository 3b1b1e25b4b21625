//! Dependency engine and filesystem-backed service state store for a
//! Unix-like service-management runtime.
//!
//! Two subsystems: [`depend`] computes topologically correct start/stop
//! orders for a runlevel from declared per-service dependencies, and
//! [`state`] tracks each service's lifecycle as a process-wide,
//! filesystem-backed state machine. [`paths`], [`resolver`] and
//! [`runlevel`] anchor both in a shared on-disk layout; [`process`] spawns
//! the init scripts the other modules reason about; [`hooks`] dispatches
//! the host-provided callback at transition points.
//!
//! Everything a runlevel-change driver or init-script interpreter needs is
//! exposed here; neither is part of this crate (see `DESIGN.md`).
#![warn(unused_crate_dependencies)]

// Carried for host binaries to initialize: a subscriber is wired up in
// whatever binary embeds this crate, never inside the library itself.
use tracing_subscriber as _;

/// Temp-file-then-rename atomic writes, used by every subsystem that
/// persists mutable state.
pub mod atomic;

/// Path fragments and timing constants shared across modules.
pub mod constants;

/// Optional root configuration overriding the layout and timing defaults.
pub mod config;

/// Dependency Engine: parsing, caching, and ordering.
pub mod depend;

/// Error taxonomy.
pub mod error;

/// Host-provided hook callback dispatch.
pub mod hooks;

/// Canonical on-disk layout.
pub mod paths;

/// Process supervision: spawning init scripts and scanning for daemons.
pub mod process;

/// Service name resolution.
pub mod resolver;

/// Runlevel enumeration, active-runlevel storage, membership.
pub mod runlevel;

/// Per-service state machine: transitions, options, daemons, scheduling.
pub mod state;

/// Scratch-root fixture shared by unit tests across every module, and by
/// the integration tests under `tests/integration/`.
#[doc(hidden)]
pub mod test_utils;
