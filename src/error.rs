//! Error taxonomy for rc-core.
use thiserror::Error;

/// Errors surfaced by the dependency engine and service state store.
///
/// Read-side operations report absence via empty results rather than an
/// error variant here (see the propagation policy in the design doc);
/// this enum exists for operations that can genuinely fail.
#[derive(Debug, Error)]
pub enum RcError {
    /// A service name did not resolve to an init script.
    #[error("service '{0}' does not resolve to an init script")]
    ServiceNotFound(String),

    /// A runlevel name has no corresponding directory.
    #[error("runlevel '{0}' does not exist")]
    RunlevelNotFound(String),

    /// A requested option key is not set for the given service.
    #[error("option '{key}' is not set for service '{service}'")]
    OptionNotFound {
        /// Service the option was requested for.
        service: String,
        /// The missing option key.
        key: String,
    },

    /// Another process (or this one) already holds the transition lock
    /// for this service.
    #[error("transition for service '{0}' is already in progress")]
    TransitionBusy(String),

    /// An unbreakable `ineed` cycle was found while ordering services.
    #[error("dependency cycle detected among: {}", .services.join(", "))]
    DependencyCycle {
        /// The services participating in the cycle, sorted for determinism.
        services: Vec<String>,
    },

    /// An init script emitted a malformed dependency line in `depend` mode.
    #[error("service '{service}' emitted a malformed dependency line: '{line}'")]
    DependencyParse {
        /// The service whose `depend` output could not be parsed.
        service: String,
        /// The offending line.
        line: String,
    },

    /// Underlying filesystem operation failed.
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The dependency cache failed to (de)serialize.
    #[error("dependency cache (de)serialization failed: {0}")]
    Cache(#[from] serde_json::Error),

    /// The root configuration file failed to parse.
    #[error("configuration parse failure: {0}")]
    Config(#[from] serde_yaml::Error),

    /// A `libc`/`nix` system call failed.
    #[error("system call failed: {0}")]
    Errno(#[from] nix::errno::Errno),

    /// An internal mutex was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for RcError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        RcError::LockPoisoned(err.to_string())
    }
}
