//! Path fragments and timing constants shared across modules.
use std::time::Duration;

/// Runlevels that always exist and cannot be removed via the registry.
pub const RESERVED_RUNLEVELS: &[&str] = &["sysinit", "boot", "single", "shutdown", "reboot"];

/// Runlevel consulted in addition to the target when computing `to_start`.
pub const SYSINIT_RUNLEVEL: &str = "sysinit";

/// Runlevel consulted in addition to the target when computing `to_start`.
pub const BOOT_RUNLEVEL: &str = "boot";

/// Default active runlevel when none has ever been set.
pub const DEFAULT_RUNLEVEL: &str = "sysinit";

/// Name of the file holding the active runlevel's name.
pub const ACTIVE_RUNLEVEL_FILE: &str = "softlevel";

/// Name of the marker file present while a runlevel start is in flight.
pub const RUNLEVEL_STARTING_FILE: &str = "rc-core-starting";

/// Name of the marker file present while a runlevel stop is in flight.
pub const RUNLEVEL_STOPPING_FILE: &str = "rc-core-stopping";

/// Name of the serialized dependency cache file.
pub const DEPTREE_FILE_NAME: &str = "deptree";

/// Reserved option key under which the last start/stop exit status is persisted.
pub const EXIT_STATUS_OPTION_KEY: &str = "_exit_status";

/// Reserved option key recording the uid that started the service, consulted
/// by `service_daemons_crashed` when scanning the process table.
pub const STARTER_UID_OPTION_KEY: &str = "_starter_uid";

/// Initial interval between polls of a transition lock.
pub const SERVICE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Ceiling the doubling poll interval saturates at.
pub const SERVICE_POLL_INTERVAL_MAX: Duration = Duration::from_millis(200);

/// Default timeout for `wait_service` when the caller does not override it.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default grace period `terminate_daemon` waits between SIGTERM and SIGKILL.
pub const DEFAULT_TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Poll interval used while waiting for a child pid to exit.
pub const WAITPID_POLL_INTERVAL: Duration = Duration::from_millis(50);
