//! Canonical on-disk layout: init scripts, runlevel/state symlink trees,
//! options, daemon records, scheduling links and the dependency cache.
//!
//! `Paths` is an explicit, cloneable value returned by a constructor;
//! `init`/`current` below layer a process-wide global on top of it for
//! callers that prefer not to thread a handle through their own call graph.
use std::{
    env,
    path::{Path, PathBuf},
    sync::{OnceLock, RwLock},
};

use crate::constants::{ACTIVE_RUNLEVEL_FILE, DEPTREE_FILE_NAME};

/// Root-relative directory layout for a single `rc-core` filesystem tree.
///
/// Init scripts are searched across an ordered list of directories so a
/// user-local override can shadow a system one (see [`Paths::resolve_dirs`]);
/// every other subtree lives under a single `state_root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    init_dirs: Vec<PathBuf>,
    runlevel_root: PathBuf,
    state_root: PathBuf,
}

impl Paths {
    /// System-mode layout: scripts under `/etc/init.d`, runlevels under
    /// `/etc/runlevels`, mutable state under `/run/rc-core` — read-mostly
    /// config kept apart from the read-write state root.
    pub fn system() -> Self {
        Self {
            init_dirs: vec![PathBuf::from("/etc/init.d")],
            runlevel_root: PathBuf::from("/etc"),
            state_root: PathBuf::from("/run/rc-core"),
        }
    }

    /// User-mode layout, scoped under the invoking user's `$HOME`.
    pub fn user() -> Self {
        let home = env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/"));
        Self::from_user_home(&home)
    }

    /// User-mode layout rooted at an explicit home directory, used by
    /// `user()` and by callers overriding the home directory directly.
    pub fn from_user_home(home: &Path) -> Self {
        let config_root = home.join(".config/rc-core");
        Self {
            init_dirs: vec![config_root.join("init.d")],
            runlevel_root: config_root,
            state_root: home.join(".local/share/rc-core"),
        }
    }

    /// Single-root layout for tests and embedders who want one scratch
    /// directory holding init scripts, runlevels and state together.
    pub fn at(root: &Path) -> Self {
        Self {
            init_dirs: vec![root.join("init.d")],
            runlevel_root: root.to_path_buf(),
            state_root: root.to_path_buf(),
        }
    }

    /// Prepends a user-local init directory so it shadows every directory
    /// already in the search list.
    pub fn with_user_init_dir(mut self, dir: PathBuf) -> Self {
        self.init_dirs.insert(0, dir);
        self
    }

    /// Overrides the runlevel root, for [`crate::config::RootConfig`]
    /// overrides of the default system/user layout.
    pub fn with_runlevel_root(mut self, root: PathBuf) -> Self {
        self.runlevel_root = root;
        self
    }

    /// Overrides the mutable state root, for [`crate::config::RootConfig`]
    /// overrides of the default system/user layout.
    pub fn with_state_root(mut self, root: PathBuf) -> Self {
        self.state_root = root;
        self
    }

    /// Ordered list of directories searched for init scripts, first match
    /// wins.
    pub fn init_dirs(&self) -> &[PathBuf] {
        &self.init_dirs
    }

    /// Root directory holding `runlevels/` and the active-runlevel marker.
    pub fn runlevel_root(&self) -> &Path {
        &self.runlevel_root
    }

    /// Root directory holding mutable per-service state.
    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    /// Directory containing runlevel membership directories.
    pub fn runlevels_dir(&self) -> PathBuf {
        self.runlevel_root.join("runlevels")
    }

    /// Directory for a single runlevel's membership symlinks.
    pub fn runlevel_dir(&self, level: &str) -> PathBuf {
        self.runlevels_dir().join(level)
    }

    /// Path of the file storing the currently active runlevel's name.
    pub fn active_runlevel_file(&self) -> PathBuf {
        self.runlevel_root.join(ACTIVE_RUNLEVEL_FILE)
    }

    /// Path of a transient mid-transition marker file.
    pub fn transition_marker_file(&self, file_name: &str) -> PathBuf {
        self.state_root.join(file_name)
    }

    /// Root directory of the exclusive/orthogonal state symlink tree.
    pub fn state_dir(&self) -> PathBuf {
        self.state_root.join("state")
    }

    /// Path of a single state symlink.
    pub fn state_link(&self, state_name: &str, service: &str) -> PathBuf {
        self.state_dir().join(state_name).join(service)
    }

    /// Per-service options directory.
    pub fn options_dir(&self, service: &str) -> PathBuf {
        self.state_root.join("options").join(service)
    }

    /// Path of a single option file.
    pub fn option_file(&self, service: &str, key: &str) -> PathBuf {
        self.options_dir(service).join(key)
    }

    /// Per-service daemon-record directory.
    pub fn daemons_dir(&self, service: &str) -> PathBuf {
        self.state_root.join("daemons").join(service)
    }

    /// Path of a single daemon record, keyed by its 1-based index.
    pub fn daemon_file(&self, service: &str, index: u32) -> PathBuf {
        self.daemons_dir(service).join(index.to_string())
    }

    /// Root directory of the scheduling links, one subdirectory per
    /// trigger service.
    pub fn scheduled_root(&self) -> PathBuf {
        self.state_root.join("scheduled")
    }

    /// Directory holding a trigger service's scheduled targets.
    pub fn scheduled_dir(&self, trigger: &str) -> PathBuf {
        self.scheduled_root().join(trigger)
    }

    /// Path of a single trigger → target scheduling link.
    pub fn scheduled_link(&self, trigger: &str, target: &str) -> PathBuf {
        self.scheduled_dir(trigger).join(target)
    }

    /// Path of the serialized dependency cache.
    pub fn deptree_file(&self) -> PathBuf {
        self.state_root.join(DEPTREE_FILE_NAME)
    }

    /// Directory holding one advisory lockfile per service.
    ///
    /// A dedicated empty file separate from the state symlinks, so a held
    /// `flock` never blocks a reader simply stat-ing `state/<statename>/`.
    pub fn locks_dir(&self) -> PathBuf {
        self.state_root.join("locks")
    }

    /// Path of a single service's transition lockfile.
    pub fn lock_file(&self, service: &str) -> PathBuf {
        self.locks_dir().join(format!("{service}.lock"))
    }

    /// Creates every directory this layout depends on existing. Safe to
    /// call repeatedly; used by callers bootstrapping a fresh root and by
    /// the test fixture in [`crate::test_utils`].
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in &self.init_dirs {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::create_dir_all(self.runlevels_dir())?;
        std::fs::create_dir_all(self.state_dir())?;
        std::fs::create_dir_all(self.state_root.join("options"))?;
        std::fs::create_dir_all(self.state_root.join("daemons"))?;
        std::fs::create_dir_all(self.scheduled_root())?;
        std::fs::create_dir_all(self.locks_dir())?;
        Ok(())
    }
}

static CONTEXT: OnceLock<RwLock<Paths>> = OnceLock::new();

fn context_lock() -> &'static RwLock<Paths> {
    CONTEXT.get_or_init(|| RwLock::new(Paths::user()))
}

/// Installs `paths` as the process-wide default, for callers that prefer
/// the global-style over threading a `Paths` value through their own call
/// graph. The handle returned by [`Paths::system`] / [`Paths::user`] /
/// [`Paths::at`] remains the primary, recommended API.
pub fn init(paths: Paths) {
    let mut guard = context_lock().write().unwrap_or_else(|e| e.into_inner());
    *guard = paths;
}

/// Returns a clone of the process-wide default layout.
pub fn current() -> Paths {
    context_lock()
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
}
