//! Optional root configuration: a human-authored YAML file overriding the
//! Path & FS Layout roots and the transition-lock timing this crate would
//! otherwise default to.
//!
//! This crate has no opinion on what a service *is* beyond its init script,
//! so the only thing worth overriding from a file is *where things live*
//! and *how long to wait*.
use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::{constants::DEFAULT_WAIT_TIMEOUT, error::RcError, paths::Paths};

/// Root-level configuration, normally loaded from `/etc/rc-core.yaml` or a
/// user-scoped equivalent. Every field is optional; an absent file is not
/// an error; callers fall back to [`Paths::system`]/[`Paths::user`] and the
/// crate's built-in timing constants.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RootConfig {
    /// Additional init-script directory, shadowing the layout's defaults.
    pub init_dir: Option<PathBuf>,
    /// Overrides the directory holding runlevel membership and the active
    /// runlevel marker.
    pub runlevel_root: Option<PathBuf>,
    /// Overrides the directory holding mutable per-service state.
    pub state_root: Option<PathBuf>,
    /// Overrides [`crate::state::StateStore::wait_service`]'s default
    /// timeout, in seconds.
    pub wait_timeout_secs: Option<u64>,
}

impl RootConfig {
    /// Parses a `RootConfig` from a YAML file.
    pub fn load(path: &Path) -> Result<Self, RcError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Parses a `RootConfig` from a YAML file, returning the default
    /// (all-`None`) config if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, RcError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Applies every override this config specifies on top of `paths`,
    /// leaving fields this config is silent on untouched.
    pub fn apply(&self, mut paths: Paths) -> Paths {
        if let Some(dir) = &self.init_dir {
            paths = paths.with_user_init_dir(dir.clone());
        }
        if let Some(root) = &self.runlevel_root {
            paths = paths.with_runlevel_root(root.clone());
        }
        if let Some(root) = &self.state_root {
            paths = paths.with_state_root(root.clone());
        }
        paths
    }

    /// The configured `wait_service` timeout, or the crate default.
    pub fn wait_timeout(&self) -> Duration {
        self.wait_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_WAIT_TIMEOUT)
    }
}
