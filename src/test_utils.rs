//! Scratch-root fixture shared by every module's unit tests, and by the
//! integration tests under `tests/integration/`: a scratch `Paths::at(root)`
//! tree with stub init scripts.
//!
//! Rolls its own directory-under-`TMPDIR` cleanup rather than depending on
//! `tempfile`: this module is `pub` so it's reachable from separate
//! integration test binaries, which link only the library's normal build
//! and so cannot see `tempfile`, a dev-dependency.
use std::{
    fs,
    os::unix::fs::PermissionsExt,
    path::PathBuf,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::paths::Paths;

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// A throwaway directory under `$TMPDIR`, removed recursively when dropped.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new() -> Self {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("rc-core-test-{}-{n}", std::process::id()));
        fs::create_dir_all(&dir).expect("create scratch dir");
        Self(dir)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

/// A throwaway `init.d`/`runlevels`/state tree, torn down when dropped.
pub struct RcRoot {
    dir: ScratchDir,
    paths: Paths,
}

impl RcRoot {
    /// Creates a fresh scratch root with every directory the layout
    /// depends on already present.
    pub fn new() -> Self {
        let dir = ScratchDir::new();
        let paths = Paths::at(&dir.0);
        paths.ensure_dirs().expect("ensure_dirs");
        Self { dir, paths }
    }

    /// The layout rooted at this scratch directory.
    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    /// The scratch directory itself.
    pub fn root(&self) -> PathBuf {
        self.dir.0.clone()
    }

    /// Writes an executable init script under the scratch `init.d`.
    pub fn write_script(&self, name: &str, contents: &str) -> PathBuf {
        let dir = &self.paths.init_dirs()[0];
        fs::create_dir_all(dir).expect("init dir");
        let path = dir.join(name);
        fs::write(&path, contents).expect("write script");
        let mut perms = fs::metadata(&path).expect("stat script").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("chmod script");
        path
    }

    /// Writes a stub init script whose `depend` verb prints `lines`
    /// verbatim (one `echo` per line) and whose `start`/`stop` verbs
    /// succeed immediately.
    pub fn write_depend_script(&self, name: &str, lines: &[&str]) -> PathBuf {
        let mut body = String::from("#!/bin/sh\ncase \"$1\" in\n  depend)\n");
        for line in lines {
            body.push_str(&format!("    echo '{line}'\n"));
        }
        body.push_str("    ;;\n  start) exit 0 ;;\n  stop) exit 0 ;;\nesac\n");
        self.write_script(name, &body)
    }

    /// Writes a stub init script whose `start`/`stop` verbs exit with
    /// `exit_code` after touching a marker file, for tests that drive
    /// [`crate::process::start_service`]/`stop_service` end to end.
    pub fn write_runnable_script(&self, name: &str, exit_code: i32) -> PathBuf {
        let body = format!(
            "#!/bin/sh\ncase \"$1\" in\n  depend) ;;\n  start|stop) exit {exit_code} ;;\nesac\n"
        );
        self.write_script(name, &body)
    }
}

impl Default for RcRoot {
    fn default() -> Self {
        Self::new()
    }
}
