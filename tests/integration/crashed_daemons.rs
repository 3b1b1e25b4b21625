//! A service with a daemon record is crashed iff no process matches its
//! `(exec, pidfile)`, using a real spawned child rather than a process we
//! merely assert doesn't exist (`src/process.rs`'s unit test covers the
//! always-absent case).
use std::{fs, process::Command, thread, time::Duration};

use rc_core::{
    process::{daemons_crashed, is_crashed},
    state::{ExclusiveState, StateStore},
    test_utils::RcRoot,
};

const SLEEP_EXEC: &str = "/usr/bin/sleep";

#[test]
fn crashed_flips_once_process_exits() {
    if !std::path::Path::new(SLEEP_EXEC).exists() {
        eprintln!("skipping: {SLEEP_EXEC} not present in this environment");
        return;
    }

    let root = RcRoot::new();
    let pidfile = root.root().join("d.pid");
    let store = StateStore::new(root.paths().clone());

    let mut child = Command::new(SLEEP_EXEC).arg("2").spawn().unwrap();
    fs::write(&pidfile, child.id().to_string()).unwrap();
    store
        .set_service_daemon("d", SLEEP_EXEC, None, Some(pidfile.to_str().unwrap()), true)
        .unwrap();

    assert!(!daemons_crashed(&store, "d"), "process is alive, should not read as crashed");

    child.kill().unwrap();
    child.wait().unwrap();
    // Allow the OS to fully reap/unregister the pid from the process table.
    thread::sleep(Duration::from_millis(100));

    assert!(daemons_crashed(&store, "d"), "process has exited, should read as crashed");
}

#[test]
fn is_crashed_requires_started_state() {
    let root = RcRoot::new();
    let store = StateStore::new(root.paths().clone());
    store
        .set_service_daemon("d", "/bin/definitely-not-running-xyz", None, None, true)
        .unwrap();

    assert!(!is_crashed(&store, "d"), "not started yet, crashed predicate must not fire");

    store.mark_service("d", ExclusiveState::Starting).unwrap();
    store.mark_service("d", ExclusiveState::Started).unwrap();
    assert!(is_crashed(&store, "d"));
}
