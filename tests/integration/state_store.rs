//! End-to-end service-supervision flow: spawn a real init script through
//! [`rc_core::process`], wait for it to exit, and confirm the state store
//! lands in the terminal state the exit code implies.
use std::time::Duration;

use rc_core::{
    hooks::NoopHooks,
    process,
    state::{ExclusiveState, Marker, StateStore},
    test_utils::RcRoot,
};

#[test]
fn successful_start_reaches_started_with_no_failed_marker() {
    let root = RcRoot::new();
    root.write_runnable_script("sshd", 0);
    let store = StateStore::new(root.paths().clone());

    let outcome = process::start_service(root.paths(), &store, &NoopHooks, "sshd").unwrap();
    let process::SpawnOutcome::Spawned(pid) = outcome else {
        panic!("expected a spawned child");
    };
    let code = process::wait_pid(pid).unwrap();
    process::complete_transition(&store, &NoopHooks, "sshd", true, code).unwrap();

    assert_eq!(store.exclusive_state("sshd"), Some(ExclusiveState::Started));
    assert!(!store.has_marker("sshd", Marker::Failed));
    assert_eq!(store.last_exit_status("sshd"), Some(0));
}

#[test]
fn failing_start_lands_in_stopped_with_failed_marker() {
    let root = RcRoot::new();
    root.write_runnable_script("broken", 1);
    let store = StateStore::new(root.paths().clone());

    let outcome = process::start_service(root.paths(), &store, &NoopHooks, "broken").unwrap();
    let process::SpawnOutcome::Spawned(pid) = outcome else {
        panic!("expected a spawned child");
    };
    let code = process::wait_pid(pid).unwrap();
    process::complete_transition(&store, &NoopHooks, "broken", true, code).unwrap();

    assert_eq!(store.exclusive_state("broken"), Some(ExclusiveState::Stopped));
    assert!(store.has_marker("broken", Marker::Failed));
}

#[test]
fn starting_an_already_started_service_is_a_noop() {
    let root = RcRoot::new();
    root.write_runnable_script("sshd", 0);
    let store = StateStore::new(root.paths().clone());
    store.mark_service("sshd", ExclusiveState::Starting).unwrap();
    store.mark_service("sshd", ExclusiveState::Started).unwrap();

    let outcome = process::start_service(root.paths(), &store, &NoopHooks, "sshd").unwrap();
    assert_eq!(outcome, process::SpawnOutcome::AlreadyDone);
}

/// `mark_service("e", starting)` then a concurrent `wait_service` call
/// unblocks within a 1s timeout once the transition reaches `started`.
#[test]
fn wait_service_unblocks_when_transition_completes() {
    let root = RcRoot::new();
    let store = std::sync::Arc::new(StateStore::new(root.paths().clone()));
    store.mark_service("e", ExclusiveState::Starting).unwrap();

    let waiter_store = store.clone();
    let waiter = std::thread::spawn(move || waiter_store.wait_service("e", Duration::from_secs(1)));

    std::thread::sleep(Duration::from_millis(200));
    store.mark_service("e", ExclusiveState::Started).unwrap();

    assert!(waiter.join().unwrap());
}

#[test]
fn wait_service_times_out_while_transition_is_stuck() {
    let root = RcRoot::new();
    let store = StateStore::new(root.paths().clone());
    store.mark_service("stuck", ExclusiveState::Starting).unwrap();

    assert!(!store.wait_service("stuck", Duration::from_millis(150)));
}
