//! Free-standing `wait_service`, used by a caller that never constructs a
//! [`rc_core::state::StateStore`] of its own (e.g. a short-lived CLI
//! invocation), exercised across two independent `Paths` handles onto the
//! same scratch root to stand in for two cooperating processes.
use std::time::Duration;

use rc_core::{
    state::{wait_service, ExclusiveState, StateStore},
    test_utils::RcRoot,
};

#[test]
fn free_function_agrees_with_method_form() {
    let root = RcRoot::new();
    let store = StateStore::new(root.paths().clone());
    store.mark_service("svc", ExclusiveState::Starting).unwrap();
    store.mark_service("svc", ExclusiveState::Started).unwrap();

    assert!(wait_service(root.paths(), "svc", Duration::from_millis(200)));
}

#[test]
fn never_transitioned_service_has_no_lock_to_wait_on() {
    let root = RcRoot::new();
    assert!(wait_service(root.paths(), "never-touched", Duration::from_millis(50)));
}

#[test]
fn second_handle_onto_same_root_observes_the_same_lock() {
    let root = RcRoot::new();
    let store_a = StateStore::new(root.paths().clone());
    let paths_b = root.paths().clone();

    store_a.mark_service("svc", ExclusiveState::Starting).unwrap();
    assert!(!wait_service(&paths_b, "svc", Duration::from_millis(100)));

    store_a.mark_service("svc", ExclusiveState::Started).unwrap();
    assert!(wait_service(&paths_b, "svc", Duration::from_millis(100)));
}
