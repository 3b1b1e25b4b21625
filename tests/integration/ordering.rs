//! End-to-end activation ordering, built from real spawned init scripts
//! rather than hand-assembled graphs (unlike the unit tests in
//! `src/depend/query.rs`), exercising the full parser → cache → query
//! pipeline together.
use rc_core::{
    depend::{self, DepOptions},
    runlevel,
    state::{ExclusiveState, StateStore},
    test_utils::RcRoot,
};

/// `B: ineed A`, `C: iuse B`, all members of `default` → `[A, B, C]`.
#[test]
fn linear_start_chain_from_real_scripts() {
    let root = RcRoot::new();
    root.write_depend_script("a", &[]);
    root.write_depend_script("b", &["ineed a"]);
    root.write_depend_script("c", &["iuse b"]);
    for svc in ["a", "b", "c"] {
        runlevel::add_member(root.paths(), "default", svc).unwrap();
    }

    let graph = depend::update_deptree(root.paths(), true).unwrap();
    let store = StateStore::new(root.paths().clone());
    let order = depend::order_services(&graph, root.paths(), &store, "default", DepOptions::for_start()).unwrap();
    assert_eq!(order, vec!["a".to_string(), "b".to_string(), "c".to_string()]);
}

/// All three started, target runlevel `single` contains none of them →
/// full reverse-order stop.
#[test]
fn switching_to_empty_runlevel_stops_everything_in_reverse() {
    let root = RcRoot::new();
    root.write_depend_script("a", &[]);
    root.write_depend_script("b", &["ineed a"]);
    root.write_depend_script("c", &["iuse b"]);
    for svc in ["a", "b", "c"] {
        runlevel::add_member(root.paths(), "default", svc).unwrap();
    }

    let graph = depend::update_deptree(root.paths(), true).unwrap();
    let store = StateStore::new(root.paths().clone());
    for svc in ["a", "b", "c"] {
        store.mark_service(svc, ExclusiveState::Starting).unwrap();
        store.mark_service(svc, ExclusiveState::Started).unwrap();
    }

    let order = depend::order_services(&graph, root.paths(), &store, "single", DepOptions::for_stop()).unwrap();
    assert_eq!(order, vec!["c".to_string(), "b".to_string(), "a".to_string()]);
}

/// `W: ineed X`, `X: ineed W` → fatal cycle surfaced with both names.
#[test]
fn mutual_ineed_cycle_is_fatal() {
    let root = RcRoot::new();
    root.write_depend_script("w", &["ineed x"]);
    root.write_depend_script("x", &["ineed w"]);
    for svc in ["w", "x"] {
        runlevel::add_member(root.paths(), "default", svc).unwrap();
    }

    let graph = depend::update_deptree(root.paths(), true).unwrap();
    let store = StateStore::new(root.paths().clone());
    let err = depend::order_services(&graph, root.paths(), &store, "default", DepOptions::for_start()).unwrap_err();
    match err {
        rc_core::error::RcError::DependencyCycle { services } => {
            assert_eq!(services, vec!["w".to_string(), "x".to_string()]);
        }
        other => panic!("expected DependencyCycle, got {other:?}"),
    }
}

/// A coldplugged service outside every runlevel is still brought into
/// `to_start`, and an `iwant` dependency not present anywhere is simply
/// absent from the final order rather than erroring.
#[test]
fn coldplugged_services_join_to_start_set() {
    let root = RcRoot::new();
    root.write_depend_script("hotplugged", &[]);
    root.write_depend_script("net", &["iwant dhcp"]);
    runlevel::add_member(root.paths(), "default", "net").unwrap();

    let graph = depend::update_deptree(root.paths(), true).unwrap();
    let store = StateStore::new(root.paths().clone());
    store.mark_service("hotplugged", ExclusiveState::Starting).unwrap();
    store.mark_service("hotplugged", ExclusiveState::Started).unwrap();
    store.set_marker("hotplugged", rc_core::state::Marker::ColdPlugged, true).unwrap();

    let order = depend::order_services(&graph, root.paths(), &store, "default", DepOptions::for_start()).unwrap();
    assert!(order.contains(&"hotplugged".to_string()));
    assert!(order.contains(&"net".to_string()));
    assert!(!order.contains(&"dhcp".to_string()));
}

/// Stop-before-start: no service in the start portion of the output
/// precedes any service in the stop portion.
#[test]
fn stop_portion_never_follows_start_portion() {
    let root = RcRoot::new();
    root.write_depend_script("keep", &[]);
    root.write_depend_script("gone", &[]);
    runlevel::add_member(root.paths(), "default", "keep").unwrap();

    let graph = depend::update_deptree(root.paths(), true).unwrap();
    let store = StateStore::new(root.paths().clone());
    store.mark_service("gone", ExclusiveState::Starting).unwrap();
    store.mark_service("gone", ExclusiveState::Started).unwrap();

    let order = depend::order_services(&graph, root.paths(), &store, "default", DepOptions::for_start()).unwrap();
    let stop_pos = order.iter().position(|s| s == "gone").unwrap();
    let start_pos = order.iter().position(|s| s == "keep").unwrap();
    assert!(stop_pos < start_pos);
}
