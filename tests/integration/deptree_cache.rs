//! End-to-end cache round-trip and staleness detection against real
//! init-script mtimes (unit tests in `src/depend/cache.rs` cover the same
//! ground with hand-built graphs; this exercises the full parser too).
use std::{thread, time::Duration};

use rc_core::depend::{self, Relation};

#[test]
fn round_trip_through_real_save_and_load() {
    let root = rc_core::test_utils::RcRoot::new();
    root.write_depend_script("a", &[]);
    root.write_depend_script("b", &["ineed a"]);

    let built = depend::update_deptree(root.paths(), true).unwrap();
    let loaded = depend::load(root.paths()).unwrap();
    assert_eq!(built, loaded);
    assert_eq!(loaded.deptype("a", Relation::NeedsMe), vec!["b".to_string()]);
}

#[test]
fn cache_is_reused_until_a_script_changes() {
    let root = rc_core::test_utils::RcRoot::new();
    root.write_depend_script("a", &["ineed b"]);

    let first = depend::update_deptree(root.paths(), false).unwrap();
    let second = depend::update_deptree(root.paths(), false).unwrap();
    assert_eq!(first, second);

    thread::sleep(Duration::from_millis(20));
    root.write_depend_script("a", &["ineed c"]);
    let third = depend::update_deptree(root.paths(), false).unwrap();
    assert_eq!(third.deptype("a", Relation::INeed), vec!["c".to_string()]);
}

/// Two providers of `net`, only `p1` a member of the active runlevel →
/// `ineed net` always resolves to `p1`, and the cache reflects the rewrite.
#[test]
fn provide_tiebreak_survives_a_cache_round_trip() {
    let root = rc_core::test_utils::RcRoot::new();
    root.write_depend_script("p1", &["iprovide net"]);
    root.write_depend_script("p2", &["iprovide net"]);
    root.write_depend_script("consumer", &["ineed net"]);
    rc_core::runlevel::add_member(root.paths(), "default", "p1").unwrap();
    rc_core::runlevel::set_runlevel(root.paths(), "default").unwrap();

    let built = depend::update_deptree(root.paths(), true).unwrap();
    assert_eq!(built.deptype("consumer", Relation::INeed), vec!["p1".to_string()]);

    let loaded = depend::load(root.paths()).unwrap();
    assert_eq!(loaded.deptype("consumer", Relation::INeed), vec!["p1".to_string()]);
}
