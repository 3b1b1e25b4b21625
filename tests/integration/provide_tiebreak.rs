//! `iprovide` alias resolution across real spawned `depend` scripts, both
//! when one provider is an active runlevel member and when neither is.
use rc_core::{
    depend::{self, Relation},
    runlevel,
    test_utils::RcRoot,
};

/// `p1` is in the active runlevel, `p2` is not → `ineed net` resolves
/// to `p1` regardless of parse order.
#[test]
fn active_runlevel_member_wins_the_alias() {
    let root = RcRoot::new();
    root.write_depend_script("p1", &["iprovide net"]);
    root.write_depend_script("p2", &["iprovide net"]);
    root.write_depend_script("consumer", &["ineed net"]);
    runlevel::add_member(root.paths(), "default", "p1").unwrap();
    runlevel::set_runlevel(root.paths(), "default").unwrap();

    let graph = depend::update_deptree(root.paths(), true).unwrap();
    assert_eq!(graph.deptype("consumer", Relation::INeed), vec!["p1".to_string()]);
    assert_eq!(graph.deptype("p1", Relation::NeedsMe), vec!["consumer".to_string()]);
    assert!(graph.deptype("p2", Relation::NeedsMe).is_empty());
}

/// When neither provider is a member of the active runlevel, the
/// lexicographically-first provider name wins, deterministically.
#[test]
fn neither_provider_active_falls_back_to_lexicographic_name() {
    let root = RcRoot::new();
    root.write_depend_script("zeta", &["iprovide net"]);
    root.write_depend_script("alpha", &["iprovide net"]);
    root.write_depend_script("consumer", &["ineed net"]);

    let graph = depend::update_deptree(root.paths(), true).unwrap();
    assert_eq!(graph.deptype("consumer", Relation::INeed), vec!["alpha".to_string()]);
}

/// Switching the active runlevel changes which provider wins on the next
/// rebuild, since resolution consults the runlevel at parse time.
#[test]
fn tiebreak_follows_the_active_runlevel_across_rebuilds() {
    let root = RcRoot::new();
    root.write_depend_script("p1", &["iprovide net"]);
    root.write_depend_script("p2", &["iprovide net"]);
    root.write_depend_script("consumer", &["ineed net"]);
    runlevel::add_member(root.paths(), "default", "p1").unwrap();
    runlevel::add_member(root.paths(), "rescue", "p2").unwrap();

    runlevel::set_runlevel(root.paths(), "default").unwrap();
    let under_default = depend::update_deptree(root.paths(), true).unwrap();
    assert_eq!(under_default.deptype("consumer", Relation::INeed), vec!["p1".to_string()]);

    runlevel::set_runlevel(root.paths(), "rescue").unwrap();
    let under_rescue = depend::update_deptree(root.paths(), true).unwrap();
    assert_eq!(under_rescue.deptype("consumer", Relation::INeed), vec!["p2".to_string()]);
}
