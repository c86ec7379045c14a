//! Invariant checks against the knowledge base and the parser, driven
//! through the public API without the engine threads.

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use rstest::rstest;

use noesis::{
    AssertionId, KbEvent, KnowledgeBase, PotentialAssertion, Term, channel_sink, null_sink,
    parse_kif,
};

fn term(s: &str) -> Term {
    parse_kif(s).unwrap().remove(0)
}

fn candidate(s: &str, priority: f64, depth: u32, support: &[&AssertionId]) -> PotentialAssertion {
    let support: IndexSet<AssertionId> = support.iter().map(|id| (*id).clone()).collect();
    PotentialAssertion::analyze(term(s), priority, depth, support, None).unwrap()
}

/// Sources shared between the round-trip checks below.
static ROUND_TRIP_CORPUS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "(instance Socrates Man)",
        "(=> (and (p ?x) (not (q ?x))) (r ?x))",
        "(forall (?x ?y) (likes ?x ?y))",
        "(\"two words\" \"with \\\" quote\" plain)",
        "(= (age Fluffy) 3)",
        "()",
        "(a (b (c (d))))",
    ]
});

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(4)]
#[case(5)]
#[case(6)]
fn test_print_parse_round_trip(#[case] index: usize) {
    let source = ROUND_TRIP_CORPUS[index];
    let parsed = term(source);
    let printed = parsed.kif_string();
    assert_eq!(printed, source);
    assert_eq!(term(&printed), parsed);
}

#[test]
fn test_capacity_bound_holds_under_load() {
    let (sink, rx) = channel_sink();
    let kb = KnowledgeBase::new(10, sink);
    for i in 0..50 {
        kb.commit(candidate(&format!("(p item{i})"), i as f64, 0, &[]));
        assert!(kb.len() <= 10, "capacity exceeded at step {i}");
    }
    assert_eq!(kb.len(), 10);

    // Lowest-priority entries were evicted with events.
    let evicted = rx
        .try_iter()
        .filter(|e| matches!(e, KbEvent::Evict { .. }))
        .count();
    assert_eq!(evicted, 40);
    // The survivors are the 10 highest-priority facts.
    for i in 40..50 {
        assert_eq!(
            kb.find_instances_of_pattern(&term(&format!("(p item{i})")), false)
                .len(),
            1
        );
    }
}

#[test]
fn test_eviction_cascades_through_dependents() {
    let (sink, rx) = channel_sink();
    let kb = KnowledgeBase::new(2, sink);
    let base = kb.commit(candidate("(p base)", 0.1, 0, &[])).unwrap();
    let derived = kb
        .commit(candidate("(q derived)", 5.0, 1, &[&base.id]))
        .unwrap();
    while rx.try_recv().is_ok() {}

    // Inserting a third fact evicts the lowest-priority base, which takes
    // its dependent with it.
    kb.commit(candidate("(r other)", 9.0, 0, &[])).unwrap();
    assert!(kb.get(&base.id).is_none());
    assert!(kb.get(&derived.id).is_none());

    let evicted: Vec<AssertionId> = rx
        .try_iter()
        .filter_map(|e| match e {
            KbEvent::Evict { id } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(evicted, vec![base.id.clone(), derived.id.clone()]);
}

#[test]
fn test_support_closure_after_retraction() {
    let kb = KnowledgeBase::new(64, null_sink());
    let f1 = kb.commit(candidate("(p a)", 1.0, 0, &[])).unwrap();
    let f2 = kb.commit(candidate("(p b)", 1.0, 0, &[])).unwrap();
    // A diamond: f3 rests on both roots, f4 on f3 alone.
    let f3 = kb
        .commit(candidate("(q ab)", 1.0, 1, &[&f1.id, &f2.id]))
        .unwrap();
    let f4 = kb.commit(candidate("(r ab)", 1.0, 2, &[&f3.id])).unwrap();

    kb.retract(&f1.id);
    // Everything resting on f1 is gone; the other root survives.
    assert!(kb.get(&f1.id).is_none());
    assert!(kb.get(&f3.id).is_none());
    assert!(kb.get(&f4.id).is_none());
    assert!(kb.get(&f2.id).is_some());
    assert_eq!(kb.len(), 1);
}

#[test]
fn test_depth_bookkeeping() {
    let kb = KnowledgeBase::new(64, null_sink());
    let f1 = kb.commit(candidate("(p a)", 1.0, 0, &[])).unwrap();
    assert_eq!(f1.derivation_depth, 0);
    assert!(f1.support.is_empty());

    let f2 = kb.commit(candidate("(q a)", 1.0, 1, &[&f1.id])).unwrap();
    assert_eq!(f2.derivation_depth, 1 + f1.derivation_depth);
}

#[test]
fn test_committed_assertions_are_queryable() {
    let kb = KnowledgeBase::new(64, null_sink());
    let sources = [
        "(instance Socrates Man)",
        "(not (instance Socrates Robot))",
        "(= (age Fluffy) 3)",
    ];
    for source in sources {
        let a = kb.commit(candidate(source, 1.0, 0, &[])).unwrap();
        let found = kb.find_instances_of_pattern(a.effective_term(), a.is_negated);
        assert!(
            found.iter().any(|stored| stored.id == a.id),
            "{source} not reachable through its own pattern"
        );
    }
}

#[test]
fn test_skolemized_duplicate_is_subsumed() {
    let kb = KnowledgeBase::new(64, null_sink());
    kb.commit(candidate("(likes skc_someone_0 Alice)", 1.0, 0, &[]))
        .unwrap();
    assert!(
        kb.commit(candidate("(likes skc_someone_0 Alice)", 2.0, 0, &[]))
            .is_none()
    );
    assert_eq!(kb.len(), 1);
}

#[test]
fn test_ids_are_unique_and_prefixed() {
    let kb = KnowledgeBase::new(64, null_sink());
    let a = kb.commit(candidate("(p a)", 1.0, 0, &[])).unwrap();
    let b = kb.commit(candidate("(p b)", 1.0, 0, &[])).unwrap();
    let u = kb
        .commit(candidate("(forall (?x) (z ?x))", 1.0, 0, &[]))
        .unwrap();
    assert_ne!(a.id, b.id);
    assert!(a.id.as_str().starts_with("fact-ground-"));
    assert!(u.id.as_str().starts_with("fact-universal-"));
}

#[test]
fn test_scheduling_order() {
    let kb = KnowledgeBase::new(64, null_sink());
    let low = kb.commit(candidate("(p a)", 1.0, 0, &[])).unwrap();
    let high = kb.commit(candidate("(p b)", 5.0, 0, &[])).unwrap();
    let deep = kb.commit(candidate("(p c)", 5.0, 3, &[])).unwrap();

    // Priority descending first.
    assert_eq!(high.scheduling_cmp(&low), std::cmp::Ordering::Less);
    // Then depth ascending on priority ties.
    assert_eq!(high.scheduling_cmp(&deep), std::cmp::Ordering::Less);
}
