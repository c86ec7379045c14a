//! The knowledge base: typed assertion storage with path, universal,
//! dependency, and eviction indices.
//!
//! All state sits behind a single writer lock; commit, retraction, and clear
//! serialize on it, queries take the shared side. Readers never observe a
//! partially-updated index: every event is emitted only after the indices
//! for the assertion it names are in place.

mod assertion;
mod path_index;

pub use assertion::{
    Assertion, AssertionType, PotentialAssertion, REFLEXIVE_OPERATORS, Rule, TermShapeError,
};
pub use path_index::PathIndex;

pub(crate) use assertion::{free_variables, is_trivial, quantifier_spec_vars};

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::base::{AssertionId, IdCounter};
use crate::event::{EventSink, KbEvent};
use crate::term::Term;
use crate::unify::{Bindings, match_pattern, unify};

/// Occupancy fraction that logs a warning.
const OCCUPANCY_HIGH: f64 = 0.90;
/// Occupancy fraction that logs a critical signal.
const OCCUPANCY_CRITICAL: f64 = 0.98;

/// Counts of stored assertions by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KbStatus {
    pub ground: usize,
    pub universal: usize,
    pub skolemized: usize,
}

impl KbStatus {
    pub fn total(&self) -> usize {
        self.ground + self.universal + self.skolemized
    }
}

/// Why a cascade is removing assertions; decides which event kind is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RemovalCause {
    Retraction,
    Eviction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Occupancy {
    Normal,
    High,
    Critical,
}

struct EvictionEntry {
    priority: f64,
    timestamp: u64,
    id: AssertionId,
}

// Max-heap inverted so the lowest priority (oldest on ties) pops first.
impl Ord for EvictionEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| other.timestamp.cmp(&self.timestamp))
    }
}

impl PartialOrd for EvictionEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EvictionEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EvictionEntry {}

#[derive(Default)]
struct KbState {
    by_id: FxHashMap<AssertionId, Arc<Assertion>>,
    path_index: PathIndex,
    universal_index: FxHashMap<Term, IndexSet<AssertionId>>,
    dependencies: FxHashMap<AssertionId, IndexSet<AssertionId>>,
    eviction: BinaryHeap<EvictionEntry>,
    occupancy: Option<Occupancy>,
}

/// The typed assertion store and its indices.
pub struct KnowledgeBase {
    capacity: usize,
    state: RwLock<KbState>,
    events: EventSink,
    next_id: IdCounter,
    next_timestamp: IdCounter,
}

impl KnowledgeBase {
    pub fn new(capacity: usize, events: EventSink) -> Self {
        Self {
            capacity,
            state: RwLock::new(KbState::default()),
            events,
            next_id: IdCounter::new(),
            next_timestamp: IdCounter::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &AssertionId) -> Option<Arc<Assertion>> {
        self.state.read().by_id.get(id).cloned()
    }

    pub fn status(&self) -> KbStatus {
        let state = self.state.read();
        let mut status = KbStatus::default();
        for assertion in state.by_id.values() {
            match assertion.assertion_type {
                AssertionType::Ground => status.ground += 1,
                AssertionType::Universal => status.universal += 1,
                AssertionType::Skolemized => status.skolemized += 1,
            }
        }
        status
    }

    /// Commit a candidate. Returns the stored assertion, or `None` when the
    /// candidate was trivial, subsumed, a duplicate, or capacity could not be
    /// recovered.
    pub fn commit(&self, candidate: PotentialAssertion) -> Option<Arc<Assertion>> {
        let mut state = self.state.write();

        if is_trivial(&candidate.kif) {
            tracing::debug!(kif = %candidate.kif, "rejecting trivial assertion");
            return None;
        }

        // A candidate marked ground may have picked up skolem markers.
        let assertion_type = if candidate.assertion_type == AssertionType::Ground
            && candidate.kif.contains_skolem()
        {
            AssertionType::Skolemized
        } else {
            candidate.assertion_type
        };

        match assertion_type {
            AssertionType::Ground | AssertionType::Skolemized => {
                if state.is_subsumed(&candidate) {
                    tracing::debug!(kif = %candidate.kif, "rejecting subsumed assertion");
                    return None;
                }
            }
            AssertionType::Universal => {
                if state.universal_duplicate(&candidate) {
                    tracing::debug!(kif = %candidate.kif, "rejecting duplicate universal");
                    return None;
                }
            }
        }

        while state.by_id.len() >= self.capacity {
            let Some(victim) = state.pop_eviction_candidate() else {
                tracing::warn!(
                    capacity = self.capacity,
                    kif = %candidate.kif,
                    "capacity exhausted with nothing evictable; dropping candidate"
                );
                return None;
            };
            cascade_remove(&mut state, victim, RemovalCause::Eviction, &self.events);
        }

        let id = AssertionId::new(format!(
            "{}-{}",
            assertion_type.id_prefix(),
            self.next_id.next()
        ));
        let assertion = Arc::new(Assertion {
            id: id.clone(),
            kif: candidate.kif,
            priority: candidate.priority,
            timestamp: self.next_timestamp.next(),
            source_note_id: candidate.source_note_id,
            support: candidate.support,
            assertion_type,
            is_equality: candidate.is_equality,
            is_oriented_equality: candidate.is_oriented_equality,
            is_negated: candidate.is_negated,
            quantified_vars: candidate.quantified_vars,
            derivation_depth: candidate.derivation_depth,
        });

        state.by_id.insert(id.clone(), Arc::clone(&assertion));
        match assertion_type {
            AssertionType::Ground | AssertionType::Skolemized => {
                state.path_index.add(&assertion.kif, &id);
                state.eviction.push(EvictionEntry {
                    priority: assertion.priority,
                    timestamp: assertion.timestamp,
                    id: id.clone(),
                });
            }
            AssertionType::Universal => {
                for head in head_predicates(assertion.effective_term()) {
                    state
                        .universal_index
                        .entry(head)
                        .or_default()
                        .insert(id.clone());
                }
            }
        }
        for supporter in &assertion.support {
            state
                .dependencies
                .entry(supporter.clone())
                .or_default()
                .insert(id.clone());
        }

        state.log_occupancy(self.capacity);

        (self.events)(&KbEvent::Added {
            id,
            priority: assertion.priority,
            depth: assertion.derivation_depth,
            kif: assertion.kif.kif_string(),
        });
        Some(assertion)
    }

    /// Retract an assertion and, transitively, everything it supports.
    /// Idempotent for ids no longer present.
    pub fn retract(&self, id: &AssertionId) {
        let mut state = self.state.write();
        cascade_remove(&mut state, id.clone(), RemovalCause::Retraction, &self.events);
    }

    /// Drop all assertions and indices.
    pub fn clear(&self) {
        let mut state = self.state.write();
        *state = KbState::default();
    }

    /// Ground/skolemized assertions whose stored form could unify with the
    /// clause (polarity included in the query), confirmed against the
    /// clause's pattern.
    pub fn find_clause_candidates(&self, clause: &Term) -> Vec<Arc<Assertion>> {
        let negated = clause.operator() == Some("not");
        let pattern = Rule::clause_pattern(clause);
        let state = self.state.read();
        let mut out = Vec::new();
        for id in state.path_index.find_unifiable(clause) {
            let Some(assertion) = state.by_id.get(&id) else {
                continue;
            };
            if assertion.is_negated != negated {
                continue;
            }
            if unify(pattern, assertion.effective_term(), &Bindings::default()).is_some() {
                out.push(Arc::clone(assertion));
            }
        }
        out
    }

    /// Ground/skolemized assertions of the given polarity whose effective
    /// term is an instance of `pattern`.
    pub fn find_instances_of_pattern(
        &self,
        pattern: &Term,
        negated: bool,
    ) -> Vec<Arc<Assertion>> {
        let query = if negated {
            Term::list(vec![Term::atom("not"), pattern.clone()])
        } else {
            pattern.clone()
        };
        let state = self.state.read();
        let mut out = Vec::new();
        for id in state.path_index.find_instances(&query) {
            let Some(assertion) = state.by_id.get(&id) else {
                continue;
            };
            if assertion.is_negated != negated {
                continue;
            }
            if match_pattern(pattern, assertion.effective_term(), &Bindings::default()).is_some()
            {
                out.push(Arc::clone(assertion));
            }
        }
        out
    }

    /// Universals registered under the given head predicate.
    pub fn find_relevant_universals(&self, head: &Term) -> Vec<Arc<Assertion>> {
        let state = self.state.read();
        let Some(ids) = state.universal_index.get(head) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| state.by_id.get(id).cloned())
            .collect()
    }

    /// Snapshot of all ground and skolemized assertions.
    pub fn ground_snapshot(&self) -> Vec<Arc<Assertion>> {
        let state = self.state.read();
        state
            .by_id
            .values()
            .filter(|a| a.assertion_type != AssertionType::Universal)
            .cloned()
            .collect()
    }

    /// Snapshot of all stored oriented, non-negated equalities.
    pub fn oriented_equality_snapshot(&self) -> Vec<Arc<Assertion>> {
        let state = self.state.read();
        state
            .by_id
            .values()
            .filter(|a| a.is_oriented_equality && !a.is_negated)
            .cloned()
            .collect()
    }

    /// Report a router-side event through the KB's sink.
    pub(crate) fn emit(&self, event: &KbEvent) {
        (self.events)(event);
    }

    #[cfg(test)]
    pub(crate) fn dependency_edges(&self, supporter: &AssertionId) -> Vec<AssertionId> {
        let state = self.state.read();
        state
            .dependencies
            .get(supporter)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl KbState {
    /// A candidate is subsumed when a stored ground/skolemized assertion of
    /// the same polarity matches its effective term.
    fn is_subsumed(&self, candidate: &PotentialAssertion) -> bool {
        for id in self.path_index.find_generalizations(&candidate.kif) {
            let Some(stored) = self.by_id.get(&id) else {
                continue;
            };
            if stored.is_negated != candidate.is_negated {
                continue;
            }
            if match_pattern(
                stored.effective_term(),
                candidate.effective_term(),
                &Bindings::default(),
            )
            .is_some()
            {
                return true;
            }
        }
        false
    }

    fn universal_duplicate(&self, candidate: &PotentialAssertion) -> bool {
        for head in head_predicates(candidate.effective_term()) {
            let Some(ids) = self.universal_index.get(&head) else {
                continue;
            };
            for id in ids {
                if let Some(stored) = self.by_id.get(id) {
                    if stored.kif == candidate.kif {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Lowest-priority ground/skolemized id still present, skipping stale
    /// heap entries.
    fn pop_eviction_candidate(&mut self) -> Option<AssertionId> {
        while let Some(entry) = self.eviction.pop() {
            if self.by_id.contains_key(&entry.id) {
                return Some(entry.id);
            }
        }
        None
    }

    fn unindex(&mut self, assertion: &Assertion) {
        match assertion.assertion_type {
            AssertionType::Ground | AssertionType::Skolemized => {
                self.path_index.remove(&assertion.kif, &assertion.id);
            }
            AssertionType::Universal => {
                for head in head_predicates(assertion.effective_term()) {
                    if let Some(ids) = self.universal_index.get_mut(&head) {
                        ids.shift_remove(&assertion.id);
                        if ids.is_empty() {
                            self.universal_index.remove(&head);
                        }
                    }
                }
            }
        }
    }

    fn log_occupancy(&mut self, capacity: usize) {
        let ratio = self.by_id.len() as f64 / capacity as f64;
        let level = if ratio >= OCCUPANCY_CRITICAL {
            Occupancy::Critical
        } else if ratio >= OCCUPANCY_HIGH {
            Occupancy::High
        } else {
            Occupancy::Normal
        };
        if self.occupancy != Some(level) {
            let percent = (ratio * 100.0) as u32;
            match level {
                Occupancy::Critical => {
                    tracing::warn!(percent, "knowledge base critically full");
                }
                Occupancy::High => {
                    tracing::warn!(percent, "knowledge base nearly full");
                }
                Occupancy::Normal => {}
            }
            self.occupancy = Some(level);
        }
    }
}

/// Depth-first removal of an assertion and all its transitive dependents,
/// emitting one event per removed id in DFS order from the root.
fn cascade_remove(
    state: &mut KbState,
    root: AssertionId,
    cause: RemovalCause,
    events: &EventSink,
) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let Some(assertion) = state.by_id.remove(&id) else {
            continue;
        };
        state.unindex(&assertion);
        for supporter in &assertion.support {
            if let Some(deps) = state.dependencies.get_mut(supporter) {
                deps.shift_remove(&id);
                if deps.is_empty() {
                    state.dependencies.remove(supporter);
                }
            }
        }
        let event = match cause {
            RemovalCause::Retraction => KbEvent::Retracted { id: id.clone() },
            RemovalCause::Eviction => KbEvent::Evict { id: id.clone() },
        };
        events(&event);
        if let Some(dependents) = state.dependencies.remove(&id) {
            for dependent in dependents.into_iter().rev() {
                stack.push(dependent);
            }
        }
    }
}

/// All atoms appearing as the head of some sublist inside `term`, including
/// the term's own head.
pub(crate) fn head_predicates(term: &Term) -> FxHashSet<Term> {
    let mut out = FxHashSet::default();
    collect_heads(term, &mut out);
    out
}

fn collect_heads(term: &Term, out: &mut FxHashSet<Term>) {
    if let Some(children) = term.as_list() {
        if let Some(head) = children.first() {
            if head.is_atom() {
                out.insert(head.clone());
            }
        }
        for child in children {
            collect_heads(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{channel_sink, null_sink};
    use crate::parser::parse_kif;

    fn term(s: &str) -> Term {
        parse_kif(s).unwrap().remove(0)
    }

    fn candidate(s: &str) -> PotentialAssertion {
        PotentialAssertion::analyze(term(s), 1.0, 0, IndexSet::default(), None).unwrap()
    }

    fn candidate_with(
        s: &str,
        priority: f64,
        depth: u32,
        support: &[&AssertionId],
    ) -> PotentialAssertion {
        let support: IndexSet<AssertionId> = support.iter().map(|id| (*id).clone()).collect();
        PotentialAssertion::analyze(term(s), priority, depth, support, None).unwrap()
    }

    #[test]
    fn test_commit_and_get() {
        let kb = KnowledgeBase::new(16, null_sink());
        let a = kb.commit(candidate("(likes Alice Bob)")).unwrap();
        assert!(a.id.as_str().starts_with("fact-ground-"));
        assert_eq!(kb.get(&a.id).unwrap().kif, term("(likes Alice Bob)"));
        assert_eq!(kb.len(), 1);
    }

    #[test]
    fn test_commit_emits_added() {
        let (sink, rx) = channel_sink();
        let kb = KnowledgeBase::new(16, sink);
        let a = kb.commit(candidate("(likes Alice Bob)")).unwrap();
        match rx.try_recv().unwrap() {
            KbEvent::Added { id, kif, depth, .. } => {
                assert_eq!(id, a.id);
                assert_eq!(kif, "(likes Alice Bob)");
                assert_eq!(depth, 0);
            }
            other => panic!("expected Added, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let kb = KnowledgeBase::new(16, null_sink());
        assert!(kb.commit(candidate("(likes Alice Bob)")).is_some());
        assert!(kb.commit(candidate("(likes Alice Bob)")).is_none());
        assert_eq!(kb.len(), 1);
    }

    #[test]
    fn test_trivial_is_rejected() {
        let kb = KnowledgeBase::new(16, null_sink());
        assert!(kb.commit(candidate("(instance a a)")).is_none());
        assert!(kb.commit(candidate("(not (= b b))")).is_none());
        assert_eq!(kb.len(), 0);
    }

    #[test]
    fn test_subsumption_same_polarity_only() {
        let kb = KnowledgeBase::new(16, null_sink());
        assert!(kb.commit(candidate("(likes Alice Bob)")).is_some());
        // Opposite polarity is not subsumed.
        assert!(kb.commit(candidate("(not (likes Alice Bob))")).is_some());
        assert_eq!(kb.len(), 2);
    }

    #[test]
    fn test_skolem_promotion_on_commit() {
        let kb = KnowledgeBase::new(16, null_sink());
        let a = kb.commit(candidate("(instance skc_k_77 Kitten)")).unwrap();
        assert_eq!(a.assertion_type, AssertionType::Skolemized);
        assert!(a.id.as_str().starts_with("fact-skolemized-"));
    }

    #[test]
    fn test_universal_duplicate_rejected() {
        let kb = KnowledgeBase::new(16, null_sink());
        let u = "(forall (?x) (=> (instance ?x Dog) (attribute ?x Canine)))";
        assert!(kb.commit(candidate(u)).is_some());
        assert!(kb.commit(candidate(u)).is_none());
        assert_eq!(kb.len(), 1);
    }

    #[test]
    fn test_universal_indexed_by_heads() {
        let kb = KnowledgeBase::new(16, null_sink());
        let u = kb
            .commit(candidate(
                "(forall (?x) (=> (instance ?x Dog) (attribute ?x Canine)))",
            ))
            .unwrap();
        for head in ["=>", "instance", "attribute"] {
            let found = kb.find_relevant_universals(&Term::atom(head));
            assert_eq!(found.len(), 1, "missing under head {head}");
            assert_eq!(found[0].id, u.id);
        }
        assert!(kb.find_relevant_universals(&Term::atom("likes")).is_empty());
    }

    #[test]
    fn test_retract_removes_assertion() {
        let (sink, rx) = channel_sink();
        let kb = KnowledgeBase::new(16, sink);
        let a = kb.commit(candidate("(p a)")).unwrap();
        let _ = rx.try_recv();
        kb.retract(&a.id);
        assert!(kb.get(&a.id).is_none());
        assert_eq!(rx.try_recv().unwrap(), KbEvent::Retracted { id: a.id.clone() });
        // Idempotent.
        kb.retract(&a.id);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_cascade_retraction_dfs_order() {
        let (sink, rx) = channel_sink();
        let kb = KnowledgeBase::new(16, sink);
        let f1 = kb.commit(candidate("(p a)")).unwrap();
        let f2 = kb
            .commit(candidate_with("(q a)", 1.0, 1, &[&f1.id]))
            .unwrap();
        let f3 = kb
            .commit(candidate_with("(r a)", 1.0, 2, &[&f2.id]))
            .unwrap();
        while rx.try_recv().is_ok() {}

        kb.retract(&f1.id);
        let order: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert_eq!(
            order,
            vec![
                KbEvent::Retracted { id: f1.id.clone() },
                KbEvent::Retracted { id: f2.id.clone() },
                KbEvent::Retracted { id: f3.id.clone() },
            ]
        );
        assert_eq!(kb.len(), 0);
        assert!(kb.dependency_edges(&f1.id).is_empty());
        assert!(kb.dependency_edges(&f2.id).is_empty());
    }

    #[test]
    fn test_retract_supporter_only_affects_dependents() {
        let kb = KnowledgeBase::new(16, null_sink());
        let f1 = kb.commit(candidate("(p a)")).unwrap();
        let other = kb.commit(candidate("(p b)")).unwrap();
        let _f2 = kb
            .commit(candidate_with("(q a)", 1.0, 1, &[&f1.id]))
            .unwrap();
        kb.retract(&f1.id);
        assert_eq!(kb.len(), 1);
        assert!(kb.get(&other.id).is_some());
    }

    #[test]
    fn test_capacity_evicts_lowest_priority() {
        let (sink, rx) = channel_sink();
        let kb = KnowledgeBase::new(2, sink);
        let low = kb
            .commit(candidate_with("(p low)", 0.1, 0, &[]))
            .unwrap();
        let high = kb
            .commit(candidate_with("(p high)", 5.0, 0, &[]))
            .unwrap();
        while rx.try_recv().is_ok() {}

        let newcomer = kb
            .commit(candidate_with("(p new)", 1.0, 0, &[]))
            .unwrap();
        assert_eq!(kb.len(), 2);
        assert!(kb.get(&low.id).is_none());
        assert!(kb.get(&high.id).is_some());
        assert!(kb.get(&newcomer.id).is_some());

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(events.contains(&KbEvent::Evict { id: low.id.clone() }));
    }

    #[test]
    fn test_find_clause_candidates_polarity() {
        let kb = KnowledgeBase::new(16, null_sink());
        kb.commit(candidate("(p a)")).unwrap();
        kb.commit(candidate("(not (p b))")).unwrap();

        let positive = kb.find_clause_candidates(&term("(p ?x)"));
        assert_eq!(positive.len(), 1);
        assert_eq!(positive[0].kif, term("(p a)"));

        let negative = kb.find_clause_candidates(&term("(not (p ?x))"));
        assert_eq!(negative.len(), 1);
        assert_eq!(negative[0].effective_term(), &term("(p b)"));
    }

    #[test]
    fn test_find_instances_of_pattern() {
        let kb = KnowledgeBase::new(16, null_sink());
        kb.commit(candidate("(instance Socrates Man)")).unwrap();
        kb.commit(candidate("(instance Plato Man)")).unwrap();
        kb.commit(candidate("(instance Rex Dog)")).unwrap();

        let men = kb.find_instances_of_pattern(&term("(instance ?x Man)"), false);
        assert_eq!(men.len(), 2);
        let all = kb.find_instances_of_pattern(&term("(instance ?x ?y)"), false);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_status_counts() {
        let kb = KnowledgeBase::new(16, null_sink());
        kb.commit(candidate("(p a)")).unwrap();
        kb.commit(candidate("(instance skc_k_3 Kitten)")).unwrap();
        kb.commit(candidate("(forall (?x) (p ?x))")).unwrap();
        let status = kb.status();
        assert_eq!(status.ground, 1);
        assert_eq!(status.skolemized, 1);
        assert_eq!(status.universal, 1);
        assert_eq!(status.total(), 3);
    }

    #[test]
    fn test_clear() {
        let kb = KnowledgeBase::new(16, null_sink());
        kb.commit(candidate("(p a)")).unwrap();
        kb.commit(candidate("(forall (?x) (p ?x))")).unwrap();
        kb.clear();
        assert!(kb.is_empty());
        assert!(kb.find_relevant_universals(&Term::atom("p")).is_empty());
    }
}
