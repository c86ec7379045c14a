//! Rule derivation: antecedent matching, consequent dispatch, logical
//! simplification, and candidate submission under depth/weight limits.

use indexmap::IndexSet;

use crate::base::AssertionId;
use crate::kb::{Assertion, AssertionType, PotentialAssertion, Rule};
use crate::term::Term;
use crate::unify::{Bindings, match_pattern, rewrite, substitute, unify};

use super::EngineCore;
use super::skolem::skolemize;

/// Fixed-point bound for logical simplification.
const SIMPLIFY_PASS_LIMIT: usize = 5;

/// Accumulated justification while matching antecedents.
#[derive(Debug, Clone)]
struct Derivation {
    clause_index: usize,
    bindings: Bindings,
    support: IndexSet<AssertionId>,
    min_priority: f64,
    max_depth: u32,
}

/// Match every antecedent of `rule` against the knowledge base, depth-first
/// with an explicit work stack, and process each complete binding's
/// consequent.
pub(super) fn run_match_antecedent(
    core: &EngineCore,
    rule: &Rule,
    trigger: &AssertionId,
    seed: &Bindings,
) {
    // The trigger must still be present; a retracted trigger no longer
    // justifies anything.
    let Some(trigger_assertion) = core.kb.get(trigger) else {
        return;
    };

    let mut support = IndexSet::default();
    support.insert(trigger_assertion.id.clone());
    let mut stack = vec![Derivation {
        clause_index: 0,
        bindings: seed.clone(),
        support,
        min_priority: trigger_assertion.priority,
        max_depth: trigger_assertion.derivation_depth,
    }];

    while let Some(state) = stack.pop() {
        if state.clause_index == rule.antecedents.len() {
            let consequent = substitute(&rule.consequent, &state.bindings);
            let simplified = simplify(&consequent);
            process_consequent(core, rule, &simplified, &state);
            continue;
        }

        let clause = substitute(&rule.antecedents[state.clause_index], &state.bindings);
        let pattern = Rule::clause_pattern(&clause).clone();
        for candidate in core.kb.find_clause_candidates(&clause) {
            if let Some(extended) =
                unify(&pattern, candidate.effective_term(), &state.bindings)
            {
                let mut support = state.support.clone();
                support.insert(candidate.id.clone());
                stack.push(Derivation {
                    clause_index: state.clause_index + 1,
                    bindings: extended,
                    support,
                    min_priority: state.min_priority.min(candidate.priority),
                    max_depth: state.max_depth.max(candidate.derivation_depth),
                });
            }
        }
    }
}

/// Dispatch a fully-bound consequent by its outermost operator.
fn process_consequent(core: &EngineCore, rule: &Rule, consequent: &Term, state: &Derivation) {
    match consequent.operator() {
        Some("and") => {
            for conjunct in consequent.args() {
                process_consequent(core, rule, conjunct, state);
            }
        }
        Some("forall") => {
            let args = consequent.args();
            let body_is_rule = args.len() == 2
                && matches!(args[1].operator(), Some("=>") | Some("<=>"));
            if body_is_rule && core.config.enable_rule_derivation {
                let priority = state.min_priority * core.config.derived_priority_decay;
                if let Err(error) = core.install_rule(&args[1], priority) {
                    tracing::debug!(rule = %rule.form, %error, "discarding malformed derived rule");
                }
            } else if core.config.enable_forward_instantiation {
                submit_derived(core, rule, consequent.clone(), state);
            }
        }
        Some("exists") => {
            if core.config.enable_skolemization {
                match skolemize(consequent, &Bindings::default()) {
                    Ok(body) => submit_derived(core, rule, body, state),
                    Err(error) => {
                        tracing::debug!(rule = %rule.form, %error, "discarding malformed existential");
                    }
                }
            }
        }
        _ => submit_derived(core, rule, consequent.clone(), state),
    }
}

fn submit_derived(core: &EngineCore, rule: &Rule, kif: Term, state: &Derivation) {
    let mut support = state.support.clone();
    support.insert(rule.id.clone());
    submit_candidate(
        core,
        kif,
        state.min_priority * core.config.derived_priority_decay,
        state.max_depth + 1,
        support,
        rule.form.kif_string().as_str(),
    );
}

/// Validate a derived term against the depth/weight limits and offer it to
/// the commit queue.
pub(super) fn submit_candidate(
    core: &EngineCore,
    kif: Term,
    priority: f64,
    depth: u32,
    support: IndexSet<AssertionId>,
    origin: &str,
) {
    if depth > core.config.max_derivation_depth {
        tracing::debug!(origin, depth, "derivation depth limit reached");
        return;
    }
    if kif.weight() > core.config.max_derived_term_weight {
        tracing::warn!(origin, weight = kif.weight(), "discarding overweight derived term");
        return;
    }
    match PotentialAssertion::analyze(kif, priority, depth, support, None) {
        Ok(candidate) => {
            if candidate.assertion_type != AssertionType::Universal
                && candidate.kif.contains_variable()
            {
                tracing::debug!(origin, kif = %candidate.kif, "discarding open derived term");
                return;
            }
            core.commit.offer(candidate);
        }
        Err(error) => {
            tracing::debug!(origin, %error, "discarding malformed derived term");
        }
    }
}

/// Apply an oriented equality to one target assertion and submit the
/// rewritten form.
pub(super) fn run_rewrite(core: &EngineCore, rule: &Assertion, target: &Assertion) {
    if !is_rewrite_rule(rule) {
        return;
    }
    // Skip stale work: either side may have been retracted since enqueue.
    if core.kb.get(&rule.id).is_none() || core.kb.get(&target.id).is_none() {
        return;
    }
    let lhs = &rule.kif.args()[0];
    let rhs = &rule.kif.args()[1];
    let Some(rewritten) = rewrite(&target.kif, lhs, rhs) else {
        return;
    };
    if rewritten == target.kif {
        return;
    }
    let mut support = target.support.clone();
    support.insert(target.id.clone());
    support.insert(rule.id.clone());
    submit_candidate(
        core,
        rewritten,
        target.priority.min(rule.priority) * core.config.derived_priority_decay,
        target.derivation_depth.max(rule.derivation_depth) + 1,
        support,
        "rewrite",
    );
}

/// A stored assertion usable as a left-to-right rewrite rule.
pub(super) fn is_rewrite_rule(assertion: &Assertion) -> bool {
    assertion.is_oriented_equality
        && !assertion.is_negated
        && assertion.assertion_type != AssertionType::Universal
        && assertion.kif.as_list().map(<[Term]>::len) == Some(3)
}

/// Does any subterm of `term` match the rewrite pattern `lhs`?
pub(super) fn has_redex(term: &Term, lhs: &Term) -> bool {
    if match_pattern(lhs, term, &Bindings::default()).is_some() {
        return true;
    }
    term.as_list()
        .is_some_and(|children| children.iter().any(|c| has_redex(c, lhs)))
}

/// Bounded fixed point of semantics-preserving local rewrites. The only
/// installed rule is double-negation elimination.
pub(super) fn simplify(term: &Term) -> Term {
    let mut current = term.clone();
    for _ in 0..SIMPLIFY_PASS_LIMIT {
        let next = simplify_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn simplify_once(term: &Term) -> Term {
    if term.operator() == Some("not") {
        let args = term.args();
        if args.len() == 1 && args[0].operator() == Some("not") && args[0].args().len() == 1 {
            return args[0].args()[0].clone();
        }
    }
    let Some(children) = term.as_list() else {
        return term.clone();
    };
    let mut changed = false;
    let simplified: Vec<Term> = children
        .iter()
        .map(|c| {
            let s = simplify_once(c);
            if s != *c {
                changed = true;
            }
            s
        })
        .collect();
    if changed {
        Term::list(simplified)
    } else {
        term.clone()
    }
}
