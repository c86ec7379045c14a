//! Unification, one-way matching, substitution, and rewriting.
//!
//! Bindings map variables to terms. All operations treat bindings as
//! immutable: a successful step returns an extended copy, a failed step
//! leaves the caller's map untouched.

use rustc_hash::FxHashMap;

use crate::term::Term;

/// A substitution from variables to terms. Keys are always `Term::Var`.
pub type Bindings = FxHashMap<Term, Term>;

/// Substitution application stops after this many passes.
const SUBSTITUTION_DEPTH_LIMIT: usize = 50;

/// Classical unification with occurs check. Both sides are resolved through
/// the bindings before structural descent. Returns the extended bindings, or
/// `None` when the terms do not unify.
pub fn unify(x: &Term, y: &Term, bindings: &Bindings) -> Option<Bindings> {
    let x = substitute(x, bindings);
    let y = substitute(y, bindings);

    if x == y {
        return Some(bindings.clone());
    }
    match (&x, &y) {
        (Term::Var(_), _) => bind_variable(&x, &y, bindings),
        (_, Term::Var(_)) => bind_variable(&y, &x, bindings),
        (Term::List(a), Term::List(b)) => {
            let (a, b) = (a.children.as_slice(), b.children.as_slice());
            if a.len() != b.len() {
                return None;
            }
            let mut current = bindings.clone();
            for (ca, cb) in a.iter().zip(b) {
                current = unify(ca, cb, &current)?;
            }
            Some(current)
        }
        _ => None,
    }
}

/// Bind `var` to `value` (already resolved). Fails the occurs check when the
/// value contains the variable.
fn bind_variable(var: &Term, value: &Term, bindings: &Bindings) -> Option<Bindings> {
    if occurs(var, value) {
        return None;
    }
    let mut extended = bindings.clone();
    extended.insert(var.clone(), value.clone());
    Some(extended)
}

fn occurs(var: &Term, value: &Term) -> bool {
    match value {
        Term::Var(_) => var == value,
        Term::Atom(_) => false,
        Term::List(d) => d.contains_variable && d.children.iter().any(|c| occurs(var, c)),
    }
}

/// One-way matching: only variables of `pattern` may be bound; `term` is
/// taken literally. A pattern variable that is already bound must match the
/// term recursively rather than unify further. No occurs check.
pub fn match_pattern(pattern: &Term, term: &Term, bindings: &Bindings) -> Option<Bindings> {
    match pattern {
        Term::Var(_) => {
            if let Some(bound) = bindings.get(pattern) {
                let bound = bound.clone();
                // A variable bound to itself must compare directly, or the
                // lookup would recurse without consuming the term.
                if bound == *pattern {
                    return (bound == *term).then(|| bindings.clone());
                }
                match_pattern(&bound, term, bindings)
            } else {
                let mut extended = bindings.clone();
                extended.insert(pattern.clone(), term.clone());
                Some(extended)
            }
        }
        Term::Atom(_) => (pattern == term).then(|| bindings.clone()),
        Term::List(p) => {
            let t = term.as_list()?;
            if p.children.len() != t.len() {
                return None;
            }
            let mut current = bindings.clone();
            for (cp, ct) in p.children.iter().zip(t) {
                current = match_pattern(cp, ct, &current)?;
            }
            Some(current)
        }
    }
}

/// Apply a substitution to a fixed point, bounded by
/// [`SUBSTITUTION_DEPTH_LIMIT`] passes to keep pathological binding chains
/// from looping.
pub fn substitute(term: &Term, bindings: &Bindings) -> Term {
    if bindings.is_empty() || !term.contains_variable() {
        return term.clone();
    }
    let mut current = apply_once(term, bindings);
    for _ in 0..SUBSTITUTION_DEPTH_LIMIT {
        if !current.contains_variable() {
            return current;
        }
        let next = apply_once(&current, bindings);
        if next == current {
            return current;
        }
        current = next;
    }
    tracing::warn!(term = %term, "substitution did not reach a fixed point");
    current
}

fn apply_once(term: &Term, bindings: &Bindings) -> Term {
    match term {
        Term::Atom(_) => term.clone(),
        Term::Var(_) => bindings.get(term).cloned().unwrap_or_else(|| term.clone()),
        Term::List(d) => {
            if !d.contains_variable {
                return term.clone();
            }
            let mut changed = false;
            let children: Vec<Term> = d
                .children
                .iter()
                .map(|c| {
                    let applied = apply_once(c, bindings);
                    if applied != *c {
                        changed = true;
                    }
                    applied
                })
                .collect();
            if changed { Term::list(children) } else { term.clone() }
        }
    }
}

/// Attempt a single rewrite of `target` with the rule `lhs → rhs`: first at
/// the whole term, then recursively at the leftmost child that admits one.
/// Returns the rewritten term, changing exactly one subterm position.
pub fn rewrite(target: &Term, lhs: &Term, rhs: &Term) -> Option<Term> {
    if let Some(bindings) = match_pattern(lhs, target, &Bindings::default()) {
        return Some(substitute(rhs, &bindings));
    }
    let children = target.as_list()?;
    for (i, child) in children.iter().enumerate() {
        if let Some(rewritten) = rewrite(child, lhs, rhs) {
            let mut out = children.to_vec();
            out[i] = rewritten;
            return Some(Term::list(out));
        }
    }
    None
}
