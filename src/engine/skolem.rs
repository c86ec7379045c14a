//! Existential elimination.
//!
//! `(exists <varspec> body)` is replaced by `body` with each existential
//! variable bound to a fresh skolem term: a `skc_` constant when the body has
//! no free variables outside the existential set, otherwise a `skf_`-headed
//! application of those free variables. Skolem names embed a process-wide
//! monotone counter.

use smol_str::SmolStr;

use crate::base::next_skolem_id;
use crate::kb::TermShapeError;
use crate::kb::{free_variables, quantifier_spec_vars};
use crate::term::{SKOLEM_CONSTANT_PREFIX, SKOLEM_FUNCTION_PREFIX, Term};
use crate::unify::{Bindings, substitute};

/// Skolemize the body of an `exists` term in the context of `bindings`.
/// Returns the closed (skolemized) body.
pub fn skolemize(exists: &Term, bindings: &Bindings) -> Result<Term, TermShapeError> {
    let args = exists.args();
    if exists.operator() != Some("exists") || args.len() != 2 {
        return Err(TermShapeError::InvalidQuantifierSpec {
            term: exists.kif_string(),
        });
    }
    let existential_vars = quantifier_spec_vars(&args[0]).ok_or_else(|| {
        TermShapeError::InvalidQuantifierSpec {
            term: exists.kif_string(),
        }
    })?;
    let body = &args[1];

    // Free variables of the body outside the existential set, resolved
    // through the context and sorted by print order for stable argument
    // positions.
    let mut outer: Vec<Term> = free_variables(body)
        .into_iter()
        .filter(|v| !existential_vars.contains(v))
        .collect();
    outer.sort_by_key(|v| v.kif_string());
    let outer_args: Vec<Term> = outer.iter().map(|v| substitute(v, bindings)).collect();

    let mut skolem_map = bindings.clone();
    for var in &existential_vars {
        let name = var.as_var_name().expect("quantified variable");
        let suffix = next_skolem_id();
        let replacement = if outer_args.is_empty() {
            Term::atom(SmolStr::new(format!(
                "{SKOLEM_CONSTANT_PREFIX}{name}_{suffix}"
            )))
        } else {
            let mut children =
                vec![Term::atom(SmolStr::new(format!(
                    "{SKOLEM_FUNCTION_PREFIX}{name}_{suffix}"
                )))];
            children.extend(outer_args.iter().cloned());
            Term::list(children)
        };
        skolem_map.insert(var.clone(), replacement);
    }

    Ok(substitute(body, &skolem_map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_kif;

    fn term(s: &str) -> Term {
        parse_kif(s).unwrap().remove(0)
    }

    #[test]
    fn test_skolem_constant_when_no_outer_vars() {
        let out = skolemize(
            &term("(exists (?k) (and (instance ?k Kitten) (attribute ?k Cute)))"),
            &Bindings::default(),
        )
        .unwrap();
        assert!(!out.contains_variable());
        assert!(out.contains_skolem());
        // The same constant threads through both conjuncts.
        let conjuncts = out.args();
        assert_eq!(conjuncts[0].args()[0], conjuncts[1].args()[0]);
        let name = conjuncts[0].args()[0].as_atom().unwrap();
        assert!(name.starts_with("skc_k_"));
    }

    #[test]
    fn test_skolem_function_over_free_vars() {
        let out = skolemize(&term("(exists (?y) (parent ?x ?y))"), &Bindings::default()).unwrap();
        let skolem = &out.args()[1];
        assert_eq!(skolem.operator().map(|op| op.starts_with("skf_y_")), Some(true));
        assert_eq!(skolem.args(), &[Term::var("x")]);
    }

    #[test]
    fn test_context_bindings_resolve_free_vars() {
        let mut bindings = Bindings::default();
        bindings.insert(Term::var("x"), Term::atom("Rex"));
        let out = skolemize(&term("(exists (?y) (parent ?x ?y))"), &bindings).unwrap();
        assert!(!out.contains_variable());
        let skolem = &out.args()[1];
        assert_eq!(skolem.args(), &[Term::atom("Rex")]);
    }

    #[test]
    fn test_fresh_names_per_call() {
        let exists = term("(exists (?k) (instance ?k Kitten))");
        let a = skolemize(&exists, &Bindings::default()).unwrap();
        let b = skolemize(&exists, &Bindings::default()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_multiple_existentials() {
        let out = skolemize(&term("(exists (?a ?b) (pair ?a ?b))"), &Bindings::default()).unwrap();
        assert!(!out.contains_variable());
        assert_ne!(out.args()[0], out.args()[1]);
    }

    #[test]
    fn test_invalid_spec_rejected() {
        assert!(skolemize(&term("(exists a (p a))"), &Bindings::default()).is_err());
        assert!(skolemize(&term("(exists (?x))"), &Bindings::default()).is_err());
    }
}
