//! Interned term algebra.
//!
//! A [`Term`] is a closed sum with exactly three variants: atoms, variables,
//! and lists. Atoms and variables are interned process-wide: identical value
//! implies identical (pointer-equal) backing allocation. Lists precompute
//! their derived data (structural weight, contains-variable and
//! contains-skolem flags, structural hash) at construction and cache the KIF
//! string form on first access.
//!
//! Skolem markers: an atom whose value begins with `skc_` is a skolem
//! constant; a list whose operator begins with `skf_` is a skolem function
//! application.

mod intern;
mod print;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use rustc_hash::{FxHashSet, FxHasher};
use smol_str::SmolStr;

pub(crate) use intern::{intern_atom, intern_var};

/// Prefix marking a skolem constant atom.
pub const SKOLEM_CONSTANT_PREFIX: &str = "skc_";
/// Prefix marking the operator of a skolem function application.
pub const SKOLEM_FUNCTION_PREFIX: &str = "skf_";

/// An immutable, structurally-hashed KIF term.
#[derive(Clone)]
pub enum Term {
    Atom(Arc<AtomData>),
    Var(Arc<VarData>),
    List(Arc<ListData>),
}

/// Interned atom payload.
#[derive(Debug)]
pub struct AtomData {
    pub(crate) value: SmolStr,
    pub(crate) is_skolem_constant: bool,
}

/// Interned variable payload. The stored name excludes the leading `?`.
#[derive(Debug)]
pub struct VarData {
    pub(crate) name: SmolStr,
}

/// List payload with derived data computed at construction.
pub struct ListData {
    pub(crate) children: Vec<Term>,
    pub(crate) weight: u64,
    pub(crate) contains_variable: bool,
    pub(crate) contains_skolem: bool,
    pub(crate) hash: u64,
    pub(crate) kif: OnceLock<String>,
}

impl Term {
    /// An interned atom. Same value, same allocation.
    pub fn atom(value: impl Into<SmolStr>) -> Term {
        Term::Atom(intern_atom(value.into()))
    }

    /// An interned variable. `name` excludes the leading `?`.
    pub fn var(name: impl Into<SmolStr>) -> Term {
        Term::Var(intern_var(name.into()))
    }

    /// A list term. Derived data is computed eagerly from the children.
    pub fn list(children: Vec<Term>) -> Term {
        let weight = 1 + children.iter().map(Term::weight).sum::<u64>();
        let contains_variable = children.iter().any(Term::contains_variable);
        let operator_is_skolem = matches!(
            children.first(),
            Some(Term::Atom(a)) if a.value.starts_with(SKOLEM_FUNCTION_PREFIX)
        );
        let contains_skolem =
            operator_is_skolem || children.iter().any(Term::contains_skolem);

        let mut hasher = FxHasher::default();
        2u8.hash(&mut hasher);
        for child in &children {
            child.hash(&mut hasher);
        }
        let hash = hasher.finish();

        Term::List(Arc::new(ListData {
            children,
            weight,
            contains_variable,
            contains_skolem,
            hash,
            kif: OnceLock::new(),
        }))
    }

    /// Structural weight: 1 for atoms and variables, 1 + Σ children for lists.
    pub fn weight(&self) -> u64 {
        match self {
            Term::Atom(_) | Term::Var(_) => 1,
            Term::List(d) => d.weight,
        }
    }

    pub fn contains_variable(&self) -> bool {
        match self {
            Term::Atom(_) => false,
            Term::Var(_) => true,
            Term::List(d) => d.contains_variable,
        }
    }

    pub fn contains_skolem(&self) -> bool {
        match self {
            Term::Atom(a) => a.is_skolem_constant,
            Term::Var(_) => false,
            Term::List(d) => d.contains_skolem,
        }
    }

    /// The canonical KIF string form.
    pub fn kif_string(&self) -> String {
        match self {
            Term::Atom(a) => print::atom_kif(&a.value),
            Term::Var(v) => format!("?{}", v.name),
            Term::List(d) => d
                .kif
                .get_or_init(|| print::list_kif(&d.children))
                .clone(),
        }
    }

    /// The set of variables occurring anywhere in the term.
    pub fn variables(&self) -> FxHashSet<Term> {
        let mut out = FxHashSet::default();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut FxHashSet<Term>) {
        match self {
            Term::Atom(_) => {}
            Term::Var(_) => {
                out.insert(self.clone());
            }
            Term::List(d) => {
                if d.contains_variable {
                    for child in &d.children {
                        child.collect_variables(out);
                    }
                }
            }
        }
    }

    pub fn is_atom(&self) -> bool {
        matches!(self, Term::Atom(_))
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Term::List(_))
    }

    /// The atom's value, if this is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Term::Atom(a) => Some(&a.value),
            _ => None,
        }
    }

    /// The variable's name (without `?`), if this is a variable.
    pub fn as_var_name(&self) -> Option<&str> {
        match self {
            Term::Var(v) => Some(&v.name),
            _ => None,
        }
    }

    /// The list's children, if this is a list.
    pub fn as_list(&self) -> Option<&[Term]> {
        match self {
            Term::List(d) => Some(&d.children),
            _ => None,
        }
    }

    /// The operator of a list term: the value of its head atom.
    pub fn operator(&self) -> Option<&str> {
        self.as_list().and_then(|cs| cs.first()).and_then(Term::as_atom)
    }

    /// The arguments of a list term (everything after the operator).
    pub fn args(&self) -> &[Term] {
        match self.as_list() {
            Some(cs) if !cs.is_empty() => &cs[1..],
            _ => &[],
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Interned: pointer equality decides for atoms and variables.
            (Term::Atom(a), Term::Atom(b)) => Arc::ptr_eq(a, b) || a.value == b.value,
            (Term::Var(a), Term::Var(b)) => Arc::ptr_eq(a, b) || a.name == b.name,
            (Term::List(a), Term::List(b)) => {
                Arc::ptr_eq(a, b)
                    || (a.hash == b.hash
                        && a.weight == b.weight
                        && a.children == b.children)
            }
            _ => false,
        }
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Term::Atom(a) => {
                0u8.hash(state);
                a.value.hash(state);
            }
            Term::Var(v) => {
                1u8.hash(state);
                v.name.hash(state);
            }
            Term::List(d) => {
                state.write_u64(d.hash);
            }
        }
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kif_string())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kif_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atoms_are_interned() {
        let a = Term::atom("Socrates");
        let b = Term::atom("Socrates");
        match (&a, &b) {
            (Term::Atom(x), Term::Atom(y)) => assert!(Arc::ptr_eq(x, y)),
            _ => unreachable!(),
        }
        assert_eq!(a, b);
    }

    #[test]
    fn test_vars_of_same_name_are_identical() {
        let a = Term::var("x");
        let b = Term::var("x");
        assert_eq!(a, b);
        assert_ne!(a, Term::var("y"));
    }

    #[test]
    fn test_weight() {
        assert_eq!(Term::atom("a").weight(), 1);
        assert_eq!(Term::var("x").weight(), 1);
        let t = Term::list(vec![Term::atom("f"), Term::atom("a"), Term::atom("b")]);
        assert_eq!(t.weight(), 4);
        let nested = Term::list(vec![Term::atom("g"), t]);
        assert_eq!(nested.weight(), 6);
    }

    #[test]
    fn test_contains_variable() {
        let ground = Term::list(vec![Term::atom("f"), Term::atom("a")]);
        assert!(!ground.contains_variable());
        let open = Term::list(vec![Term::atom("f"), Term::var("x")]);
        assert!(open.contains_variable());
        assert_eq!(open.variables().len(), 1);
    }

    #[test]
    fn test_skolem_detection() {
        assert!(Term::atom("skc_k_0").contains_skolem());
        assert!(!Term::atom("k").contains_skolem());
        let f = Term::list(vec![Term::atom("skf_k_1"), Term::atom("a")]);
        assert!(f.contains_skolem());
        let wrapped = Term::list(vec![Term::atom("instance"), Term::atom("skc_k_0")]);
        assert!(wrapped.contains_skolem());
        // skf_ only marks the operator position
        let arg_only = Term::list(vec![Term::atom("f"), Term::atom("skf_x_2")]);
        assert!(!arg_only.contains_skolem());
    }

    #[test]
    fn test_structural_equality_and_hash() {
        use std::collections::hash_map::DefaultHasher;
        let a = Term::list(vec![Term::atom("likes"), Term::atom("Alice"), Term::atom("Bob")]);
        let b = Term::list(vec![Term::atom("likes"), Term::atom("Alice"), Term::atom("Bob")]);
        assert_eq!(a, b);
        let hash = |t: &Term| {
            let mut h = DefaultHasher::new();
            t.hash(&mut h);
            h.finish()
        };
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_operator_and_args() {
        let t = Term::list(vec![Term::atom("f"), Term::atom("a"), Term::atom("b")]);
        assert_eq!(t.operator(), Some("f"));
        assert_eq!(t.args().len(), 2);
        assert_eq!(Term::list(vec![]).operator(), None);
        let var_head = Term::list(vec![Term::var("x"), Term::atom("a")]);
        assert_eq!(var_head.operator(), None);
    }
}
