//! Assertions, candidate assertions, and rules.
//!
//! An [`Assertion`] is a stored, typed term with identity, priority, support,
//! and derivation depth, immutable after construction. A
//! [`PotentialAssertion`] carries everything needed to construct one and is
//! what travels through the commit queue. A [`Rule`] is a compiled `(=> A C)`
//! form with its antecedent clause list precomputed.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use indexmap::IndexSet;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;
use thiserror::Error;

use crate::base::{AssertionId, next_rule_id};
use crate::term::Term;

/// Operators for which `(op x x)` carries no information, closed and stable.
pub const REFLEXIVE_OPERATORS: [&str; 9] = [
    "instance",
    "subclass",
    "subrelation",
    "equivalent",
    "same",
    "equal",
    "domain",
    "range",
    "=",
];

/// Rejected term shapes at the router / rule-construction boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TermShapeError {
    #[error("top-level input must be a list, found {found}")]
    NotAList { found: String },
    #[error("'not' takes exactly one list argument: {term}")]
    InvalidNegation { term: String },
    #[error("invalid quantifier variable specification in {term}")]
    InvalidQuantifierSpec { term: String },
    #[error("rule form must be (=> antecedent consequent) or (<=> antecedent consequent): {term}")]
    InvalidRuleForm { term: String },
    #[error("antecedent clause must be a list or a negated list: {clause}")]
    InvalidAntecedentClause { clause: String },
    #[error("input fact must be ground: {term}")]
    NonGroundInput { term: String },
}

/// The three stored assertion kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssertionType {
    /// Closed term with no variables and no skolem markers.
    Ground,
    /// Top-level `(forall <varspec> <body>)` with quantified variables.
    Universal,
    /// Closed term containing a skolem constant or function.
    Skolemized,
}

impl AssertionType {
    pub(crate) fn id_prefix(self) -> &'static str {
        match self {
            AssertionType::Ground => "fact-ground",
            AssertionType::Universal => "fact-universal",
            AssertionType::Skolemized => "fact-skolemized",
        }
    }
}

/// Derived structural facts about a candidate term, validated at analysis.
#[derive(Debug, Clone)]
pub(crate) struct TermTraits {
    pub assertion_type: AssertionType,
    pub is_negated: bool,
    pub is_equality: bool,
    pub is_oriented_equality: bool,
    pub quantified_vars: Vec<Term>,
}

/// Validate a candidate term's shape and compute its structural flags.
///
/// Enforced here: `not` has exactly one argument which is a list; `forall`
/// has a variable or non-empty variable-list spec; UNIVERSAL iff top-level
/// `forall`.
pub(crate) fn analyze_term(kif: &Term) -> Result<TermTraits, TermShapeError> {
    if !kif.is_list() {
        return Err(TermShapeError::NotAList {
            found: kif.kif_string(),
        });
    }

    let is_negated = kif.operator() == Some("not");
    if is_negated {
        let args = kif.args();
        if args.len() != 1 || !args[0].is_list() {
            return Err(TermShapeError::InvalidNegation {
                term: kif.kif_string(),
            });
        }
    }

    let mut quantified_vars = Vec::new();
    let assertion_type = if kif.operator() == Some("forall") {
        let args = kif.args();
        if args.len() != 2 {
            return Err(TermShapeError::InvalidQuantifierSpec {
                term: kif.kif_string(),
            });
        }
        quantified_vars = quantifier_spec_vars(&args[0]).ok_or_else(|| {
            TermShapeError::InvalidQuantifierSpec {
                term: kif.kif_string(),
            }
        })?;
        AssertionType::Universal
    } else if kif.contains_skolem() {
        AssertionType::Skolemized
    } else {
        AssertionType::Ground
    };

    let is_equality = !is_negated && kif.operator() == Some("=");
    let is_oriented_equality = is_equality && kif.args().len() == 2 && {
        let args = kif.args();
        args[0].weight() > args[1].weight()
    };

    Ok(TermTraits {
        assertion_type,
        is_negated,
        is_equality,
        is_oriented_equality,
        quantified_vars,
    })
}

/// Variables bound by a `forall`/`exists` spec: a single variable or a
/// non-empty list of variables.
pub(crate) fn quantifier_spec_vars(spec: &Term) -> Option<Vec<Term>> {
    match spec {
        Term::Var(_) => Some(vec![spec.clone()]),
        Term::List(_) => {
            let children = spec.as_list()?;
            if children.is_empty() || !children.iter().all(Term::is_var) {
                return None;
            }
            Some(children.to_vec())
        }
        _ => None,
    }
}

/// Free variables of a term, treating nested `forall`/`exists` as binders.
pub(crate) fn free_variables(term: &Term) -> FxHashSet<Term> {
    let mut out = FxHashSet::default();
    collect_free(term, &mut out);
    out
}

fn collect_free(term: &Term, out: &mut FxHashSet<Term>) {
    match term {
        Term::Atom(_) => {}
        Term::Var(_) => {
            out.insert(term.clone());
        }
        Term::List(_) => {
            if matches!(term.operator(), Some("forall") | Some("exists")) {
                let args = term.args();
                if args.len() == 2 {
                    if let Some(bound) = quantifier_spec_vars(&args[0]) {
                        let mut inner = FxHashSet::default();
                        collect_free(&args[1], &mut inner);
                        for v in bound {
                            inner.remove(&v);
                        }
                        out.extend(inner);
                        return;
                    }
                }
            }
            for child in term.as_list().expect("list") {
                collect_free(child, out);
            }
        }
    }
}

/// True for a reflexive relation between structurally identical arguments,
/// including its negation.
pub(crate) fn is_trivial(term: &Term) -> bool {
    let inner = if term.operator() == Some("not") {
        match term.args().first() {
            Some(t) => t,
            None => return false,
        }
    } else {
        term
    };
    match inner.operator() {
        Some(op) if REFLEXIVE_OPERATORS.contains(&op) => {
            let args = inner.args();
            args.len() >= 2 && args[0] == args[1]
        }
        _ => false,
    }
}

/// A stored, typed term with identity, priority, support, and depth.
#[derive(Debug, Clone)]
pub struct Assertion {
    pub id: AssertionId,
    pub kif: Term,
    pub priority: f64,
    pub timestamp: u64,
    pub source_note_id: Option<SmolStr>,
    pub support: IndexSet<AssertionId>,
    pub assertion_type: AssertionType,
    pub is_equality: bool,
    pub is_oriented_equality: bool,
    pub is_negated: bool,
    pub quantified_vars: Vec<Term>,
    pub derivation_depth: u32,
}

impl Assertion {
    /// The payload relative to the outermost connective: the argument of
    /// `not` when negated, the body of `forall` when universal, the whole
    /// term otherwise.
    pub fn effective_term(&self) -> &Term {
        effective_of(&self.kif, self.is_negated, self.assertion_type)
    }

    /// Work-scheduling order: priority descending, then depth ascending,
    /// then timestamp descending.
    pub fn scheduling_cmp(&self, other: &Assertion) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| self.derivation_depth.cmp(&other.derivation_depth))
            .then_with(|| other.timestamp.cmp(&self.timestamp))
    }
}

pub(crate) fn effective_of(kif: &Term, is_negated: bool, assertion_type: AssertionType) -> &Term {
    if is_negated {
        return &kif.args()[0];
    }
    if assertion_type == AssertionType::Universal {
        return &kif.args()[1];
    }
    kif
}

/// A candidate assertion travelling through the commit queue. Equality is by
/// `kif` alone.
#[derive(Debug, Clone)]
pub struct PotentialAssertion {
    pub kif: Term,
    pub priority: f64,
    pub source_note_id: Option<SmolStr>,
    pub support: IndexSet<AssertionId>,
    pub assertion_type: AssertionType,
    pub is_equality: bool,
    pub is_oriented_equality: bool,
    pub is_negated: bool,
    pub quantified_vars: Vec<Term>,
    pub derivation_depth: u32,
}

impl PotentialAssertion {
    /// Validate `kif`'s shape and build a candidate with computed flags.
    pub fn analyze(
        kif: Term,
        priority: f64,
        derivation_depth: u32,
        support: IndexSet<AssertionId>,
        source_note_id: Option<SmolStr>,
    ) -> Result<Self, TermShapeError> {
        let traits = analyze_term(&kif)?;
        Ok(Self {
            kif,
            priority,
            source_note_id,
            support,
            assertion_type: traits.assertion_type,
            is_equality: traits.is_equality,
            is_oriented_equality: traits.is_oriented_equality,
            is_negated: traits.is_negated,
            quantified_vars: traits.quantified_vars,
            derivation_depth,
        })
    }

    pub fn effective_term(&self) -> &Term {
        effective_of(&self.kif, self.is_negated, self.assertion_type)
    }
}

impl PartialEq for PotentialAssertion {
    fn eq(&self, other: &Self) -> bool {
        self.kif == other.kif
    }
}

impl Eq for PotentialAssertion {}

/// A compiled one-way rule `(=> antecedent consequent)`. Equality and
/// hashing are by `form`.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: AssertionId,
    pub form: Term,
    pub antecedent: Term,
    pub consequent: Term,
    pub priority: f64,
    /// Top-level conjuncts of the antecedent, each a list or a negated list.
    pub antecedents: Vec<Term>,
}

impl Rule {
    /// Compile a rule form into its one-way rules: one for `=>`, two (with
    /// identical priority) for `<=>`.
    pub fn compile(form: &Term, priority: f64) -> Result<Vec<Rule>, TermShapeError> {
        let op = form.operator();
        let args = form.args();
        if args.len() != 2 || !matches!(op, Some("=>") | Some("<=>")) {
            return Err(TermShapeError::InvalidRuleForm {
                term: form.kif_string(),
            });
        }
        let forward = Rule::directed(form.clone(), args[0].clone(), args[1].clone(), priority)?;
        if op == Some("=>") {
            return Ok(vec![forward]);
        }
        let reverse_form = Term::list(vec![Term::atom("=>"), args[1].clone(), args[0].clone()]);
        let reverse = Rule::directed(reverse_form, args[1].clone(), args[0].clone(), priority)?;
        Ok(vec![forward, reverse])
    }

    fn directed(
        form: Term,
        antecedent: Term,
        consequent: Term,
        priority: f64,
    ) -> Result<Rule, TermShapeError> {
        let antecedents = clause_list(&antecedent)?;

        let antecedent_vars = free_variables(&antecedent);
        let unbound: Vec<_> = free_variables(&consequent)
            .into_iter()
            .filter(|v| !antecedent_vars.contains(v))
            .collect();
        if !unbound.is_empty() {
            tracing::warn!(
                rule = %form,
                vars = ?unbound,
                "consequent variables not bound by antecedent"
            );
        }

        Ok(Rule {
            id: next_rule_id(),
            form,
            antecedent,
            consequent,
            priority,
            antecedents,
        })
    }

    /// The pattern of an antecedent clause: the inner list when negated.
    pub fn clause_pattern(clause: &Term) -> &Term {
        if clause.operator() == Some("not") {
            &clause.args()[0]
        } else {
            clause
        }
    }

    /// Whether an antecedent clause is negated.
    pub fn clause_negated(clause: &Term) -> bool {
        clause.operator() == Some("not")
    }
}

/// Split an antecedent into clauses: the conjuncts of a top-level `and`,
/// otherwise the antecedent itself. Each clause must be a list or a negated
/// list.
fn clause_list(antecedent: &Term) -> Result<Vec<Term>, TermShapeError> {
    let clauses: Vec<Term> = if antecedent.operator() == Some("and") {
        antecedent.args().to_vec()
    } else {
        vec![antecedent.clone()]
    };
    for clause in &clauses {
        let valid = if clause.operator() == Some("not") {
            clause.args().len() == 1 && clause.args()[0].is_list()
        } else {
            clause.is_list()
        };
        if !valid {
            return Err(TermShapeError::InvalidAntecedentClause {
                clause: clause.kif_string(),
            });
        }
    }
    Ok(clauses)
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.form == other.form
    }
}

impl Eq for Rule {}

impl Hash for Rule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.form.hash(state);
    }
}
