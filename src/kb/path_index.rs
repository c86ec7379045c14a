//! Trie over term structure mapping partial paths to assertion-id sets.
//!
//! Keys: an atom's value; the `Var` sentinel for variables; for lists, the
//! operator atom's value when the head is an atom, otherwise the `List`
//! sentinel. Every node visited while adding a term records the id, so a
//! node's `here` set covers its whole subtree. Queries return a candidate
//! superset; callers confirm with `match`/`unify`.

use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::base::AssertionId;
use crate::term::Term;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PathKey {
    Atom(SmolStr),
    Var,
    List,
}

fn key_for(term: &Term) -> PathKey {
    match term {
        Term::Atom(_) => PathKey::Atom(SmolStr::new(term.as_atom().expect("atom"))),
        Term::Var(_) => PathKey::Var,
        Term::List(_) => match term.operator() {
            Some(op) => PathKey::Atom(SmolStr::new(op)),
            None => PathKey::List,
        },
    }
}

#[derive(Debug, Default)]
struct Node {
    children: FxHashMap<PathKey, Node>,
    here: FxHashSet<AssertionId>,
}

impl Node {
    fn is_empty(&self) -> bool {
        self.here.is_empty() && self.children.is_empty()
    }
}

/// Path index over the ground and skolemized portion of the knowledge base.
#[derive(Debug, Default)]
pub struct PathIndex {
    root: Node,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, term: &Term, id: &AssertionId) {
        self.root.here.insert(id.clone());
        add_rec(&mut self.root, term, id);
    }

    pub fn remove(&mut self, term: &Term, id: &AssertionId) {
        self.root.here.remove(id);
        remove_rec(&mut self.root, term, id);
    }

    pub fn clear(&mut self) {
        self.root = Node::default();
    }

    /// Ids of stored terms that could unify with `query`.
    pub fn find_unifiable(&self, query: &Term) -> FxHashSet<AssertionId> {
        let mut out = FxHashSet::default();
        unifiable_rec(&self.root, query, &mut out);
        out
    }

    /// Ids of stored terms that could be instances of the pattern `query`.
    pub fn find_instances(&self, query: &Term) -> FxHashSet<AssertionId> {
        let mut out = FxHashSet::default();
        instances_rec(&self.root, query, &mut out);
        out
    }

    /// Ids of stored terms that could match `query` (generalizations of it).
    pub fn find_generalizations(&self, query: &Term) -> FxHashSet<AssertionId> {
        let mut out = FxHashSet::default();
        generalizations_rec(&self.root, query, &mut out);
        out
    }
}

fn add_rec(node: &mut Node, term: &Term, id: &AssertionId) {
    let child = node.children.entry(key_for(term)).or_default();
    child.here.insert(id.clone());
    if let Some(children) = term.as_list() {
        for c in children {
            add_rec(child, c, id);
        }
    }
}

fn remove_rec(node: &mut Node, term: &Term, id: &AssertionId) {
    let key = key_for(term);
    if let Some(child) = node.children.get_mut(&key) {
        child.here.remove(id);
        if let Some(children) = term.as_list() {
            for c in children {
                remove_rec(child, c, id);
            }
        }
        if child.is_empty() {
            node.children.remove(&key);
        }
    }
}

fn collect(node: &Node, out: &mut FxHashSet<AssertionId>) {
    // `here` of a node covers everything stored below it.
    out.extend(node.here.iter().cloned());
}

fn unifiable_rec(node: &Node, query: &Term, out: &mut FxHashSet<AssertionId>) {
    if query.is_var() {
        collect(node, out);
        return;
    }
    // Stored variables unify with anything at this position.
    if let Some(var_child) = node.children.get(&PathKey::Var) {
        collect(var_child, out);
    }
    if let Some(child) = node.children.get(&key_for(query)) {
        collect(child, out);
    }
    // A stored list headed by a variable can unify with any list query.
    if query.is_list() && !matches!(key_for(query), PathKey::List) {
        if let Some(list_child) = node.children.get(&PathKey::List) {
            collect(list_child, out);
        }
    }
}

fn instances_rec(node: &Node, query: &Term, out: &mut FxHashSet<AssertionId>) {
    match query {
        // A pattern variable admits any stored subterm.
        Term::Var(_) => collect(node, out),
        Term::Atom(_) => {
            if let Some(child) = node.children.get(&key_for(query)) {
                collect(child, out);
            }
        }
        Term::List(_) => {
            if query.operator().is_some() {
                if let Some(child) = node.children.get(&key_for(query)) {
                    collect(child, out);
                }
            } else {
                // Variable-headed pattern: any stored operator could match.
                collect(node, out);
            }
        }
    }
}

fn generalizations_rec(node: &Node, query: &Term, out: &mut FxHashSet<AssertionId>) {
    // A stored variable generalizes any query term.
    if let Some(var_child) = node.children.get(&PathKey::Var) {
        collect(var_child, out);
    }
    match query {
        Term::Var(_) => {}
        Term::Atom(_) => {
            if let Some(child) = node.children.get(&key_for(query)) {
                collect(child, out);
            }
        }
        Term::List(_) => {
            if let Some(child) = node.children.get(&key_for(query)) {
                collect(child, out);
            }
            // A stored variable-headed list can generalize a concrete one.
            if !matches!(key_for(query), PathKey::List) {
                if let Some(list_child) = node.children.get(&PathKey::List) {
                    collect(list_child, out);
                }
            }
        }
    }
}
