//! Process-wide interning of atoms and variables.
//!
//! Identical value implies an identical `Arc`, so equality checks on leaves
//! are pointer comparisons in the common case. The maps hold strong
//! references; the working set is bounded by the knowledge base, so entries
//! are never reclaimed.

use std::sync::{Arc, LazyLock};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use super::{AtomData, SKOLEM_CONSTANT_PREFIX, VarData};

static ATOMS: LazyLock<Mutex<FxHashMap<SmolStr, Arc<AtomData>>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

static VARS: LazyLock<Mutex<FxHashMap<SmolStr, Arc<VarData>>>> =
    LazyLock::new(|| Mutex::new(FxHashMap::default()));

pub(crate) fn intern_atom(value: SmolStr) -> Arc<AtomData> {
    let mut atoms = ATOMS.lock();
    if let Some(existing) = atoms.get(&value) {
        return Arc::clone(existing);
    }
    let data = Arc::new(AtomData {
        is_skolem_constant: value.starts_with(SKOLEM_CONSTANT_PREFIX),
        value: value.clone(),
    });
    atoms.insert(value, Arc::clone(&data));
    data
}

pub(crate) fn intern_var(name: SmolStr) -> Arc<VarData> {
    let mut vars = VARS.lock();
    if let Some(existing) = vars.get(&name) {
        return Arc::clone(existing);
    }
    let data = Arc::new(VarData { name: name.clone() });
    vars.insert(name, Arc::clone(&data));
    data
}
