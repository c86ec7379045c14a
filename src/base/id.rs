//! Identifier newtypes and monotone counters.
//!
//! Every identifier minted by the kernel embeds a process-wide monotone
//! counter, so two ids never collide across a run even when the knowledge
//! base is cleared and repopulated.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use smol_str::SmolStr;

/// Identifier of a stored assertion (or of a rule appearing in a support
/// set). The prefix reflects the kind: `fact-ground-`, `fact-universal-`,
/// `fact-skolemized-`, `rule-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssertionId(SmolStr);

impl AssertionId {
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssertionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A monotone counter handing out unique `u64` values.
#[derive(Debug, Default)]
pub struct IdCounter(AtomicU64);

impl IdCounter {
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

static RULE_IDS: IdCounter = IdCounter::new();
static SKOLEM_IDS: IdCounter = IdCounter::new();

/// Mint a fresh rule identifier.
pub fn next_rule_id() -> AssertionId {
    AssertionId::new(format!("rule-{}", RULE_IDS.next()))
}

/// Next suffix for a skolem constant or function name.
pub fn next_skolem_id() -> u64 {
    SKOLEM_IDS.next()
}
