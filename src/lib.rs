//! # noesis-core
//!
//! Core library for KIF term parsing, unification, and forward-chaining
//! inference over a bounded knowledge base.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! router    → input classification, control-command dialect
//!   ↓
//! engine    → commit thread, inference worker pool, skolemization
//!   ↓
//! kb        → assertions, path/universal indices, commit & retraction
//!   ↓
//! unify     → unification, one-way matching, substitution, rewriting
//!   ↓
//! parser    → Logos lexer, recursive-descent S-expression parser
//!   ↓
//! term      → interned term algebra (atoms, variables, lists)
//!   ↓
//! base      → primitives (ids, counters, line index)
//! ```

// ============================================================================
// MODULES (dependency order: base → term → parser → unify → kb → engine)
// ============================================================================

/// Foundation types: assertion ids, monotone counters, line index
pub mod base;

/// Term algebra: interned atoms and variables, lists with cached derived data
pub mod term;

/// Parser: Logos lexer, recursive-descent parser producing terms
pub mod parser;

/// Unification, one-way matching, substitution, term rewriting
pub mod unify;

/// Knowledge base: typed assertions, indices, commit and cascade retraction
pub mod kb;

/// Reasoner engine: commit thread, worker pool, derivation machinery
pub mod engine;

/// Event stream emitted by the knowledge base and the input router
pub mod event;

/// Input router: classifies parsed terms and feeds the engine
pub mod router;

/// Engine configuration knobs
pub mod config;

// Re-export the surface most callers need
pub use base::AssertionId;
pub use config::ReasonerConfig;
pub use engine::Reasoner;
pub use event::{KbEvent, channel_sink, null_sink};
pub use kb::{Assertion, AssertionType, KnowledgeBase, PotentialAssertion, Rule, TermShapeError};
pub use parser::{ParseError, parse_kif};
pub use router::{Command, InputSource};
pub use term::Term;
