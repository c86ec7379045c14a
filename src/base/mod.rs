//! Foundation types for the noesis kernel.
//!
//! This module provides fundamental types used throughout the engine:
//! - [`AssertionId`] - monotone, prefix-tagged assertion identifiers
//! - [`IdCounter`] - process-wide monotone counters
//! - [`LineIndex`], [`LineCol`] - byte offset to line/column conversion
//!
//! This module has NO dependencies on other noesis modules.

mod id;
mod position;

pub use id::{AssertionId, IdCounter, next_rule_id, next_skolem_id};
pub use position::{LineCol, LineIndex};
