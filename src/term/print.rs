//! KIF printing.
//!
//! Atoms print bare iff non-empty and every character is in the bare class
//! `[A-Za-z0-9_\-+*/.<>=:]`; otherwise they print quoted with `\\` and `\"`
//! escapes. Lists print space-separated inside parentheses. This surface
//! form is the canonical external contract and must round-trip through the
//! parser.

use super::Term;

pub(crate) fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '*' | '/' | '.' | '<' | '>' | '=' | ':')
}

fn is_bare(value: &str) -> bool {
    !value.is_empty() && value.chars().all(is_bare_char)
}

pub(crate) fn atom_kif(value: &str) -> String {
    if is_bare(value) {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

pub(crate) fn list_kif(children: &[Term]) -> String {
    let mut out = String::from("(");
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&child.kif_string());
    }
    out.push(')');
    out
}
