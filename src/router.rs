//! Input routing: classify a parsed top-level term as rule, existential,
//! universal, or ground fact, and feed the engine accordingly.
//!
//! Also speaks the line-oriented control dialect used by external shells:
//! `retract <assertion-id>`, or any other input parsed as a sequence of KIF
//! terms.

use indexmap::IndexSet;
use smol_str::SmolStr;

use crate::base::AssertionId;
use crate::engine::{Reasoner, skolemize};
use crate::event::KbEvent;
use crate::kb::{PotentialAssertion, TermShapeError};
use crate::parser::{ParseError, parse_kif};
use crate::term::Term;
use crate::unify::Bindings;

/// Where an input came from; decides its baseline priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// A rules file read at boot.
    File,
    /// The broadcast (WebSocket) surface.
    Broadcast,
    /// The language-model adapter.
    Adapter,
}

impl InputSource {
    pub fn tag(self) -> &'static str {
        match self {
            InputSource::File => "file",
            InputSource::Broadcast => "broadcast",
            InputSource::Adapter => "adapter",
        }
    }
}

/// A line-oriented control command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Retract(AssertionId),
    Assert(Vec<Term>),
}

impl Command {
    /// Parse a command line: `retract <assertion-id>`, or KIF terms.
    pub fn parse(input: &str) -> Result<Command, ParseError> {
        let trimmed = input.trim();
        if let Some(id) = trimmed.strip_prefix("retract ") {
            return Ok(Command::Retract(AssertionId::new(id.trim())));
        }
        parse_kif(input).map(Command::Assert)
    }
}

impl Reasoner {
    /// Classify and submit one parsed top-level term.
    pub fn route_term(
        &self,
        term: &Term,
        source: InputSource,
        note_id: Option<SmolStr>,
    ) -> Result<(), TermShapeError> {
        let priority = self.input_priority(term, source);
        match term.operator() {
            Some("=>") | Some("<=>") => {
                self.add_rule(term, priority)?;
                Ok(())
            }
            Some("exists") => {
                if !self.config().enable_skolemization {
                    tracing::debug!(kif = %term, "skolemization disabled; dropping existential");
                    return Ok(());
                }
                let body = skolemize(term, &Bindings::default())?;
                if body.contains_variable() {
                    return Err(TermShapeError::NonGroundInput {
                        term: term.kif_string(),
                    });
                }
                self.submit_input_fact(body, priority, source, note_id)
            }
            Some("forall") => {
                let args = term.args();
                if args.len() != 2 {
                    return Err(TermShapeError::InvalidQuantifierSpec {
                        term: term.kif_string(),
                    });
                }
                if matches!(args[1].operator(), Some("=>") | Some("<=>")) {
                    self.add_rule(&args[1], priority)?;
                    return Ok(());
                }
                if !self.config().enable_forward_instantiation {
                    tracing::debug!(
                        kif = %term,
                        "forward instantiation disabled; dropping universal"
                    );
                    return Ok(());
                }
                let candidate = PotentialAssertion::analyze(
                    term.clone(),
                    priority,
                    0,
                    IndexSet::default(),
                    note_id,
                )?;
                self.submit(candidate);
                Ok(())
            }
            _ => {
                if !term.is_list() {
                    return Err(TermShapeError::NotAList {
                        found: term.kif_string(),
                    });
                }
                if term.contains_variable() {
                    tracing::warn!(kif = %term, "rejecting non-ground input");
                    return Err(TermShapeError::NonGroundInput {
                        term: term.kif_string(),
                    });
                }
                self.submit_input_fact(term.clone(), priority, source, note_id)
            }
        }
    }

    /// Parse a whole source text and route every top-level term. Shape
    /// errors are logged per term; a parse error rejects the entire block.
    /// Returns the number of terms routed.
    pub fn load_kif_str(&self, text: &str, source: InputSource) -> Result<usize, ParseError> {
        let terms = parse_kif(text)?;
        let mut routed = 0;
        for term in &terms {
            match self.route_term(term, source, None) {
                Ok(()) => routed += 1,
                Err(error) => tracing::warn!(kif = %term, %error, "rejecting input term"),
            }
        }
        Ok(routed)
    }

    /// Execute a control command line. Returns the number of terms routed
    /// (zero for `retract`).
    pub fn execute_command(
        &self,
        input: &str,
        source: InputSource,
    ) -> Result<usize, ParseError> {
        match Command::parse(input)? {
            Command::Retract(id) => {
                self.kb().retract(&id);
                Ok(0)
            }
            Command::Assert(terms) => {
                let mut routed = 0;
                for term in &terms {
                    match self.route_term(term, source, None) {
                        Ok(()) => routed += 1,
                        Err(error) => {
                            tracing::warn!(kif = %term, %error, "rejecting input term");
                        }
                    }
                }
                Ok(routed)
            }
        }
    }

    fn input_priority(&self, term: &Term, source: InputSource) -> f64 {
        let base = match source {
            InputSource::File | InputSource::Broadcast => self.config().input_priority_base,
            InputSource::Adapter => self.config().adapter_priority_base,
        };
        base / (1.0 + term.weight() as f64)
    }

    fn submit_input_fact(
        &self,
        kif: Term,
        priority: f64,
        source: InputSource,
        note_id: Option<SmolStr>,
    ) -> Result<(), TermShapeError> {
        let candidate =
            PotentialAssertion::analyze(kif, priority, 0, IndexSet::default(), note_id)?;
        self.kb().emit(&KbEvent::Input {
            kif: candidate.kif.kif_string(),
            priority: candidate.priority,
            depth: 0,
            source: source.tag(),
        });
        self.submit(candidate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReasonerConfig;
    use crate::event::null_sink;

    fn term(s: &str) -> Term {
        parse_kif(s).unwrap().remove(0)
    }

    fn engine() -> Reasoner {
        Reasoner::new(ReasonerConfig::default(), null_sink())
    }

    #[test]
    fn test_rule_form_installs_rule() {
        let engine = engine();
        engine
            .route_term(&term("(=> (p ?x) (q ?x))"), InputSource::File, None)
            .unwrap();
        assert_eq!(engine.rule_count(), 1);
        engine.stop();
    }

    #[test]
    fn test_equivalence_installs_both_directions() {
        let engine = engine();
        engine
            .route_term(&term("(<=> (p ?x) (q ?x))"), InputSource::File, None)
            .unwrap();
        assert_eq!(engine.rule_count(), 2);
        engine.stop();
    }

    #[test]
    fn test_forall_rule_body_installs_rule() {
        let engine = engine();
        engine
            .route_term(
                &term("(forall (?x) (=> (instance ?x Dog) (attribute ?x Canine)))"),
                InputSource::File,
                None,
            )
            .unwrap();
        assert_eq!(engine.rule_count(), 1);
        engine.stop();
    }

    #[test]
    fn test_non_ground_input_rejected() {
        let engine = engine();
        let result = engine.route_term(&term("(p ?x)"), InputSource::File, None);
        assert!(matches!(result, Err(TermShapeError::NonGroundInput { .. })));
        engine.stop();
    }

    #[test]
    fn test_atom_input_rejected() {
        let engine = engine();
        let result = engine.route_term(&term("standalone"), InputSource::File, None);
        assert!(matches!(result, Err(TermShapeError::NotAList { .. })));
        engine.stop();
    }

    #[test]
    fn test_command_parse_retract() {
        let command = Command::parse("retract fact-ground-12").unwrap();
        assert_eq!(
            command,
            Command::Retract(AssertionId::new("fact-ground-12"))
        );
    }

    #[test]
    fn test_command_parse_kif() {
        let command = Command::parse("(p a) (q b)").unwrap();
        match command {
            Command::Assert(terms) => assert_eq!(terms.len(), 2),
            other => panic!("expected Assert, got {other:?}"),
        }
    }

    #[test]
    fn test_command_parse_error_propagates() {
        assert!(Command::parse("(p a").is_err());
    }

    #[test]
    fn test_load_kif_str_counts_routed_terms() {
        let engine = engine();
        let routed = engine
            .load_kif_str("(p a) (q ?x) (r b)", InputSource::File)
            .unwrap();
        // The open term is rejected and logged; the rest go through.
        assert_eq!(routed, 2);
        engine.stop();
    }

    #[test]
    fn test_load_kif_str_parse_error_rejects_block() {
        let engine = engine();
        assert!(engine.load_kif_str("(p a) (broken", InputSource::File).is_err());
        engine.stop();
    }

    #[test]
    fn test_input_priority_scales_with_weight() {
        let engine = engine();
        let light = engine.input_priority(&term("(p a)"), InputSource::File);
        let heavy = engine.input_priority(&term("(p a b c d e)"), InputSource::File);
        assert!(light > heavy);
        let adapter = engine.input_priority(&term("(p a)"), InputSource::Adapter);
        assert!(adapter > light);
        engine.stop();
    }
}
