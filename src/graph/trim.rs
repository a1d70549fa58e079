//! Graph trimming: drop every statement about one resource

use super::term::Term;
use super::triple::Graph;

/// Return a new graph holding every triple of `graph` whose subject is not
/// `subject`.
///
/// The input is left untouched. Trimming is idempotent, an empty graph trims
/// to an empty graph, and a subject absent from the graph yields an equal
/// copy. Triples that merely *reference* `subject` as their object are kept.
pub fn trim(graph: &Graph, subject: &Term) -> Graph {
    graph
        .iter()
        .filter(|t| &t.subject != subject)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Literal, Triple};

    #[test]
    fn removes_only_statements_about_subject() {
        let mut g = Graph::new();
        g.add(Term::iri("urn:r1"), "urn:p", Term::iri("urn:o1"));
        g.add(Term::iri("urn:r1"), "urn:q", Term::literal(Literal::string("x")));
        g.add(Term::iri("urn:s2"), "urn:p2", Term::iri("urn:r1"));

        let trimmed = trim(&g, &Term::iri("urn:r1"));

        assert_eq!(trimmed.len(), 1);
        assert!(trimmed.contains(&Triple::new(Term::iri("urn:s2"), "urn:p2", Term::iri("urn:r1"))));
        // input untouched
        assert_eq!(g.len(), 3);
    }

    #[test]
    fn empty_graph_trims_to_empty() {
        assert!(trim(&Graph::new(), &Term::iri("urn:any")).is_empty());
    }

    #[test]
    fn absent_subject_returns_equal_graph() {
        let mut g = Graph::new();
        g.add(Term::iri("urn:a"), "urn:p", Term::iri("urn:b"));
        g.add(Term::blank("n0"), "urn:p", Term::literal(Literal::integer(1)));

        assert_eq!(trim(&g, &Term::iri("urn:missing")), g);
    }

    #[test]
    fn blank_subjects_trim_by_label() {
        let mut g = Graph::new();
        g.add(Term::blank("n0"), "urn:p", Term::iri("urn:b"));
        g.add(Term::blank("n1"), "urn:p", Term::iri("urn:b"));

        let trimmed = trim(&g, &Term::blank("n0"));
        assert_eq!(trimmed.len(), 1);
        assert!(!trimmed.has_subject(&Term::blank("n0")));
    }
}
