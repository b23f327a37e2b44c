//! Serialization of peptide-to-protein associations into the solver's
//! input graph grammar.
//!
//! For every usable peptide record the output carries one edge record
//! (`e <sequence>`), one membership record per associated protein
//! (`r <token>`) and one probability record (`p <probability>`). Scores are
//! resolved to posterior probabilities before a single byte is rendered, so
//! an unusable score type aborts the encoding with nothing written.

use crate::accession::AccessionMap;
use crate::ident::PeptideRecord;
use crate::Error;
use log::warn;
use std::collections::BTreeSet;
use std::fmt::Write;

/// Result of one encoding pass.
#[derive(Debug, Default)]
pub struct GraphEncoding {
    pub text: String,
    /// Number of peptide edges emitted.
    pub edges: usize,
    /// Whether posterior error probabilities were converted on the fly.
    pub converted_scores: bool,
}

struct ResolvedEdge<'a> {
    sequence: &'a str,
    tokens: Vec<&'a str>,
    probability: f64,
}

/// Encode `peptides` for the solver, optionally filtered to the run with
/// identifier `run_id` and optionally reading the probability from the
/// named meta-value instead of the primary score.
pub fn encode(
    peptides: &[PeptideRecord],
    accessions: &AccessionMap,
    prob_param: Option<&str>,
    run_id: Option<&str>,
) -> Result<GraphEncoding, Error> {
    let mut resolved = Vec::new();
    let mut converted_scores = false;

    for record in peptides {
        if let Some(id) = run_id {
            if record.run_id != id {
                continue;
            }
        }
        let hit = match record.best_hit() {
            Some(hit) => hit,
            None => continue,
        };
        if hit.sequence.is_empty() || hit.proteins.is_empty() {
            continue;
        }

        let probability = match prob_param.and_then(|param| hit.meta.get(param)) {
            Some(&value) => value,
            None => {
                if hit.higher_score_better {
                    hit.score
                } else if is_error_probability(&hit.score_type) {
                    if !converted_scores {
                        warn!(
                            "peptide hit scores appear to be posterior error \
                             probabilities; converting to posterior probabilities"
                        );
                        converted_scores = true;
                    }
                    1.0 - hit.score
                } else {
                    return Err(unsuitable_score("lower scores are better"));
                }
            }
        };
        if probability < 0.0 {
            return Err(unsuitable_score("score < 0"));
        }
        if probability > 1.0 {
            return Err(unsuitable_score("score > 1"));
        }

        // Distinct accessions in sorted order; empty ones carry no
        // information and are dropped.
        let raw: BTreeSet<&str> = hit
            .proteins
            .iter()
            .map(String::as_str)
            .filter(|acc| !acc.is_empty())
            .collect();
        let mut tokens = Vec::with_capacity(raw.len());
        for acc in raw {
            match accessions.sanitize(acc) {
                Some(token) => tokens.push(token),
                None => {
                    return Err(Error::DataQuality(format!(
                        "peptide hit `{}` references protein `{}` which is \
                         missing from the protein identification data",
                        hit.sequence, acc
                    )))
                }
            }
        }
        resolved.push(ResolvedEdge {
            sequence: &hit.sequence,
            tokens,
            probability,
        });
    }

    let mut text = String::new();
    for edge in &resolved {
        let _ = writeln!(text, "e {}", edge.sequence);
        for token in &edge.tokens {
            let _ = writeln!(text, "r {}", token);
        }
        let _ = writeln!(text, "p {}", edge.probability);
    }

    Ok(GraphEncoding {
        text,
        edges: resolved.len(),
        converted_scores,
    })
}

/// Score types whose values are posterior *error* probabilities and can be
/// converted via `p = 1 - score`.
fn is_error_probability(score_type: &str) -> bool {
    let score_type = score_type.to_lowercase();
    score_type == "posterior error probability" || score_type.starts_with("consensus_")
}

fn unsuitable_score(reason: &str) -> Error {
    Error::DataQuality(format!(
        "unsuitable score type for peptide-spectrum matches ({}); the solver \
         requires posterior probabilities as scores",
        reason
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ident::PeptideHit;

    fn record(run_id: &str, hits: Vec<PeptideHit>) -> PeptideRecord {
        PeptideRecord {
            run_id: run_id.into(),
            hits,
        }
    }

    fn hit(sequence: &str, score: f64, proteins: &[&str]) -> PeptideHit {
        PeptideHit {
            sequence: sequence.into(),
            score,
            higher_score_better: true,
            score_type: "Posterior Probability_score".into(),
            proteins: proteins.iter().map(|s| s.to_string()).collect(),
            meta: Default::default(),
        }
    }

    fn map() -> AccessionMap {
        AccessionMap::build(["A1", "B2"])
    }

    #[test]
    fn emits_edge_membership_probability_blocks() {
        let peptides = vec![
            record("run", vec![hit("PEPTIDEA", 0.9, &["B2", "A1"])]),
            record("run", vec![hit("PEPTIDEB", 0.4, &["A1"])]),
        ];
        let encoding = encode(&peptides, &map(), None, None).unwrap();
        assert_eq!(encoding.edges, 2);
        assert!(!encoding.converted_scores);
        assert_eq!(
            encoding.text,
            "e PEPTIDEA\nr A1_1\nr B2_2\np 0.9\ne PEPTIDEB\nr A1_1\np 0.4\n"
        );
    }

    #[test]
    fn skips_unusable_records_silently() {
        let peptides = vec![
            record("run", vec![]),
            record("run", vec![hit("", 0.9, &["A1"])]),
            record("run", vec![hit("PEPTIDEC", 0.9, &[])]),
            record("other", vec![hit("PEPTIDED", 0.9, &["A1"])]),
        ];
        let encoding = encode(&peptides, &map(), None, Some("run")).unwrap();
        assert_eq!(encoding.edges, 0);
        assert!(encoding.text.is_empty());
    }

    #[test]
    fn converts_posterior_error_probabilities() {
        let mut pep = hit("PEPTIDEA", 0.25, &["A1"]);
        pep.higher_score_better = false;
        pep.score_type = "Posterior Error Probability".into();
        let encoding = encode(&[record("run", vec![pep])], &map(), None, None).unwrap();
        assert!(encoding.converted_scores);
        assert_eq!(encoding.text, "e PEPTIDEA\nr A1_1\np 0.75\n");
    }

    #[test]
    fn alternate_meta_score_wins_over_primary() {
        let mut pep = hit("PEPTIDEA", 42.0, &["A1"]);
        pep.meta.insert("pp".into(), 0.5);
        let encoding = encode(&[record("run", vec![pep])], &map(), Some("pp"), None).unwrap();
        assert_eq!(encoding.text, "e PEPTIDEA\nr A1_1\np 0.5\n");
    }

    #[test]
    fn lower_is_better_without_known_type_is_fatal() {
        let mut pep = hit("PEPTIDEA", 12.0, &["A1"]);
        pep.higher_score_better = false;
        pep.score_type = "XCorr".into();
        let err = encode(&[record("run", vec![pep])], &map(), None, None).unwrap_err();
        assert!(matches!(err, Error::DataQuality(_)));
    }

    #[test]
    fn out_of_range_probability_is_fatal() {
        let peptides = vec![
            record("run", vec![hit("PEPTIDEA", 0.9, &["A1"])]),
            record("run", vec![hit("PEPTIDEB", 1.5, &["B2"])]),
        ];
        let err = encode(&peptides, &map(), None, None).unwrap_err();
        assert!(matches!(err, Error::DataQuality(_)));
    }
}
