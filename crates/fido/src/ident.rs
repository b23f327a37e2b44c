//! In-memory peptide/protein identification containers.
//!
//! These stand in for the identification document format: loading and
//! storing happens elsewhere, the adapter only needs scores, sequences,
//! accessions and meta-values.

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetDecoy {
    Target,
    Decoy,
}

/// A single candidate identification of a peptide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeptideHit {
    pub sequence: String,
    pub score: f64,
    pub higher_score_better: bool,
    #[serde(default)]
    pub score_type: String,
    /// Accessions of the proteins this peptide maps to.
    #[serde(default)]
    pub proteins: Vec<String>,
    /// Named numeric meta-values, e.g. an alternate probability score
    /// attached by an upstream tool.
    #[serde(default)]
    pub meta: FnvHashMap<String, f64>,
}

/// A retention-time-independent identification entry holding a ranked list
/// of candidate hits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeptideRecord {
    /// Identifier of the protein identification run this entry belongs to.
    /// Cleared in place when runs are merged.
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub hits: Vec<PeptideHit>,
}

impl PeptideRecord {
    /// The top-ranked hit under each hit's own score direction.
    pub fn best_hit(&self) -> Option<&PeptideHit> {
        self.hits.iter().min_by(|a, b| {
            let a_key = if a.higher_score_better { -a.score } else { a.score };
            let b_key = if b.higher_score_better { -b.score } else { b.score };
            a_key.total_cmp(&b_key)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProteinHit {
    pub accession: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub target_decoy: Option<TargetDecoy>,
    /// Arbitrary string meta-values carried through merging untouched.
    #[serde(default)]
    pub meta: FnvHashMap<String, String>,
}

/// A set of proteins the solver could not separate given the observed
/// peptide evidence, sharing one probability.
///
/// Accessions are kept lexicographically sorted; group lists on a record
/// are sorted ascending by probability, accessions as tie-break.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProteinGroup {
    pub probability: f64,
    pub accessions: Vec<String>,
}

/// One protein identification run, plus the inference result once the
/// solver has been run on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProteinRecord {
    #[serde(default)]
    pub run_id: String,
    #[serde(default)]
    pub search_engine: String,
    #[serde(default)]
    pub score_type: String,
    #[serde(default)]
    pub higher_score_better: bool,
    #[serde(default)]
    pub hits: Vec<ProteinHit>,
    /// Indistinguishable protein groups; overwritten on every solve.
    #[serde(default)]
    pub groups: Vec<ProteinGroup>,
    /// Named numeric meta-values recording the resolved solver parameters.
    #[serde(default)]
    pub meta: FnvHashMap<String, f64>,
}

impl ProteinRecord {
    pub fn find_hit_mut(&mut self, accession: &str) -> Option<&mut ProteinHit> {
        self.hits.iter_mut().find(|hit| hit.accession == accession)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn hit(sequence: &str, score: f64, higher_score_better: bool) -> PeptideHit {
        PeptideHit {
            sequence: sequence.into(),
            score,
            higher_score_better,
            score_type: String::new(),
            proteins: vec![],
            meta: Default::default(),
        }
    }

    #[test]
    fn best_hit_follows_score_direction() {
        let record = PeptideRecord {
            run_id: String::new(),
            hits: vec![hit("AAA", 0.2, true), hit("BBB", 0.9, true)],
        };
        assert_eq!(record.best_hit().unwrap().sequence, "BBB");

        let record = PeptideRecord {
            run_id: String::new(),
            hits: vec![hit("AAA", 0.2, false), hit("BBB", 0.9, false)],
        };
        assert_eq!(record.best_hit().unwrap().sequence, "AAA");

        assert!(PeptideRecord::default().best_hit().is_none());
    }
}
