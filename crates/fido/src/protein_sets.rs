//! Serialization of the target/decoy protein partition for the solver.

use crate::accession::AccessionMap;
use crate::ident::{ProteinRecord, TargetDecoy};
use crate::Error;
use itertools::Itertools;
use std::collections::BTreeSet;

/// Encode one run's protein hits as the solver's two-line protein-set
/// grammar: a brace-delimited, comma-separated list of target tokens
/// followed by one of decoy tokens, each sorted lexicographically.
///
/// Every hit must carry a target/decoy annotation and both sets must be
/// non-empty, since the solver needs both classes to calibrate.
pub fn encode(record: &ProteinRecord, accessions: &AccessionMap) -> Result<String, Error> {
    let mut targets = BTreeSet::new();
    let mut decoys = BTreeSet::new();

    for hit in &record.hits {
        let token = match accessions.sanitize(&hit.accession) {
            Some(token) => token,
            None => {
                return Err(Error::DataQuality(format!(
                    "protein hit `{}` is missing from the accession map",
                    hit.accession
                )))
            }
        };
        match hit.target_decoy {
            Some(TargetDecoy::Target) => {
                targets.insert(token);
            }
            Some(TargetDecoy::Decoy) => {
                decoys.insert(token);
            }
            None => {
                return Err(Error::DataQuality(format!(
                    "protein hit `{}` carries no target/decoy annotation; all \
                     protein hits must be annotated with target/decoy meta data",
                    hit.accession
                )))
            }
        }
    }

    if targets.is_empty() {
        return Err(Error::DataQuality(
            "no target proteins found; the solver needs both targets and decoys".into(),
        ));
    }
    if decoys.is_empty() {
        return Err(Error::DataQuality(
            "no decoy proteins found; the solver needs both targets and decoys".into(),
        ));
    }

    Ok(format!(
        "{{ {} }}\n{{ {} }}\n",
        targets.iter().join(" , "),
        decoys.iter().join(" , ")
    ))
}
