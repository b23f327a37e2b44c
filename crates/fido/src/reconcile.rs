//! # Run reconciliation and solver orchestration
//!
//! The adapter entry point lives here: it builds the accession map over
//! all runs, owns the scoped temporary directory, and processes the runs
//! either independently (separate mode) or pooled into one combined record
//! (merge mode, the default). Each run is encoded, solved and decoded to
//! completion before the next begins; the subprocess call is a blocking
//! suspension point with no overlap between invocations.

use crate::accession::AccessionMap;
use crate::decode;
use crate::graph;
use crate::ident::{PeptideRecord, ProteinHit, ProteinRecord};
use crate::protein_sets;
use crate::solver::{self, SolverConfig};
use crate::Error;
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::path::Path;

/// Meta-value names under which the resolved solver parameters are
/// recorded on each processed record, for downstream tooling.
pub const META_PROB_PROTEIN: &str = "Fido_prob_protein";
pub const META_PROB_PEPTIDE: &str = "Fido_prob_peptide";
pub const META_PROB_SPURIOUS: &str = "Fido_prob_spurious";

#[derive(Debug, Clone, Default)]
pub struct AdapterOptions {
    pub solver: SolverConfig,
    /// Read the peptide probability from this meta-value instead of the
    /// score field, if present on a hit.
    pub prob_param: Option<String>,
    /// Process multiple identification runs separately instead of merging
    /// them.
    pub separate_runs: bool,
    /// Keep the (possibly very large) group of proteins with estimated
    /// probability zero.
    pub keep_zero_group: bool,
    /// Retain the temporary solver input/output files for inspection.
    pub keep_temp_files: bool,
}

/// Run the inference adapter over all identification runs.
///
/// Returns whether the solver succeeded; data-quality and I/O failures
/// propagate as errors instead. In separate mode the returned flag
/// reflects only the last attempted run: earlier solver failures are
/// logged but do not fail a later successful run.
pub fn run_inference(
    proteins: &mut Vec<ProteinRecord>,
    peptides: &mut [PeptideRecord],
    options: &AdapterOptions,
) -> Result<bool, Error> {
    if proteins.is_empty() || peptides.is_empty() {
        return Err(Error::DataQuality(
            "input must contain both protein and peptide identification data".into(),
        ));
    }

    let accessions = AccessionMap::build(
        proteins
            .iter()
            .flat_map(|run| run.hits.iter().map(|hit| hit.accession.as_str())),
    );
    info!("sanitized {} distinct protein accessions", accessions.len());

    let temp_dir = tempfile::Builder::new().prefix("fido_adapter.").tempdir()?;
    let exe = options.solver.executable();
    let template = options.solver.arg_template();

    let success = if options.separate_runs {
        let mut success = false;
        for (index, record) in proteins.iter_mut().enumerate() {
            info!("protein identification run {}:", index + 1);
            success = attempt_run(
                record,
                peptides,
                &accessions,
                options,
                &exe,
                &template,
                temp_dir.path(),
                index + 1,
            )?;
        }
        success
    } else if proteins.len() > 1 {
        let mut combined = combine_runs(proteins, peptides);
        let success = attempt_run(
            &mut combined,
            peptides,
            &accessions,
            options,
            &exe,
            &template,
            temp_dir.path(),
            0,
        )?;
        write_group_scores(&mut combined);
        proteins.clear();
        proteins.push(combined);
        success
    } else {
        attempt_run(
            &mut proteins[0],
            peptides,
            &accessions,
            options,
            &exe,
            &template,
            temp_dir.path(),
            0,
        )?
    };

    if options.keep_temp_files {
        let path = temp_dir.keep();
        info!("keeping temporary files at `{}`", path.display());
    } else {
        info!("removing temporary files");
        if let Err(err) = temp_dir.close() {
            warn!("could not remove temporary directory: {}", err);
        }
    }

    Ok(success)
}

/// Pool all runs into one combined record.
///
/// Peptide records lose their run identifiers so they count towards the
/// combined run. Protein hits are deduplicated by accession with an
/// explicit fold in run order: the earliest run's hit wins, which decides
/// which meta-values (notably target/decoy) survive for an accession seen
/// in several runs. The combined hits come out sorted by accession.
fn combine_runs(proteins: &[ProteinRecord], peptides: &mut [PeptideRecord]) -> ProteinRecord {
    for peptide in peptides.iter_mut() {
        peptide.run_id.clear();
    }
    let mut by_accession: BTreeMap<&str, &ProteinHit> = BTreeMap::new();
    for run in proteins {
        for hit in &run.hits {
            by_accession.entry(hit.accession.as_str()).or_insert(hit);
        }
    }
    ProteinRecord {
        run_id: String::new(),
        search_engine: "Fido".to_string(),
        score_type: "Posterior Probability".to_string(),
        higher_score_better: true,
        hits: by_accession.into_values().cloned().collect(),
        ..Default::default()
    }
}

/// Overwrite each protein hit's score with the probability of the group it
/// was assigned to.
fn write_group_scores(record: &mut ProteinRecord) {
    let groups = std::mem::take(&mut record.groups);
    for group in &groups {
        for accession in &group.accessions {
            if let Some(hit) = record.find_hit_mut(accession) {
                hit.score = group.probability;
            }
        }
    }
    record.groups = groups;
}

/// Solve one run, containing solver failures to this attempt: they are
/// logged and reported as `Ok(false)` so remaining runs can still be
/// tried, while anything else propagates.
#[allow(clippy::too_many_arguments)]
fn attempt_run(
    record: &mut ProteinRecord,
    peptides: &[PeptideRecord],
    accessions: &AccessionMap,
    options: &AdapterOptions,
    exe: &Path,
    template: &[String],
    temp_dir: &Path,
    counter: usize,
) -> Result<bool, Error> {
    match solve_run(
        record, peptides, accessions, options, exe, template, temp_dir, counter,
    ) {
        Ok(()) => Ok(true),
        Err(err) if err.is_tool_failure() => {
            error!("{}", err);
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

/// Encode, invoke and decode a single solver run, writing groups and the
/// resolved parameters back into `record`.
#[allow(clippy::too_many_arguments)]
fn solve_run(
    record: &mut ProteinRecord,
    peptides: &[PeptideRecord],
    accessions: &AccessionMap,
    options: &AdapterOptions,
    exe: &Path,
    template: &[String],
    temp_dir: &Path,
    counter: usize,
) -> Result<(), Error> {
    info!("generating solver input files");
    let suffix = if counter != 0 {
        format!(".{}", counter)
    } else {
        String::new()
    };
    let graph_path = temp_dir.join(format!("fido_input_graph{}.txt", suffix));
    let proteins_path = temp_dir.join(format!("fido_input_proteins{}.txt", suffix));

    let run_filter = if record.run_id.is_empty() {
        None
    } else {
        Some(record.run_id.as_str())
    };
    let encoding = graph::encode(
        peptides,
        accessions,
        options.prob_param.as_deref(),
        run_filter,
    )?;
    info!("encoded {} peptide edges", encoding.edges);
    std::fs::write(&graph_path, &encoding.text)?;

    let choose_params = options.solver.choose_params();
    if choose_params {
        std::fs::write(&proteins_path, protein_sets::encode(record, accessions)?)?;
        info!("running solver with parameter estimation");
    } else {
        info!("running solver with fixed parameters");
    }

    let args = solver::substitute_paths(template, &graph_path, &proteins_path);
    let output = solver::run(exe, &args, options.solver.timeout)?;

    let trace = String::from_utf8_lossy(&output.stderr);
    let result = String::from_utf8_lossy(&output.stdout);
    if options.keep_temp_files {
        std::fs::write(temp_dir.join(format!("fido_status{}.txt", suffix)), trace.as_bytes())?;
        std::fs::write(temp_dir.join(format!("fido_output{}.txt", suffix)), result.as_bytes())?;
    }

    let mut params = options.solver.prob;
    if choose_params {
        info!("solver parameter search:");
        if let Some(found) = decode::parse_parameter_trace(&trace)? {
            params = found;
        }
    }

    info!("parsing solver results");
    let decoded = decode::parse_groups(&result, accessions, options.keep_zero_group)?;
    let zeros = decoded.zero_probability;
    info!(
        "inferred {} proteins in {} groups ({}{} proteins with probability zero{}",
        decoded.inferred_proteins,
        decoded.groups.len(),
        if options.keep_zero_group && zeros > 0 {
            "including "
        } else {
            ""
        },
        zeros,
        if options.keep_zero_group || zeros == 0 {
            ")."
        } else {
            " not included)."
        }
    );

    record.groups = decoded.groups;
    record.meta.insert(META_PROB_PROTEIN.to_string(), params.protein);
    record.meta.insert(META_PROB_PEPTIDE.to_string(), params.peptide);
    record
        .meta
        .insert(META_PROB_SPURIOUS.to_string(), params.spurious);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ident::{ProteinGroup, TargetDecoy};

    fn marked_hit(accession: &str, marker: &str) -> ProteinHit {
        let mut meta = fnv::FnvHashMap::default();
        meta.insert("marker".to_string(), marker.to_string());
        ProteinHit {
            accession: accession.into(),
            score: 0.0,
            target_decoy: Some(TargetDecoy::Target),
            meta,
        }
    }

    fn run_with(hits: Vec<ProteinHit>) -> ProteinRecord {
        ProteinRecord {
            hits,
            ..Default::default()
        }
    }

    #[test]
    fn earlier_run_wins_on_duplicate_accessions() {
        let runs = vec![
            run_with(vec![marked_hit("P", "first"), marked_hit("Q", "first")]),
            run_with(vec![marked_hit("P", "second"), marked_hit("R", "second")]),
        ];
        let mut peptides = [PeptideRecord {
            run_id: "run 1".into(),
            hits: vec![],
        }];
        let combined = combine_runs(&runs, &mut peptides);

        assert_eq!(combined.search_engine, "Fido");
        assert!(combined.higher_score_better);
        assert!(peptides[0].run_id.is_empty());

        let accessions: Vec<_> = combined.hits.iter().map(|h| h.accession.as_str()).collect();
        assert_eq!(accessions, vec!["P", "Q", "R"]);
        assert_eq!(combined.hits[0].meta["marker"], "first");
        assert_eq!(combined.hits[2].meta["marker"], "second");
    }

    #[test]
    fn group_probabilities_overwrite_hit_scores() {
        let mut record = run_with(vec![marked_hit("P", ""), marked_hit("Q", "")]);
        record.groups = vec![ProteinGroup {
            probability: 0.85,
            accessions: vec!["P".into()],
        }];
        write_group_scores(&mut record);
        assert_eq!(record.hits[0].score, 0.85);
        assert_eq!(record.hits[1].score, 0.0);
        // groups survive the write-back
        assert_eq!(record.groups.len(), 1);
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = run_inference(&mut vec![], &mut [], &AdapterOptions::default()).unwrap_err();
        assert!(matches!(err, Error::DataQuality(_)));
    }
}
