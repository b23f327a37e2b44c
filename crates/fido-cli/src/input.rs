use anyhow::Context;
use clap::ArgMatches;
use fido_core::reconcile::AdapterOptions;
use fido_core::solver::{Accuracy, SolverConfig, SolverParams};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The identification document the adapter reads and augments: protein
/// runs plus retention-time-independent peptide entries, as JSON.
#[derive(Serialize, Deserialize, Default)]
pub struct IdentificationData {
    #[serde(default)]
    pub protein_identifications: Vec<fido_core::ident::ProteinRecord>,
    #[serde(default)]
    pub peptide_identifications: Vec<fido_core::ident::PeptideRecord>,
}

/// Everything gathered from the command line.
pub struct Input {
    pub in_path: String,
    pub out_path: String,
    pub options: AdapterOptions,
}

impl Input {
    pub fn from_arguments(matches: ArgMatches) -> anyhow::Result<Self> {
        let in_path = matches
            .get_one::<String>("in")
            .cloned()
            .context("no input file given")?;
        let out_path = matches
            .get_one::<String>("out")
            .cloned()
            .context("no output file given")?;

        let accuracy = match matches.get_one::<String>("accuracy") {
            Some(raw) => Some(raw.parse::<Accuracy>().map_err(anyhow::Error::msg)?),
            None => None,
        };

        let solver = SolverConfig {
            exe: matches
                .get_one::<String>("exe")
                .cloned()
                .unwrap_or_default(),
            prob: SolverParams {
                protein: matches.get_one::<f64>("prob-protein").copied().unwrap_or(0.0),
                peptide: matches.get_one::<f64>("prob-peptide").copied().unwrap_or(0.0),
                spurious: matches
                    .get_one::<f64>("prob-spurious")
                    .copied()
                    .unwrap_or(0.0),
            },
            log2_states: matches.get_one::<u32>("log2-states").copied().unwrap_or(0),
            log2_states_precalc: matches
                .get_one::<u32>("log2-states-precalc")
                .copied()
                .unwrap_or(0),
            no_cleanup: matches.get_flag("no-cleanup"),
            all_psms: matches.get_flag("all-psms"),
            group_level: matches.get_flag("group-level"),
            accuracy,
            timeout: matches
                .get_one::<u64>("timeout")
                .map(|secs| Duration::from_secs(*secs)),
        };

        Ok(Input {
            in_path,
            out_path,
            options: AdapterOptions {
                solver,
                prob_param: matches.get_one::<String>("prob-param").cloned(),
                separate_runs: matches.get_flag("separate-runs"),
                keep_zero_group: matches.get_flag("keep-zero-group"),
                keep_temp_files: matches.get_flag("keep-temp-files"),
            },
        })
    }
}
