use crate::input::{IdentificationData, Input};
use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command, ValueHint};
use log::info;

/// Process exit codes, so callers can tell an empty input from a failed
/// solver run.
pub const EXIT_OK: i32 = 0;
pub const EXIT_INPUT_EMPTY: i32 = 3;
pub const EXIT_EXTERNAL_PROGRAM_ERROR: i32 = 4;

pub fn command() -> Command {
    Command::new("fido-adapter")
        .version(clap::crate_version!())
        .about("Runs the protein inference engine Fido on identification results")
        .arg(
            Arg::new("in")
                .long("in")
                .required(true)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Input: identification results (JSON)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .required(true)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Output: identification results with scored/grouped proteins")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("exe")
                .long("exe")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path to the executable to use, or to the directory containing the \
                     'Fido' and 'FidoChooseParameters' executables; may be omitted if \
                     the executables are globally available",
                )
                .value_hint(ValueHint::AnyPath),
        )
        .arg(
            Arg::new("prob-param")
                .long("prob-param")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Read the peptide probability from this meta-value of the input \
                     instead of from the score field, if available",
                ),
        )
        .arg(
            Arg::new("separate-runs")
                .long("separate-runs")
                .action(ArgAction::SetTrue)
                .help(
                    "Process multiple protein identification runs in the input \
                     separately, don't merge them",
                ),
        )
        .arg(
            Arg::new("keep-zero-group")
                .long("keep-zero-group")
                .action(ArgAction::SetTrue)
                .help(
                    "Keep the group of proteins with estimated probability of zero, \
                     which is otherwise removed (it may be very large)",
                ),
        )
        .arg(
            Arg::new("no-cleanup")
                .long("no-cleanup")
                .action(ArgAction::SetTrue)
                .help("Omit clean-up of peptide sequences (removal of non-letter characters, replacement of I with L)"),
        )
        .arg(
            Arg::new("all-psms")
                .long("all-psms")
                .action(ArgAction::SetTrue)
                .help("Consider all PSMs of each peptide, instead of only the best one"),
        )
        .arg(
            Arg::new("group-level")
                .long("group-level")
                .action(ArgAction::SetTrue)
                .help(
                    "Perform inference on protein group level (instead of individual \
                     protein level); this will lead to higher probabilities for \
                     (bigger) protein groups",
                ),
        )
        .arg(
            Arg::new("accuracy")
                .long("accuracy")
                .value_parser(["best", "relaxed", "sloppy"])
                .help(
                    "Accuracy level of start parameters; there is a trade-off between \
                     accuracy and runtime (default: 'best')",
                ),
        )
        .arg(
            Arg::new("log2-states")
                .long("log2-states")
                .value_parser(value_parser!(u32))
                .help(
                    "Binary logarithm of the max. number of connected states in a \
                     subgraph; for a value N, subgraphs bigger than 2^N are split up, \
                     sacrificing accuracy for runtime ('0' uses the default, 18)",
                ),
        )
        .arg(
            Arg::new("log2-states-precalc")
                .long("log2-states-precalc")
                .value_parser(value_parser!(u32))
                .help("Like 'log2-states', but allows to set a separate limit for the precalculation"),
        )
        .arg(
            Arg::new("prob-protein")
                .long("prob-protein")
                .value_parser(value_parser!(f64))
                .help("Protein prior probability ('gamma' parameter) for running the solver directly, without parameter estimation"),
        )
        .arg(
            Arg::new("prob-peptide")
                .long("prob-peptide")
                .value_parser(value_parser!(f64))
                .help("Peptide emission probability ('alpha' parameter)"),
        )
        .arg(
            Arg::new("prob-spurious")
                .long("prob-spurious")
                .value_parser(value_parser!(f64))
                .help("Spurious peptide identification probability ('beta' parameter)"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_parser(value_parser!(u64))
                .help("Terminate a solver invocation after this many seconds (default: wait indefinitely)"),
        )
        .arg(
            Arg::new("keep-temp-files")
                .long("keep-temp-files")
                .action(ArgAction::SetTrue)
                .help("Keep the temporary solver input/output files for inspection"),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
}

pub struct Runner {
    input: Input,
}

impl Runner {
    pub fn new(input: Input) -> Self {
        Self { input }
    }

    /// Load the identification document, run the adapter, write the
    /// augmented document back out. Returns the process exit code.
    pub fn run(self) -> anyhow::Result<i32> {
        info!("reading input data");
        let text = std::fs::read_to_string(&self.input.in_path)
            .with_context(|| format!("failed to read `{}`", self.input.in_path))?;
        let mut data: IdentificationData = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse `{}`", self.input.in_path))?;

        if data.protein_identifications.is_empty() || data.peptide_identifications.is_empty() {
            log::error!(
                "input file `{}` should contain both protein and peptide data",
                self.input.in_path
            );
            return Ok(EXIT_INPUT_EMPTY);
        }

        let success = fido_core::reconcile::run_inference(
            &mut data.protein_identifications,
            &mut data.peptide_identifications,
            &self.input.options,
        )?;

        let json = serde_json::to_string_pretty(&data)?;
        std::fs::write(&self.input.out_path, json)
            .with_context(|| format!("failed to write `{}`", self.input.out_path))?;
        info!("wrote results to `{}`", self.input.out_path);

        Ok(if success {
            EXIT_OK
        } else {
            EXIT_EXTERNAL_PROGRAM_ERROR
        })
    }
}
