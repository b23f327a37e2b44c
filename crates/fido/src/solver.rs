//! Construction and execution of the external solver process.
//!
//! The argument vector is assembled once as a template with placeholders
//! for the generated input files, then substituted with the real temp-file
//! paths per invocation. The subprocess blocks the calling thread; both
//! output streams are drained on reader threads so a chatty solver cannot
//! deadlock on a full pipe, and an optional deadline turns an unbounded
//! wait into a reported timeout.

use crate::Error;
use log::warn;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Placeholder substituted with the PSM graph file path.
pub const INPUT_GRAPH: &str = "INPUT_GRAPH";
/// Placeholder substituted with the target/decoy protein-set file path.
pub const INPUT_PROTEINS: &str = "INPUT_PROTEINS";

/// Subgraph-size bound the solver applies when none is given.
const DEFAULT_LOG2_STATES: u32 = 18;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Accuracy tier of the parameter-search start values; a trade-off between
/// accuracy and runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    Best,
    Relaxed,
    Sloppy,
}

impl Accuracy {
    fn code(self) -> u32 {
        match self {
            Accuracy::Best => 1,
            Accuracy::Relaxed => 2,
            Accuracy::Sloppy => 3,
        }
    }
}

impl std::str::FromStr for Accuracy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best" => Ok(Accuracy::Best),
            "relaxed" => Ok(Accuracy::Relaxed),
            "sloppy" => Ok(Accuracy::Sloppy),
            _ => Err(format!(
                "invalid accuracy `{}` (expected best, relaxed or sloppy)",
                s
            )),
        }
    }
}

/// The three solver probabilities: protein prior (gamma), peptide emission
/// (alpha) and spurious identification (beta). All zero means "unknown" and
/// selects the parameter-search variant of the solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    pub protein: f64,
    pub peptide: f64,
    pub spurious: f64,
}

impl SolverParams {
    pub fn is_unset(&self) -> bool {
        self.protein == 0.0 && self.peptide == 0.0 && self.spurious == 0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    /// Path to the solver executable or to the directory containing the
    /// `Fido` and `FidoChooseParameters` binaries; empty if they are on the
    /// search path.
    pub exe: String,
    pub prob: SolverParams,
    /// Binary logarithm of the max. number of connected states in a
    /// subgraph; 0 leaves the solver default in place.
    pub log2_states: u32,
    /// Separate subgraph-size cap for the precalculation step.
    pub log2_states_precalc: u32,
    /// Omit solver-side clean-up of peptide sequences.
    pub no_cleanup: bool,
    /// Consider all PSMs of each peptide instead of only the best one.
    pub all_psms: bool,
    /// Infer on protein group level instead of individual protein level.
    pub group_level: bool,
    pub accuracy: Option<Accuracy>,
    /// Deadline for one solver invocation; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl SolverConfig {
    /// Whether the solver should search for its own parameters.
    pub fn choose_params(&self) -> bool {
        self.prob.is_unset()
    }

    /// Resolve the executable to launch: a bare name to be found on the
    /// search path, a binary inside the configured directory, or the
    /// configured path itself.
    pub fn executable(&self) -> PathBuf {
        let name = if self.choose_params() {
            "FidoChooseParameters"
        } else {
            "Fido"
        };
        if self.exe.is_empty() {
            return PathBuf::from(name);
        }
        let path = Path::new(&self.exe);
        if path.is_dir() {
            path.join(name)
        } else {
            path.to_path_buf()
        }
    }

    /// Assemble the argument template. File paths are represented by the
    /// [`INPUT_GRAPH`]/[`INPUT_PROTEINS`] placeholders and substituted per
    /// invocation with [`substitute_paths`].
    pub fn arg_template(&self) -> Vec<String> {
        let mut args = Vec::new();
        let mut log2_states = self.log2_states;
        if self.choose_params() {
            if self.no_cleanup {
                args.push("-p".to_string());
            }
            if self.all_psms {
                args.push("-a".to_string());
            }
            if self.group_level {
                args.push("-g".to_string());
            }
            if let Some(accuracy) = self.accuracy {
                // one argv entry; the solver scans it as a unit
                args.push(format!("-c {}", accuracy.code()));
            }
            args.push(INPUT_GRAPH.to_string());
            args.push(INPUT_PROTEINS.to_string());
            if self.log2_states_precalc != 0 {
                if log2_states == 0 {
                    log2_states = DEFAULT_LOG2_STATES;
                }
                args.push(self.log2_states_precalc.to_string());
            }
        } else {
            args.push(INPUT_GRAPH.to_string());
            args.push(self.prob.protein.to_string());
            args.push(self.prob.peptide.to_string());
            args.push(self.prob.spurious.to_string());
        }
        if log2_states != 0 {
            args.push(log2_states.to_string());
        }
        args
    }
}

/// Replace the file-path placeholders in `template` with the paths
/// generated for the current invocation.
pub fn substitute_paths(template: &[String], graph: &Path, proteins: &Path) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            arg.replace(INPUT_GRAPH, &graph.to_string_lossy())
                .replace(INPUT_PROTEINS, &proteins.to_string_lossy())
        })
        .collect()
}

/// Captured streams of a solver run that terminated on its own.
#[derive(Debug)]
pub struct SolverOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub status: ExitStatus,
}

/// Launch the solver and block until it terminates or the deadline
/// expires. Start failure and timeout are reported as distinct errors; the
/// exit status of a completed run is recorded but does not fail the
/// invocation, since the solver writes its result to stdout either way.
pub fn run(exe: &Path, args: &[String], timeout: Option<Duration>) -> Result<SolverOutput, Error> {
    let mut child = Command::new(exe)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| Error::ToolStart {
            exe: exe.display().to_string(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let status = wait_with_deadline(&mut child, timeout)?;
    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    match status {
        Some(status) => {
            if !status.success() {
                warn!("solver exited with {}; trying to parse its output anyway", status);
            }
            Ok(SolverOutput {
                stdout,
                stderr,
                status,
            })
        }
        None => Err(Error::ToolTimeout {
            exe: exe.display().to_string(),
            // a timeout was configured, or the wait could not have expired
            timeout: timeout.unwrap_or_default(),
        }),
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> std::thread::JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

/// `Ok(Some(status))` when the child terminated, `Ok(None)` when the
/// deadline expired and the child was killed.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<Option<ExitStatus>, Error> {
    let limit = match timeout {
        Some(limit) => limit,
        None => return Ok(Some(child.wait()?)),
    };
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            // the child may win the race and exit before the kill lands
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
