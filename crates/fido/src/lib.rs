pub mod accession;
pub mod decode;
pub mod graph;
pub mod ident;
pub mod protein_sets;
pub mod reconcile;
pub mod solver;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The identification data cannot be encoded for the solver, or the
    /// solver output refers to data that was never sent. Aborts the whole
    /// adapter invocation.
    #[error("unsuitable identification data: {0}")]
    DataQuality(String),
    /// The solver executable could not be launched.
    #[error("failed to start solver `{exe}`: {source}")]
    ToolStart {
        exe: String,
        #[source]
        source: std::io::Error,
    },
    /// The solver did not terminate before the configured deadline and was
    /// killed.
    #[error("solver `{exe}` did not finish within {timeout:?} and was terminated")]
    ToolTimeout {
        exe: String,
        timeout: std::time::Duration,
    },
    /// The solver's diagnostic trace starts with an exception marker.
    #[error("solver reported an error: {0}")]
    ToolTrace(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// External-tool failures abort only the affected invocation; anything
    /// else aborts the whole adapter run.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Error::ToolStart { .. } | Error::ToolTimeout { .. } | Error::ToolTrace(_)
        )
    }
}
