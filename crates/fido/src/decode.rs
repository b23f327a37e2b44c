//! Decoding of the solver's output streams back into domain objects.
//!
//! Two independent passes: the parameter-search trace on the error stream
//! and the probability groups on the output stream.

use crate::accession::AccessionMap;
use crate::ident::ProteinGroup;
use crate::solver::SolverParams;
use crate::Error;
use log::{info, warn};

const EXCEPTION_MARKER: &str = "caught an exception";
const WARNING_MARKER: &str = "Warning:";
const BEST_PARAMS_MARKER: &str = "Using best gamma, alpha, beta =";

/// Probability groups plus the diagnostics counters of one decode pass.
#[derive(Debug, Default)]
pub struct DecodedGroups {
    pub groups: Vec<ProteinGroup>,
    /// Total number of accessions across all retained groups.
    pub inferred_proteins: usize,
    /// Accessions reported with probability zero, whether retained or not.
    pub zero_probability: usize,
}

/// Scan the parameter-search trace for the resolved solver parameters.
///
/// An exception marker on the first meaningful line fails the whole
/// invocation; a warning marker is surfaced without failing. Returns
/// `None` when the trace carries no usable parameter line, leaving the
/// caller's values untouched.
pub fn parse_parameter_trace(trace: &str) -> Result<Option<SolverParams>, Error> {
    let lines: Vec<&str> = trace.lines().filter(|line| !line.is_empty()).collect();
    let first = match lines.first() {
        Some(first) => *first,
        None => return Ok(None),
    };
    if first.starts_with(EXCEPTION_MARKER) {
        return Err(Error::ToolTrace(first.to_string()));
    }
    if first.starts_with(WARNING_MARKER) {
        warn!("{}", first);
    }
    if let Some(last) = lines.last() {
        if last.starts_with(BEST_PARAMS_MARKER) {
            info!("{}", last);
            let tail = last.rsplit('=').next().unwrap_or("");
            let mut values = tail.split_whitespace().map(str::parse::<f64>);
            if let (Some(Ok(protein)), Some(Ok(peptide)), Some(Ok(spurious))) =
                (values.next(), values.next(), values.next())
            {
                return Ok(Some(SolverParams {
                    protein,
                    peptide,
                    spurious,
                }));
            }
        }
    }
    Ok(None)
}

/// Parse the probability groups from the solver's output stream.
///
/// Each line reads `<probability> { <token> , <token> , ... }`. Tokens are
/// reverse-mapped to raw accessions; a token the map has never issued is a
/// data-quality failure. Accessions with probability zero are counted and,
/// unless `keep_zero_group` is set, dropped. Groups and the group list are
/// both sorted before being returned, so decoding is deterministic.
pub fn parse_groups(
    output: &str,
    accessions: &AccessionMap,
    keep_zero_group: bool,
) -> Result<DecodedGroups, Error> {
    let mut decoded = DecodedGroups::default();

    for line in output.lines() {
        let mut tokens = line.split_whitespace();
        let probability = match tokens.next().map(str::parse::<f64>) {
            Some(Ok(probability)) => probability,
            _ => continue,
        };
        let mut group = Vec::new();
        for token in tokens {
            if matches!(token, "{" | "}" | ",") {
                continue;
            }
            if probability == 0.0 {
                decoded.zero_probability += 1;
                if !keep_zero_group {
                    continue;
                }
            }
            match accessions.resolve(token) {
                Some(raw) => group.push(raw.to_string()),
                None => {
                    return Err(Error::DataQuality(format!(
                        "solver output names unknown protein token `{}`",
                        token
                    )))
                }
            }
        }
        if !group.is_empty() {
            decoded.inferred_proteins += group.len();
            group.sort_unstable();
            decoded.groups.push(ProteinGroup {
                probability,
                accessions: group,
            });
        }
    }

    decoded.groups.sort_by(|a, b| {
        a.probability
            .total_cmp(&b.probability)
            .then_with(|| a.accessions.cmp(&b.accessions))
    });
    Ok(decoded)
}

#[cfg(test)]
mod test {
    use super::*;

    fn map() -> AccessionMap {
        AccessionMap::build(["GP:AJ271067_1", "GP:AJ271068_1", "SW:TRP6_HUMAN"])
    }

    #[test]
    fn parses_probability_groups() {
        // tokens follow sorted-set order of the three accessions
        let output = "0.6788 { SW:TRP6_HUMAN_3 , GP:AJ271067_1_1 , GP:AJ271068_1_2 }\n\
                      0.9 { SW:TRP6_HUMAN_3 }\n";
        let decoded = parse_groups(output, &map(), false).unwrap();
        assert_eq!(decoded.inferred_proteins, 4);
        assert_eq!(decoded.zero_probability, 0);
        assert_eq!(decoded.groups.len(), 2);
        assert_eq!(decoded.groups[0].probability, 0.6788);
        assert_eq!(
            decoded.groups[0].accessions,
            vec!["GP:AJ271067_1", "GP:AJ271068_1", "SW:TRP6_HUMAN"]
        );
        assert_eq!(decoded.groups[1].accessions, vec!["SW:TRP6_HUMAN"]);
    }

    #[test]
    fn group_list_sorts_by_probability_then_accessions() {
        let output = "0.9 { SW:TRP6_HUMAN_3 }\n0.1 { GP:AJ271068_1_2 }\n0.1 { GP:AJ271067_1_1 }\n";
        let decoded = parse_groups(output, &map(), false).unwrap();
        let order: Vec<_> = decoded
            .groups
            .iter()
            .map(|g| (g.probability, g.accessions[0].as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                (0.1, "GP:AJ271067_1"),
                (0.1, "GP:AJ271068_1"),
                (0.9, "SW:TRP6_HUMAN")
            ]
        );
        // decoding the same output again yields the identical group list
        let again = parse_groups(output, &map(), false).unwrap();
        assert_eq!(again.groups, decoded.groups);
    }

    #[test]
    fn zero_probability_groups_are_dropped_but_counted() {
        let output = "0 { SW:TRP6_HUMAN_3 , GP:AJ271067_1_1 }\n";
        let decoded = parse_groups(output, &map(), false).unwrap();
        assert!(decoded.groups.is_empty());
        assert_eq!(decoded.zero_probability, 2);
        assert_eq!(decoded.inferred_proteins, 0);
    }

    #[test]
    fn zero_probability_groups_can_be_retained() {
        let output = "0 { SW:TRP6_HUMAN_3 }\n";
        let decoded = parse_groups(output, &map(), true).unwrap();
        assert_eq!(decoded.groups.len(), 1);
        assert_eq!(decoded.groups[0].probability, 0.0);
        assert_eq!(decoded.zero_probability, 1);
    }

    #[test]
    fn unknown_token_is_a_data_quality_failure() {
        let err = parse_groups("0.5 { NOT_ISSUED_9 }\n", &map(), false).unwrap_err();
        assert!(matches!(err, Error::DataQuality(_)));
    }

    #[test]
    fn trace_with_best_parameters() {
        let trace = "reading graph\n\nchoosing parameters\n\
                     Using best gamma, alpha, beta = 0.5 0.1 0.01\n";
        let params = parse_parameter_trace(trace).unwrap().unwrap();
        assert_eq!(
            params,
            SolverParams {
                protein: 0.5,
                peptide: 0.1,
                spurious: 0.01
            }
        );
    }

    #[test]
    fn trace_with_exception_marker_fails() {
        let err = parse_parameter_trace("caught an exception: bad graph\n").unwrap_err();
        assert!(matches!(err, Error::ToolTrace(_)));
    }

    #[test]
    fn trace_without_parameter_line_yields_none() {
        assert!(parse_parameter_trace("").unwrap().is_none());
        assert!(parse_parameter_trace("Warning: low coverage\n")
            .unwrap()
            .is_none());
    }
}
