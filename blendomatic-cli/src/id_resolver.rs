//! Run id resolution
//!
//! Lets users type `7` for run `0007`: an exact id is used as is, otherwise
//! the number is matched against the runs on the active backend.

use anyhow::{Context, Result, anyhow};
use blendomatic_core::run_id::parse_run_number;

/// Resolve user input to an existing run id
///
/// # Arguments
/// * `run_ids` - Ids present on the active backend
/// * `input` - Exact id or bare run number
///
/// # Errors
/// Returns an error if the input is not a number or no run carries it
pub fn resolve_run_id(run_ids: &[String], input: &str) -> Result<String> {
    let input = input.trim();
    if run_ids.iter().any(|id| id == input) {
        return Ok(input.to_string());
    }

    let number = parse_run_number(input)
        .with_context(|| format!("'{}' is not a run id", input))?;

    let matches: Vec<&String> = run_ids
        .iter()
        .filter(|id| parse_run_number(id) == Some(number))
        .collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No run found with number {}", number)),
        [only] => Ok((*only).clone()),
        many => Err(anyhow!(
            "Run number {} is ambiguous: {}",
            number,
            many.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> Vec<String> {
        vec!["0012".to_string(), "0007".to_string(), "10000".to_string()]
    }

    #[test]
    fn test_exact_and_numeric_match() {
        assert_eq!(resolve_run_id(&ids(), "0007").unwrap(), "0007");
        assert_eq!(resolve_run_id(&ids(), "7").unwrap(), "0007");
        assert_eq!(resolve_run_id(&ids(), "010000").unwrap(), "10000");
    }

    #[test]
    fn test_unknown_or_malformed() {
        assert!(resolve_run_id(&ids(), "8").is_err());
        assert!(resolve_run_id(&ids(), "run-7").is_err());

        let doubled = vec!["7".to_string(), "0007".to_string()];
        assert!(resolve_run_id(&doubled, "07").is_err());
    }
}
