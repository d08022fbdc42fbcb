//! Run identifiers
//!
//! Run ids are zero-padded decimal numbers. The allocation floor is the
//! largest number either backend has ever seen; the store gathers the
//! candidates and this module decides.

use thiserror::Error;

/// Default zero-pad width for run ids
pub const DEFAULT_RUN_ID_WIDTH: usize = 4;

/// Format a run number, widening past `width` when the number needs it
pub fn format_run_id(number: u64, width: usize) -> String {
    format!("{:0width$}", number, width = width)
}

/// Parse a run directory name or key segment; only plain digits qualify
pub fn parse_run_number(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// The four places a highest-used run number can be observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationCandidates {
    pub local_counter: Option<u64>,
    pub local_highest: Option<u64>,
    pub remote_counter: Option<u64>,
    pub remote_highest: Option<u64>,
}

impl AllocationCandidates {
    /// Highest number observed anywhere, 0 when nothing was found
    pub fn floor(&self) -> u64 {
        [
            self.local_counter,
            self.local_highest,
            self.remote_counter,
            self.remote_highest,
        ]
        .into_iter()
        .flatten()
        .max()
        .unwrap_or(0)
    }
}

/// Why no run number could be handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// The requested number is at or below the floor
    #[error("run number {0} was already used")]
    Taken(u64),

    /// The floor is already the largest representable number
    #[error("run numbers are exhausted (floor {0})")]
    Exhausted(u64),
}

/// Pick the run number to hand out
///
/// Without an explicit request this is `floor + 1`. An explicit request must
/// be strictly above the floor.
pub fn next_run_number(floor: u64, explicit: Option<u64>) -> Result<u64, AllocationError> {
    match explicit {
        Some(requested) if requested > floor => Ok(requested),
        Some(requested) => Err(AllocationError::Taken(requested)),
        None => floor.checked_add(1).ok_or(AllocationError::Exhausted(floor)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_run_id_pads_and_widens() {
        assert_eq!(format_run_id(7, 4), "0007");
        assert_eq!(format_run_id(9999, 4), "9999");
        assert_eq!(format_run_id(10000, 4), "10000");
        assert_eq!(format_run_id(12, 2), "12");
    }

    #[test]
    fn test_parse_run_number() {
        assert_eq!(parse_run_number("0042"), Some(42));
        assert_eq!(parse_run_number("42"), Some(42));
        assert_eq!(parse_run_number(""), None);
        assert_eq!(parse_run_number("_cache"), None);
        assert_eq!(parse_run_number("+42"), None);
        assert_eq!(parse_run_number("4a"), None);
    }

    #[test]
    fn test_floor_takes_max_of_candidates() {
        let candidates = AllocationCandidates {
            local_counter: Some(3),
            local_highest: Some(5),
            remote_counter: None,
            remote_highest: Some(11),
        };
        assert_eq!(candidates.floor(), 11);
        assert_eq!(AllocationCandidates::default().floor(), 0);
    }

    #[test]
    fn test_next_run_number() {
        assert_eq!(next_run_number(0, None), Ok(1));
        assert_eq!(next_run_number(11, None), Ok(12));
        assert_eq!(next_run_number(11, Some(20)), Ok(20));
        assert_eq!(next_run_number(11, Some(11)), Err(AllocationError::Taken(11)));
        assert_eq!(next_run_number(11, Some(4)), Err(AllocationError::Taken(4)));
    }

    #[test]
    fn test_next_run_number_at_max_floor() {
        assert_eq!(
            next_run_number(u64::MAX, None),
            Err(AllocationError::Exhausted(u64::MAX))
        );
        assert_eq!(
            next_run_number(u64::MAX, Some(u64::MAX)),
            Err(AllocationError::Taken(u64::MAX))
        );
    }
}
