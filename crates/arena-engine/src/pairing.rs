//! Round-robin pairing generation
//!
//! Every unordered pair of loaded strategies meets once per iteration. Pairs
//! are produced in combinations order: `(0,1), (0,2), ..., (1,2), ...`, and
//! the lower index always takes the first seat.

/// Number of matches one iteration schedules for `participant_count` strategies
pub fn calculate_match_count(participant_count: usize) -> usize {
    if participant_count < 2 {
        return 0;
    }
    participant_count * (participant_count - 1) / 2
}

/// All `(i, j)` with `i < j < participant_count`, in combinations order
pub fn round_robin_pairs(participant_count: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::with_capacity(calculate_match_count(participant_count));
    for i in 0..participant_count {
        for j in (i + 1)..participant_count {
            pairs.push((i, j));
        }
    }
    pairs
}
