/// Counts how many of `ticket_numbers` appear in `winning_numbers`. Both
/// slices are sorted ascending (an invariant the ticket and draw types
/// already enforce at construction), so a two-pointer walk suffices —
/// the off-chain analogue of the teacher's `calculate_matches` /
/// `count_quick_pick_matches`.
pub fn count_matches(ticket_numbers: &[u32], winning_numbers: &[u32]) -> u32 {
    let mut i = 0;
    let mut j = 0;
    let mut matches = 0;
    while i < ticket_numbers.len() && j < winning_numbers.len() {
        match ticket_numbers[i].cmp(&winning_numbers[j]) {
            std::cmp::Ordering::Equal => {
                matches += 1;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_overlap() {
        assert_eq!(count_matches(&[1, 2, 3, 4, 5], &[2, 4, 6, 8, 10]), 2);
        assert_eq!(count_matches(&[1, 2, 3, 4, 5], &[1, 2, 3, 4, 5]), 5);
        assert_eq!(count_matches(&[1, 2, 3, 4, 5], &[6, 7, 8, 9, 10]), 0);
    }

    #[test]
    fn empty_inputs() {
        assert_eq!(count_matches(&[], &[1, 2, 3]), 0);
        assert_eq!(count_matches(&[1, 2, 3], &[]), 0);
    }
}
