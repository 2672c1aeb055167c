use crate::models::Vote;

/// Vote count for one choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceCount {
    pub choice: String,
    pub votes: usize,
}

/// Counts one vote per viewer per choice. Sorted by count, highest first;
/// ties keep the order in which the choices first received a vote.
pub fn tally(votes: &[Vote]) -> Vec<ChoiceCount> {
    let mut counts: Vec<ChoiceCount> = Vec::new();

    for vote in votes {
        match counts.iter_mut().find(|c| c.choice == vote.choice) {
            Some(count) => count.votes += 1,
            None => counts.push(ChoiceCount {
                choice: vote.choice.clone(),
                votes: 1,
            }),
        }
    }

    // sort_by is stable, so ties stay in first-appearance order
    counts.sort_by(|a, b| b.votes.cmp(&a.votes));
    counts
}

/// One-line summary suitable for chat, e.g. "B: 3 | A: 1 (4 voters)".
pub fn summary_line(votes: &[Vote]) -> String {
    if votes.is_empty() {
        return "No votes were cast.".to_string();
    }
    let counts = tally(votes)
        .iter()
        .map(|c| format!("{}: {}", c.choice, c.votes))
        .collect::<Vec<_>>()
        .join(" | ");
    format!("{} ({} voters)", counts, votes.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn votes(pairs: &[(&str, &str)]) -> Vec<Vote> {
        pairs.iter().map(|(u, c)| Vote::new(*u, *c)).collect()
    }

    #[test]
    fn counts_sorted_with_stable_ties() {
        let result = tally(&votes(&[("a", "X"), ("b", "Y"), ("c", "Y"), ("d", "Z"), ("e", "X"), ("f", "Y")]));
        let flat: Vec<(&str, usize)> = result.iter().map(|c| (c.choice.as_str(), c.votes)).collect();
        assert_eq!(flat, vec![("Y", 3), ("X", 2), ("Z", 1)]);
    }

    #[test]
    fn summary_for_empty_round() {
        assert_eq!(summary_line(&[]), "No votes were cast.");
    }

    #[test]
    fn summary_lists_counts() {
        let line = summary_line(&votes(&[("a", "B"), ("b", "A"), ("c", "B")]));
        assert_eq!(line, "B: 2 | A: 1 (3 voters)");
    }
}
