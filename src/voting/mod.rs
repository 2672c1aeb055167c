pub mod plurality;
pub mod queue;

use crate::models::Vote;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// What a one-second countdown step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No round is running.
    Idle,
    /// Seconds left after this tick.
    Remaining(u32),
    /// Seconds left, and this is the configured warning point.
    Warning(u32),
    /// The countdown reached zero; the round must be finalized.
    Expired,
}

/// State of the current voting round.
///
/// A viewer can vote once per round. Votes are kept in arrival order, which is
/// the order the reports list them in.
#[derive(Debug)]
pub struct Round {
    id: u64,
    choices: Vec<String>,
    duration: u32,
    remaining: u32,
    warning_at: u32,
    running: bool,
    stopped: bool,
    started_at: Option<DateTime<Utc>>,
    votes: Vec<Vote>,
    voters: HashSet<String>,
}

impl Round {
    pub fn new(warning_at: u32) -> Self {
        Self {
            id: 0,
            choices: Vec::new(),
            duration: 0,
            remaining: 0,
            warning_at,
            running: false,
            stopped: false,
            started_at: None,
            votes: Vec::new(),
            voters: HashSet::new(),
        }
    }

    /// Opens a new round and returns its id. Ticks carrying another id are stale.
    pub fn start(&mut self, choices: Vec<String>, duration: u32) -> u64 {
        self.id += 1;
        self.choices = choices;
        self.duration = duration;
        self.remaining = duration;
        self.running = true;
        self.stopped = false;
        self.started_at = Some(Utc::now());
        self.votes.clear();
        self.voters.clear();
        self.id
    }

    /// Records `user`'s vote. Returns false when the round is closed, the
    /// choice isn't offered, or the viewer already voted.
    pub fn record_vote(&mut self, user: &str, choice: &str) -> bool {
        if !self.running || !self.choices.iter().any(|c| c == choice) {
            return false;
        }
        if !self.voters.insert(user.to_string()) {
            return false;
        }
        self.votes.push(Vote::new(user, choice));
        true
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }
        self.remaining = self.remaining.saturating_sub(1);
        match self.remaining {
            0 => TickOutcome::Expired,
            n if n == self.warning_at => TickOutcome::Warning(n),
            n => TickOutcome::Remaining(n),
        }
    }

    /// Ends the countdown early. The caller still has to finalize.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.remaining = 0;
    }

    /// Closes the round and hands back its votes in arrival order.
    /// Both the vote list and the set of seen voters are emptied.
    pub fn finalize(&mut self) -> Vec<Vote> {
        self.running = false;
        self.remaining = 0;
        self.voters.clear();
        std::mem::take(&mut self.votes)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn was_stopped(&self) -> bool {
        self.stopped
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn vote_count(&self) -> usize {
        self.votes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choices(list: &[&str]) -> Vec<String> {
        list.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn one_vote_per_viewer_per_round() {
        let mut round = Round::new(10);
        round.start(choices(&["A", "B"]), 30);

        assert!(round.record_vote("alice", "A"));
        assert!(!round.record_vote("alice", "B"));
        assert!(round.record_vote("bob", "B"));
        assert_eq!(round.vote_count(), 2);

        let votes = round.finalize();
        assert_eq!(votes[0].user, "alice");
        assert_eq!(votes[0].choice, "A");
        assert_eq!(votes[1].user, "bob");
    }

    #[test]
    fn votes_rejected_outside_round_or_for_unknown_choice() {
        let mut round = Round::new(10);
        assert!(!round.record_vote("alice", "A"));

        round.start(choices(&["A"]), 5);
        assert!(!round.record_vote("alice", "Z"));
        // A rejected choice doesn't use up the viewer's vote
        assert!(round.record_vote("alice", "A"));
    }

    #[test]
    fn countdown_strictly_decreases_to_expiry() {
        let mut round = Round::new(2);
        round.start(choices(&["A"]), 4);

        assert_eq!(round.tick(), TickOutcome::Remaining(3));
        assert_eq!(round.tick(), TickOutcome::Warning(2));
        assert_eq!(round.tick(), TickOutcome::Remaining(1));
        assert_eq!(round.tick(), TickOutcome::Expired);
        assert_eq!(round.remaining(), 0);
    }

    #[test]
    fn zero_length_round_expires_on_first_tick() {
        let mut round = Round::new(10);
        round.start(choices(&["A"]), 0);
        assert_eq!(round.tick(), TickOutcome::Expired);
    }

    #[test]
    fn idle_round_does_not_tick() {
        let mut round = Round::new(10);
        assert_eq!(round.tick(), TickOutcome::Idle);
    }

    #[test]
    fn finalize_clears_votes_and_voters() {
        let mut round = Round::new(10);
        round.start(choices(&["A"]), 5);
        round.record_vote("alice", "A");

        let votes = round.finalize();
        assert_eq!(votes.len(), 1);
        assert!(!round.is_running());
        assert_eq!(round.vote_count(), 0);
        assert!(round.finalize().is_empty());

        // The seen-voters set went with the votes
        round.start(choices(&["A"]), 5);
        assert!(round.record_vote("alice", "A"));
    }

    #[test]
    fn new_round_resets_stop_flag_and_voters() {
        let mut round = Round::new(10);
        let first = round.start(choices(&["A"]), 5);
        round.record_vote("alice", "A");
        round.stop();
        assert!(round.was_stopped());
        round.finalize();

        let second = round.start(choices(&["A"]), 5);
        assert_ne!(first, second);
        assert!(!round.was_stopped());
        assert!(round.record_vote("alice", "A"));
    }
}
