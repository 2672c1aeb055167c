use crate::error::BotResult;
use crate::models::{SubscriptionTable, Vote};
use log::{error, info};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes the two result files at the end of every round.
///
/// Subscribers are listed twice when `subscriber_bonus` is on, so anyone
/// drawing from the files gives them double weight.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    results_file: PathBuf,
    grouped_file: PathBuf,
    subscriber_bonus: bool,
}

impl ReportWriter {
    pub fn new(results_file: PathBuf, grouped_file: PathBuf, subscriber_bonus: bool) -> Self {
        Self {
            results_file,
            grouped_file,
            subscriber_bonus,
        }
    }

    /// Rewrites both files from scratch. Earlier contents are discarded.
    /// Both files are attempted even if one fails; the first error is returned.
    pub fn write(&self, votes: &[Vote], subs: &SubscriptionTable) -> BotResult<()> {
        let per_vote = save(&self.results_file, &vote_lines(votes, subs, self.subscriber_bonus));
        let grouped = save(&self.grouped_file, &grouped_lines(votes, subs, self.subscriber_bonus));
        per_vote.and(grouped)
    }

    pub fn subscriber_bonus(&self) -> bool {
        self.subscriber_bonus
    }
}

fn save(path: &Path, contents: &str) -> BotResult<()> {
    match fs::write(path, contents) {
        Ok(()) => {
            info!("Results saved to {}", path.display());
            Ok(())
        }
        Err(e) => {
            error!("Could not write {}: {}", path.display(), e);
            Err(e.into())
        }
    }
}

/// How many times a viewer is listed.
fn weight(user: &str, subs: &SubscriptionTable, bonus: bool) -> usize {
    if bonus && subs.tier_of(user).is_subscriber() { 2 } else { 1 }
}

/// `user,choice,tier` per vote, in the order the votes arrived.
pub fn vote_lines(votes: &[Vote], subs: &SubscriptionTable, bonus: bool) -> String {
    let mut out = String::new();
    for vote in votes {
        let tier = subs.tier_of(&vote.user);
        for _ in 0..weight(&vote.user, subs, bonus) {
            let _ = writeln!(out, "{},{},{}", vote.user, vote.choice, tier.short_label());
        }
    }
    out
}

/// Viewer logins grouped under a header per choice. Choices appear in the
/// order they first received a vote.
pub fn grouped_lines(votes: &[Vote], subs: &SubscriptionTable, bonus: bool) -> String {
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for vote in votes {
        let idx = match groups.iter().position(|(choice, _)| *choice == vote.choice) {
            Some(idx) => idx,
            None => {
                groups.push((vote.choice.as_str(), Vec::new()));
                groups.len() - 1
            }
        };
        for _ in 0..weight(&vote.user, subs, bonus) {
            groups[idx].1.push(vote.user.as_str());
        }
    }

    let mut out = String::new();
    for (choice, users) in groups {
        let _ = writeln!(out, "------------- Choice: {} -------------", choice);
        out.push_str(&users.join("\n"));
        out.push('\n');
    }
    out
}

/// Console table shown to the operator when a round ends.
pub fn render_table(votes: &[Vote], subs: &SubscriptionTable, bonus: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>4} | {:<25} | {:<12} | {}", "No.", "Username", "Subscription", "Choice");
    let _ = writeln!(out, "{}", "-".repeat(60));

    let mut row = 0;
    for vote in votes {
        let tier = subs.tier_of(&vote.user);
        for _ in 0..weight(&vote.user, subs, bonus) {
            row += 1;
            let _ = writeln!(out, "{:>4} | {:<25} | {:<12} | {}", row, vote.user, tier.to_string(), vote.choice);
        }
    }
    if row == 0 {
        out.push_str("(no votes)\n");
    }
    out
}
