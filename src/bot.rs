use crate::config::Config;
use crate::error::{BotError, BotResult};
use crate::event::BotEvent;
use crate::models::{SubscriptionTable, Vote};
use crate::report::{self, ReportWriter};
use crate::tasks;
use crate::twitch::chat::ChatSink;
use crate::voting::plurality::{self, ChoiceCount};
use crate::voting::queue::{JoinOutcome, Waitlist};
use crate::voting::{Round, TickOutcome};
use log::{debug, error, info};
use std::fmt::Write as _;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How many queue entries `!queue` shows in chat.
pub const QUEUE_PREVIEW: usize = 5;

/// Owns every piece of mutable state. Only the event loop touches it, so no
/// locking is needed.
pub struct VoteBot<S: ChatSink> {
    chat: S,
    round: Round,
    queue: Waitlist,
    default_choices: Vec<String>,
    default_seconds: u32,
    queue_keywords: Vec<String>,
    subscriptions: SubscriptionTable,
    reports: ReportWriter,
    last_results: Vec<Vote>,
    greeting: Option<String>,
    events: Option<mpsc::Sender<BotEvent>>,
    ticker: Option<JoinHandle<()>>,
}

impl<S: ChatSink> VoteBot<S> {
    pub fn new(chat: S, config: &Config) -> Self {
        Self {
            chat,
            round: Round::new(config.warning_seconds),
            queue: Waitlist::new(),
            default_choices: config.vote_choices.clone(),
            default_seconds: config.vote_seconds,
            queue_keywords: config.queue_keywords.clone(),
            subscriptions: SubscriptionTable::new(),
            reports: ReportWriter::new(
                config.results_file.clone(),
                config.grouped_file.clone(),
                config.subscriber_bonus,
            ),
            last_results: Vec::new(),
            greeting: config.greeting.clone(),
            events: None,
            ticker: None,
        }
    }

    /// Lets the bot drive its own countdown by posting `Tick` events.
    /// Without it, ticks must be fed in by the caller.
    pub fn with_ticks(mut self, events: mpsc::Sender<BotEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn set_subscriptions(&mut self, table: SubscriptionTable) {
        self.subscriptions = table;
    }

    pub async fn on_joined(&mut self, channel: &str) {
        info!("Joined #{}", channel);
        if let Some(greeting) = &self.greeting {
            self.chat.say(greeting).await;
        }
    }

    // ── Voting ──────────────────────────────────────────────────────────────

    /// Opens a round. Missing arguments fall back to the configured defaults.
    pub async fn start_vote(&mut self, choices: Option<Vec<String>>, seconds: Option<u32>) -> BotResult<u64> {
        if self.round.is_running() {
            return Err(BotError::InvalidCommand("A vote is already running.".to_string()));
        }
        let choices = choices.unwrap_or_else(|| self.default_choices.clone());
        if choices.is_empty() {
            return Err(BotError::InvalidCommand("No vote choices given.".to_string()));
        }
        let seconds = seconds.unwrap_or(self.default_seconds);

        let round_id = self.round.start(choices, seconds);
        info!("Round {} started: {:?} for {}s", round_id, self.round.choices(), seconds);

        if let Some(events) = &self.events {
            self.ticker = Some(tasks::countdown::spawn(round_id, events.clone()));
        }

        self.chat
            .say(&format!(
                "🚨 Voting has started! Type {} to choose. You have {} seconds!",
                self.round.choices().join(", "),
                seconds
            ))
            .await;
        Ok(round_id)
    }

    /// Records a vote and acknowledges it in chat.
    pub async fn cast_vote(&mut self, user: &str, choice: &str) -> bool {
        if !self.round.record_vote(user, choice) {
            return false;
        }
        debug!("{} voted {}", user, choice);
        self.chat.say(&format!("{} chose {}!", user, choice)).await;
        true
    }

    /// Advances the countdown for `round_id`. Ticks for other rounds are ignored.
    pub async fn tick(&mut self, round_id: u64) -> TickOutcome {
        if round_id != self.round.id() {
            return TickOutcome::Idle;
        }

        let outcome = self.round.tick();
        match outcome {
            TickOutcome::Idle => {}
            TickOutcome::Remaining(left) => debug!("Countdown: {}s", left),
            TickOutcome::Warning(left) => {
                self.chat.say(&format!("⏳ {} seconds left!", left)).await;
            }
            TickOutcome::Expired => {
                if !self.round.was_stopped() {
                    self.chat.say("Voting time is over!").await;
                }
                self.finish().await;
            }
        }
        outcome
    }

    /// Ends the running round early and saves its results.
    pub async fn stop_vote(&mut self) -> BotResult<()> {
        if !self.round.is_running() {
            return Err(BotError::InvalidCommand("No vote is running.".to_string()));
        }
        self.round.stop();
        self.chat.say("⏹️ Voting has been stopped!").await;
        self.finish().await;
        Ok(())
    }

    /// Closes the round: saves both reports, posts the tally, clears state.
    async fn finish(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }

        let votes = self.round.finalize();
        info!("Round {} finished with {} vote(s)", self.round.id(), votes.len());

        if let Err(e) = self.reports.write(&votes, &self.subscriptions) {
            error!("Vote results were not fully saved: {}", e);
        }
        self.chat
            .say(&format!("Results: {}", plurality::summary_line(&votes)))
            .await;
        self.last_results = votes;
    }

    // ── Queue ───────────────────────────────────────────────────────────────

    pub fn is_queue_keyword(&self, content: &str) -> bool {
        self.queue_keywords.iter().any(|k| k == content)
    }

    pub async fn join_queue(&mut self, user: &str) -> JoinOutcome {
        let outcome = self.queue.join(user);
        match outcome {
            JoinOutcome::Joined(position) => {
                info!("{} joined the queue at #{}", user, position);
                self.chat.say(&format!("{} joined the queue!", user)).await;
            }
            JoinOutcome::AlreadyQueued => {
                self.chat.say(&format!("{} is already in the queue.", user)).await;
            }
        }
        outcome
    }

    pub async fn leave_queue(&mut self, user: &str) -> bool {
        let left = self.queue.leave(user);
        if left {
            self.chat.say(&format!("{} left the queue.", user)).await;
        }
        left
    }

    pub async fn announce_queue(&self) {
        self.chat.say(&self.queue_preview()).await;
    }

    /// Chat version of the queue: the first few entries only.
    pub fn queue_preview(&self) -> String {
        if self.queue.is_empty() {
            return "The queue is empty.".to_string();
        }
        let entries = self
            .queue
            .head(QUEUE_PREVIEW)
            .iter()
            .enumerate()
            .map(|(idx, user)| format!("{}. {}", idx + 1, user))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Queue: {}", entries)
    }

    pub fn set_queue_keywords(&mut self, keywords: Vec<String>) {
        info!("Queue keywords set to {:?}", keywords);
        self.queue_keywords = keywords;
    }

    pub fn remove_from_queue(&mut self, user: &str) -> bool {
        self.queue.remove(user)
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    // ── Views ───────────────────────────────────────────────────────────────

    pub fn round(&self) -> &Round {
        &self.round
    }

    #[cfg(test)]
    pub fn queue(&self) -> &Waitlist {
        &self.queue
    }

    pub fn queue_keywords(&self) -> &[String] {
        &self.queue_keywords
    }

    pub fn last_results(&self) -> &[Vote] {
        &self.last_results
    }

    pub fn tally(&self) -> Vec<ChoiceCount> {
        plurality::tally(&self.last_results)
    }

    pub fn results_table(&self) -> String {
        report::render_table(&self.last_results, &self.subscriptions, self.reports.subscriber_bonus())
    }

    pub fn queue_table(&self) -> String {
        if self.queue.is_empty() {
            return "Queue is empty.".to_string();
        }
        let mut out = String::new();
        for (idx, user) in self.queue.entries().iter().enumerate() {
            let _ = writeln!(out, "{:>4}. {}", idx + 1, user);
        }
        out
    }

    pub fn status(&self) -> String {
        let round = if self.round.is_running() {
            let started = self
                .round
                .started_at()
                .map(|t| t.format("%H:%M:%S UTC").to_string())
                .unwrap_or_default();
            format!(
                "vote running since {}: {}s left of {}, {} vote(s), choices {}",
                started,
                self.round.remaining(),
                self.round.duration(),
                self.round.vote_count(),
                self.round.choices().join(", ")
            )
        } else {
            "no vote running".to_string()
        };
        format!(
            "{}; queue has {} viewer(s); queue keywords {:?}; {} subscriber(s) known",
            round,
            self.queue.len(),
            self.queue_keywords,
            self.subscriptions.len()
        )
    }
}
