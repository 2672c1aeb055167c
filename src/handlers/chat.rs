use crate::bot::VoteBot;
use crate::models::ChatMessage;
use crate::twitch::chat::ChatSink;
use log::debug;

pub const QUEUE_COMMAND: &str = "!QUEUE";
pub const LEAVE_COMMAND: &str = "!LEAVE";

/// Viewer side of the bot. Content is matched trimmed and upper-cased, so
/// "  a " votes for choice "A".
pub async fn handle_chat<S: ChatSink>(bot: &mut VoteBot<S>, msg: &ChatMessage) {
    let content = msg.text.trim().to_uppercase();
    let user = msg.user.as_str();
    debug!("#{} <{}> {}", msg.channel, msg.display_name, msg.text);

    if bot.round().is_running() && bot.round().choices().contains(&content) {
        bot.cast_vote(user, &content).await;
    }

    if bot.is_queue_keyword(&content) {
        bot.join_queue(user).await;
    }

    match content.as_str() {
        QUEUE_COMMAND => bot.announce_queue().await,
        LEAVE_COMMAND => {
            bot.leave_queue(user).await;
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::test_support::bot_in;

    fn msg(user: &str, text: &str) -> ChatMessage {
        ChatMessage {
            user: user.to_string(),
            display_name: user.to_string(),
            channel: "chan".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn vote_is_case_and_space_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let (mut bot, sink) = bot_in(dir.path());
        bot.start_vote(None, None).await.unwrap();

        handle_chat(&mut bot, &msg("alice", "  a ")).await;
        handle_chat(&mut bot, &msg("alice", "B")).await;
        handle_chat(&mut bot, &msg("bob", "hello")).await;

        assert_eq!(bot.round().vote_count(), 1);
        assert_eq!(sink.last().unwrap(), "alice chose A!");
    }

    #[tokio::test]
    async fn queue_keyword_works_without_a_round() {
        let dir = tempfile::tempdir().unwrap();
        let (mut bot, sink) = bot_in(dir.path());

        handle_chat(&mut bot, &msg("alice", "!join")).await;
        handle_chat(&mut bot, &msg("alice", "!JOIN")).await;
        handle_chat(&mut bot, &msg("bob", "!join")).await;

        assert_eq!(bot.queue().entries(), ["alice", "bob"]);
        let lines = sink.lines();
        assert_eq!(lines[0], "alice joined the queue!");
        assert_eq!(lines[1], "alice is already in the queue.");

        handle_chat(&mut bot, &msg("carol", "!queue")).await;
        assert_eq!(sink.last().unwrap(), "Queue: 1. alice, 2. bob");

        handle_chat(&mut bot, &msg("alice", "!leave")).await;
        assert_eq!(bot.queue().entries(), ["bob"]);
    }

    #[tokio::test]
    async fn choices_are_only_votes_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let (mut bot, sink) = bot_in(dir.path());

        handle_chat(&mut bot, &msg("alice", "A")).await;
        assert!(sink.lines().is_empty());
        assert_eq!(bot.round().vote_count(), 0);
    }
}
